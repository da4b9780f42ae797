//! Lead capture agent.
//!
//! Collects name and email (phone and use case when offered), then records
//! the contact in the CRM once and follows up with a deal record. A failed
//! CRM write is acknowledged to the caller and never retried automatically.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use frontdesk_core::capabilities::CrmConnector;
use frontdesk_core::config::BusinessConfig;
use frontdesk_core::domain::crm::{
    ContactPayload, CrmActionStatus, CrmActionType, CrmPayload, DealPayload,
};
use frontdesk_core::domain::intent::Intent;
use frontdesk_core::domain::session::CallId;
use frontdesk_core::errors::{DomainError, TurnError};
use frontdesk_store::{BeginActionOutcome, SessionStore};

use crate::extraction::SlotExtractor;

use super::{greet_if_first, SlotFillingAgent};

pub struct LeadAgent {
    extractor: Arc<dyn SlotExtractor>,
    crm: Arc<dyn CrmConnector>,
    business: BusinessConfig,
}

impl LeadAgent {
    pub fn new(
        extractor: Arc<dyn SlotExtractor>,
        crm: Arc<dyn CrmConnector>,
        business: BusinessConfig,
    ) -> Self {
        Self { extractor, crm, business }
    }

    async fn complete(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        payload: ContactPayload,
    ) -> Result<String, TurnError> {
        let name = payload.name.clone().unwrap_or_else(|| "there".to_string());
        match store.begin_crm_action(call_id, CrmPayload::Contact(payload.clone())) {
            BeginActionOutcome::Started(key) => {
                match self.crm.upsert_contact(&payload, &key).await {
                    Ok(outcome) => {
                        let contact_id = outcome.external_id().map(str::to_string);
                        if contact_id.is_none() {
                            info!(call_id = %call_id, "crm not configured; contact kept locally");
                        }
                        store.update_crm_action(call_id, &key, |action| {
                            if let Err(error) = action.mark_success(contact_id.clone()) {
                                warn!(%error, "contact action already settled");
                            }
                        });
                        self.record_deal(store, call_id, &payload, contact_id).await;
                        Ok(format!(
                            "Perfect, {name}! I have your details down and someone from our team \
                             will reach out shortly. Is there anything else I can help with?"
                        ))
                    }
                    Err(error) => {
                        warn!(call_id = %call_id, %error, "contact upsert failed");
                        store.update_crm_action(call_id, &key, |action| {
                            if let Err(error) = action.mark_failed(error.to_string()) {
                                warn!(%error, "contact action already settled");
                            }
                        });
                        Ok(format!(
                            "Thanks, {name}. I'm having trouble saving your details right now, \
                             so I'll have someone call you back to follow up."
                        ))
                    }
                }
            }
            BeginActionOutcome::AlreadyTracked => {
                let settled = store.get(call_id).is_some_and(|session| {
                    session.has_action(CrmActionType::ContactUpsert, CrmActionStatus::Success)
                });
                if settled {
                    Ok(format!(
                        "You're all set, {name}. We already have your details and someone will \
                         be in touch soon."
                    ))
                } else {
                    Ok("One moment, I'm just saving your details now.".to_string())
                }
            }
            BeginActionOutcome::SessionMissing => Err(TurnError::SessionMissing(call_id.clone())),
        }
    }

    /// Opens a deal for the freshly recorded contact. Deal problems are
    /// logged against the action record and never spoken to the caller.
    async fn record_deal(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        contact: &ContactPayload,
        contact_id: Option<String>,
    ) {
        let payload = DealPayload {
            contact_id: contact_id.unwrap_or_else(|| "unconfigured".to_string()),
            summary: contact.use_case.clone().unwrap_or_else(|| "new phone inquiry".to_string()),
        };
        let BeginActionOutcome::Started(key) =
            store.begin_crm_action(call_id, CrmPayload::Deal(payload.clone()))
        else {
            return;
        };
        match self.crm.create_deal(&payload, &key).await {
            Ok(outcome) => {
                let external_id = outcome.external_id().map(str::to_string);
                store.update_crm_action(call_id, &key, |action| {
                    if let Err(error) = action.mark_success(external_id.clone()) {
                        warn!(%error, "deal action already settled");
                    }
                });
            }
            Err(error) => {
                warn!(call_id = %call_id, %error, "deal create failed");
                store.update_crm_action(call_id, &key, |action| {
                    if let Err(error) = action.mark_failed(error.to_string()) {
                        warn!(%error, "deal action already settled");
                    }
                });
            }
        }
    }
}

#[async_trait]
impl SlotFillingAgent for LeadAgent {
    fn intent(&self) -> Intent {
        Intent::Lead
    }

    async fn respond(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        text: &str,
    ) -> Result<String, TurnError> {
        let correction = self.extractor.is_correction(text);
        let name = self.extractor.name(text);
        let email = self.extractor.email(text);
        let phone = self.extractor.phone(text);
        let use_case = self.extractor.use_case(text);

        let session = store
            .update_collected(call_id, |collected| {
                let Some(slots) = collected.as_lead_mut() else { return };
                if let Some(name) = name {
                    if correction {
                        slots.contact.correct_name(name);
                    } else {
                        slots.contact.fill_name(name);
                    }
                }
                if let Some(email) = email {
                    if correction {
                        slots.contact.correct_email(email);
                    } else {
                        slots.contact.fill_email(email);
                    }
                }
                if let Some(phone) = phone {
                    if correction {
                        slots.contact.correct_phone(phone);
                    } else {
                        slots.contact.fill_phone(phone);
                    }
                }
                if let Some(use_case) = use_case {
                    if slots.use_case.is_none() || correction {
                        slots.use_case = Some(use_case);
                    }
                }
            })
            .ok_or_else(|| TurnError::SessionMissing(call_id.clone()))?;

        let slots = session.collected.as_lead().cloned().ok_or_else(|| {
            TurnError::Domain(DomainError::InvariantViolation(
                "lead agent dispatched without lead slots".to_string(),
            ))
        })?;

        if !slots.is_complete() {
            let nothing_collected = slots.contact.name.is_none()
                && slots.contact.email.is_none()
                && slots.contact.phone.is_none()
                && slots.use_case.is_none();
            let reply = if nothing_collected {
                // Fallback-routed turns land here with no signal at all, so
                // the opening line spells out what the caller can ask for.
                format!(
                    "I can help you make a reservation, answer questions about our menu, or \
                     take your details so {} can follow up. Could I start with your name?",
                    self.business.name
                )
            } else if slots.contact.name.is_none() {
                "I'd be happy to have someone follow up with you. Could I get your name?"
                    .to_string()
            } else {
                format!(
                    "Thanks, {}. And what's the best email to reach you at?",
                    slots.contact.name.as_deref().unwrap_or("there")
                )
            };
            return Ok(greet_if_first(&session, &self.business, reply));
        }

        if session.has_action(CrmActionType::ContactUpsert, CrmActionStatus::Failed) {
            return Ok(greet_if_first(
                &session,
                &self.business,
                "I've noted everything down, and since our system is acting up I'll make sure \
                 someone calls you back directly."
                    .to_string(),
            ));
        }

        let payload = ContactPayload {
            name: slots.contact.name.clone(),
            email: slots.contact.email.clone(),
            phone: slots.contact.phone.clone(),
            use_case: slots.use_case.clone(),
        };
        let reply = self.complete(store, call_id, payload).await?;
        Ok(greet_if_first(&session, &self.business, reply))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use frontdesk_core::capabilities::InMemoryCrm;
    use frontdesk_core::config::ConversationConfig;
    use frontdesk_core::domain::crm::{CrmActionStatus, CrmActionType};
    use frontdesk_core::domain::intent::Intent;
    use frontdesk_core::domain::session::{CallId, SessionMetadata};
    use frontdesk_store::SessionStore;

    use crate::extraction::HeuristicExtractor;

    use super::{LeadAgent, SlotFillingAgent};

    fn setup() -> (SessionStore, Arc<InMemoryCrm>, LeadAgent, CallId) {
        let store = SessionStore::new(Duration::hours(24));
        let crm = Arc::new(InMemoryCrm::new());
        let agent = LeadAgent::new(
            Arc::new(HeuristicExtractor::new()),
            crm.clone(),
            ConversationConfig::default().business,
        );
        let call_id = CallId("call-1".to_string());
        store.create(call_id.clone(), SessionMetadata::default());
        store.update(&call_id, |session| session.assign_intent(Intent::Lead));
        (store, crm, agent, call_id)
    }

    #[tokio::test]
    async fn empty_handed_turn_opens_with_the_capability_list() {
        let (store, _crm, agent, call_id) = setup();

        let reply = agent.respond(&store, &call_id, "uh, hello?").await.expect("turn");
        assert!(reply.contains("reservation"));
        assert!(reply.contains("menu"));
        assert!(reply.contains("your name"));
    }

    #[tokio::test]
    async fn prompts_for_name_then_email_then_records_once() {
        let (store, crm, agent, call_id) = setup();

        let reply = agent
            .respond(&store, &call_id, "I'd like information about your services")
            .await
            .expect("turn");
        assert!(reply.contains("your name"));

        let reply = agent
            .respond(&store, &call_id, "My name is Test User")
            .await
            .expect("turn");
        assert!(reply.contains("email"));

        let reply = agent
            .respond(&store, &call_id, "it's test@example.com")
            .await
            .expect("turn");
        assert!(reply.contains("Test User"));

        let session = store.get(&call_id).expect("session");
        assert!(session.has_action(CrmActionType::ContactUpsert, CrmActionStatus::Success));
        assert!(session.has_action(CrmActionType::DealCreate, CrmActionStatus::Success));
        assert_eq!(crm.calls_of("contact"), 1);
        assert_eq!(crm.calls_of("deal"), 1);
    }

    #[tokio::test]
    async fn repeated_completion_turns_do_not_duplicate_the_contact() {
        let (store, crm, agent, call_id) = setup();

        agent
            .respond(&store, &call_id, "My name is Test User and my email is test@example.com")
            .await
            .expect("turn");
        let reply = agent
            .respond(&store, &call_id, "just checking, my email is test@example.com")
            .await
            .expect("turn");

        assert!(reply.contains("already have your details"));
        assert_eq!(crm.calls_of("contact"), 1);
        assert_eq!(store.get(&call_id).expect("session").crm_actions.len(), 2);
    }

    #[tokio::test]
    async fn crm_failure_is_spoken_gracefully_and_never_retried() {
        let (store, crm, agent, call_id) = setup();
        crm.fail_next("simulated outage");

        let reply = agent
            .respond(&store, &call_id, "My name is Test User and my email is test@example.com")
            .await
            .expect("turn");
        assert!(reply.contains("call you back"));

        let session = store.get(&call_id).expect("session");
        assert!(session.has_action(CrmActionType::ContactUpsert, CrmActionStatus::Failed));

        // A later turn acknowledges the failure instead of retrying.
        let reply = agent
            .respond(&store, &call_id, "did that go through?")
            .await
            .expect("turn");
        assert!(reply.contains("calls you back"));
        assert_eq!(crm.calls_of("contact"), 0);
    }

    #[tokio::test]
    async fn correction_overwrites_a_previously_captured_email() {
        let (store, _crm, agent, call_id) = setup();

        agent.respond(&store, &call_id, "My name is Test User").await.expect("turn");
        agent.respond(&store, &call_id, "my email is wrong@example.com").await.expect("turn");
        agent
            .respond(&store, &call_id, "Actually, I meant right@example.com")
            .await
            .expect("turn");

        let session = store.get(&call_id).expect("session");
        let email = session
            .collected
            .contact()
            .and_then(|contact| contact.email.clone());
        assert_eq!(email.as_deref(), Some("right@example.com"));
    }
}
