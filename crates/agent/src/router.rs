//! Turn pipeline.
//!
//! Every caller turn runs the same sequence: policy overrides, transcript
//! append, intent detection or switch, agent dispatch. Errors stop at this
//! boundary; the caller always hears a reply.

use std::sync::Arc;

use tracing::{debug, error, info};

use frontdesk_core::domain::intent::Intent;
use frontdesk_core::domain::session::{CallId, TranscriptEntry};
use frontdesk_core::errors::TurnError;
use frontdesk_store::SessionStore;

use crate::agents::SlotFillingAgent;
use crate::intent::IntentClassifier;
use crate::overrides::PolicyOverrideEngine;

/// Keyword hits required in the current utterance before an established
/// intent may be abandoned for a new one.
const SWITCH_HIT_THRESHOLD: usize = 2;

/// Redirection phrases that make a switch explicit. Keyword hits alone never
/// reassign an established intent; the caller has to signal the change.
const SWITCH_MARKERS: [&str; 6] =
    ["actually", "instead", "rather", "forget that", "change of plans", "never mind"];

pub struct AgentRouter {
    overrides: PolicyOverrideEngine,
    classifier: Arc<dyn IntentClassifier>,
    lead: Arc<dyn SlotFillingAgent>,
    booking: Arc<dyn SlotFillingAgent>,
    menu: Arc<dyn SlotFillingAgent>,
}

impl AgentRouter {
    pub fn new(
        overrides: PolicyOverrideEngine,
        classifier: Arc<dyn IntentClassifier>,
        lead: Arc<dyn SlotFillingAgent>,
        booking: Arc<dyn SlotFillingAgent>,
        menu: Arc<dyn SlotFillingAgent>,
    ) -> Self {
        Self { overrides, classifier, lead, booking, menu }
    }

    fn agent_for(&self, intent: Intent) -> &dyn SlotFillingAgent {
        match intent {
            Intent::Lead => self.lead.as_ref(),
            Intent::Booking => self.booking.as_ref(),
            Intent::Menu => self.menu.as_ref(),
        }
    }

    fn switch_acknowledgement(intent: Intent) -> &'static str {
        match intent {
            Intent::Booking => "Sure, let's get a reservation going.",
            Intent::Menu => "Happy to go over the menu.",
            Intent::Lead => "No problem, I can take your details.",
        }
    }

    fn has_switch_marker(text: &str) -> bool {
        let normalized = text.to_ascii_lowercase();
        SWITCH_MARKERS.iter().any(|marker| normalized.contains(marker))
    }

    /// Handles one caller utterance and returns what the agent says back.
    /// Never fails: internal errors degrade to a fixed spoken apology.
    pub async fn process_turn(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        text: &str,
        confidence: Option<f32>,
    ) -> String {
        let Some(session) = store.get(call_id) else {
            error!(call_id = %call_id, "turn for unknown session");
            return TurnError::SessionMissing(call_id.clone()).spoken_fallback().to_string();
        };

        // Overrides run against the session as it stood before this turn,
        // so "repeat" replays prior content, not the current utterance.
        if let Some(reply) = self.overrides.evaluate(&session, text) {
            debug!(call_id = %call_id, "policy override handled the turn");
            store.add_transcript(call_id, TranscriptEntry::caller(text, confidence));
            store.add_transcript(call_id, TranscriptEntry::agent(reply.clone()));
            return reply;
        }

        let history = session.transcript.clone();
        store.add_transcript(call_id, TranscriptEntry::caller(text, confidence));

        let decision = self.classifier.classify(text, &history);
        let mut prefix = None;
        let intent = match session.current_intent {
            None => {
                // Ties and signal-free turns classify as the lead fallback,
                // so the intent is always written on the first routed turn.
                info!(call_id = %call_id, intent = %decision.intent, score = decision.score,
                    "intent assigned");
                store.update(call_id, |session| session.assign_intent(decision.intent));
                decision.intent
            }
            Some(current)
                if decision.intent != current
                    && decision.utterance_hits >= SWITCH_HIT_THRESHOLD
                    && Self::has_switch_marker(text) =>
            {
                info!(call_id = %call_id, from = %current, to = %decision.intent,
                    "intent switched");
                store.update(call_id, |session| session.switch_intent(decision.intent));
                prefix = Some(Self::switch_acknowledgement(decision.intent));
                decision.intent
            }
            Some(current) => current,
        };

        let reply = match self.agent_for(intent).respond(store, call_id, text).await {
            Ok(reply) => reply,
            Err(turn_error) => {
                error!(call_id = %call_id, error = %turn_error, "turn failed");
                turn_error.spoken_fallback().to_string()
            }
        };
        let reply = match prefix {
            Some(acknowledgement) => format!("{acknowledgement} {reply}"),
            None => reply,
        };
        store.add_transcript(call_id, TranscriptEntry::agent(reply.clone()));
        reply
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use frontdesk_core::capabilities::{InMemoryAvailability, InMemoryCrm, StaticMenu};
    use frontdesk_core::config::ConversationConfig;
    use frontdesk_core::domain::intent::Intent;
    use frontdesk_core::domain::session::{CallId, SessionMetadata};
    use frontdesk_store::SessionStore;

    use crate::agents::{BookingAgent, LeadAgent, MenuAgent};
    use crate::extraction::HeuristicExtractor;
    use crate::intent::KeywordIntentClassifier;
    use crate::overrides::PolicyOverrideEngine;

    use super::AgentRouter;

    fn router() -> AgentRouter {
        let config = ConversationConfig::default();
        let extractor = Arc::new(HeuristicExtractor::new());
        let crm = Arc::new(InMemoryCrm::new());
        let availability =
            Arc::new(InMemoryAvailability::new().with_slot("tonight", "7:00 pm", 8));
        AgentRouter::new(
            PolicyOverrideEngine::with_default_rules(),
            Arc::new(KeywordIntentClassifier::new()),
            Arc::new(LeadAgent::new(extractor.clone(), crm.clone(), config.business.clone())),
            Arc::new(BookingAgent::new(
                extractor.clone(),
                crm,
                availability,
                config.booking.clone(),
                config.business.clone(),
            )),
            Arc::new(MenuAgent::new(Arc::new(StaticMenu::sample()), config.business.clone())),
        )
    }

    fn store_with(call: &str) -> (SessionStore, CallId) {
        let store = SessionStore::new(Duration::hours(24));
        let call_id = CallId(call.to_string());
        store.create(call_id.clone(), SessionMetadata::default());
        (store, call_id)
    }

    #[tokio::test]
    async fn first_turn_greets_and_assigns_the_detected_intent() {
        let router = router();
        let (store, call_id) = store_with("c1");

        let reply = router
            .process_turn(&store, &call_id, "I'd like to book a table for tonight", None)
            .await;
        assert!(reply.starts_with("Thanks for calling"));

        let session = store.get(&call_id).expect("session");
        assert_eq!(session.current_intent, Some(Intent::Booking));
        assert_eq!(session.transcript.len(), 2);
    }

    #[tokio::test]
    async fn signal_free_turn_assigns_the_lead_fallback() {
        let router = router();
        let (store, call_id) = store_with("c1");

        let reply = router
            .process_turn(&store, &call_id, "hi, someone told me to give you a ring", None)
            .await;
        assert!(reply.contains("reservation"));
        assert_eq!(store.get(&call_id).expect("session").current_intent, Some(Intent::Lead));
    }

    #[tokio::test]
    async fn cross_intent_tie_assigns_the_lead_fallback() {
        let router = router();
        let (store, call_id) = store_with("c1");

        // One booking hit and one menu hit tie; the turn still routes to lead.
        router.process_turn(&store, &call_id, "a table near the dessert station", None).await;
        assert_eq!(store.get(&call_id).expect("session").current_intent, Some(Intent::Lead));
    }

    #[tokio::test]
    async fn weak_signals_never_steal_an_established_intent() {
        let router = router();
        let (store, call_id) = store_with("c1");

        router.process_turn(&store, &call_id, "I'd like information about catering", None).await;
        // One menu keyword is not enough to abandon the lead flow.
        router.process_turn(&store, &call_id, "we'd want a dessert course", None).await;
        assert_eq!(store.get(&call_id).expect("session").current_intent, Some(Intent::Lead));
    }

    #[tokio::test]
    async fn strong_signals_switch_the_intent_and_acknowledge_it() {
        let router = router();
        let (store, call_id) = store_with("c1");

        router.process_turn(&store, &call_id, "I'd like information about catering", None).await;
        let reply = router
            .process_turn(&store, &call_id, "actually, can I book a table instead?", None)
            .await;
        assert!(reply.contains("reservation going"));

        let session = store.get(&call_id).expect("session");
        assert_eq!(session.current_intent, Some(Intent::Booking));
        assert_eq!(session.last_intent, Some(Intent::Lead));
    }

    #[tokio::test]
    async fn keyword_mentions_without_a_redirection_never_switch_the_intent() {
        let router = router();
        let (store, call_id) = store_with("c1");

        router.process_turn(&store, &call_id, "I'd like information about catering", None).await;
        // Two booking keywords, but the caller never asked to change course.
        router.process_turn(&store, &call_id, "we usually reserve a table for these", None).await;
        assert_eq!(store.get(&call_id).expect("session").current_intent, Some(Intent::Lead));
    }

    #[tokio::test]
    async fn overrides_preempt_intent_routing() {
        let router = router();
        let (store, call_id) = store_with("c1");

        let reply = router
            .process_turn(&store, &call_id, "this is urgent, I need a real person", None)
            .await;
        assert!(reply.contains("connecting you"));
        assert!(store.get(&call_id).expect("session").current_intent.is_none());
    }

    #[tokio::test]
    async fn unknown_session_still_gets_a_spoken_reply() {
        let router = router();
        let store = SessionStore::new(Duration::hours(24));

        let reply =
            router.process_turn(&store, &CallId("ghost".to_string()), "hello", None).await;
        assert!(!reply.is_empty());
    }
}
