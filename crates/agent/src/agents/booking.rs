//! Reservation booking agent.
//!
//! Collects party size, date and time, and a name, then commits the seat
//! before opening the CRM reservation record. Losing the slot between check
//! and commit is an alternate-offer branch, never an error, and never leaves
//! a failed action behind.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use frontdesk_core::capabilities::{join_spoken, AvailabilityCalendar, CrmConnector};
use frontdesk_core::config::{BookingConfig, BusinessConfig};
use frontdesk_core::domain::crm::{
    CrmActionStatus, CrmActionType, CrmPayload, ReservationPayload,
};
use frontdesk_core::domain::intent::Intent;
use frontdesk_core::domain::session::{CallId, Session};
use frontdesk_core::domain::slots::{BookingSlots, TimeSlot};
use frontdesk_core::errors::{DomainError, TurnError};
use frontdesk_store::{BeginActionOutcome, SessionStore};

use crate::extraction::SlotExtractor;

use super::{greet_if_first, SlotFillingAgent};

/// Phrases that mark the previous agent line as an alternate-time offer.
/// A time given right after one of these may replace the requested slot.
const ALTERNATE_OFFER_MARKERS: [&str; 2] = ["How about", "fully booked"];

pub struct BookingAgent {
    extractor: Arc<dyn SlotExtractor>,
    crm: Arc<dyn CrmConnector>,
    availability: Arc<dyn AvailabilityCalendar>,
    booking: BookingConfig,
    business: BusinessConfig,
}

impl BookingAgent {
    pub fn new(
        extractor: Arc<dyn SlotExtractor>,
        crm: Arc<dyn CrmConnector>,
        availability: Arc<dyn AvailabilityCalendar>,
        booking: BookingConfig,
        business: BusinessConfig,
    ) -> Self {
        Self { extractor, crm, availability, booking, business }
    }

    fn after_alternate_offer(session: &Session) -> bool {
        session
            .last_agent_line()
            .is_some_and(|line| ALTERNATE_OFFER_MARKERS.iter().any(|marker| line.contains(marker)))
    }

    fn prompt_for_missing(slots: &BookingSlots) -> String {
        if slots.party_size.is_none() {
            "I can help with that. How many people will be joining us?".to_string()
        } else if slots.requested.is_none() {
            "Great. What day and time would you like to come in?".to_string()
        } else {
            "Almost done. What name should I put the reservation under?".to_string()
        }
    }

    async fn offer_alternatives(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        slot: &TimeSlot,
        party_size: u8,
    ) -> Result<String, TurnError> {
        let alternatives = self.availability.alternative_times(&slot.date, party_size).await?;
        if alternatives.is_empty() {
            return Ok(format!(
                "I'm so sorry, we're fully booked {} for a party of {party_size}. Is there \
                 another day that could work?",
                slot.date
            ));
        }
        store.update(call_id, |session| {
            session.last_menu_read = Some(alternatives.clone());
        });
        Ok(format!(
            "I'm sorry, {slot} just filled up for a party of {party_size}. How about {}?",
            join_spoken(&alternatives)
        ))
    }

    async fn complete(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        slots: &BookingSlots,
    ) -> Result<String, TurnError> {
        let name = slots.contact.name.clone().unwrap_or_default();
        let party_size = slots.party_size.unwrap_or_default();
        let Some(slot) = slots.requested.clone() else {
            return Err(TurnError::Domain(DomainError::InvariantViolation(
                "booking completion without a requested slot".to_string(),
            )));
        };

        if !self.availability.is_slot_available(&slot, party_size).await?
            || !self.availability.reserve_slot(&slot, party_size).await?
        {
            return self.offer_alternatives(store, call_id, &slot, party_size).await;
        }

        let payload = ReservationPayload {
            name: name.clone(),
            party_size,
            slot: slot.clone(),
            special_requests: slots.special_requests.clone(),
            phone: slots.contact.phone.clone(),
        };
        match store.begin_crm_action(call_id, CrmPayload::Reservation(payload.clone())) {
            BeginActionOutcome::Started(key) => {
                match self.crm.create_reservation(&payload, &key).await {
                    Ok(outcome) => {
                        let external_id = outcome.external_id().map(str::to_string);
                        if external_id.is_none() {
                            info!(call_id = %call_id, "crm not configured; reservation kept local");
                        }
                        store.update_crm_action(call_id, &key, |action| {
                            if let Err(error) = action.mark_success(external_id.clone()) {
                                warn!(%error, "reservation action already settled");
                            }
                        });
                        Ok(format!(
                            "Perfect, {name}! Your table for {party_size} is booked for {slot}. \
                             We'll see you then!"
                        ))
                    }
                    Err(error) => {
                        warn!(call_id = %call_id, %error, "reservation create failed");
                        store.update_crm_action(call_id, &key, |action| {
                            if let Err(error) = action.mark_failed(error.to_string()) {
                                warn!(%error, "reservation action already settled");
                            }
                        });
                        Ok(format!(
                            "I'm holding your table for {party_size} on {slot}, {name}, but I \
                             couldn't save the booking record. Someone will call to confirm \
                             shortly."
                        ))
                    }
                }
            }
            BeginActionOutcome::AlreadyTracked => Ok(format!(
                "You're already booked, {name}: a table for {party_size} on {slot}."
            )),
            BeginActionOutcome::SessionMissing => Err(TurnError::SessionMissing(call_id.clone())),
        }
    }
}

#[async_trait]
impl SlotFillingAgent for BookingAgent {
    fn intent(&self) -> Intent {
        Intent::Booking
    }

    async fn respond(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        text: &str,
    ) -> Result<String, TurnError> {
        let before =
            store.get(call_id).ok_or_else(|| TurnError::SessionMissing(call_id.clone()))?;
        let correction = self.extractor.is_correction(text);
        let allow_time_overwrite = correction || Self::after_alternate_offer(&before);

        let name = self.extractor.name(text);
        // Sizes outside the configured bounds are treated as not heard; the
        // caller gets the party-size prompt again.
        let party_size = self
            .extractor
            .party_size(text, self.booking.max_party_size)
            .filter(|value| *value >= self.booking.min_party_size);
        let requested = self.extractor.time_slot(text);
        let special_requests = self.extractor.special_requests(text);
        let phone = self.extractor.phone(text);

        let session = store
            .update_collected(call_id, |collected| {
                let Some(slots) = collected.as_booking_mut() else { return };
                if let Some(name) = name {
                    if correction {
                        slots.contact.correct_name(name);
                    } else {
                        slots.contact.fill_name(name);
                    }
                }
                if let Some(phone) = phone {
                    if correction {
                        slots.contact.correct_phone(phone);
                    } else {
                        slots.contact.fill_phone(phone);
                    }
                }
                if let Some(value) = party_size {
                    if correction {
                        slots.party_size = Some(value);
                    } else {
                        slots.fill_party_size(value);
                    }
                }
                if let Some(slot) = requested {
                    if allow_time_overwrite {
                        slots.requested = Some(slot);
                    } else {
                        slots.fill_requested(slot);
                    }
                }
                if let Some(requests) = special_requests {
                    slots.fill_special_requests(requests);
                }
            })
            .ok_or_else(|| TurnError::SessionMissing(call_id.clone()))?;

        let slots = session.collected.as_booking().cloned().ok_or_else(|| {
            TurnError::Domain(DomainError::InvariantViolation(
                "booking agent dispatched without booking slots".to_string(),
            ))
        })?;

        if !slots.is_complete() {
            let reply = Self::prompt_for_missing(&slots);
            return Ok(greet_if_first(&session, &self.business, reply));
        }

        if session.has_action(CrmActionType::ReservationCreate, CrmActionStatus::Failed) {
            return Ok(greet_if_first(
                &session,
                &self.business,
                "Your table is held, and since our booking system is acting up someone will \
                 call you to confirm the details."
                    .to_string(),
            ));
        }

        // Settled or in-flight reservations short-circuit before the seat
        // commit, so a repeated confirmation turn cannot take seats twice.
        if session.has_open_or_successful_action(CrmActionType::ReservationCreate) {
            let settled =
                session.has_action(CrmActionType::ReservationCreate, CrmActionStatus::Success);
            let reply = if settled {
                format!(
                    "You're already booked, {}: a table for {} on {}.",
                    slots.contact.name.as_deref().unwrap_or("there"),
                    slots.party_size.unwrap_or_default(),
                    slots.requested.as_ref().map(ToString::to_string).unwrap_or_default()
                )
            } else {
                "One moment, I'm just confirming your reservation now.".to_string()
            };
            return Ok(greet_if_first(&session, &self.business, reply));
        }

        let reply = self.complete(store, call_id, &slots).await?;
        Ok(greet_if_first(&session, &self.business, reply))
    }
}
