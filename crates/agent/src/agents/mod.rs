//! Per-intent slot-filling agents.
//!
//! Each agent owns one intent: it pulls whatever slots it can out of the
//! current utterance, asks for the next missing one, and runs its completion
//! side effect exactly once when everything required is in hand.

use async_trait::async_trait;

use frontdesk_core::config::BusinessConfig;
use frontdesk_core::domain::intent::Intent;
use frontdesk_core::domain::session::{CallId, Session};
use frontdesk_core::errors::TurnError;
use frontdesk_store::SessionStore;

pub mod booking;
pub mod lead;
pub mod menu;

pub use booking::BookingAgent;
pub use lead::LeadAgent;
pub use menu::MenuAgent;

#[async_trait]
pub trait SlotFillingAgent: Send + Sync {
    fn intent(&self) -> Intent;

    /// Handles one caller turn for this intent and returns the spoken reply.
    async fn respond(
        &self,
        store: &SessionStore,
        call_id: &CallId,
        text: &str,
    ) -> Result<String, TurnError>;
}

/// Prefixes the configured greeting when the agent has not spoken yet on
/// this call.
pub(crate) fn greet_if_first(
    session: &Session,
    business: &BusinessConfig,
    reply: String,
) -> String {
    if session.is_first_agent_turn() {
        format!("{} {reply}", business.rendered_greeting())
    } else {
        reply
    }
}
