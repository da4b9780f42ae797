//! Conversation engine for the phone frontdesk.
//!
//! Turns flow through a fixed pipeline: policy overrides, intent detection,
//! and a per-intent slot-filling agent that runs its CRM side effect exactly
//! once. [`runtime::ConversationRuntime`] is the entry point; everything else
//! here is the machinery behind it.

pub mod agents;
pub mod extraction;
pub mod intent;
pub mod overrides;
pub mod router;
pub mod runtime;

pub use agents::{BookingAgent, LeadAgent, MenuAgent, SlotFillingAgent};
pub use extraction::{HeuristicExtractor, SlotExtractor};
pub use intent::{IntentClassifier, KeywordIntentClassifier};
pub use overrides::{OverrideFault, OverrideRule, PolicyOverrideEngine};
pub use router::AgentRouter;
pub use runtime::ConversationRuntime;
