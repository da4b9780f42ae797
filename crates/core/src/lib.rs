//! Domain types and capability seams for the phone frontdesk.
//!
//! This crate has no dialogue logic of its own: it defines the session,
//! slot, and side-effect models, the errors that move between layers, the
//! configuration surface, and the traits external backends plug into.

pub mod capabilities;
pub mod config;
pub mod domain;
pub mod errors;

pub use capabilities::{
    AvailabilityCalendar, CrmConnector, CrmOutcome, InMemoryAvailability, InMemoryCrm, MenuItem,
    MenuSource, SpeechSynthesizer, StaticMenu, Transcriber, Transcription, UnconfiguredCrm,
};
pub use config::{ConfigError, ConversationConfig};
pub use domain::crm::{
    ContactPayload, CrmAction, CrmActionStatus, CrmActionType, CrmPayload, DealPayload,
    IdempotencyKey, ReservationPayload,
};
pub use domain::intent::{Intent, IntentDecision};
pub use domain::session::{CallId, Session, SessionMetadata, Speaker, TranscriptEntry};
pub use domain::slots::{BookingSlots, CollectedSlots, ContactDetails, LeadSlots, TimeSlot};
pub use errors::{CapabilityError, DomainError, TurnError};
