//! In-memory session store for the conversation core.
//!
//! Owns session records and their mutation API; it has no knowledge of
//! dialogue semantics. Side-effect tracking (the CRM action ledger) is
//! layered into the same store so the duplicate-suppression check and the
//! pending insert share one lock acquisition.

pub mod sessions;
pub mod sweeper;

pub use sessions::{BeginActionOutcome, SessionStore};
pub use sweeper::spawn_sweeper;
