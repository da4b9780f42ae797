use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::crm::{CrmAction, CrmActionStatus, CrmActionType, IdempotencyKey};
use crate::domain::intent::Intent;
use crate::domain::slots::CollectedSlots;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Caller,
    Agent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Recognition confidence reported by the transcriber, when the entry
    /// came from speech rather than an internal response.
    pub confidence: Option<f32>,
}

impl TranscriptEntry {
    pub fn caller(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self { speaker: Speaker::Caller, text: text.into(), timestamp: Utc::now(), confidence }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self { speaker: Speaker::Agent, text: text.into(), timestamp: Utc::now(), confidence: None }
    }
}

/// Contextual data attached when the call starts; never mutated afterward.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub caller_number: Option<String>,
    pub assistant_id: Option<String>,
    pub business_name: Option<String>,
}

/// Full mutable state of one in-progress or recently-ended call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub call_id: CallId,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub current_intent: Option<Intent>,
    pub last_intent: Option<Intent>,
    pub collected: CollectedSlots,
    pub transcript: Vec<TranscriptEntry>,
    pub crm_actions: Vec<CrmAction>,
    /// Most recently spoken list of item descriptions, kept so "repeat"
    /// requests can replay exact prior content.
    pub last_menu_read: Option<Vec<String>>,
    pub is_active: bool,
    pub metadata: SessionMetadata,
}

impl Session {
    pub fn new(call_id: CallId, metadata: SessionMetadata) -> Self {
        let now = Utc::now();
        Self {
            call_id,
            created_at: now,
            last_activity: now,
            current_intent: None,
            last_intent: None,
            collected: CollectedSlots::Unassigned,
            transcript: Vec::new(),
            crm_actions: Vec::new(),
            last_menu_read: None,
            is_active: true,
            metadata,
        }
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Sets the intent for the first time. Subsequent detection passes must
    /// not call this again; switching goes through [`Session::switch_intent`].
    pub fn assign_intent(&mut self, intent: Intent) {
        if self.current_intent.is_some() {
            return;
        }
        self.current_intent = Some(intent);
        self.collected = CollectedSlots::for_intent(intent, self.collected.contact_carry_over());
    }

    /// Explicit intent switch: remembers the prior intent and rebuilds the
    /// slot set for the new one, carrying contact details over.
    pub fn switch_intent(&mut self, intent: Intent) {
        self.last_intent = self.current_intent;
        self.current_intent = Some(intent);
        self.collected = CollectedSlots::for_intent(intent, self.collected.contact_carry_over());
    }

    pub fn append_transcript(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry);
        self.touch();
    }

    pub fn last_agent_line(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|entry| entry.speaker == Speaker::Agent)
            .map(|entry| entry.text.as_str())
    }

    pub fn caller_turns(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.transcript.iter().filter(|entry| entry.speaker == Speaker::Caller)
    }

    /// True before the agent has spoken at all; drives the opening greeting.
    pub fn is_first_agent_turn(&self) -> bool {
        !self.transcript.iter().any(|entry| entry.speaker == Speaker::Agent)
    }

    pub fn has_action(&self, action_type: CrmActionType, status: CrmActionStatus) -> bool {
        self.crm_actions
            .iter()
            .any(|action| action.action_type() == action_type && action.status == status)
    }

    /// Duplicate-suppression check for the completion branch: an action of
    /// this type that is already pending or has succeeded blocks a new one.
    pub fn has_open_or_successful_action(&self, action_type: CrmActionType) -> bool {
        self.crm_actions.iter().any(|action| {
            action.action_type() == action_type
                && matches!(action.status, CrmActionStatus::Pending | CrmActionStatus::Success)
        })
    }

    pub fn find_action_mut(&mut self, key: &IdempotencyKey) -> Option<&mut CrmAction> {
        self.crm_actions.iter_mut().find(|action| &action.idempotency_key == key)
    }

    pub fn find_action(&self, key: &IdempotencyKey) -> Option<&CrmAction> {
        self.crm_actions.iter().find(|action| &action.idempotency_key == key)
    }

    /// Deactivation happens exactly once; later calls are no-ops.
    pub fn deactivate(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.touch();
        true
    }
}
