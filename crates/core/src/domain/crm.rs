use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::slots::TimeSlot;
use crate::errors::DomainError;

/// Unique token ensuring a side effect is applied at most once. Never reused
/// across two different logical actions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrmActionType {
    ContactUpsert,
    ReservationCreate,
    DealCreate,
}

impl CrmActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContactUpsert => "contact_upsert",
            Self::ReservationCreate => "reservation_create",
            Self::DealCreate => "deal_create",
        }
    }
}

impl std::fmt::Display for CrmActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrmActionStatus {
    Pending,
    Success,
    Failed,
}

/// Typed payload for each side-effect kind; the action type is derived from
/// the payload so the two can never disagree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrmPayload {
    Contact(ContactPayload),
    Reservation(ReservationPayload),
    Deal(DealPayload),
}

impl CrmPayload {
    pub fn action_type(&self) -> CrmActionType {
        match self {
            Self::Contact(_) => CrmActionType::ContactUpsert,
            Self::Reservation(_) => CrmActionType::ReservationCreate,
            Self::Deal(_) => CrmActionType::DealCreate,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub use_case: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPayload {
    pub name: String,
    pub party_size: u8,
    pub slot: TimeSlot,
    pub special_requests: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealPayload {
    pub contact_id: String,
    pub summary: String,
}

/// One tracked attempt to create or update an external business record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmAction {
    pub idempotency_key: IdempotencyKey,
    pub payload: CrmPayload,
    pub status: CrmActionStatus,
    /// External record id reported by the CRM on success, if any.
    pub external_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrmAction {
    pub fn pending(payload: CrmPayload) -> Self {
        let now = Utc::now();
        Self {
            idempotency_key: IdempotencyKey::generate(),
            payload,
            status: CrmActionStatus::Pending,
            external_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn action_type(&self) -> CrmActionType {
        self.payload.action_type()
    }

    /// Status transitions are forward-only: pending may become success or
    /// failed, and terminal states never change again.
    pub fn transition_to(&mut self, next: CrmActionStatus) -> Result<(), DomainError> {
        let allowed = matches!(
            (self.status, next),
            (CrmActionStatus::Pending, CrmActionStatus::Success)
                | (CrmActionStatus::Pending, CrmActionStatus::Failed)
        );
        if !allowed {
            return Err(DomainError::InvalidActionTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_success(&mut self, external_id: Option<String>) -> Result<(), DomainError> {
        self.transition_to(CrmActionStatus::Success)?;
        self.external_id = external_id;
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(CrmActionStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::DomainError;

    use super::{ContactPayload, CrmAction, CrmActionStatus, CrmActionType, CrmPayload};

    fn contact_action() -> CrmAction {
        CrmAction::pending(CrmPayload::Contact(ContactPayload {
            name: Some("Test User".to_string()),
            email: Some("test@example.com".to_string()),
            phone: None,
            use_case: None,
        }))
    }

    #[test]
    fn pending_action_starts_with_fresh_key_and_no_error() {
        let action = contact_action();
        assert_eq!(action.status, CrmActionStatus::Pending);
        assert_eq!(action.action_type(), CrmActionType::ContactUpsert);
        assert!(action.error.is_none());
        assert!(!action.idempotency_key.0.is_empty());
    }

    #[test]
    fn success_is_terminal() {
        let mut action = contact_action();
        action.mark_success(Some("crm-17".to_string())).expect("pending -> success");
        let error = action.mark_failed("late failure").expect_err("success is terminal");
        assert!(matches!(error, DomainError::InvalidActionTransition { .. }));
        assert_eq!(action.external_id.as_deref(), Some("crm-17"));
    }

    #[test]
    fn failed_never_returns_to_pending_or_success() {
        let mut action = contact_action();
        action.mark_failed("crm timeout").expect("pending -> failed");
        assert!(action.mark_success(None).is_err());
        assert_eq!(action.error.as_deref(), Some("crm timeout"));
    }

    #[test]
    fn two_actions_never_share_an_idempotency_key() {
        assert_ne!(contact_action().idempotency_key, contact_action().idempotency_key);
    }
}
