use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use frontdesk_core::config::StoreConfig;
use frontdesk_core::domain::crm::{CrmAction, CrmPayload, IdempotencyKey};
use frontdesk_core::domain::session::{CallId, Session, SessionMetadata, TranscriptEntry};
use frontdesk_core::domain::slots::CollectedSlots;

/// Outcome of atomically opening a new side-effect attempt for a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BeginActionOutcome {
    /// A fresh pending action was appended under this key.
    Started(IdempotencyKey),
    /// An action of the same type is already pending or succeeded; the
    /// duplicate attempt is suppressed.
    AlreadyTracked,
    SessionMissing,
}

/// In-memory session records and their mutation API. Every mutation for a
/// given call runs as one closure under the store lock, so two turns racing
/// on the same session cannot interleave a read-modify-write.
pub struct SessionStore {
    sessions: RwLock<HashMap<CallId, Session>>,
    retention: Duration,
}

impl SessionStore {
    pub fn new(retention: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), retention }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(Duration::hours(config.retention_hours as i64))
    }

    /// Creates a session for a starting call. If the call id is already
    /// present the existing session is returned untouched.
    pub fn create(&self, call_id: CallId, metadata: SessionMetadata) -> Session {
        let mut sessions = self.write();
        if let Some(existing) = sessions.get(&call_id) {
            warn!(call_id = %call_id, "session already exists; ignoring duplicate create");
            return existing.clone();
        }
        let session = Session::new(call_id.clone(), metadata);
        sessions.insert(call_id, session.clone());
        session
    }

    pub fn get(&self, call_id: &CallId) -> Option<Session> {
        self.read().get(call_id).cloned()
    }

    /// Atomic read-modify-write for one session. Bumps `last_activity`
    /// before the closure runs and returns the updated snapshot.
    pub fn update<F>(&self, call_id: &CallId, f: F) -> Option<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.write();
        let session = sessions.get_mut(call_id)?;
        session.touch();
        f(session);
        Some(session.clone())
    }

    pub fn update_collected<F>(&self, call_id: &CallId, f: F) -> Option<Session>
    where
        F: FnOnce(&mut CollectedSlots),
    {
        self.update(call_id, |session| f(&mut session.collected))
    }

    pub fn add_transcript(&self, call_id: &CallId, entry: TranscriptEntry) -> bool {
        self.update(call_id, |session| session.append_transcript(entry)).is_some()
    }

    pub fn add_crm_action(&self, call_id: &CallId, action: CrmAction) -> bool {
        self.update(call_id, |session| session.crm_actions.push(action)).is_some()
    }

    /// Duplicate-suppressed open of a new pending action. The check for an
    /// existing pending/successful action of the same type and the append of
    /// the new record happen under one lock acquisition, so two concurrent
    /// completion attempts cannot both start.
    pub fn begin_crm_action(&self, call_id: &CallId, payload: CrmPayload) -> BeginActionOutcome {
        let mut sessions = self.write();
        let Some(session) = sessions.get_mut(call_id) else {
            return BeginActionOutcome::SessionMissing;
        };
        if session.has_open_or_successful_action(payload.action_type()) {
            return BeginActionOutcome::AlreadyTracked;
        }
        let action = CrmAction::pending(payload);
        let key = action.idempotency_key.clone();
        session.crm_actions.push(action);
        session.touch();
        BeginActionOutcome::Started(key)
    }

    /// Applies `f` to the action with the given idempotency key. A missing
    /// session or key is a recoverable no-op: it is logged and reported as
    /// `false`, never surfaced to the caller as an error.
    pub fn update_crm_action<F>(&self, call_id: &CallId, key: &IdempotencyKey, f: F) -> bool
    where
        F: FnOnce(&mut CrmAction),
    {
        let mut sessions = self.write();
        let Some(session) = sessions.get_mut(call_id) else {
            warn!(call_id = %call_id, key = %key, "crm action update for unknown session");
            return false;
        };
        let Some(action) = session.find_action_mut(key) else {
            warn!(call_id = %call_id, key = %key, "no crm action matches idempotency key");
            return false;
        };
        f(action);
        session.touch();
        true
    }

    pub fn deactivate(&self, call_id: &CallId) -> bool {
        let mut sessions = self.write();
        match sessions.get_mut(call_id) {
            Some(session) => session.deactivate(),
            None => false,
        }
    }

    pub fn delete(&self, call_id: &CallId) -> bool {
        self.write().remove(call_id).is_some()
    }

    pub fn list_active(&self) -> Vec<Session> {
        self.read().values().filter(|session| session.is_active).cloned().collect()
    }

    /// Deletes sessions that have been inactive for longer than the
    /// retention window. Active sessions are never touched, whatever their
    /// age.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.is_active || session.last_activity > cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "swept expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CallId, Session>> {
        match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<CallId, Session>> {
        match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use frontdesk_core::domain::crm::{
        ContactPayload, CrmActionStatus, CrmPayload, IdempotencyKey,
    };
    use frontdesk_core::domain::intent::Intent;
    use frontdesk_core::domain::session::{CallId, SessionMetadata, TranscriptEntry};

    use super::{BeginActionOutcome, SessionStore};

    fn store() -> SessionStore {
        SessionStore::new(Duration::hours(24))
    }

    fn call(id: &str) -> CallId {
        CallId(id.to_string())
    }

    fn contact_payload() -> CrmPayload {
        CrmPayload::Contact(ContactPayload {
            name: Some("Test User".to_string()),
            email: Some("test@example.com".to_string()),
            phone: None,
            use_case: None,
        })
    }

    #[test]
    fn duplicate_create_returns_the_existing_session() {
        let store = store();
        let first = store.create(call("c1"), SessionMetadata::default());
        store.update(&call("c1"), |session| session.assign_intent(Intent::Menu));
        let second = store.create(call("c1"), SessionMetadata::default());

        assert_eq!(first.call_id, second.call_id);
        assert_eq!(second.current_intent, Some(Intent::Menu));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_bumps_last_activity() {
        let store = store();
        let created = store.create(call("c1"), SessionMetadata::default());
        let updated = store
            .add_transcript(&call("c1"), TranscriptEntry::caller("hello", Some(0.9)))
            .then(|| store.get(&call("c1")))
            .flatten()
            .expect("session present");
        assert!(updated.last_activity >= created.last_activity);
        assert_eq!(updated.transcript.len(), 1);
    }

    #[test]
    fn begin_crm_action_suppresses_duplicates_of_the_same_type() {
        let store = store();
        store.create(call("c1"), SessionMetadata::default());

        let first = store.begin_crm_action(&call("c1"), contact_payload());
        assert!(matches!(first, BeginActionOutcome::Started(_)));

        // Still pending: a second open attempt of the same type is refused.
        let second = store.begin_crm_action(&call("c1"), contact_payload());
        assert_eq!(second, BeginActionOutcome::AlreadyTracked);
        assert_eq!(store.get(&call("c1")).expect("session").crm_actions.len(), 1);
    }

    #[test]
    fn failed_action_allows_no_automatic_retry_but_success_stays_blocked() {
        let store = store();
        store.create(call("c1"), SessionMetadata::default());

        let outcome = store.begin_crm_action(&call("c1"), contact_payload());
        let BeginActionOutcome::Started(key) = outcome else {
            panic!("expected a started action");
        };
        assert!(store.update_crm_action(&call("c1"), &key, |action| {
            action.mark_failed("crm down").expect("pending -> failed");
        }));

        // Failed is terminal for that attempt; the type is open again only
        // because the action is neither pending nor successful.
        let session = store.get(&call("c1")).expect("session");
        assert_eq!(session.crm_actions[0].status, CrmActionStatus::Failed);
        assert!(!session.has_open_or_successful_action(session.crm_actions[0].action_type()));
    }

    #[test]
    fn update_with_unknown_idempotency_key_is_a_logged_noop() {
        let store = store();
        store.create(call("c1"), SessionMetadata::default());
        let applied = store.update_crm_action(&call("c1"), &IdempotencyKey::generate(), |action| {
            action.error = Some("should never run".to_string());
        });
        assert!(!applied);
        assert!(store.get(&call("c1")).expect("session").crm_actions.is_empty());
    }

    #[test]
    fn deleted_sessions_stay_gone() {
        let store = store();
        store.create(call("c1"), SessionMetadata::default());
        assert!(store.delete(&call("c1")));
        assert!(!store.delete(&call("c1")));
        assert!(store.get(&call("c1")).is_none());
    }

    #[test]
    fn sweep_removes_only_inactive_sessions_past_retention() {
        let store = SessionStore::new(Duration::zero());
        store.create(call("stale"), SessionMetadata::default());
        store.create(call("live"), SessionMetadata::default());
        store.deactivate(&call("stale"));

        let removed = store.sweep();
        assert_eq!(removed, 1);
        assert!(store.get(&call("stale")).is_none());
        assert!(store.get(&call("live")).is_some());
    }

    #[test]
    fn list_active_excludes_deactivated_sessions() {
        let store = store();
        store.create(call("c1"), SessionMetadata::default());
        store.create(call("c2"), SessionMetadata::default());
        store.deactivate(&call("c2"));

        let active = store.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].call_id, call("c1"));
    }
}
