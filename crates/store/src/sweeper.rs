use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::sessions::SessionStore;

/// Spawns the retention sweeper on a fixed timer. It only ever deletes
/// sessions already deactivated past the retention window, so it cannot race
/// with an in-progress turn's logical state.
pub fn spawn_sweeper(store: Arc<SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh process does
        // not sweep before any session had a chance to age.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep();
            if removed > 0 {
                info!(removed, "session retention sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use frontdesk_core::domain::session::{CallId, SessionMetadata};

    use super::spawn_sweeper;
    use crate::sessions::SessionStore;

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_sessions_on_its_timer() {
        let store = Arc::new(SessionStore::new(chrono::Duration::zero()));
        store.create(CallId("done".to_string()), SessionMetadata::default());
        store.deactivate(&CallId("done".to_string()));

        let handle = spawn_sweeper(Arc::clone(&store), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(store.is_empty());
        handle.abort();
    }
}
