//! Conversation runtime.
//!
//! Owns the session store and the turn pipeline and wires the default
//! capability implementations together. Interface layers talk to this type
//! only.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::info;

use frontdesk_core::capabilities::{
    AvailabilityCalendar, CrmConnector, InMemoryAvailability, MenuSource, StaticMenu,
    UnconfiguredCrm,
};
use frontdesk_core::config::ConversationConfig;
use frontdesk_core::domain::session::{CallId, Session, SessionMetadata};
use frontdesk_store::{spawn_sweeper, SessionStore};

use crate::agents::{BookingAgent, LeadAgent, MenuAgent};
use crate::extraction::HeuristicExtractor;
use crate::intent::KeywordIntentClassifier;
use crate::overrides::PolicyOverrideEngine;
use crate::router::AgentRouter;

/// Path environment variable pointing at an optional TOML config file.
const CONFIG_PATH_ENV: &str = "FRONTDESK_CONFIG";

pub struct ConversationRuntime {
    config: ConversationConfig,
    store: Arc<SessionStore>,
    router: AgentRouter,
}

impl ConversationRuntime {
    pub fn new(
        config: ConversationConfig,
        crm: Arc<dyn CrmConnector>,
        availability: Arc<dyn AvailabilityCalendar>,
        menu: Arc<dyn MenuSource>,
    ) -> Self {
        let extractor = Arc::new(HeuristicExtractor::new());
        let router = AgentRouter::new(
            PolicyOverrideEngine::with_default_rules(),
            Arc::new(KeywordIntentClassifier::new()),
            Arc::new(LeadAgent::new(extractor.clone(), crm.clone(), config.business.clone())),
            Arc::new(BookingAgent::new(
                extractor,
                crm,
                availability,
                config.booking.clone(),
                config.business.clone(),
            )),
            Arc::new(MenuAgent::new(menu, config.business.clone())),
        );
        let store = Arc::new(SessionStore::from_config(&config.store));
        Self { config, store, router }
    }

    /// Default wiring for deployments without external backends: writes go
    /// to the not-configured CRM sentinel and the sample menu answers
    /// questions.
    pub fn with_defaults() -> Self {
        Self::new(
            ConversationConfig::default(),
            Arc::new(UnconfiguredCrm),
            Arc::new(InMemoryAvailability::new()),
            Arc::new(StaticMenu::sample()),
        )
    }

    /// Loads configuration from `FRONTDESK_CONFIG` (when set) plus the
    /// environment and builds the default wiring around it.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let config = ConversationConfig::load(path).context("loading conversation config")?;
        Ok(Self::new(
            config,
            Arc::new(UnconfiguredCrm),
            Arc::new(InMemoryAvailability::new()),
            Arc::new(StaticMenu::sample()),
        ))
    }

    pub fn begin_call(&self, call_id: CallId, metadata: SessionMetadata) -> Session {
        info!(call_id = %call_id, "call started");
        self.store.create(call_id, metadata)
    }

    /// Runs one caller turn. Blank input never reaches the pipeline; the
    /// caller is asked to repeat instead.
    pub async fn process_turn(
        &self,
        call_id: &CallId,
        text: &str,
        confidence: Option<f32>,
    ) -> String {
        if text.trim().is_empty() {
            return "I didn't catch that. Could you say it again?".to_string();
        }
        self.router.process_turn(&self.store, call_id, text, confidence).await
    }

    /// Ends the call. The session stays readable until the retention sweep
    /// removes it.
    pub fn end_call(&self, call_id: &CallId) -> bool {
        let ended = self.store.deactivate(call_id);
        if ended {
            info!(call_id = %call_id, "call ended");
        }
        ended
    }

    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            Arc::clone(&self.store),
            std::time::Duration::from_secs(self.config.store.sweep_interval_secs),
        )
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }
}
