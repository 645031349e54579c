use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::core::{spawn_event_logger, EventBus};
use crate::services::llm_provider::LLMProvider;
use crate::tutor::{MemoryStore, TutorConfig, TutorEngine};

pub type Engine = TutorEngine<LLMProvider>;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    engine: Arc<Engine>,
    llm_available: bool,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, llm_available: bool) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            engine,
            llm_available,
        }
    }

    /// Engine over an in-memory store with the given configuration.
    pub fn create_engine(config: TutorConfig, provider: LLMProvider) -> Arc<Engine> {
        Arc::new(TutorEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(EventBus::new()),
            config,
            provider,
        ))
    }

    /// Builds the running service state and starts logging tutor events.
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let provider = LLMProvider::new(config.llm.clone());
        let llm_available = provider.is_available();
        if llm_available {
            tracing::info!(model = provider.model(), "LLM question rendering enabled");
        } else {
            tracing::warn!("LLM_API_KEY not set, tutor questions use built-in templates");
        }

        let engine = Self::create_engine(config.tutor.clone(), provider);
        spawn_event_logger(engine.events().subscribe());
        Self::new(engine, llm_available)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }

    pub fn llm_available(&self) -> bool {
        self.llm_available
    }
}
