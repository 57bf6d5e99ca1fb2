//! CLI command implementations and shared wiring.

pub mod digest;
pub mod onboard;
pub mod resume;
pub mod run;
pub mod status;

use anyhow::Context as _;
use coachloop_agent::{AgentController, Planner, StepExecutor};
use coachloop_capabilities::default_registry;
use coachloop_config::AppConfig;
use coachloop_core::context::ContextProvider;
use coachloop_core::digest::{ChunkSearchBackend, DigestStore};
use coachloop_core::event::EventBus;
use coachloop_core::session::SessionStore;
use coachloop_providers::OpenAiCompatClient;
use coachloop_rag::{DigestGenerator, Evaluator, QueryBuilder, Retriever, Synthesizer};
use coachloop_store::SqliteStore;
use std::sync::Arc;

/// Everything a command needs, wired once.
pub(crate) struct App {
    pub controller: AgentController,
    pub digests: Arc<DigestGenerator>,
}

impl App {
    /// Load config and wire the full stack against the SQLite store.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::load().context("failed to load configuration")?;

        let Some(api_key) = config.provider.api_key.clone() else {
            eprintln!();
            eprintln!("  ERROR: No API key configured!");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    export COACHLOOP_API_KEY='sk-...'");
            eprintln!("    export OPENAI_API_KEY='sk-...'");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            anyhow::bail!("no API key found, see above for setup instructions");
        };

        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let store = Arc::new(
            SqliteStore::new(&db_path.to_string_lossy())
                .await
                .context("failed to open the SQLite store")?,
        );

        let client = Arc::new(OpenAiCompatClient::new(
            "openai",
            &config.provider.api_url,
            api_key,
            &config.provider.model,
            &config.provider.embedding_model,
            config.provider.timeout_secs,
        ));
        let events = Arc::new(EventBus::default());

        let retriever = Retriever::new(
            client.clone(),
            store.clone() as Arc<dyn ChunkSearchBackend>,
            config.retrieval.clone(),
        );
        let digests = Arc::new(DigestGenerator::new(
            QueryBuilder::new(),
            retriever.clone(),
            Synthesizer::new(client.clone(), config.synthesis.clone()),
            Evaluator::new(client.clone(), config.evaluation.clone()),
            store.clone() as Arc<dyn DigestStore>,
            store.clone() as Arc<dyn ContextProvider>,
            config.digest.clone(),
            events.clone(),
        ));

        let registry = default_registry(
            store.clone() as Arc<dyn ContextProvider>,
            Arc::new(retriever),
            digests.clone(),
            store.clone() as Arc<dyn DigestStore>,
            config.agent.min_db_results,
        );
        let executor = Arc::new(StepExecutor::new(
            Arc::new(registry),
            store.clone() as Arc<dyn ContextProvider>,
            events.clone(),
            config.agent.capability_timeout_secs,
        ));
        let planner = Planner::new(client, config.agent.clone());
        let controller = AgentController::new(
            executor,
            planner,
            store.clone() as Arc<dyn SessionStore>,
            events,
            config.agent.clone(),
        );

        Ok(Self { controller, digests })
    }
}
