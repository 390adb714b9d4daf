use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use nm_core::{
    AgentSpec, LogNotifier, LogReporter, LogTracker, RelevanceProvider, Result,
};
use nm_engine::{
    ActionDispatcher, AgentScheduler, AnalysisEngine, ArticleFilter, EngineConfig, MonitorContext,
};
use nm_providers::{GeminiConfig, GeminiRelevance, NewsApiConfig, NewsApiSearch};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "memory", help = "Storage backend: memory or sqlite")]
    storage: String,
    #[arg(long, help = "Database path for the sqlite backend")]
    db_path: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create an agent and monitor until interrupted.
    Monitor {
        /// Agent name, used in logs and notifications.
        #[arg(long, default_value = "news-agent")]
        name: String,
        /// Comma-separated keywords to monitor (e.g. "ai, chips, nvidia").
        #[arg(long)]
        keywords: String,
        /// Seconds between monitoring cycles.
        #[arg(long, default_value_t = 300)]
        interval: u64,
        /// Restrict the search to one NewsAPI source id.
        #[arg(long)]
        source: Option<String>,
        /// Skip AI analysis and rely on keyword scoring only.
        #[arg(long)]
        no_llm: bool,
        /// Minimum AI confidence before acting on an article.
        #[arg(long, default_value_t = 0.7)]
        min_confidence: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let storage = nm_storage::create_storage(&cli.storage, cli.db_path.as_deref()).await?;
    info!("💾 Storage initialized (using {})", cli.storage);

    match cli.command {
        Commands::Monitor {
            name,
            keywords,
            interval,
            source,
            no_llm,
            min_confidence,
        } => {
            let search = Arc::new(NewsApiSearch::new(NewsApiConfig::from_env()?)?);

            // Without a Gemini key the AI tier is unusable; fall back to
            // keyword-only monitoring rather than refusing to run.
            let llm_enabled = if no_llm {
                false
            } else {
                GeminiConfig::from_env().is_ok()
            };
            let relevance: Arc<dyn RelevanceProvider> = if llm_enabled {
                Arc::new(GeminiRelevance::new(GeminiConfig::from_env()?)?)
            } else {
                if !no_llm {
                    warn!("GEMINI_API_KEY not set, using keyword analysis only");
                }
                Arc::new(GeminiRelevance::new(GeminiConfig::new(String::new()))?)
            };

            let agent = storage
                .create_agent(AgentSpec {
                    name,
                    keywords,
                    check_interval_secs: interval,
                    news_source: source,
                    llm_enabled,
                    min_confidence,
                    ..Default::default()
                })
                .await?;
            info!(
                "🤖 Agent '{}' created: {} keyword(s), every {}s",
                agent.name,
                agent.keywords.len(),
                agent.check_interval_secs
            );

            let ctx = Arc::new(MonitorContext {
                storage: storage.clone(),
                search,
                engine: Arc::new(AnalysisEngine::new(relevance, EngineConfig::default())),
                dispatcher: Arc::new(ActionDispatcher::new(
                    storage.clone(),
                    Arc::new(LogNotifier),
                    Arc::new(LogTracker),
                )),
                filter: ArticleFilter::default(),
                reporter: Arc::new(LogReporter),
            });

            let scheduler = Arc::new(AgentScheduler::new(ctx));
            scheduler.start(agent.id).await?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            scheduler.shutdown().await;

            let status = scheduler.status(agent.id).await?;
            info!(
                "📊 Final status: {} article(s) in the last 24h",
                status.articles_last_24h
            );
        }
    }

    Ok(())
}
