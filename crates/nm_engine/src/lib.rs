pub mod dedup;
pub mod dispatch;
pub mod engine;
pub mod filter;
pub mod monitor;
pub mod scheduler;
pub mod score;

pub use dedup::Deduplicator;
pub use dispatch::ActionDispatcher;
pub use engine::{AnalysisEngine, EngineConfig, FALLBACK_ACT_THRESHOLD};
pub use filter::ArticleFilter;
pub use monitor::MonitorContext;
pub use scheduler::{AgentScheduler, AgentStatus, AnalysisSummary};
pub use score::{score_keywords, KeywordMatch};
