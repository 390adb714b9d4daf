pub mod error;
pub mod providers;
pub mod sinks;
pub mod storage;
pub mod types;

pub use error::Error;
pub use providers::{RelevanceProvider, SearchProvider};
pub use sinks::{CycleReporter, LogNotifier, LogReporter, LogTracker, Notifier, TrendTracker};
pub use storage::{InsertOutcome, Storage};
pub use types::{
    parse_keywords, Agent, AgentSpec, AnalysisMethod, AnalysisRecord, Article, Decision, Judgment,
    NewAnalysis, NewArticle, RawArticle, SuggestedAction,
};

pub type Result<T> = std::result::Result<T, Error>;
