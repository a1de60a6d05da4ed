//! Core abstractions for the research ecosystem pipeline.
//!
//! This crate owns the data model shared by the four pipeline stages, the
//! multi-source data gateway, the language backend, the heuristic scoring
//! formulas, persistence and report rendering. Stage agents and the
//! orchestrator live in `ecosystem-agents`.

mod backend;
mod config;
mod error;
mod events;
pub mod gateway;
mod logging;
mod metrics;
mod report;
pub mod scoring;
mod security;
mod sources;
mod store;
mod tasks;
mod telemetry;
mod workflow;

pub use backend::{GeminiClient, Generation, LanguageBackend, TextGenerator, UNCONFIGURED_SENTINEL};
pub use config::{
    BackendConfig, Config, ConfigLoader, FeedSource, LoggingConfig, SourcesConfig, StoreConfig,
};
pub use error::{EcosystemError, StageError};
pub use events::{EventCollector, PipelineEvent, StageStatus};
pub use gateway::DataSourceGateway;
pub use logging::{AuditLog, WorkflowLogInput};
pub use metrics::{init_metrics_from_env, record_stage_metrics, record_workflow_metrics};
pub use report::render_report;
pub use security::{SecretValue, optional_env};
pub use sources::{NewsItem, Paper, Repo, ResearchBundle, SourceCounts, SourceKind, SourceRecord};
pub use store::{SqliteStore, StoredWorkflow, WorkflowStore};
pub use tasks::{Task, TaskIdGenerator, TaskStatus};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use workflow::{
    AnalysisOutput, EnvironmentOutput, InnovationOutput, PerformanceMetrics, ResearchOutput,
    StageName, StageOutcome, StagePayload, StageResult, StageTimings, SystemMetrics,
    WorkflowResult,
};
