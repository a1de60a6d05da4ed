//! Stage agents and the workflow orchestrator.

pub mod agent_context;
pub mod analyst;
pub mod environment;
pub mod innovator;
pub mod orchestrator;
pub mod researcher;

pub use agent_context::{StageAgent, StageContext, run_stage};
pub use analyst::AnalysisAgent;
pub use environment::EnvironmentAgent;
pub use innovator::InnovationAgent;
pub use orchestrator::{Orchestrator, StagePipeline};
pub use researcher::ResearchAgent;
