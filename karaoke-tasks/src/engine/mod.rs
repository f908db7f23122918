//! Generic task orchestration engine
//!
//! Task types plug in through [`TaskHandler`] and a [`TaskRegistry`];
//! everything else here is shared across them.

pub mod handler;
pub mod hooks;
pub mod lifecycle;
pub mod orchestrator;
pub mod registry;
pub mod runner;
pub mod selector;
pub mod stage;

pub use handler::TaskHandler;
pub use hooks::TaskHooks;
pub use lifecycle::{LifecycleManager, RetryPolicy, ABANDONED_KIND};
pub use orchestrator::{BatchOrchestrator, BatchSummary, RunOptions};
pub use registry::{RegisteredTask, TaskRegistry};
pub use runner::{SubjectOutcome, TaskRunner};
pub use selector::{is_eligible, EligibilityFilter};
pub use stage::{StageRecompute, TrackStage, TrackStageUpdater};
