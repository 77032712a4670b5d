//! nlq-core: Motor de orquestación de flujos NL→SQL/código.
//!
//! El core coordina dos superficies:
//! - Ingesta de datasets: una máquina de estados finita por instancia
//!   (`workflow`), con transiciones estrictamente adyacentes.
//! - Goals de consulta: un Plan acíclico de Steps (`plan`) despachado en
//!   paralelo por el `scheduler` contra colaboradores externos (`collab`).
//!
//! Toda decisión observable se publica en el `EventBus` y todo resultado se
//! almacena inmutable en el `ArtifactRegistry` (content-addressed).

pub mod collab;
pub mod constants;
pub mod errors;
pub mod event;
pub mod executor;
pub mod goal;
pub mod hashing;
pub mod model;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod scheduler;
pub mod workflow;

pub use collab::{CodeExecutor, CodeOutput, Collaborators, HumanGate, IngestStage, Planner, SqlExecutor, StageOutcome, SubagentRunner};
pub use errors::OrchestratorError;
pub use event::{EventBus, EventKind, OrchestratorEvent};
pub use executor::StepDispatcher;
pub use goal::{DecisionRecord, Goal, GoalStatus, GoalTracker, GoalType};
pub use model::{Artifact, ArtifactKind};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use plan::{Plan, PlanStatus, StepKind, StepSpec, StepStatus};
pub use registry::ArtifactRegistry;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use workflow::{Evidence, IngestState, TransitionRecord, WorkflowInstance, WorkflowStore};
