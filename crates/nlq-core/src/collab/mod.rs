//! Contratos de colaboradores externos consumidos por el core.
//!
//! La traducción NL→SQL, la ejecución de SQL/código y el planning son
//! capacidades externas: el core las trata como llamadas opacas detrás de
//! estos traits y solo les impone el contrato de errores (retryable vs
//! terminal) y la validación estructural de lo que devuelven. Todas las
//! llamadas son potencialmente largas; el scheduler las envuelve en timeout
//! y cancelación.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::OrchestratorError;
use crate::model::{Artifact, ArtifactKind};
use crate::plan::Plan;
use crate::registry::ArtifactRegistry;
use crate::workflow::{IngestState, WorkflowInstance};

/// Produce el plan de steps para un goal de consulta. El orquestador valida
/// aciclicidad y referencias antes de aceptar el grafo.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan_steps(&self,
                        goal_input: &Value,
                        artifacts: &ArtifactRegistry)
                        -> Result<Plan, OrchestratorError>;
}

/// Ejecutor SQL externo. Errores no retryables (`Query`) para SQL malformado
/// o schema mismatch; `Transient` para fallos momentáneos.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn run_sql(&self, query: &str) -> Result<Value, OrchestratorError>;
}

/// Salida de un step de código: stdout capturado más outputs auxiliares
/// (tablas, plots serializados) que se vuelven artifacts.
#[derive(Debug, Clone)]
pub struct CodeOutput {
    pub stdout: String,
    pub artifacts: Vec<Value>,
}

/// Ejecutor de código en sandbox externo. El core no sandboxea: cualquier
/// escape se reporta como `Execution`.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn run_code(&self, code: &str, inputs: &[Artifact]) -> Result<CodeOutput, OrchestratorError>;
}

/// Función de agente externo nombrada. Errores no retryables por defecto,
/// salvo que el colaborador señale transitoriedad devolviendo `Transient`.
#[async_trait]
pub trait SubagentRunner: Send + Sync {
    async fn invoke(&self, agent: &str, inputs: &[Artifact]) -> Result<Value, OrchestratorError>;
}

/// Fuente de decisiones humanas para steps `HumanGate`: la llamada bloquea
/// hasta que exista una decisión externa.
#[async_trait]
pub trait HumanGate: Send + Sync {
    async fn await_decision(&self, step_id: &str, prompt: &Value) -> Result<Value, OrchestratorError>;
}

/// Resultado de una etapa de ingesta: el artifact producido y el estado al
/// que la etapa propone avanzar. El orquestador valida la propuesta vía
/// `advance` antes de aceptarla.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub payload: Value,
    pub kind: ArtifactKind,
    pub target: IngestState,
}

/// Colaborador de una etapa de ingesta (clasificador, profiler,
/// diccionarista, revisor, loader).
#[async_trait]
pub trait IngestStage: Send + Sync {
    /// Estado cuyo trabajo realiza esta etapa.
    fn consumes(&self) -> IngestState;

    /// Nombre estable, usado como `produced_by` de sus artifacts.
    fn name(&self) -> &str;

    async fn execute(&self,
                     instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError>;
}

/// Conjunto de colaboradores inyectado al orquestador.
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub sql: Arc<dyn SqlExecutor>,
    pub code: Arc<dyn CodeExecutor>,
    pub subagent: Arc<dyn SubagentRunner>,
    pub human: Arc<dyn HumanGate>,
    pub stages: Vec<Arc<dyn IngestStage>>,
}

impl Collaborators {
    /// Etapa registrada para el estado dado, si existe.
    pub fn stage_for(&self, state: IngestState) -> Option<&Arc<dyn IngestStage>> {
        self.stages.iter().find(|s| s.consumes() == state)
    }
}
