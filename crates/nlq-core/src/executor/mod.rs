//! Despachador de steps: mapea el kind declarado a la invocación del
//! colaborador correcto y captura el resultado como artifact.
//!
//! El dispatcher no conoce la política de reintentos (local al scheduler) ni
//! publica los eventos started/finished/failed del step (los publica el
//! scheduler, único dueño del estado del plan, preservando el orden
//! started→finished por step). Sí publica `HumanInputRequested`, que es
//! semántica propia del dispatch de un gate.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::collab::Collaborators;
use crate::errors::OrchestratorError;
use crate::event::{EventBus, EventKind};
use crate::model::{Artifact, ArtifactKind};
use crate::plan::{StepKind, StepSpec};
use crate::registry::ArtifactRegistry;

pub struct StepDispatcher {
    collab: Collaborators,
    registry: Arc<ArtifactRegistry>,
    bus: Arc<EventBus>,
}

impl StepDispatcher {
    pub fn new(collab: Collaborators, registry: Arc<ArtifactRegistry>, bus: Arc<EventBus>) -> Self {
        Self { collab, registry, bus }
    }

    /// Ejecuta un intento del step y devuelve el hash del artifact
    /// resultado. `dep_artifacts` son los resultados `Succeeded` de las
    /// dependencias (vacío/parcial para steps tolerantes: predecesor nulo).
    pub async fn dispatch(&self,
                          goal_id: Uuid,
                          spec: &StepSpec,
                          dep_artifacts: &[String])
                          -> Result<Option<String>, OrchestratorError> {
        tracing::debug!(%goal_id, step_id = %spec.id, kind = ?spec.kind, "dispatching step");
        match spec.kind {
            StepKind::Sql => self.run_sql(spec).await,
            StepKind::Code => self.run_code(spec, dep_artifacts).await,
            StepKind::Subagent => self.run_subagent(spec, dep_artifacts).await,
            StepKind::HumanGate => self.run_human_gate(goal_id, spec).await,
        }
    }

    async fn run_sql(&self, spec: &StepSpec) -> Result<Option<String>, OrchestratorError> {
        let query = spec.input
                        .get("query")
                        .and_then(Value::as_str)
                        .ok_or_else(|| OrchestratorError::Query(format!("step '{}' missing 'query' input", spec.id)))?;
        let rowset = self.collab.sql.run_sql(query).await?;
        Ok(Some(self.registry.put(ArtifactKind::RowSet, rowset, &spec.id)))
    }

    async fn run_code(&self,
                      spec: &StepSpec,
                      dep_artifacts: &[String])
                      -> Result<Option<String>, OrchestratorError> {
        let code = spec.input
                       .get("code")
                       .and_then(Value::as_str)
                       .ok_or_else(|| OrchestratorError::Execution(format!("step '{}' missing 'code' input", spec.id)))?;
        let inputs = self.resolve_inputs(spec, dep_artifacts)?;
        let out = self.collab.code.run_code(code, &inputs).await?;
        let payload = json!({ "stdout": out.stdout, "artifacts": out.artifacts });
        Ok(Some(self.registry.put(ArtifactKind::CodeOutput, payload, &spec.id)))
    }

    async fn run_subagent(&self,
                          spec: &StepSpec,
                          dep_artifacts: &[String])
                          -> Result<Option<String>, OrchestratorError> {
        let agent = spec.input
                        .get("agent")
                        .and_then(Value::as_str)
                        .ok_or_else(|| OrchestratorError::Execution(format!("step '{}' missing 'agent' input", spec.id)))?;
        let inputs = self.resolve_inputs(spec, dep_artifacts)?;
        let result = self.collab.subagent.invoke(agent, &inputs).await?;
        Ok(Some(self.registry.put(ArtifactKind::GenericJson, result, &spec.id)))
    }

    async fn run_human_gate(&self, goal_id: Uuid, spec: &StepSpec) -> Result<Option<String>, OrchestratorError> {
        let hint = spec.input.get("hint").and_then(Value::as_str).map(str::to_string);
        self.bus.publish(EventKind::HumanInputRequested { goal_id,
                                                          step_id: spec.id.clone(),
                                                          hint });
        let decision = self.collab.human.await_decision(&spec.id, &spec.input).await?;
        Ok(Some(self.registry.put(ArtifactKind::Decision, decision, &spec.id)))
    }

    /// Resuelve los artifacts de entrada del step: referencias explícitas
    /// por hash en `input.inputs` más los resultados de sus dependencias.
    /// Una referencia inexistente es fatal para el step (`NotFound`).
    fn resolve_inputs(&self,
                      spec: &StepSpec,
                      dep_artifacts: &[String])
                      -> Result<Vec<Artifact>, OrchestratorError> {
        let mut hashes: Vec<String> = spec.input
                                          .get("inputs")
                                          .and_then(Value::as_array)
                                          .map(|arr| {
                                              arr.iter()
                                                 .filter_map(Value::as_str)
                                                 .map(str::to_string)
                                                 .collect()
                                          })
                                          .unwrap_or_default();
        hashes.extend(dep_artifacts.iter().cloned());
        hashes.iter().map(|h| self.registry.get(h)).collect()
    }
}
