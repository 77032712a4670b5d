//! Planner scripted: devuelve siempre el mismo grafo de steps.
//!
//! El core valida estructura (ciclos, referencias) después de recibir el
//! plan, así que el script puede ser deliberadamente inválido en tests.

use async_trait::async_trait;
use serde_json::Value;

use nlq_core::{ArtifactRegistry, OrchestratorError, Plan, Planner, StepSpec};

pub struct ScriptedPlanner {
    specs: Vec<StepSpec>,
    fail_with: Option<String>,
}

impl ScriptedPlanner {
    pub fn new(specs: Vec<StepSpec>) -> Self {
        Self { specs, fail_with: None }
    }

    /// Planner que falla siempre con `Planning(reason)`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self { specs: Vec::new(), fail_with: Some(reason.into()) }
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan_steps(&self,
                        _goal_input: &Value,
                        _artifacts: &ArtifactRegistry)
                        -> Result<Plan, OrchestratorError> {
        if let Some(reason) = &self.fail_with {
            return Err(OrchestratorError::Planning(reason.clone()));
        }
        Plan::new(self.specs.clone())
    }
}
