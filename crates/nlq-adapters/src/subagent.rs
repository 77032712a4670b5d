//! Subagentes estáticos: mapa nombre → respuesta fija.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use nlq_core::{Artifact, OrchestratorError, SubagentRunner};

#[derive(Default)]
pub struct StaticSubagents {
    agents: HashMap<String, Value>,
}

impl StaticSubagents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, name: impl Into<String>, response: Value) -> Self {
        self.agents.insert(name.into(), response);
        self
    }
}

#[async_trait]
impl SubagentRunner for StaticSubagents {
    async fn invoke(&self, agent: &str, _inputs: &[Artifact]) -> Result<Value, OrchestratorError> {
        self.agents
            .get(agent)
            .cloned()
            .ok_or_else(|| OrchestratorError::Execution(format!("unknown subagent '{agent}'")))
    }
}
