//! Ejecutor de código simulado: no corre nada, captura un stdout
//! determinista con el código y los inputs recibidos.

use async_trait::async_trait;
use serde_json::json;

use nlq_core::{Artifact, CodeExecutor, CodeOutput, OrchestratorError};

#[derive(Default)]
pub struct EchoCodeExecutor;

#[async_trait]
impl CodeExecutor for EchoCodeExecutor {
    async fn run_code(&self, code: &str, inputs: &[Artifact]) -> Result<CodeOutput, OrchestratorError> {
        let stdout = format!("executed {} bytes of code over {} input artifact(s)",
                             code.len(),
                             inputs.len());
        let artifacts = inputs.iter()
                              .map(|a| json!({ "consumed": a.hash }))
                              .collect();
        Ok(CodeOutput { stdout, artifacts })
    }
}
