//! Fuentes de decisión humana para steps `HumanGate`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use nlq_core::{HumanGate, OrchestratorError};

/// Aprueba inmediatamente con una decisión fija; útil en demos y tests que
/// no ejercitan el bloqueo.
pub struct AutoApproveGate {
    decision: Value,
}

impl AutoApproveGate {
    pub fn new(decision: Value) -> Self {
        Self { decision }
    }
}

impl Default for AutoApproveGate {
    fn default() -> Self {
        Self { decision: json!({ "approved": true }) }
    }
}

#[async_trait]
impl HumanGate for AutoApproveGate {
    async fn await_decision(&self, _step_id: &str, _prompt: &Value) -> Result<Value, OrchestratorError> {
        Ok(self.decision.clone())
    }
}

/// Gate real: el dispatch queda bloqueado hasta que alguien envíe la
/// decisión por el canal. Cerrar el sender sin decidir es un error de
/// ejecución para el step.
pub struct ChannelGate {
    rx: Mutex<mpsc::Receiver<Value>>,
}

impl ChannelGate {
    pub fn pair(buffer: usize) -> (mpsc::Sender<Value>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx: Mutex::new(rx) })
    }
}

#[async_trait]
impl HumanGate for ChannelGate {
    async fn await_decision(&self, step_id: &str, _prompt: &Value) -> Result<Value, OrchestratorError> {
        let mut rx = self.rx.lock().await;
        rx.recv()
          .await
          .ok_or_else(|| OrchestratorError::Execution(format!("gate closed before decision for step '{step_id}'")))
    }
}
