//! Instancia de workflow: estado actual, historial append-only y artifacts
//! por etapa.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Evidence, IngestState};

/// Registro de una transición exitosa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: IngestState,
    pub to: IngestState,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Una instancia por dataset subido.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub state: IngestState,
    /// Historial append-only; restringido a transiciones exitosas siempre
    /// forma un prefijo del orden lineal fijo.
    pub history: Vec<TransitionRecord>,
    /// Etapa → hash del artifact que la respalda.
    pub artifacts: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowInstance {
    pub(crate) fn new() -> Self {
        Self { id: Uuid::new_v4(),
               state: IngestState::FileDropped,
               history: Vec::new(),
               artifacts: HashMap::new(),
               created_at: Utc::now() }
    }

    /// Aplica una transición ya validada por el store.
    pub(crate) fn apply(&mut self, target: IngestState, evidence: &Evidence) {
        self.history.push(TransitionRecord { from: self.state,
                                             to: target,
                                             at: Utc::now(),
                                             reason: evidence.reason.clone() });
        if let Some(hash) = &evidence.artifact {
            self.artifacts.insert(target.stage_name().to_string(), hash.clone());
        }
        self.state = target;
    }

    /// Hash del artifact de la etapa actual, o el archivo crudo si la etapa
    /// no registró evidencia propia.
    pub fn latest_artifact(&self) -> Option<&String> {
        self.artifacts
            .get(self.state.stage_name())
            .or_else(|| self.artifacts.get(IngestState::FileDropped.stage_name()))
    }
}
