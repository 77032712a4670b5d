//! Máquina de estados de ingesta de datasets.
//!
//! Una instancia por dataset subido. El estado solo se muta vía
//! `WorkflowStore::advance`, que serializa intentos concurrentes sobre la
//! misma instancia: a lo sumo una transición gana; la perdedora observa el
//! estado ya movido y recibe `InvalidTransition`.

mod instance;
mod state;

pub use instance::{TransitionRecord, WorkflowInstance};
pub use state::IngestState;

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::event::{EventBus, EventKind};

/// Justificación de una transición: motivo textual más el artifact que la
/// respalda (guard anti-alucinación: sin evidencia registrada, el historial
/// no puede afirmar etapas no alcanzadas).
#[derive(Debug, Clone)]
pub struct Evidence {
    pub reason: String,
    pub artifact: Option<String>,
}

impl Evidence {
    pub fn new(reason: impl Into<String>, artifact: Option<String>) -> Self {
        Self { reason: reason.into(), artifact }
    }
}

/// Almacén in-memory de instancias de workflow.
pub struct WorkflowStore {
    instances: DashMap<Uuid, WorkflowInstance>,
    bus: Arc<EventBus>,
}

impl WorkflowStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { instances: DashMap::new(), bus }
    }

    /// Crea una instancia en `FileDropped` registrando el hash del archivo
    /// crudo como evidencia de la etapa inicial.
    pub fn create(&self, raw_artifact: String) -> WorkflowInstance {
        let mut instance = WorkflowInstance::new();
        instance.artifacts.insert(IngestState::FileDropped.stage_name().to_string(), raw_artifact);
        self.instances.insert(instance.id, instance.clone());
        tracing::info!(instance_id = %instance.id, "workflow instance created");
        instance
    }

    pub fn get(&self, id: Uuid) -> Result<WorkflowInstance, OrchestratorError> {
        self.instances
            .get(&id)
            .map(|i| i.clone())
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// Destruye una instancia (cache-clear explícito del host).
    pub fn remove(&self, id: Uuid) -> Result<WorkflowInstance, OrchestratorError> {
        self.instances
            .remove(&id)
            .map(|(_, i)| i)
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// Intenta avanzar la instancia a `target`.
    ///
    /// Legal únicamente si `target` es el sucesor inmediato del estado
    /// actual, o `Failed` desde cualquier estado no terminal. Saltos no
    /// adyacentes se rechazan con `InvalidTransition`. Cada transición
    /// exitosa agrega exactamente un registro al historial (append-only) y
    /// publica exactamente un evento.
    ///
    /// El `get_mut` retiene el lock de shard del DashMap durante todo el
    /// check-then-mutate, serializando transiciones concurrentes sobre la
    /// misma instancia.
    pub fn advance(&self,
                   id: Uuid,
                   target: IngestState,
                   evidence: Evidence)
                   -> Result<WorkflowInstance, OrchestratorError> {
        let mut entry = self.instances
                            .get_mut(&id)
                            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        let from = entry.state;

        let legal = !from.is_terminal()
                    && (Some(target) == from.successor() || target == IngestState::Failed);
        if !legal {
            tracing::warn!(instance_id = %id, %from, %target, "rejected workflow transition");
            return Err(OrchestratorError::InvalidTransition { from: from.to_string(),
                                                              to: target.to_string() });
        }

        entry.apply(target, &evidence);

        let kind = if target == IngestState::Failed {
            EventKind::WorkflowFailed { instance_id: id, from, reason: evidence.reason.clone() }
        } else {
            EventKind::WorkflowAdvanced { instance_id: id,
                                          from,
                                          to: target,
                                          reason: evidence.reason.clone() }
        };
        self.bus.publish(kind);
        tracing::info!(instance_id = %id, %from, %target, "workflow advanced");
        Ok(entry.clone())
    }
}
