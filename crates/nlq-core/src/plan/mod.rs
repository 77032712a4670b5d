//! Plan: grafo acíclico dirigido de Steps para un goal.
//!
//! Los steps viven en un `IndexMap` cuyo orden de inserción es el orden del
//! Planner: el tie-break FIFO del scheduler sobre ese orden garantiza
//! dispatch determinista para planes idénticos. `validate` rechaza con
//! `InvalidPlan` cualquier grafo con ciclos o referencias a steps
//! inexistentes, sin importar cuán adaptativo haya sido el Planner.

mod step;

pub use step::{StepKind, StepSpec, StepStatus};

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::OrchestratorError;

/// Estado agregado de un Plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Un step junto con su estado runtime y resultado final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub spec: StepSpec,
    pub status: StepStatus,
    /// Hash del artifact resultado (solo en `Succeeded`).
    pub artifact: Option<String>,
    /// Error terminal (solo en `Failed`). Los reintentos intermedios son
    /// locales al scheduler y no quedan registrados aquí.
    pub error: Option<OrchestratorError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Plan {
    steps: IndexMap<String, PlanStep>,
}

impl Plan {
    /// Construye un plan desde las especificaciones del Planner. Ids
    /// duplicados se rechazan acá; el resto de la validación estructural
    /// ocurre en `validate`.
    pub fn new(specs: Vec<StepSpec>) -> Result<Self, OrchestratorError> {
        let mut steps = IndexMap::with_capacity(specs.len());
        for spec in specs {
            let id = spec.id.clone();
            let prev = steps.insert(id.clone(),
                                    PlanStep { spec, status: StepStatus::Pending, artifact: None, error: None });
            if prev.is_some() {
                return Err(OrchestratorError::InvalidPlan(format!("duplicate step id '{id}'")));
            }
        }
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.get(id)
    }

    /// Steps en orden de inserción.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlanStep)> {
        self.steps.iter()
    }

    /// Valida la estructura del grafo: referencias existentes, sin
    /// auto-dependencias, sin ciclos (Kahn).
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        for (id, step) in &self.steps {
            for dep in &step.spec.depends_on {
                if dep == id {
                    return Err(OrchestratorError::InvalidPlan(format!("step '{id}' depends on itself")));
                }
                if !self.steps.contains_key(dep) {
                    return Err(OrchestratorError::InvalidPlan(format!(
                        "step '{id}' depends on unknown step '{dep}'"
                    )));
                }
            }
        }

        // Kahn: si no podemos visitar todos los nodos, hay ciclo.
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (id, step) in &self.steps {
            indegree.entry(id.as_str()).or_insert(0);
            for dep in &step.spec.depends_on {
                *indegree.entry(id.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(id.as_str());
            }
        }
        let mut queue: VecDeque<&str> = self.steps
                                            .keys()
                                            .map(|k| k.as_str())
                                            .filter(|k| indegree[k] == 0)
                                            .collect();
        let mut visited = 0usize;
        while let Some(id) = queue.pop_front() {
            visited += 1;
            for next in dependents.get(id).into_iter().flatten() {
                let d = indegree.get_mut(next).expect("dependent tracked");
                *d -= 1;
                if *d == 0 {
                    queue.push_back(next);
                }
            }
        }
        if visited != self.steps.len() {
            return Err(OrchestratorError::InvalidPlan("dependency graph contains a cycle".into()));
        }
        Ok(())
    }

    /// Frontier: steps `Pending` cuyos predecesores alcanzaron `Succeeded`
    /// (o, para tolerantes, cualquier estado terminal). Orden estable FIFO
    /// por inserción.
    pub fn ready_steps(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|(_, s)| s.status == StepStatus::Pending)
            .filter(|(_, s)| {
                s.spec.depends_on.iter().all(|d| {
                    let dep = &self.steps[d];
                    if s.spec.tolerant {
                        dep.status.is_terminal()
                    } else {
                        dep.status == StepStatus::Succeeded
                    }
                })
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Marca `Skipped` (transitivamente) todo step `Pending` no tolerante
    /// con alguna dependencia `Failed`/`Skipped`. Devuelve los ids recién
    /// saltados en orden de inserción, para que el scheduler publique sus
    /// eventos.
    pub fn propagate_skips(&mut self) -> Vec<String> {
        let mut skipped = Vec::new();
        loop {
            let next: Vec<String> =
                self.steps
                    .iter()
                    .filter(|(_, s)| s.status == StepStatus::Pending && !s.spec.tolerant)
                    .filter(|(_, s)| {
                        s.spec.depends_on.iter().any(|d| {
                            matches!(self.steps[d].status, StepStatus::Failed | StepStatus::Skipped)
                        })
                    })
                    .map(|(id, _)| id.clone())
                    .collect();
            if next.is_empty() {
                break;
            }
            for id in next {
                self.steps[&id].status = StepStatus::Skipped;
                skipped.push(id);
            }
        }
        skipped
    }

    pub fn mark_running(&mut self, id: &str) {
        if let Some(s) = self.steps.get_mut(id) {
            s.status = StepStatus::Running;
        }
    }

    pub fn mark_succeeded(&mut self, id: &str, artifact: Option<String>) {
        if let Some(s) = self.steps.get_mut(id) {
            s.status = StepStatus::Succeeded;
            s.artifact = artifact;
        }
    }

    pub fn mark_failed(&mut self, id: &str, error: OrchestratorError) {
        if let Some(s) = self.steps.get_mut(id) {
            s.status = StepStatus::Failed;
            s.error = Some(error);
        }
    }

    /// Salta todo step no terminal (camino de cancelación). Devuelve los
    /// ids afectados.
    pub fn skip_remaining(&mut self) -> Vec<String> {
        let mut skipped = Vec::new();
        for (id, s) in self.steps.iter_mut() {
            if !s.status.is_terminal() {
                s.status = StepStatus::Skipped;
                skipped.push(id.clone());
            }
        }
        skipped
    }

    /// Hashes de los resultados `Succeeded` de las dependencias de `id`,
    /// en el orden declarado. Dependencias tolerada-fallidas se omiten
    /// (resultado nulo del predecesor).
    pub fn dependency_artifacts(&self, id: &str) -> Vec<String> {
        self.steps
            .get(id)
            .map(|s| {
                s.spec
                 .depends_on
                 .iter()
                 .filter_map(|d| self.steps[d].artifact.clone())
                 .collect()
            })
            .unwrap_or_default()
    }

    /// Todos los steps alcanzaron estado terminal.
    pub fn is_settled(&self) -> bool {
        self.steps.values().all(|s| s.status.is_terminal())
    }

    /// Estado agregado: `Succeeded` sii todo step terminó `Succeeded` o
    /// `Skipped` siendo tolerante; cualquier `Failed` o skip propagado
    /// implica `Failed`.
    pub fn status(&self) -> PlanStatus {
        if !self.is_settled() {
            if self.steps.values().any(|s| s.status != StepStatus::Pending) {
                return PlanStatus::Running;
            }
            return PlanStatus::Pending;
        }
        let ok = self.steps.values().all(|s| {
                     s.status == StepStatus::Succeeded
                     || (s.status == StepStatus::Skipped && s.spec.tolerant)
                 });
        if ok {
            PlanStatus::Succeeded
        } else {
            PlanStatus::Failed
        }
    }

    /// Primer error terminal en orden de inserción (el disparador del fallo
    /// del plan).
    pub fn first_error(&self) -> Option<OrchestratorError> {
        self.steps.values().find_map(|s| s.error.clone())
    }

    /// Representación serializada del plan para registrarlo como artifact
    /// (replay/explicabilidad).
    pub fn to_value(&self) -> serde_json::Value {
        let steps: Vec<_> = self.steps
                                .values()
                                .map(|s| serde_json::to_value(&s.spec).unwrap_or_default())
                                .collect();
        json!({
            "engine_version": crate::constants::ENGINE_VERSION,
            "steps": steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(id: &str, deps: &[&str]) -> StepSpec {
        StepSpec::new(id, StepKind::Sql, json!({})).depends_on(deps)
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = Plan::new(vec![spec("a", &[]), spec("a", &[])]).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidPlan(_)));
    }

    #[test]
    fn cycle_rejected() {
        let plan = Plan::new(vec![spec("a", &["b"]), spec("b", &["a"])]).unwrap();
        assert!(matches!(plan.validate(), Err(OrchestratorError::InvalidPlan(_))));
    }

    #[test]
    fn unknown_reference_rejected() {
        let plan = Plan::new(vec![spec("a", &["ghost"])]).unwrap();
        assert!(matches!(plan.validate(), Err(OrchestratorError::InvalidPlan(_))));
    }

    #[test]
    fn frontier_follows_insertion_order() {
        let plan = Plan::new(vec![spec("b", &[]), spec("a", &[]), spec("c", &["a", "b"])]).unwrap();
        plan.validate().unwrap();
        assert_eq!(plan.ready_steps(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn skip_propagates_transitively() {
        let mut plan = Plan::new(vec![spec("a", &[]), spec("b", &["a"]), spec("c", &["b"])]).unwrap();
        plan.mark_running("a");
        plan.mark_failed("a", OrchestratorError::Query("boom".into()));
        let skipped = plan.propagate_skips();
        assert_eq!(skipped, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(plan.status(), PlanStatus::Failed);
    }
}
