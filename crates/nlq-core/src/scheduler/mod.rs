//! Scheduler de planes: resuelve el grafo de dependencias en un orden de
//! ejecución válido y corre steps independientes en paralelo.
//!
//! El loop de `run` es el único dueño del estado mutable del Plan: la
//! recomputación del frontier está serializada, mientras los steps listos
//! corren concurrentes en un `JoinSet` acotado por `max_concurrency`. El
//! tie-break entre steps listos es FIFO estable por orden de inserción, lo
//! que hace el orden de dispatch determinista para planes idénticos.
//!
//! Los reintentos son locales al scheduler e invisibles para el Plan: solo
//! el resultado final de cada step queda registrado.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::constants::{DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS,
                       DEFAULT_STEP_TIMEOUT_MS};
use crate::errors::OrchestratorError;
use crate::event::{EventBus, EventKind};
use crate::executor::StepDispatcher;
use crate::plan::{Plan, PlanStatus, StepKind, StepSpec};

/// Política de ejecución por plan; los steps pueden override reintentos y
/// timeout individualmente.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Workers concurrentes máximos por plan.
    pub max_concurrency: usize,
    /// Reintentos ante `Transient` antes de convertir al error terminal.
    pub max_retries: u32,
    /// Backoff base entre reintentos; exponencial por intento.
    pub retry_backoff_ms: u64,
    /// Timeout por intento; expirar cuenta como fallo retryable.
    pub step_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrency: DEFAULT_MAX_CONCURRENCY,
               max_retries: DEFAULT_MAX_RETRIES,
               retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
               step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS }
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    bus: Arc<EventBus>,
}

type WorkerResult = (String, StepKind, Result<Option<String>, OrchestratorError>);

impl Scheduler {
    pub fn new(config: SchedulerConfig, bus: Arc<EventBus>) -> Self {
        Self { config, bus }
    }

    /// Ejecuta el plan hasta que todos los steps alcancen estado terminal,
    /// o hasta cancelación vía el canal `watch`.
    pub async fn run(&self,
                     goal_id: Uuid,
                     plan: &mut Plan,
                     dispatcher: Arc<StepDispatcher>,
                     mut cancel: watch::Receiver<bool>)
                     -> PlanStatus {
        if plan.is_empty() {
            return PlanStatus::Succeeded;
        }
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        let mut cancel_open = true;

        loop {
            self.publish_skips(goal_id, plan);

            if *cancel.borrow() {
                return self.cancel_plan(goal_id, plan, &mut workers);
            }

            // Despachar el frontier en orden estable hasta el límite.
            for id in plan.ready_steps() {
                if workers.len() >= self.config.max_concurrency {
                    break;
                }
                let deps = plan.dependency_artifacts(&id);
                plan.mark_running(&id);
                let spec = plan.step(&id).expect("ready step exists").spec.clone();
                self.bus.publish(EventKind::StepStarted { goal_id,
                                                          step_id: id.clone(),
                                                          kind: spec.kind });
                let dispatcher = dispatcher.clone();
                let bus = self.bus.clone();
                let cfg = self.config.clone();
                workers.spawn(async move {
                           let kind = spec.kind;
                           let res = run_with_retries(goal_id, &spec, &deps, dispatcher, bus, cfg).await;
                           (spec.id, kind, res)
                       });
            }

            if workers.is_empty() {
                break;
            }

            let joined = if cancel_open {
                tokio::select! {
                    changed = cancel.changed() => {
                        match changed {
                            Ok(()) if *cancel.borrow() => {
                                return self.cancel_plan(goal_id, plan, &mut workers);
                            }
                            Ok(()) => continue,
                            Err(_) => {
                                // caller soltó el sender: seguir sin cancelación
                                cancel_open = false;
                                continue;
                            }
                        }
                    }
                    joined = workers.join_next() => joined,
                }
            } else {
                workers.join_next().await
            };

            match joined {
                Some(Ok((id, kind, outcome))) => match outcome {
                    Ok(artifact) => {
                        self.bus.publish(EventKind::StepFinished { goal_id,
                                                                   step_id: id.clone(),
                                                                   kind,
                                                                   artifact: artifact.clone() });
                        plan.mark_succeeded(&id, artifact);
                    }
                    Err(error) => {
                        self.bus.publish(EventKind::StepFailed { goal_id,
                                                                 step_id: id.clone(),
                                                                 kind,
                                                                 error: error.clone() });
                        plan.mark_failed(&id, error);
                    }
                },
                Some(Err(join_err)) => {
                    // solo alcanzable si un worker entra en pánico
                    tracing::warn!(%goal_id, error = %join_err, "worker task aborted unexpectedly");
                }
                None => {}
            }
        }

        let status = plan.status();
        tracing::info!(%goal_id, ?status, "plan settled");
        status
    }

    fn publish_skips(&self, goal_id: Uuid, plan: &mut Plan) {
        for id in plan.propagate_skips() {
            let tolerant = plan.step(&id).map(|s| s.spec.tolerant).unwrap_or(false);
            self.bus.publish(EventKind::StepSkipped { goal_id, step_id: id, tolerant });
        }
    }

    /// Camino de cancelación: aborta los workers en vuelo, salta todo step
    /// no terminal y no despacha nada más.
    fn cancel_plan(&self, goal_id: Uuid, plan: &mut Plan, workers: &mut JoinSet<WorkerResult>) -> PlanStatus {
        workers.abort_all();
        for id in plan.skip_remaining() {
            let tolerant = plan.step(&id).map(|s| s.spec.tolerant).unwrap_or(false);
            self.bus.publish(EventKind::StepSkipped { goal_id, step_id: id, tolerant });
        }
        tracing::info!(%goal_id, "plan cancelled");
        PlanStatus::Cancelled
    }
}

/// Intenta el step hasta agotar la política de reintentos. `Transient`
/// (incluido timeout de intento) reintenta con backoff exponencial; agotado
/// el límite, se convierte al error terminal del kind del step.
async fn run_with_retries(goal_id: Uuid,
                          spec: &StepSpec,
                          deps: &[String],
                          dispatcher: Arc<StepDispatcher>,
                          bus: Arc<EventBus>,
                          cfg: SchedulerConfig)
                          -> Result<Option<String>, OrchestratorError> {
    let max_retries = spec.max_retries.unwrap_or(cfg.max_retries);
    let timeout_ms = spec.timeout_ms.unwrap_or(cfg.step_timeout_ms);
    let mut attempt: u32 = 0;
    loop {
        let fut = dispatcher.dispatch(goal_id, spec, deps);
        let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(res) => res,
            Err(_) => Err(OrchestratorError::Transient(format!("step '{}' timed out after {timeout_ms}ms",
                                                               spec.id))),
        };
        match outcome {
            Ok(artifact) => return Ok(artifact),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay_ms = cfg.retry_backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                bus.publish(EventKind::StepRetryScheduled { goal_id,
                                                            step_id: spec.id.clone(),
                                                            attempt,
                                                            delay_ms });
                tracing::debug!(step_id = %spec.id, attempt, delay_ms, "retrying after transient failure");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => {
                let e = if e.is_retryable() {
                    spec.kind.terminal_error(format!("retries exhausted: {e}"))
                } else {
                    e
                };
                return Err(e);
            }
        }
    }
}
