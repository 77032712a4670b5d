//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable (`CONFIG`)
//! con la política de ejecución del orquestador.

use once_cell::sync::Lazy;
use std::env;

use nlq_core::{OrchestratorConfig, SchedulerConfig};

/// Configuración global de la aplicación (extensible para más secciones).
pub struct AppConfig {
    /// Política de ejecución del orquestador.
    pub orchestrator: OrchestratorSettings,
}

/// Parámetros del orquestador leídos de entorno, con defaults del core.
pub struct OrchestratorSettings {
    pub event_capacity: usize,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub step_timeout_ms: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    let defaults = OrchestratorConfig::default();
    AppConfig { orchestrator: OrchestratorSettings {
        event_capacity: env_or("NLQFLOW_EVENT_CAPACITY", defaults.event_capacity),
        max_concurrency: env_or("NLQFLOW_MAX_CONCURRENCY", defaults.scheduler.max_concurrency),
        max_retries: env_or("NLQFLOW_MAX_RETRIES", defaults.scheduler.max_retries),
        retry_backoff_ms: env_or("NLQFLOW_RETRY_BACKOFF_MS", defaults.scheduler.retry_backoff_ms),
        step_timeout_ms: env_or("NLQFLOW_STEP_TIMEOUT_MS", defaults.scheduler.step_timeout_ms),
    } }
});

/// Construye la configuración del orquestador a partir de `CONFIG`.
pub fn orchestrator_config() -> OrchestratorConfig {
    let s = &CONFIG.orchestrator;
    OrchestratorConfig { scheduler: SchedulerConfig { max_concurrency: s.max_concurrency,
                                                      max_retries: s.max_retries,
                                                      retry_backoff_ms: s.retry_backoff_ms,
                                                      step_timeout_ms: s.step_timeout_ms },
                         event_capacity: s.event_capacity }
}
