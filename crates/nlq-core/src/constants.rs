//! Constantes del motor core.
//!
//! Valores estáticos que participan en el hashing de planes/artifacts y en
//! los defaults del scheduler. `ENGINE_VERSION` entra en el payload del plan
//! registrado para que un cambio de motor invalide hashes aunque la
//! definición no cambie.

/// Versión lógica del motor. Mantener estable mientras no haya cambios
/// incompatibles en el formato de eventos o de planes.
pub const ENGINE_VERSION: &str = "O1.0";

/// Capacidad por defecto del canal broadcast del `EventBus`. Suscriptores
/// lentos pierden eventos (delivery best-effort), nunca bloquean productores.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Concurrencia por defecto del pool de workers del scheduler.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Reintentos por defecto ante `Transient` antes de convertir el error al
/// tipo terminal del step.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Backoff base (ms) entre reintentos; crece exponencialmente por intento.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

/// Timeout por intento de step (ms). Expirar cuenta como fallo retryable.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;
