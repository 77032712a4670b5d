//! Ejecutores SQL in-memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};

use nlq_core::{OrchestratorError, SqlExecutor};

/// Marcador en el texto de query que simula SQL malformado (error terminal).
pub const FAIL_MARKER: &str = "__fail__";
/// Marcador que simula un fallo momentáneo del backend (error retryable).
pub const TRANSIENT_MARKER: &str = "__transient__";

/// Rowsets enlatados por texto exacto de query; queries desconocidas
/// devuelven un rowset vacío determinista.
pub struct CannedSqlExecutor {
    responses: HashMap<String, Value>,
}

impl CannedSqlExecutor {
    pub fn new() -> Self {
        Self { responses: HashMap::new() }
    }

    pub fn with_response(mut self, query: impl Into<String>, rowset: Value) -> Self {
        self.responses.insert(query.into(), rowset);
        self
    }
}

impl Default for CannedSqlExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlExecutor for CannedSqlExecutor {
    async fn run_sql(&self, query: &str) -> Result<Value, OrchestratorError> {
        if query.contains(FAIL_MARKER) {
            return Err(OrchestratorError::Query(format!("malformed query: {query}")));
        }
        if query.contains(TRANSIENT_MARKER) {
            return Err(OrchestratorError::Transient("sql backend unavailable".into()));
        }
        Ok(self.responses
               .get(query)
               .cloned()
               .unwrap_or_else(|| json!({ "columns": [], "rows": [] })))
    }
}

/// Falla con `Transient` las primeras `failures` llamadas y luego responde
/// el rowset fijo. Para ejercitar la política de reintentos del scheduler.
pub struct FlakySqlExecutor {
    rowset: Value,
    failures_remaining: AtomicU32,
}

impl FlakySqlExecutor {
    pub fn new(rowset: Value, failures: u32) -> Self {
        Self { rowset, failures_remaining: AtomicU32::new(failures) }
    }
}

#[async_trait]
impl SqlExecutor for FlakySqlExecutor {
    async fn run_sql(&self, _query: &str) -> Result<Value, OrchestratorError> {
        let remaining = self.failures_remaining
                            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                            .ok();
        match remaining {
            Some(_) => Err(OrchestratorError::Transient("sql backend flaking".into())),
            None => Ok(self.rowset.clone()),
        }
    }
}
