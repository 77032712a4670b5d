//! Registro de artifacts content-addressed.
//!
//! `put` es idempotente: contenido idéntico devuelve el mismo hash y no
//! duplica almacenamiento. Las escrituras son conmutativas, por lo que no
//! hace falta lock global: el check-then-insert atómico lo da la entry API
//! de `DashMap` (lock por shard). Compartido read-only entre todos los
//! goals del proceso.

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;

use crate::errors::OrchestratorError;
use crate::hashing::hash_value;
use crate::model::{Artifact, ArtifactKind};

#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    inner: DashMap<String, Artifact>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    /// Almacena un payload y devuelve su hash. Recalcular sobre contenido
    /// idéntico devuelve el mismo hash sin segunda copia.
    pub fn put(&self, kind: ArtifactKind, payload: Value, produced_by: &str) -> String {
        self.put_with_metadata(kind, payload, None, produced_by)
    }

    /// Variante con metadata auxiliar (excluida del hash).
    pub fn put_with_metadata(&self,
                             kind: ArtifactKind,
                             payload: Value,
                             metadata: Option<Value>,
                             produced_by: &str)
                             -> String {
        let hash = hash_value(&payload);
        self.inner.entry(hash.clone()).or_insert_with(|| {
                      Artifact { kind,
                                 hash: hash.clone(),
                                 payload,
                                 metadata,
                                 produced_by: produced_by.to_string(),
                                 created_at: Utc::now() }
                  });
        hash
    }

    /// Recupera un artifact por hash.
    pub fn get(&self, hash: &str) -> Result<Artifact, OrchestratorError> {
        self.inner
            .get(hash)
            .map(|a| a.clone())
            .ok_or_else(|| OrchestratorError::NotFound(hash.to_string()))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.inner.contains_key(hash)
    }

    /// Cantidad de artifacts almacenados (una entrada por contenido único).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_is_idempotent() {
        let reg = ArtifactRegistry::new();
        let h1 = reg.put(ArtifactKind::RowSet, json!({"rows": [[1, 2]]}), "s1");
        let h2 = reg.put(ArtifactKind::RowSet, json!({"rows": [[1, 2]]}), "s2");
        assert_eq!(h1, h2);
        assert_eq!(reg.len(), 1);
        // el primer productor gana; el contenido nunca cambia bajo un hash
        assert_eq!(reg.get(&h1).unwrap().produced_by, "s1");
    }

    #[test]
    fn get_missing_is_not_found() {
        let reg = ArtifactRegistry::new();
        assert!(matches!(reg.get("deadbeef"), Err(OrchestratorError::NotFound(_))));
    }
}
