//! Artifact inmutable del flujo.
//!
//! Un `Artifact` es la unidad de datos producida por etapas de ingesta y por
//! steps de plan. Es neutral:
//! - `payload` es JSON genérico; el motor no interpreta su semántica.
//! - `hash` es el blake3 del payload canonicalizado (ver `hashing`); sirve
//!   como identidad para deduplicación y como referencia estable desde logs
//!   de goals sin copiar payloads grandes.
//! - `metadata` anota información auxiliar que no entra al hash.
//! - Una vez escrito bajo un hash, el contenido nunca cambia.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tipos de artifact producidos por el pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Bytes crudos de un dataset subido.
    RawFile,
    /// Clasificación estructural del archivo (delimitador, encoding, tipo).
    FileProfile,
    /// Diccionario de datos (columnas, tipos inferidos, descripciones).
    DataDictionary,
    /// Schema generado para la carga (DDL).
    TableSchema,
    /// Resultado de una consulta SQL (rowset serializado).
    RowSet,
    /// Salida capturada de un step de código (stdout + outputs auxiliares).
    CodeOutput,
    /// Plan aceptado para un goal, registrado para replay.
    PlanSpec,
    /// Decisión humana provista a un step `HumanGate`.
    Decision,
    /// JSON genérico sin semántica.
    GenericJson,
}

/// Artifact content-addressed producido por una etapa o step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub hash: String,            // hash canonical del payload (asignado por el registry)
    pub payload: Value,          // contenido neutro JSON
    pub metadata: Option<Value>, // información auxiliar (no entra al hash)
    pub produced_by: String,     // id de la etapa o step productor
    pub created_at: DateTime<Utc>,
}
