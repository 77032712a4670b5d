//! Etapas de ingesta CSV: clasificador, profiler, diccionarista, revisor,
//! generador de schema, carga y cierre.
//!
//! Cada etapa consume el artifact de la etapa anterior y propone el estado
//! sucesor; el orquestador valida la propuesta vía `advance`. Las etapas
//! son pipeline-style: el clasificador extrae la muestra parseada del
//! archivo crudo y las siguientes trabajan sobre el payload del predecesor,
//! sin volver a tocar los bytes originales.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use nlq_core::{Artifact, ArtifactKind, IngestStage, IngestState, OrchestratorError, StageOutcome,
               WorkflowInstance};

/// Pipeline completo FileDropped → Done para un dataset tabular.
pub fn default_pipeline(table: &str) -> Vec<Arc<dyn IngestStage>> {
    vec![Arc::new(ClassifierStage),
         Arc::new(ProfilerStage),
         Arc::new(DictDraftStage { table: table.to_string() }),
         Arc::new(DictReviewStage),
         Arc::new(SchemaStage),
         Arc::new(BulkLoadStage),
         Arc::new(FinalizeStage)]
}

fn latest_payload<'a>(stage: &str, latest: Option<&'a Artifact>) -> Result<&'a Value, OrchestratorError> {
    latest.map(|a| &a.payload)
          .ok_or_else(|| OrchestratorError::Execution(format!("stage '{stage}' has no input artifact")))
}

fn infer_type(sample: &str) -> &'static str {
    if sample.parse::<i64>().is_ok() {
        "integer"
    } else if sample.parse::<f64>().is_ok() {
        "real"
    } else {
        "text"
    }
}

/// Clasifica el archivo: detecta delimitador y extrae header + filas.
pub struct ClassifierStage;

#[async_trait]
impl IngestStage for ClassifierStage {
    fn consumes(&self) -> IngestState {
        IngestState::FileDropped
    }

    fn name(&self) -> &str {
        "classifier"
    }

    async fn execute(&self,
                     _instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError> {
        let payload = latest_payload(self.name(), latest)?;
        let content = payload.get("content")
                             .and_then(Value::as_str)
                             .ok_or_else(|| OrchestratorError::Execution("raw file artifact missing 'content'".into()))?;
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let header_line = lines.next()
                               .ok_or_else(|| OrchestratorError::Execution("uploaded file is empty".into()))?;

        // delimitador más frecuente en el header
        let delimiter = [',', ';', '\t'].into_iter()
                                        .max_by_key(|d| header_line.matches(*d).count())
                                        .unwrap_or(',');
        let header: Vec<String> = header_line.split(delimiter).map(|c| c.trim().to_string()).collect();
        let rows: Vec<Vec<String>> = lines.map(|l| l.split(delimiter).map(|c| c.trim().to_string()).collect())
                                          .collect();

        Ok(StageOutcome { payload: json!({
                              "format": "delimited",
                              "delimiter": delimiter.to_string(),
                              "header": header,
                              "rows": rows,
                          }),
                          kind: ArtifactKind::FileProfile,
                          target: IngestState::Classified })
    }
}

/// Perfila columnas: tipo inferido y muestra por columna.
pub struct ProfilerStage;

#[async_trait]
impl IngestStage for ProfilerStage {
    fn consumes(&self) -> IngestState {
        IngestState::Classified
    }

    fn name(&self) -> &str {
        "profiler"
    }

    async fn execute(&self,
                     _instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError> {
        let payload = latest_payload(self.name(), latest)?;
        let header = payload.get("header")
                            .and_then(Value::as_array)
                            .ok_or_else(|| OrchestratorError::Execution("classification missing 'header'".into()))?;
        let rows = payload.get("rows").and_then(Value::as_array).cloned().unwrap_or_default();

        let columns: Vec<Value> = header.iter()
                                        .enumerate()
                                        .map(|(idx, name)| {
                                            let sample = rows.first()
                                                             .and_then(|r| r.get(idx))
                                                             .and_then(Value::as_str)
                                                             .unwrap_or("");
                                            json!({
                                                "name": name,
                                                "inferred_type": infer_type(sample),
                                                "sample": sample,
                                            })
                                        })
                                        .collect();

        Ok(StageOutcome { payload: json!({ "columns": columns, "row_count": rows.len() }),
                          kind: ArtifactKind::FileProfile,
                          target: IngestState::Profiled })
    }
}

/// Redacta el diccionario de datos a partir del perfil.
pub struct DictDraftStage {
    pub table: String,
}

#[async_trait]
impl IngestStage for DictDraftStage {
    fn consumes(&self) -> IngestState {
        IngestState::Profiled
    }

    fn name(&self) -> &str {
        "dict-writer"
    }

    async fn execute(&self,
                     _instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError> {
        let payload = latest_payload(self.name(), latest)?;
        let columns = payload.get("columns")
                             .and_then(Value::as_array)
                             .ok_or_else(|| OrchestratorError::Execution("profile missing 'columns'".into()))?;
        let entries: Vec<Value> = columns.iter()
                                         .map(|c| {
                                             let name = c.get("name").and_then(Value::as_str).unwrap_or("");
                                             let ty = c.get("inferred_type").and_then(Value::as_str).unwrap_or("text");
                                             json!({
                                                 "name": name,
                                                 "type": ty,
                                                 "description": format!("column '{name}' of type {ty}"),
                                             })
                                         })
                                         .collect();

        Ok(StageOutcome { payload: json!({
                              "table": self.table,
                              "columns": entries,
                              "row_count": payload.get("row_count"),
                          }),
                          kind: ArtifactKind::DataDictionary,
                          target: IngestState::DictDraft })
    }
}

/// Revisa el borrador del diccionario y lo marca aprobado.
pub struct DictReviewStage;

#[async_trait]
impl IngestStage for DictReviewStage {
    fn consumes(&self) -> IngestState {
        IngestState::DictDraft
    }

    fn name(&self) -> &str {
        "dict-reviewer"
    }

    async fn execute(&self,
                     _instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError> {
        let payload = latest_payload(self.name(), latest)?.clone();
        let mut reviewed = payload;
        if let Some(obj) = reviewed.as_object_mut() {
            obj.insert("reviewed".into(), json!(true));
        }
        Ok(StageOutcome { payload: reviewed,
                          kind: ArtifactKind::DataDictionary,
                          target: IngestState::DictReviewed })
    }
}

/// Genera el DDL de carga a partir del diccionario revisado.
pub struct SchemaStage;

#[async_trait]
impl IngestStage for SchemaStage {
    fn consumes(&self) -> IngestState {
        IngestState::DictReviewed
    }

    fn name(&self) -> &str {
        "schema-builder"
    }

    async fn execute(&self,
                     _instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError> {
        let payload = latest_payload(self.name(), latest)?;
        let table = payload.get("table").and_then(Value::as_str).unwrap_or("dataset");
        let columns = payload.get("columns")
                             .and_then(Value::as_array)
                             .ok_or_else(|| OrchestratorError::Execution("dictionary missing 'columns'".into()))?;
        let defs: Vec<String> = columns.iter()
                                       .map(|c| {
                                           let name = c.get("name").and_then(Value::as_str).unwrap_or("");
                                           let ty = match c.get("type").and_then(Value::as_str) {
                                               Some("integer") => "INTEGER",
                                               Some("real") => "REAL",
                                               _ => "TEXT",
                                           };
                                           format!("{name} {ty}")
                                       })
                                       .collect();
        let ddl = format!("CREATE TABLE {table} ({})", defs.join(", "));

        Ok(StageOutcome { payload: json!({
                              "table": table,
                              "ddl": ddl,
                              "row_count": payload.get("row_count"),
                          }),
                          kind: ArtifactKind::TableSchema,
                          target: IngestState::Ready })
    }
}

/// Simula la carga bulk reportando filas cargadas.
pub struct BulkLoadStage;

#[async_trait]
impl IngestStage for BulkLoadStage {
    fn consumes(&self) -> IngestState {
        IngestState::Ready
    }

    fn name(&self) -> &str {
        "bulk-loader"
    }

    async fn execute(&self,
                     _instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError> {
        let payload = latest_payload(self.name(), latest)?;
        Ok(StageOutcome { payload: json!({
                              "table": payload.get("table"),
                              "rows_loaded": payload.get("row_count"),
                          }),
                          kind: ArtifactKind::GenericJson,
                          target: IngestState::BulkLoaded })
    }
}

/// Cierra la ingesta marcando el dataset listo para consultas.
pub struct FinalizeStage;

#[async_trait]
impl IngestStage for FinalizeStage {
    fn consumes(&self) -> IngestState {
        IngestState::BulkLoaded
    }

    fn name(&self) -> &str {
        "finalizer"
    }

    async fn execute(&self,
                     _instance: &WorkflowInstance,
                     latest: Option<&Artifact>)
                     -> Result<StageOutcome, OrchestratorError> {
        let payload = latest_payload(self.name(), latest)?;
        Ok(StageOutcome { payload: json!({
                              "dataset_ready": true,
                              "table": payload.get("table"),
                          }),
                          kind: ArtifactKind::GenericJson,
                          target: IngestState::Done })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_inference() {
        assert_eq!(infer_type("42"), "integer");
        assert_eq!(infer_type("3.14"), "real");
        assert_eq!(infer_type("hello"), "text");
    }
}
