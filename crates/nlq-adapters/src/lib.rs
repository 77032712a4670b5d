//! nlq-adapters: colaboradores in-memory para el core.
//!
//! Este crate provee implementaciones deterministas de los traits de
//! `nlq_core::collab`, usadas por los tests del core y por el binario demo:
//! - `ScriptedPlanner`: devuelve un plan fijo (o falla a pedido).
//! - `CannedSqlExecutor` / `FlakySqlExecutor`: rowsets enlatados, con
//!   marcadores para simular errores de query y fallos transitorios.
//! - `EchoCodeExecutor`: ejecución de código simulada con stdout capturado.
//! - `StaticSubagents`: funciones de agente nombradas sobre un mapa fijo.
//! - `AutoApproveGate` / `ChannelGate`: decisiones humanas inmediatas o
//!   entregadas por canal.
//! - `default_pipeline`: las siete etapas de ingesta CSV (clasificador,
//!   profiler, diccionarista, revisor, schema, carga, cierre).
//!
//! Nota: el core solo conoce `Artifact { kind, hash, payload, metadata }`;
//! la semántica CSV vive enteramente de este lado.

pub mod code;
pub mod gate;
pub mod ingest;
pub mod planner;
pub mod sql;
pub mod subagent;

pub use code::EchoCodeExecutor;
pub use gate::{AutoApproveGate, ChannelGate};
pub use ingest::default_pipeline;
pub use planner::ScriptedPlanner;
pub use sql::{CannedSqlExecutor, FlakySqlExecutor};
pub use subagent::StaticSubagents;

use std::sync::Arc;

use nlq_core::Collaborators;

/// Conjunto de colaboradores por defecto para demos y tests: planner con el
/// script dado, SQL enlatado, código echo, sin subagentes registrados,
/// gate auto-aprobador y pipeline CSV completo.
pub fn default_collaborators(planner: ScriptedPlanner, sql: CannedSqlExecutor) -> Collaborators {
    Collaborators { planner: Arc::new(planner),
                    sql: Arc::new(sql),
                    code: Arc::new(EchoCodeExecutor::default()),
                    subagent: Arc::new(StaticSubagents::default()),
                    human: Arc::new(AutoApproveGate::default()),
                    stages: default_pipeline("dataset") }
}
