//! Estados de la ingesta y su orden lineal fijo.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ciclo de vida de ingesta de un dataset.
///
/// El orden es lineal y fijo; `advance` solo acepta el sucesor inmediato
/// (o `Failed` desde cualquier estado no terminal). `Done` y `Failed` son
/// terminales: ninguna transición posterior se acepta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IngestState {
    FileDropped,
    Classified,
    Profiled,
    DictDraft,
    DictReviewed,
    Ready,
    BulkLoaded,
    Done,
    Failed,
}

impl IngestState {
    /// Sucesor único en el orden lineal; `None` para terminales.
    pub fn successor(self) -> Option<IngestState> {
        use IngestState::*;
        match self {
            FileDropped => Some(Classified),
            Classified => Some(Profiled),
            Profiled => Some(DictDraft),
            DictDraft => Some(DictReviewed),
            DictReviewed => Some(Ready),
            Ready => Some(BulkLoaded),
            BulkLoaded => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, IngestState::Done | IngestState::Failed)
    }

    /// Nombre de etapa usado como clave en el mapa de artifacts de la
    /// instancia.
    pub fn stage_name(self) -> &'static str {
        use IngestState::*;
        match self {
            FileDropped => "file_dropped",
            Classified => "classified",
            Profiled => "profiled",
            DictDraft => "dict_draft",
            DictReviewed => "dict_reviewed",
            Ready => "ready",
            BulkLoaded => "bulk_loaded",
            Done => "done",
            Failed => "failed",
        }
    }

    /// Orden lineal completo, usado por tests de la propiedad de prefijo.
    pub const ORDERED: [IngestState; 8] = [IngestState::FileDropped,
                                           IngestState::Classified,
                                           IngestState::Profiled,
                                           IngestState::DictDraft,
                                           IngestState::DictReviewed,
                                           IngestState::Ready,
                                           IngestState::BulkLoaded,
                                           IngestState::Done];
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_chain_matches_successors() {
        for pair in IngestState::ORDERED.windows(2) {
            assert_eq!(pair[0].successor(), Some(pair[1]));
        }
        assert_eq!(IngestState::Done.successor(), None);
        assert_eq!(IngestState::Failed.successor(), None);
    }
}
