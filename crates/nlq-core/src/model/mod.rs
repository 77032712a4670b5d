//! Modelos neutrales compartidos (Artifact).

pub mod artifact;

pub use artifact::{Artifact, ArtifactKind};
