//! Artifacts neutros, su versión tipada y el contexto de ejecución.

pub mod artifact;
pub mod context;
pub mod typed_artifact;

pub use artifact::Artifact;
pub use context::ExecutionContext;
pub use typed_artifact::{ArtifactError, ArtifactSpec};
