//! em-core: motor lineal determinista de steps.
//!
//! Cada protocolo se expresa como una cadena de `TypedStep`s; el engine
//! registra cada transición en un `EventStore` append-only y calcula
//! fingerprints reproducibles. Los errores de steps se clasifican con
//! `ErrorClass` y quedan guardados en el evento `StepFailed`.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod repo;
pub mod step;

pub use engine::FlowEngine;
pub use errors::{CoreEngineError, ErrorClass};
pub use event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
pub use model::{Artifact, ArtifactError, ArtifactSpec};
pub use repo::{FlowDefinition, FlowRepository, InMemoryFlowRepository};
pub use step::{StepDefinition, StepKind, StepRunResult, StepRunResultTyped, StepSignal, StepStatus, TypedStep};
