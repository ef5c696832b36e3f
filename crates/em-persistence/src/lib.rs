//! em-persistence
//!
//! Event store durable para los flujos de protocolo: cada evento se agrega
//! como una línea JSON a un archivo append-only dentro del directorio de la
//! ejecución, de modo que el timeline de un run puede reconstruirse después
//! con el `FlowRepository` del core.
//!
//! Módulos:
//! - `jsonl`: `JsonlEventStore` (implementa `EventStore`).
//! - `error`: errores de lectura/escritura del log.

pub mod error;
pub mod jsonl;

pub use error::PersistenceError;
pub use jsonl::{read_events, JsonlEventStore, EVENTS_FILE};
