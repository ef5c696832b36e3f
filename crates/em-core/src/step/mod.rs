//! Steps: la interfaz neutra que ejecuta el engine (`StepDefinition`) y la
//! interfaz tipada con la que se escriben los protocolos (`TypedStep`).

pub mod definition;
pub mod macros;
mod run_result;
mod status;
pub mod typed;

pub use definition::{StepDefinition, StepKind};
pub use run_result::{StepRunResult, StepSignal};
pub use status::StepStatus;
pub use typed::{SameAs, StepRunResultTyped, TypedStep};
