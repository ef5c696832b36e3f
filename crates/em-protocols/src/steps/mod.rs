//! Steps tipados de los protocolos. Cada step es un `TypedStep` del engine;
//! la lógica vive en funciones libres (`materialize`, `resolve_command`, ...)
//! que devuelven `Result<_, ProtocolError>` y se prueban por separado.
pub mod download;
pub mod execute;
pub mod harvest;
pub mod materialize;
pub mod resolve;
pub mod split;
pub mod unlinked;

pub use download::{ExtractMapStep, FetchMapStep};
pub use execute::ExecuteCommandStep;
pub use harvest::HarvestOutputsStep;
pub use materialize::MaterializeInputsStep;
pub use resolve::ResolveCommandStep;
pub use split::{LocateDataStarStep, SplitSubsetsStep};
pub use unlinked::FilterLinkedStep;
