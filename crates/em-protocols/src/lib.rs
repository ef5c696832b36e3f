//! em-protocols: protocolos cryo-EM como flujos de `TypedStep`s sobre em-core.
//!
//! - `env` / `runner`: entorno declarado por el usuario y ejecución en streaming.
//! - `steps`: los steps tipados (materializar, resolver, ejecutar, recoger,
//!   descargar, filtrar, repartir).
//! - `protocols`: parámetros y drivers que ejecutan el flujo y registran las
//!   salidas en el `OutputRegistry` del host.
pub mod artifacts;
pub mod env;
pub mod error;
pub mod protocols;
pub mod run;
pub mod runner;
pub mod settings;
pub mod steps;

pub use env::{effective_environment, EnvOverlay};
pub use error::ProtocolError;
pub use protocols::download_emdb::{DownloadEmdbParams, DownloadEmdbProtocol};
pub use protocols::generic_cmd::{GenericCmdInputs, GenericCmdParams, GenericCmdProtocol};
pub use protocols::remove_unlinked::RemoveUnlinkedProtocol;
pub use protocols::split_subsets::{SplitSubsetsParams, SplitSubsetsProtocol};
pub use protocols::ProtocolOutcome;
pub use run::{OutputObject, OutputRegistry, Pointer, ProtocolRun, Relation, RelationKind};
pub use runner::OutputRelay;
pub use settings::HostSettings;
pub use steps::download::{HttpMapFetcher, MapFetcher};
