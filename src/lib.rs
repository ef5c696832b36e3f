//! emflow
//!
//! Host de línea de comandos para los protocolos de em-protocols:
//! - `config`: `AppConfig` desde variables de entorno / .env.
//! - `cli`: definición clap y despacho de cada subcomando a su protocolo.
//! - `errors`: `AppError` y códigos de salida.

pub mod cli;
pub mod config;
pub mod errors;

pub use cli::{execute, Cli, Command};
pub use config::AppConfig;
pub use errors::AppError;
