//! Errores del binario: agrupa los de cada crate para reportarlos con un
//! código de salida.
use thiserror::Error;

use em_convert::ConvertError;
use em_core::ErrorClass;
use em_domain::DomainError;
use em_persistence::PersistenceError;
use em_protocols::ProtocolError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("cannot serialize outcome: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// 2 para errores de configuración/argumentos, 1 para el resto.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgs(_) => 2,
            Self::Protocol(e) if e.class() == ErrorClass::Configuration => 2,
            _ => 1,
        }
    }
}
