//! Errores de los protocolos y su clasificación estable (`ErrorClass`).
use std::path::PathBuf;

use em_convert::ConvertError;
use em_core::{CoreEngineError, ErrorClass};
use em_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid parameter: {0}")]
    InvalidParams(String),
    #[error("{file} not found in your command")]
    UnreferencedInput { file: String },
    #[error("invalid output pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("could not spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command exited with code {code}:\n{transcript}")]
    CommandFailed { code: i32, transcript: String },
    #[error("no valid output detected (patterns '{particles_pattern}', '{volumes_pattern}')")]
    NoOutputs {
        particles_pattern: String,
        volumes_pattern: String,
    },
    #[error("failed to download {url}: {message}")]
    Download { url: String, message: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Engine(#[from] CoreEngineError),
}

impl ProtocolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProtocolError::InvalidParams(_) | ProtocolError::UnreferencedInput { .. } | ProtocolError::Pattern { .. } => {
                ErrorClass::Configuration
            }
            ProtocolError::Spawn { .. } | ProtocolError::CommandFailed { .. } => ErrorClass::Execution,
            ProtocolError::NoOutputs { .. } => ErrorClass::OutputContract,
            ProtocolError::Download { .. } => ErrorClass::Download,
            ProtocolError::Convert(_) | ProtocolError::Domain(_) => ErrorClass::Conversion,
            ProtocolError::Io { .. } => ErrorClass::Io,
            ProtocolError::Engine(e) => e.class(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ProtocolError {
        let path = path.into();
        move |source| ProtocolError::Io { path, source }
    }
}

impl From<ProtocolError> for CoreEngineError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Engine(inner) => inner,
            other => CoreEngineError::StepFailed { class: other.class(),
                                                   message: other.to_string() },
        }
    }
}
