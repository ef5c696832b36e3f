use std::path::PathBuf;

use em_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("STAR parse error at line {line}: {message}")]
    StarSyntax { line: usize, message: String },
    #[error("missing STAR block or label '{0}'")]
    MissingLabel(String),
    #[error("invalid value '{value}' for label '{label}'")]
    InvalidValue { label: String, value: String },
    #[error("invalid MRC file {path}: {message}")]
    Mrc { path: PathBuf, message: String },
    #[error("unsupported MRC mode {0}")]
    UnsupportedMode(i32),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ConvertError {
        let path = path.into();
        move |source| ConvertError::Io { path, source }
    }
}
