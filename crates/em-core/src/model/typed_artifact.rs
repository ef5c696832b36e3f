//! Conversión entre structs de Rust y `Artifact`.
//!
//! Cada tipo declara su nombre y versión de esquema; al decodificar se
//! comprueban ambos, de modo que un step nunca interpreta el output de otro
//! tipo por accidente.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::Artifact;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },
    #[error("schema version mismatch: expected {expected}, found {found:?}")]
    VersionMismatch { expected: u32, found: Option<u32> },
    #[error("encode {artifact_type}: {message}")]
    Encode { artifact_type: &'static str, message: String },
    #[error("decode {artifact_type}: {message}")]
    Decode { artifact_type: &'static str, message: String },
    #[error("invalid {artifact_type}: {message}")]
    Invalid { artifact_type: &'static str, message: String },
}

pub const VERSION_FIELD: &str = "schema_version";

pub trait ArtifactSpec: Sized + Serialize + DeserializeOwned + Clone {
    const TYPE_NAME: &'static str;
    const SCHEMA_VERSION: u32 = 1;

    /// Comprobación semántica tras decodificar.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// El hash lo añade el engine.
    fn into_artifact(self) -> Result<Artifact, ArtifactError> {
        let mut payload = serde_json::to_value(&self).map_err(|e| ArtifactError::Encode { artifact_type: Self::TYPE_NAME,
                                                                                          message: e.to_string() })?;
        if let Value::Object(map) = &mut payload {
            map.entry(VERSION_FIELD.to_string())
               .or_insert(Value::from(Self::SCHEMA_VERSION));
        }
        Ok(Artifact::unhashed(Self::TYPE_NAME, payload))
    }

    fn from_artifact(artifact: &Artifact) -> Result<Self, ArtifactError> {
        if artifact.artifact_type != Self::TYPE_NAME {
            return Err(ArtifactError::TypeMismatch { expected: Self::TYPE_NAME,
                                                     found: artifact.artifact_type.clone() });
        }
        let found = artifact.payload
                            .get(VERSION_FIELD)
                            .and_then(Value::as_u64)
                            .map(|v| v as u32);
        if found != Some(Self::SCHEMA_VERSION) {
            return Err(ArtifactError::VersionMismatch { expected: Self::SCHEMA_VERSION,
                                                        found });
        }
        let decoded: Self =
            serde_json::from_value(artifact.payload.clone()).map_err(|e| ArtifactError::Decode { artifact_type: Self::TYPE_NAME,
                                                                                                message: e.to_string() })?;
        decoded.validate()
               .map_err(|message| ArtifactError::Invalid { artifact_type: Self::TYPE_NAME,
                                                           message })?;
        Ok(decoded)
    }
}
