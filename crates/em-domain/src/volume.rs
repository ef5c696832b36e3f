use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::DomainError;

/// Volumen 3D respaldado por un fichero binario (normalmente MRC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: u64,
    pub file: PathBuf,
    pub sampling_rate: Option<f64>,
    pub dims: Option<[u32; 3]>,
}

impl Volume {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { id: 0,
               file: file.into(),
               sampling_rate: None,
               dims: None }
    }

    pub fn with_sampling_rate(mut self, sampling_rate: f64) -> Result<Self, DomainError> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(DomainError::ValidationError(format!("invalid sampling rate {sampling_rate}")));
        }
        self.sampling_rate = Some(sampling_rate);
        Ok(self)
    }

    pub fn with_dims(mut self, dims: [u32; 3]) -> Self {
        self.dims = Some(dims);
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// `true` si la extensión es `.mrc` (los `.map` y otros formatos se
    /// convierten antes de entregarse a herramientas externas).
    pub fn is_mrc(&self) -> bool {
        self.file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mrc"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mrc_extension_detection() {
        assert!(Volume::new("a/b/vol.MRC").is_mrc());
        assert!(!Volume::new("emd_1234.map").is_mrc());
        assert!(!Volume::new("noext").is_mrc());
    }

    #[test]
    fn sampling_rate_must_be_positive() {
        assert!(Volume::new("v.mrc").with_sampling_rate(0.0).is_err());
        assert_eq!(Volume::new("v.mrc").with_sampling_rate(1.2).unwrap().sampling_rate, Some(1.2));
    }
}
