// particle.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::DomainError;

/// Posición de una imagen dentro de un stack: `index@path` (índice 1-based,
/// convención RELION).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLocation {
    pub index: usize,
    pub path: PathBuf,
}

impl ImageLocation {
    pub fn new(index: usize, path: impl Into<PathBuf>) -> Self {
        Self { index, path: path.into() }
    }

    /// Parsea `12@Particles/stack.mrcs`. Sin `@` se asume una imagen suelta
    /// (índice 1).
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::InvalidLocation(text.to_string()));
        }
        match text.split_once('@') {
            Some((idx, path)) => {
                let index = idx.parse::<usize>()
                               .map_err(|_| DomainError::InvalidLocation(text.to_string()))?;
                if index == 0 || path.is_empty() {
                    return Err(DomainError::InvalidLocation(text.to_string()));
                }
                Ok(Self::new(index, path))
            }
            None => Ok(Self::new(1, text)),
        }
    }

    pub fn file_name(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}@{}", self.index, self.path.display())
    }
}

/// Orientación y desplazamiento (Å) de una partícula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Transform {
    pub rot: f64,
    pub tilt: f64,
    pub psi: f64,
    pub shift_x: f64,
    pub shift_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ctf {
    pub defocus_u: f64,
    pub defocus_v: f64,
    pub defocus_angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: u64,
    pub location: ImageLocation,
    pub micrograph: Option<String>,
    pub optics_group: u32,
    pub ctf: Option<Ctf>,
    pub transform: Option<Transform>,
    /// Etiquetas STAR adicionales conservadas tal cual (clave sin `_` inicial,
    /// p. ej. `rlnRandomSubset`).
    pub extra: BTreeMap<String, String>,
}

impl Particle {
    pub fn new(id: u64, location: ImageLocation) -> Self {
        Self { id,
               location,
               micrograph: None,
               optics_group: 1,
               ctf: None,
               transform: None,
               extra: BTreeMap::new() }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}
