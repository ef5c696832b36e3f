//! Conjuntos de datos como enum etiquetado por tipo. Los protocolos que
//! aceptan "cualquier conjunto" trabajan sobre `EmSet` y obtienen un conjunto
//! del mismo tipo como salida.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{DomainError, Micrograph, MicrographSet, Particle, ParticleSet, Volume};

/// Elemento respaldado por un fichero binario.
pub trait EmItem {
    fn file_name(&self) -> &Path;
}

impl EmItem for Particle {
    fn file_name(&self) -> &Path {
        &self.location.path
    }
}

impl EmItem for Micrograph {
    fn file_name(&self) -> &Path {
        &self.file
    }
}

impl EmItem for Volume {
    fn file_name(&self) -> &Path {
        &self.file
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSet {
    id: Uuid,
    sampling_rate: Option<f64>,
    volumes: Vec<Volume>,
}

impl VolumeSet {
    pub fn new(sampling_rate: Option<f64>) -> Self {
        Self { id: Uuid::new_v4(),
               sampling_rate,
               volumes: Vec::new() }
    }

    pub fn empty_copy(&self) -> Self {
        Self::new(self.sampling_rate)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sampling_rate(&self) -> Option<f64> {
        self.sampling_rate
    }

    pub fn push(&mut self, mut volume: Volume) {
        if volume.id == 0 {
            volume.id = self.volumes.len() as u64 + 1;
        }
        self.volumes.push(volume);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Volume> {
        self.volumes.iter()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetKind {
    Particles,
    Micrographs,
    Volumes,
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
                        SetKind::Particles => "particles",
                        SetKind::Micrographs => "micrographs",
                        SetKind::Volumes => "volumes",
                    })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "set", rename_all = "snake_case")]
pub enum EmSet {
    Particles(ParticleSet),
    Micrographs(MicrographSet),
    Volumes(VolumeSet),
}

impl EmSet {
    pub fn kind(&self) -> SetKind {
        match self {
            EmSet::Particles(_) => SetKind::Particles,
            EmSet::Micrographs(_) => SetKind::Micrographs,
            EmSet::Volumes(_) => SetKind::Volumes,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            EmSet::Particles(s) => s.id(),
            EmSet::Micrographs(s) => s.id(),
            EmSet::Volumes(s) => s.id(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EmSet::Particles(s) => s.len(),
            EmSet::Micrographs(s) => s.len(),
            EmSet::Volumes(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nombre de la salida que registra un protocolo de filtrado para este tipo.
    pub fn output_key(&self) -> &'static str {
        match self.kind() {
            SetKind::Particles => "outputParticles",
            SetKind::Micrographs => "outputMicrographs",
            SetKind::Volumes => "outputVolumes",
        }
    }

    /// Ficheros binarios de cada elemento, en el orden del conjunto.
    pub fn item_files(&self) -> Vec<PathBuf> {
        match self {
            EmSet::Particles(s) => s.iter().map(|i| i.file_name().to_path_buf()).collect(),
            EmSet::Micrographs(s) => s.iter().map(|i| i.file_name().to_path_buf()).collect(),
            EmSet::Volumes(s) => s.iter().map(|i| i.file_name().to_path_buf()).collect(),
        }
    }

    /// Nuevo conjunto del mismo tipo (misma información común) con los
    /// elementos cuya máscara es `true`.
    pub fn retain_mask(&self, mask: &[bool]) -> Result<EmSet, DomainError> {
        if mask.len() != self.len() {
            return Err(DomainError::ValidationError(format!("mask of length {} for a set of {} items",
                                                            mask.len(),
                                                            self.len())));
        }
        Ok(match self {
            EmSet::Particles(s) => {
                let mut out = s.empty_copy();
                s.iter().zip(mask).filter(|(_, k)| **k).for_each(|(p, _)| out.push(p.clone()));
                EmSet::Particles(out)
            }
            EmSet::Micrographs(s) => {
                let mut out = s.empty_copy();
                s.iter().zip(mask).filter(|(_, k)| **k).for_each(|(m, _)| out.push(m.clone()));
                EmSet::Micrographs(out)
            }
            EmSet::Volumes(s) => {
                let mut out = s.empty_copy();
                s.iter().zip(mask).filter(|(_, k)| **k).for_each(|(v, _)| out.push(v.clone()));
                EmSet::Volumes(out)
            }
        })
    }
}
