// particle_set.rs
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{AlignType, DomainError, Particle};

/// Grupo óptico (tabla `data_optics` de RELION 3.1+).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticsGroup {
    pub number: u32,
    pub name: String,
    pub pixel_size: f64,
    pub image_size: Option<u32>,
    pub voltage: Option<f64>,
    pub spherical_aberration: Option<f64>,
    pub amplitude_contrast: Option<f64>,
}

impl OpticsGroup {
    pub fn new(number: u32, pixel_size: f64) -> Self {
        Self { number,
               name: format!("opticsGroup{number}"),
               pixel_size,
               image_size: None,
               voltage: None,
               spherical_aberration: None,
               amplitude_contrast: None }
    }
}

/// Conjunto ordenado de partículas con su información común (muestreo,
/// ópticas y modo de alineamiento).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleSet {
    id: Uuid,
    sampling_rate: Option<f64>,
    alignment: AlignType,
    optics: Vec<OpticsGroup>,
    particles: Vec<Particle>,
}

impl ParticleSet {
    pub fn new(sampling_rate: Option<f64>, alignment: AlignType) -> Self {
        Self { id: Uuid::new_v4(),
               sampling_rate,
               alignment,
               optics: Vec::new(),
               particles: Vec::new() }
    }

    /// Conjunto vacío que copia la información común de `self` (nuevo id).
    pub fn empty_copy(&self) -> Self {
        Self { id: Uuid::new_v4(),
               sampling_rate: self.sampling_rate,
               alignment: self.alignment,
               optics: self.optics.clone(),
               particles: Vec::new() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sampling_rate(&self) -> Option<f64> {
        self.sampling_rate
    }

    pub fn set_sampling_rate(&mut self, sampling_rate: Option<f64>) {
        self.sampling_rate = sampling_rate;
    }

    pub fn alignment(&self) -> AlignType {
        self.alignment
    }

    pub fn optics(&self) -> &[OpticsGroup] {
        &self.optics
    }

    pub fn add_optics_group(&mut self, group: OpticsGroup) -> Result<(), DomainError> {
        if self.optics.iter().any(|g| g.number == group.number) {
            return Err(DomainError::ValidationError(format!("duplicated optics group {}", group.number)));
        }
        if self.sampling_rate.is_none() {
            self.sampling_rate = Some(group.pixel_size);
        }
        self.optics.push(group);
        Ok(())
    }

    /// Añade una partícula; un id 0 se reemplaza por el siguiente libre.
    pub fn push(&mut self, mut particle: Particle) {
        if particle.id == 0 {
            particle.id = self.particles.last().map(|p| p.id + 1).unwrap_or(1);
        }
        self.particles.push(particle);
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Hash del contenido (ubicaciones, transformaciones y columnas extra),
    /// independiente del id del conjunto.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for p in &self.particles {
            hasher.update(p.location.to_string().as_bytes());
            if let Some(t) = &p.transform {
                for v in [t.rot, t.tilt, t.psi, t.shift_x, t.shift_y] {
                    hasher.update(v.to_le_bytes());
                }
            }
            for (k, v) in &p.extra {
                hasher.update(k.as_bytes());
                hasher.update([0]);
                hasher.update(v.as_bytes());
                hasher.update([0]);
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

impl<'a> IntoIterator for &'a ParticleSet {
    type Item = &'a Particle;
    type IntoIter = std::slice::Iter<'a, Particle>;

    fn into_iter(self) -> Self::IntoIter {
        self.particles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageLocation, Transform};

    #[test]
    fn push_assigns_sequential_ids() {
        let mut set = ParticleSet::new(Some(1.5), AlignType::Proj);
        set.push(Particle::new(0, ImageLocation::new(1, "a.mrcs")));
        set.push(Particle::new(0, ImageLocation::new(2, "a.mrcs")));
        let ids: Vec<u64> = set.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn empty_copy_keeps_info_but_not_items() {
        let mut set = ParticleSet::new(None, AlignType::Proj);
        set.add_optics_group(OpticsGroup::new(1, 7.08)).unwrap();
        set.push(Particle::new(1, ImageLocation::new(1, "a.mrcs")));
        let copy = set.empty_copy();
        assert!(copy.is_empty());
        assert_eq!(copy.sampling_rate(), Some(7.08));
        assert_ne!(copy.id(), set.id());
    }

    #[test]
    fn duplicated_optics_group_is_rejected() {
        let mut set = ParticleSet::new(None, AlignType::None);
        set.add_optics_group(OpticsGroup::new(1, 1.0)).unwrap();
        assert!(set.add_optics_group(OpticsGroup::new(1, 2.0)).is_err());
    }

    #[test]
    fn content_hash_tracks_transforms() {
        let mut a = ParticleSet::new(None, AlignType::Proj);
        let mut b = ParticleSet::new(None, AlignType::Proj);
        a.push(Particle::new(1, ImageLocation::new(1, "s.mrcs")).with_transform(Transform::default()));
        b.push(Particle::new(1, ImageLocation::new(1, "s.mrcs")).with_transform(Transform { psi: 90.0,
                                                                                            ..Default::default() }));
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
