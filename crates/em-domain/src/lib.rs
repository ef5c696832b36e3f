// em-domain: objetos del modelo cryo-EM que cruzan los protocolos.
pub mod alignment;
pub mod em_set;
pub mod error;
pub mod micrograph;
pub mod particle;
pub mod particle_set;
pub mod volume;

pub use alignment::AlignType;
pub use em_set::{EmItem, EmSet, SetKind, VolumeSet};
pub use error::DomainError;
pub use micrograph::{Micrograph, MicrographSet};
pub use particle::{Ctf, ImageLocation, Particle, Transform};
pub use particle_set::{OpticsGroup, ParticleSet};
pub use volume::Volume;
