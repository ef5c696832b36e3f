//! Capa de conversión: tablas STAR estilo RELION y volúmenes/stacks MRC.
//!
//! Los protocolos no conocen los formatos; trabajan contra los traits
//! `ParticleCodec` y `VolumeCodec`, implementados aquí por `RelionCodec`.
pub mod error;
pub mod mrc;
pub mod relion;
pub mod star;

use std::fmt::Debug;
use std::path::Path;

use em_domain::{AlignType, MicrographSet, ParticleSet, Volume};

pub use error::ConvertError;
pub use mrc::MrcHeader;
pub use relion::RelionCodec;
pub use star::{DataBlock, StarDocument, StarTable};

/// Escribe/lee conjuntos de partículas en ficheros de metadatos.
pub trait ParticleCodec: Debug + Send + Sync {
    fn write_particles(&self, set: &ParticleSet, path: &Path) -> Result<(), ConvertError>;

    /// Lee un fichero de partículas interpretando ángulos según `alignment`
    /// y conservando además las etiquetas de `extra_labels`.
    fn read_particles(&self,
                      path: &Path,
                      alignment: AlignType,
                      extra_labels: &[String])
                      -> Result<ParticleSet, ConvertError>;

    /// Como `read_particles`, pero toda columna sin campo propio en
    /// `Particle` se guarda en `extra` y vuelve a escribirse.
    fn read_particles_keeping_all(&self, path: &Path, alignment: AlignType) -> Result<ParticleSet, ConvertError>;

    fn read_micrographs(&self, path: &Path) -> Result<MicrographSet, ConvertError>;
}

/// Conversión de volúmenes al formato que esperan las herramientas externas.
pub trait VolumeCodec: Debug + Send + Sync {
    /// Convierte el binario de `volume` a MRC dentro de `dest_dir`.
    fn convert_binary_volume(&self, volume: &Volume, dest_dir: &Path) -> Result<Volume, ConvertError>;

    /// Escribe `volume` (ya MRC) en `dest` con su muestreo y dimensiones.
    fn write_volume(&self, volume: &Volume, dest: &Path) -> Result<Volume, ConvertError>;
}
