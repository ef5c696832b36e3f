//! Modo de alineamiento con el que se interpretan las columnas de ángulos y
//! desplazamientos de un fichero de partículas.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AlignType {
    /// Sin información de alineamiento.
    #[default]
    None,
    /// Alineamiento en el plano: psi + desplazamientos.
    TwoD,
    /// Proyección: rot, tilt, psi + desplazamientos.
    Proj,
}

impl AlignType {
    pub fn has_angles(self) -> bool {
        !matches!(self, AlignType::None)
    }
}

impl fmt::Display for AlignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
                        AlignType::None => "none",
                        AlignType::TwoD => "2d",
                        AlignType::Proj => "proj",
                    })
    }
}

impl FromStr for AlignType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AlignType::None),
            "2d" => Ok(AlignType::TwoD),
            "proj" | "projection" => Ok(AlignType::Proj),
            other => Err(DomainError::ValidationError(format!("unknown alignment '{other}'"))),
        }
    }
}
