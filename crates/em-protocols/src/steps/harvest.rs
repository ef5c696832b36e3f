//! HarvestOutputsStep: busca en el scratch los ficheros que casan con los
//! patrones de salida y los convierte en salidas tipadas.
use globset::GlobBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use em_convert::MrcHeader;
use em_core::{StepKind, StepRunResultTyped, TypedStep};
use em_domain::{AlignType, Volume};

use crate::artifacts::{ExecutionRecord, HarvestReport, HarvestedOutput};
use crate::protocols::generic_cmd::{GenericCmdContext, GenericCmdParams};
use crate::run::OutputObject;
use crate::ProtocolError;

/// Ficheros de `dir` (sin recursión) cuyo nombre casa con `pattern`,
/// ordenados por nombre. Un patrón vacío no casa con nada.
pub fn glob_dir(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ProtocolError> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let matcher = GlobBuilder::new(pattern).literal_separator(true)
                                           .build()
                                           .map_err(|e| ProtocolError::Pattern { pattern: pattern.to_string(),
                                                                                 message: e.to_string() })?
                                           .compile_matcher();
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(ProtocolError::io(dir))? {
        let entry = entry.map_err(ProtocolError::io(dir))?;
        let path = entry.path();
        if path.is_file() && matcher.is_match(entry.file_name()) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Volumen con muestreo y dimensiones de la cabecera MRC cuando se puede leer.
pub fn volume_from_file(path: &Path) -> Volume {
    let volume = Volume::new(path);
    match MrcHeader::read(path) {
        Ok(header) => {
            let volume = volume.with_dims(header.dims());
            match header.voxel_size() {
                Some(v) => volume.clone().with_sampling_rate(v).unwrap_or(volume),
                None => volume,
            }
        }
        Err(e) => {
            log::warn!("could not read MRC header of {}: {e}", path.display());
            volume
        }
    }
}

pub fn harvest(ctx: &GenericCmdContext, params: &GenericCmdParams) -> Result<HarvestReport, ProtocolError> {
    let extra = ctx.run.extra_dir();
    let particle_files = glob_dir(&extra, &params.output_particles_pattern)?;
    let volume_files = glob_dir(&extra, &params.output_volumes_pattern)?;
    if particle_files.is_empty() && volume_files.is_empty() {
        return Err(ProtocolError::NoOutputs { particles_pattern: params.output_particles_pattern.clone(),
                                              volumes_pattern: params.output_volumes_pattern.clone() });
    }

    let labels: Vec<String> = params.extra_labels.split_whitespace().map(str::to_string).collect();
    let mut outputs = Vec::with_capacity(particle_files.len() + volume_files.len());

    for (n, file) in particle_files.into_iter().enumerate() {
        let set = ctx.particle_codec.read_particles(&file, AlignType::Proj, &labels)?;
        outputs.push(HarvestedOutput { index: n,
                                       name: format!("outputParticles{n}"),
                                       file: Some(file),
                                       object: OutputObject::Particles(set) });
    }
    for (n, file) in volume_files.into_iter().enumerate() {
        let volume = volume_from_file(&file);
        outputs.push(HarvestedOutput { index: n,
                                       name: format!("outputVol{n}"),
                                       file: Some(file),
                                       object: OutputObject::Volume(volume) });
    }
    log::info!("harvested {} outputs", outputs.len());
    Ok(HarvestReport { outputs,
                       schema_version: 1 })
}

#[derive(Debug)]
pub struct HarvestOutputsStep {
    ctx: Arc<GenericCmdContext>,
}

impl HarvestOutputsStep {
    pub fn new(ctx: Arc<GenericCmdContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for HarvestOutputsStep {
    type Params = GenericCmdParams;
    type Input = ExecutionRecord;
    type Output = HarvestReport;

    fn id(&self) -> &'static str {
        "harvest_outputs"
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    fn params_default(&self) -> GenericCmdParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, _input: Option<ExecutionRecord>, params: GenericCmdParams) -> StepRunResultTyped<HarvestReport> {
        StepRunResultTyped::from_result(harvest(&self.ctx, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_is_sorted_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["outputParticles1.star", "outputParticles0.star", "other.star"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("outputParticles9.star")).unwrap();
        let found = glob_dir(dir.path(), "outputParticles*.star").unwrap();
        let names: Vec<String> = found.iter()
                                      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                                      .collect();
        assert_eq!(names, vec!["outputParticles0.star", "outputParticles1.star"]);
        assert!(glob_dir(dir.path(), "").unwrap().is_empty());
    }

    #[test]
    fn invalid_pattern_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = glob_dir(dir.path(), "out[.star").unwrap_err();
        assert_eq!(err.class(), em_core::ErrorClass::Configuration);
    }

    #[test]
    fn volume_header_provides_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputVolume0.mrc");
        em_convert::mrc::write_f32(&path, [2, 2, 2], 1.1, &[0.0; 8]).unwrap();
        let vol = volume_from_file(&path);
        assert_eq!(vol.dims, Some([2, 2, 2]));
        assert!((vol.sampling_rate.unwrap() - 1.1).abs() < 1e-5);
    }
}
