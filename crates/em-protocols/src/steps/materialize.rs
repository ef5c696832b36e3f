//! MaterializeInputsStep (Source): escribe cada entrada habilitada como
//! fichero de metadatos en el scratch y exige que el comando lo referencie.
use std::path::Path;
use std::sync::Arc;

use em_core::{StepKind, StepRunResultTyped, TypedStep};

use crate::artifacts::MaterializedInputs;
use crate::protocols::generic_cmd::{GenericCmdContext, GenericCmdParams};
use crate::ProtocolError;

pub fn particles_file_name(index: usize) -> String {
    format!("particles{index}.star")
}

pub fn volume_file_name(index: usize) -> String {
    format!("volume{index}.mrc")
}

/// Falla si el nombre base de `path` no aparece literalmente en `command`.
pub fn ensure_referenced(command: &str, path: &Path) -> Result<(), ProtocolError> {
    let base = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    if base.is_empty() || !command.contains(&base) {
        return Err(ProtocolError::UnreferencedInput { file: base });
    }
    Ok(())
}

pub fn materialize(ctx: &GenericCmdContext, params: &GenericCmdParams) -> Result<MaterializedInputs, ProtocolError> {
    let run = &ctx.run;
    let mut particle_files = Vec::new();
    let mut particle_hashes = Vec::new();
    let mut volume_files = Vec::new();

    if params.use_particles {
        for (i, pointer) in ctx.inputs.particles.iter().enumerate() {
            let path = run.extra_path(particles_file_name(i));
            ctx.particle_codec.write_particles(&pointer.value, &path)?;
            log::debug!("wrote {} particles from {} to {}", pointer.value.len(), pointer.id, path.display());
            ensure_referenced(&params.command, &path)?;
            particle_files.push(path);
            particle_hashes.push(pointer.value.content_hash());
        }
    }

    if params.use_volumes {
        for (i, pointer) in ctx.inputs.volumes.iter().enumerate() {
            let mut volume = pointer.value.clone();
            volume.file = run.resolve(&volume.file);
            if !volume.is_mrc() {
                volume = ctx.volume_codec.convert_binary_volume(&volume, &run.tmp_path(""))?;
            }
            let path = run.extra_path(volume_file_name(i));
            ctx.volume_codec.write_volume(&volume, &path)?;
            ensure_referenced(&params.command, &path)?;
            volume_files.push(path);
        }
    }

    Ok(MaterializedInputs { particle_files,
                            particle_hashes,
                            volume_files,
                            schema_version: 1 })
}

#[derive(Debug)]
pub struct MaterializeInputsStep {
    ctx: Arc<GenericCmdContext>,
}

impl MaterializeInputsStep {
    pub fn new(ctx: Arc<GenericCmdContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for MaterializeInputsStep {
    type Params = GenericCmdParams;
    type Input = MaterializedInputs;
    type Output = MaterializedInputs;

    fn id(&self) -> &'static str {
        "materialize_inputs"
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    fn params_default(&self) -> GenericCmdParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, _input: Option<MaterializedInputs>, params: GenericCmdParams) -> StepRunResultTyped<MaterializedInputs> {
        StepRunResultTyped::from_result(materialize(&self.ctx, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use em_domain::{AlignType, ImageLocation, Particle, ParticleSet};

    use crate::protocols::generic_cmd::{GenericCmdInputs, GenericCmdProtocol};
    use crate::run::{Pointer, ProtocolRun};
    use crate::HostSettings;

    fn set_with_class(class: &str) -> ParticleSet {
        let mut set = ParticleSet::new(Some(1.0), AlignType::Proj);
        let mut p = Particle::new(0, ImageLocation::new(1, "stack.mrcs"));
        p.extra.insert("rlnClassNumber".into(), class.into());
        set.push(p);
        set
    }

    #[test]
    fn materialized_inputs_carry_content_hashes() {
        let project = tempfile::tempdir().unwrap();
        let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
        let params = GenericCmdParams { command: "cat $EXTRA_DIR/particles0.star $EXTRA_DIR/particles1.star".into(),
                                        ..Default::default() };
        let inputs = GenericCmdInputs { particles: vec![Pointer::new("a", set_with_class("1")),
                                                        Pointer::new("b", set_with_class("2"))],
                                        volumes: vec![] };
        let protocol = GenericCmdProtocol::new(params.clone(), inputs, run, HostSettings::default());
        let ctx = protocol.context();

        let out = materialize(ctx, &params).unwrap();
        assert_eq!(out.particle_files.len(), 2);
        let expected: Vec<String> = ctx.inputs.particles.iter().map(|p| p.value.content_hash()).collect();
        assert_eq!(out.particle_hashes, expected);
        assert_ne!(out.particle_hashes[0], out.particle_hashes[1]);
    }

    #[test]
    fn basename_must_appear_in_command() {
        let path = PathBuf::from("/p/Runs/x/extra/particles0.star");
        assert!(ensure_referenced("relion_star_handler --i $EXTRA_DIR/particles0.star", &path).is_ok());
        let err = ensure_referenced("relion_star_handler --i $EXTRA_DIR/particles1.star", &path).unwrap_err();
        assert!(matches!(err, ProtocolError::UnreferencedInput { ref file } if file == "particles0.star"));
    }
}
