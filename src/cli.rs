//! Línea de comandos: un subcomando por protocolo.
//!
//! Cada subcomando crea una ejecución nueva bajo `<proyecto>/Runs/`, abre el
//! log de eventos `logs/events.jsonl` de esa ejecución y lanza el protocolo.
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use em_convert::{ParticleCodec, RelionCodec};
use em_domain::{AlignType, EmSet, Volume, VolumeSet};
use em_persistence::{JsonlEventStore, EVENTS_FILE};
use em_protocols::protocols::{download_emdb, generic_cmd, remove_unlinked, split_subsets};
use em_protocols::{DownloadEmdbParams, DownloadEmdbProtocol, GenericCmdInputs, GenericCmdParams, GenericCmdProtocol,
                   OutputRegistry, Pointer, ProtocolOutcome, ProtocolRun, RemoveUnlinkedProtocol, SplitSubsetsParams,
                   SplitSubsetsProtocol};

use crate::config::AppConfig;
use crate::AppError;

#[derive(Debug, Parser)]
#[command(name = "emflow", version, about = "Run cryo-EM processing protocols on a project directory")]
pub struct Cli {
    /// Project directory (overrides EMFLOW_PROJECT_DIR).
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an arbitrary shell command over particle sets and/or volumes.
    GenericCmd(GenericCmdArgs),
    /// Download a map from the EMDB archive.
    DownloadEmdb(DownloadEmdbArgs),
    /// Drop items whose file does not exist.
    RemoveUnlinked(RemoveUnlinkedArgs),
    /// Split the particles of a refinement into subsets.
    SplitSubsets(SplitSubsetsArgs),
}

#[derive(Debug, Args)]
pub struct GenericCmdArgs {
    /// Command template; may use $EXTRA_DIR, $WORKING_DIR and the input files.
    #[arg(long)]
    pub command: String,
    /// Environment assignments, e.g. "A=1 B=two words".
    #[arg(long, default_value = "")]
    pub env_vars: String,
    /// Run with only the declared variables instead of the current environment.
    #[arg(long)]
    pub no_inherit_env: bool,
    #[arg(long)]
    pub conda_env: Option<String>,
    /// Input particle STAR files (materialized as particles0.star, particles1.star, ...).
    #[arg(long = "particles", num_args = 1..)]
    pub particles: Vec<PathBuf>,
    /// Input volumes (materialized as volume0.mrc, volume1.mrc, ...).
    #[arg(long = "volumes", num_args = 1..)]
    pub volumes: Vec<PathBuf>,
    /// Pixel size (Å/px) assigned to the input volumes.
    #[arg(long)]
    pub volume_sampling: Option<f64>,
    #[arg(long, default_value = "outputParticles*.star")]
    pub output_particles_pattern: String,
    /// Output volumes are harvested as MRC files, hence `.mrc` rather than `.star`.
    #[arg(long, default_value = "outputVolume*.mrc")]
    pub output_volumes_pattern: String,
    /// Extra STAR labels to keep when reading outputs (space separated).
    #[arg(long, default_value = "")]
    pub extra_labels: String,
}

#[derive(Debug, Args)]
pub struct DownloadEmdbArgs {
    /// Numeric EMDB id, e.g. 1234.
    #[arg(long)]
    pub id: String,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct UnlinkedInput {
    /// Particle STAR file.
    #[arg(long)]
    pub particles: Option<PathBuf>,
    /// Micrograph STAR file.
    #[arg(long)]
    pub micrographs: Option<PathBuf>,
    #[arg(long, num_args = 1..)]
    pub volumes: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RemoveUnlinkedArgs {
    #[command(flatten)]
    pub input: UnlinkedInput,
}

#[derive(Debug, Args)]
pub struct SplitSubsetsArgs {
    /// Extra directory of the refinement run (relative paths are taken from the project).
    #[arg(long)]
    pub refine_extra: PathBuf,
    #[arg(short = 'n', long, default_value_t = 2)]
    pub subsets: usize,
    #[arg(long)]
    pub randomize: bool,
    #[arg(long, requires = "randomize")]
    pub seed: Option<u64>,
}

fn pointer_id(path: &Path) -> String {
    path.display().to_string()
}

fn open_events(run: &ProtocolRun) -> Result<JsonlEventStore, AppError> {
    Ok(JsonlEventStore::open(run.logs_path(EVENTS_FILE))?)
}

fn load_volume(path: &Path, sampling: Option<f64>) -> Result<Volume, AppError> {
    let volume = Volume::new(path);
    match sampling {
        Some(sr) => Ok(volume.with_sampling_rate(sr)?),
        None => Ok(volume),
    }
}

/// Lanza el protocolo del subcomando y devuelve su resultado.
pub fn execute(command: Command, config: &AppConfig) -> Result<ProtocolOutcome, AppError> {
    let settings = config.host_settings();
    let project = config.project_dir.as_path();
    let codec = RelionCodec::new();
    let mut registry = OutputRegistry::new();

    match command {
        Command::GenericCmd(args) => {
            let mut inputs = GenericCmdInputs::default();
            for path in &args.particles {
                let set = codec.read_particles_keeping_all(path, AlignType::Proj)?;
                inputs.particles.push(Pointer::new(pointer_id(path), set));
            }
            for path in &args.volumes {
                inputs.volumes.push(Pointer::new(pointer_id(path), load_volume(path, args.volume_sampling)?));
            }
            let params = GenericCmdParams { command: args.command,
                                            env_vars: args.env_vars,
                                            inherit_env: !args.no_inherit_env,
                                            conda_env: args.conda_env,
                                            use_particles: !args.particles.is_empty(),
                                            use_volumes: !args.volumes.is_empty(),
                                            output_particles_pattern: args.output_particles_pattern,
                                            output_volumes_pattern: args.output_volumes_pattern,
                                            extra_labels: args.extra_labels };
            let run = ProtocolRun::create(project, generic_cmd::LABEL)?;
            let events = open_events(&run)?;
            Ok(GenericCmdProtocol::new(params, inputs, run, settings).launch(events, &mut registry)?)
        }
        Command::DownloadEmdb(args) => {
            let params = DownloadEmdbParams { emdb_id: args.id };
            // valida antes de crear el directorio de la ejecución
            params.validated_id()?;
            let run = ProtocolRun::create(project, download_emdb::LABEL)?;
            let events = open_events(&run)?;
            Ok(DownloadEmdbProtocol::new(params, run, settings).launch(events, &mut registry)?)
        }
        Command::RemoveUnlinked(args) => {
            let (id, set) = match args.input {
                UnlinkedInput { particles: Some(path), .. } => {
                    (pointer_id(&path), EmSet::Particles(codec.read_particles_keeping_all(&path, AlignType::Proj)?))
                }
                UnlinkedInput { micrographs: Some(path), .. } => {
                    (pointer_id(&path), EmSet::Micrographs(codec.read_micrographs(&path)?))
                }
                UnlinkedInput { volumes, .. } if !volumes.is_empty() => {
                    let mut set = VolumeSet::new(None);
                    for path in &volumes {
                        set.push(Volume::new(path));
                    }
                    ("volumes".to_string(), EmSet::Volumes(set))
                }
                _ => return Err(AppError::InvalidArgs("one of --particles, --micrographs or --volumes is required".into())),
            };
            let run = ProtocolRun::create(project, remove_unlinked::LABEL)?;
            let events = open_events(&run)?;
            Ok(RemoveUnlinkedProtocol::new(Pointer::new(id, set), run).launch(events, &mut registry)?)
        }
        Command::SplitSubsets(args) => {
            let params = SplitSubsetsParams { number_of_subsets: args.subsets,
                                              randomize: args.randomize,
                                              seed: args.seed };
            let run = ProtocolRun::create(project, split_subsets::LABEL)?;
            let events = open_events(&run)?;
            let input = Pointer::new(pointer_id(&args.refine_extra), args.refine_extra);
            Ok(SplitSubsetsProtocol::new(params, input, run).launch(events, &mut registry)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn remove_unlinked_takes_exactly_one_input_kind() {
        assert!(Cli::try_parse_from(["emflow", "remove-unlinked"]).is_err());
        assert!(Cli::try_parse_from(["emflow", "remove-unlinked", "--particles", "a.star", "--micrographs", "m.star"]).is_err());
        let cli = Cli::try_parse_from(["emflow", "remove-unlinked", "--volumes", "a.mrc", "b.mrc"]).unwrap();
        match cli.command {
            Command::RemoveUnlinked(args) => assert_eq!(args.input.volumes.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn generic_cmd_defaults() {
        let cli = Cli::try_parse_from(["emflow", "generic-cmd", "--command", "echo hi"]).unwrap();
        match cli.command {
            Command::GenericCmd(args) => {
                assert!(!args.no_inherit_env);
                assert_eq!(args.output_particles_pattern, "outputParticles*.star");
                assert_eq!(args.output_volumes_pattern, "outputVolume*.mrc");
                assert!(args.particles.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
