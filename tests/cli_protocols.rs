use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as Process;

use clap::Parser;
use em_convert::{ParticleCodec, RelionCodec, StarDocument};
use em_core::FlowEventKind;
use em_domain::{AlignType, ImageLocation, Particle, ParticleSet};
use em_persistence::read_events;
use em_protocols::OutputRelay;
use emflow::{execute, AppConfig, AppError, Cli, Command};

fn config_for(project: &Path) -> AppConfig {
    let mut config = AppConfig::from_lookup(|_| None);
    config.project_dir = project.to_path_buf();
    config
}

fn write_particles(path: &Path, n: usize) {
    let mut set = ParticleSet::new(Some(1.0), AlignType::Proj);
    for i in 1..=n {
        set.push(Particle::new(0, ImageLocation::new(i, "stack.mrcs")));
    }
    RelionCodec::new().write_particles(&set, path).unwrap();
}

fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(args).unwrap().command
}

#[test]
fn defaults_without_environment() {
    let config = AppConfig::from_lookup(|_| None);
    assert_eq!(config.project_dir, PathBuf::from("."));
    assert_eq!(config.shell, "/bin/sh");
    assert_eq!(config.log_filter, "info");
    let settings = config.host_settings();
    assert_eq!(settings.relay, OutputRelay::Stderr);
    assert_eq!(settings.emdb_url("1234"),
               "https://ftp.ebi.ac.uk/pub/databases/emdb/structures/EMD-1234/map/emd_1234.map.gz");
}

#[test]
fn environment_overrides_and_blank_values() {
    let config = AppConfig::from_lookup(|key| match key {
                                            "EMFLOW_SHELL" => Some("/bin/bash".into()),
                                            "EMFLOW_CONDA_ACTIVATION_CMD" => Some("  ".into()),
                                            "EMFLOW_EMDB_URL_TEMPLATE" => Some("http://mirror/{id}.gz".into()),
                                            _ => None,
                                        });
    let settings = config.host_settings();
    assert_eq!(settings.shell, "/bin/bash");
    assert_eq!(settings.conda_activation_cmd, None);
    assert_eq!(settings.emdb_url("7"), "http://mirror/7.gz");
}

#[test]
fn generic_cmd_writes_outputs_and_event_log() {
    let project = tempfile::tempdir().unwrap();
    let input = project.path().join("input.star");
    write_particles(&input, 3);
    let input_arg = input.display().to_string();
    let command = parse(&["emflow",
                          "generic-cmd",
                          "--command",
                          "cp $EXTRA_DIR/particles0.star $EXTRA_DIR/outputParticles0.star",
                          "--particles",
                          &input_arg]);

    let outcome = execute(command, &config_for(project.path())).unwrap();
    assert_eq!(outcome.protocol, "generic_cmd");
    assert_eq!(outcome.outputs, vec!["outputParticles0".to_string()]);

    let events = read_events(&outcome.run_dir.join("logs").join("events.jsonl")).unwrap();
    assert!(!events.is_empty());
    assert!(events.windows(2).all(|w| w[1].seq == w[0].seq + 1));
    let exit = events.iter().find_map(|e| match &e.kind {
                                FlowEventKind::StepSignal { signal, data, .. } if signal == "command_exit" => Some(data.clone()),
                                _ => None,
                            });
    assert_eq!(exit.map(|d| d["exit_code"].clone()), Some(serde_json::json!(0)));
    assert!(matches!(events.last().map(|e| &e.kind), Some(FlowEventKind::FlowCompleted { .. })));
    assert!(outcome.run_dir.join("outputs.json").exists());
}

#[test]
fn invalid_emdb_id_fails_before_creating_a_run() {
    let project = tempfile::tempdir().unwrap();
    let command = parse(&["emflow", "download-emdb", "--id", "EMD-12"]);
    let err = execute(command, &config_for(project.path())).unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(!project.path().join("Runs").exists());
}

#[test]
fn remove_unlinked_from_micrograph_star() {
    let project = tempfile::tempdir().unwrap();
    let mic1 = project.path().join("mic1.mrc");
    fs::write(&mic1, b"x").unwrap();
    let missing = project.path().join("gone.mrc");
    let star = project.path().join("mics.star");
    fs::write(&star,
              format!("data_micrographs\n\nloop_\n_rlnMicrographName #1\n{}\n{}\n",
                      mic1.display(),
                      missing.display())).unwrap();
    let star_arg = star.display().to_string();
    let command = parse(&["emflow", "remove-unlinked", "--micrographs", &star_arg]);

    let outcome = execute(command, &config_for(project.path())).unwrap();
    assert_eq!(outcome.outputs, vec!["outputMicrographs".to_string()]);
}

#[test]
fn input_star_columns_reach_the_command() {
    let project = tempfile::tempdir().unwrap();
    let input = project.path().join("in.star");
    fs::write(&input,
              "data_particles\n\nloop_\n_rlnImageName #1\n_rlnCoordinateX #2\n_rlnClassNumber #3\n\
               000001@s.mrcs 512.0 4\n000002@s.mrcs 128.5 2\n")
        .unwrap();
    let input_arg = input.display().to_string();
    let command = parse(&["emflow",
                          "generic-cmd",
                          "--command",
                          "cp $EXTRA_DIR/particles0.star $EXTRA_DIR/outputParticles0.star",
                          "--particles",
                          &input_arg]);

    let outcome = execute(command, &config_for(project.path())).unwrap();
    let doc = StarDocument::read(&outcome.run_dir.join("extra").join("particles0.star")).unwrap();
    let table = doc.block("particles").and_then(|b| b.table.as_ref()).unwrap();
    let x = table.column("rlnCoordinateX").expect("coordinate column kept");
    let class = table.column("rlnClassNumber").expect("class column kept");
    assert_eq!(table.rows()[0][x], "512.0");
    assert_eq!(table.rows()[1][class], "2");
}

#[test]
fn binary_stdout_is_only_the_json_outcome() {
    let project = tempfile::tempdir().unwrap();
    let input = project.path().join("input.star");
    write_particles(&input, 2);
    let out = Process::new(env!("CARGO_BIN_EXE_emflow")).arg("--project")
                                                        .arg(project.path())
                                                        .args(["generic-cmd",
                                                               "--command",
                                                               "echo chatter; cp $EXTRA_DIR/particles0.star \
                                                                $EXTRA_DIR/outputParticles0.star",
                                                               "--particles"])
                                                        .arg(&input)
                                                        .env_remove("RUST_LOG")
                                                        .output()
                                                        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let outcome: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(outcome["protocol"], "generic_cmd");
    assert_eq!(outcome["outputs"], serde_json::json!(["outputParticles0"]));
    assert!(String::from_utf8_lossy(&out.stderr).contains("chatter"));
}
