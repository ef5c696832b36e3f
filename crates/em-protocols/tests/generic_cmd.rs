use std::fs;

use em_core::{ErrorClass, InMemoryEventStore};
use em_domain::{AlignType, ImageLocation, Particle, ParticleSet, Transform, Volume};
use em_protocols::{GenericCmdInputs, GenericCmdParams, GenericCmdProtocol, HostSettings, OutputObject, OutputRegistry,
                   Pointer, ProtocolError, ProtocolRun, RelationKind};

fn particles(n: usize) -> ParticleSet {
    let mut set = ParticleSet::new(Some(1.2), AlignType::Proj);
    for i in 1..=n {
        set.push(Particle::new(0, ImageLocation::new(i, "Extract/job003/stack.mrcs"))
            .with_transform(Transform { rot: i as f64,
                                        tilt: 45.0,
                                        psi: 0.0,
                                        shift_x: 0.5,
                                        shift_y: 0.0 }));
    }
    set
}

fn two_inputs() -> GenericCmdInputs {
    GenericCmdInputs { particles: vec![Pointer::new("import_a.outputParticles", particles(3)),
                                       Pointer::new("import_b.outputParticles", particles(2))],
                       volumes: vec![] }
}

fn params(command: &str) -> GenericCmdParams {
    GenericCmdParams { command: command.to_string(),
                       ..Default::default() }
}

#[test]
fn harvests_each_output_with_provenance() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let run_dir = run.run_dir().to_path_buf();
    let cmd = "cp $EXTRA_DIR/particles0.star $EXTRA_DIR/outputParticles0.star && \
               cp $EXTRA_DIR/particles1.star $EXTRA_DIR/outputParticles1.star && echo done";
    let protocol = GenericCmdProtocol::new(params(cmd), two_inputs(), run, HostSettings::default());

    let mut registry = OutputRegistry::new();
    let outcome = protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap();

    assert_eq!(outcome.outputs, vec!["outputParticles0", "outputParticles1"]);
    for (name, size) in [("outputParticles0", 3), ("outputParticles1", 2)] {
        match registry.output(name) {
            Some(OutputObject::Particles(set)) => {
                assert_eq!(set.len(), size);
                assert_eq!(set.alignment(), AlignType::Proj);
            }
            other => panic!("unexpected output {other:?}"),
        }
        let sources: Vec<&str> = registry.relations_to(name)
                                         .filter(|r| r.kind == RelationKind::Source)
                                         .map(|r| r.input.as_str())
                                         .collect();
        assert_eq!(sources, vec!["import_a.outputParticles", "import_b.outputParticles"]);
    }

    let command = fs::read_to_string(run_dir.join("extra/command.txt")).unwrap();
    assert!(command.contains(&format!("{}/particles0.star", run_dir.join("extra").display())));
    assert!(!command.contains("$EXTRA_DIR"));
    assert_eq!(fs::read_to_string(run_dir.join("logs/stdout.log")).unwrap(), "done\n");
    assert!(run_dir.join("outputs.json").exists());
    assert!(outcome.summary[0].starts_with("You have run the command 'cp $EXTRA_DIR/particles0.star"));
    assert!(outcome.flow_fingerprint.is_some());
}

#[test]
fn unreferenced_input_fails_before_running() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let run_dir = run.run_dir().to_path_buf();
    let protocol = GenericCmdProtocol::new(params("cat $EXTRA_DIR/particles0.star"),
                                           two_inputs(),
                                           run,
                                           HostSettings::default());

    let err = protocol.launch(InMemoryEventStore::default(), &mut OutputRegistry::new())
                      .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(err.to_string().contains("particles1.star"));
    assert!(!run_dir.join("extra/command.txt").exists());
}

#[test]
fn successful_command_without_outputs_breaks_the_contract() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let p = GenericCmdParams { use_particles: false,
                               ..params("true") };
    let protocol = GenericCmdProtocol::new(p, GenericCmdInputs::default(), run, HostSettings::default());

    let mut registry = OutputRegistry::new();
    let err = protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap_err();
    assert_eq!(err.class(), ErrorClass::OutputContract);
    assert!(registry.is_empty());
}

#[test]
fn failing_command_reports_both_streams() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let run_dir = run.run_dir().to_path_buf();
    let p = GenericCmdParams { use_particles: false,
                               ..params("echo working; echo boom >&2; exit 3") };
    let protocol = GenericCmdProtocol::new(p, GenericCmdInputs::default(), run, HostSettings::default());

    let err = protocol.launch(InMemoryEventStore::default(), &mut OutputRegistry::new())
                      .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Execution);
    let msg = err.to_string();
    assert!(msg.contains("working"));
    assert!(msg.contains("boom"));
    assert!(matches!(err, ProtocolError::Engine(_)));
    assert_eq!(fs::read_to_string(run_dir.join("logs/stderr.log")).unwrap(), "boom\n");
}

#[test]
fn declared_variables_replace_the_environment() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let run_dir = run.run_dir().to_path_buf();
    let p = GenericCmdParams { use_particles: false,
                               env_vars: "FOO=bar baz EMPTY_CHECK=1".into(),
                               inherit_env: false,
                               ..params("echo \"$FOO|${HOME:-none}\" > $EXTRA_DIR/env.txt") };
    let protocol = GenericCmdProtocol::new(p, GenericCmdInputs::default(), run, HostSettings::default());

    let err = protocol.launch(InMemoryEventStore::default(), &mut OutputRegistry::new())
                      .unwrap_err();
    assert_eq!(err.class(), ErrorClass::OutputContract);
    assert_eq!(fs::read_to_string(run_dir.join("extra/env.txt")).unwrap(), "bar baz|none\n");
}

#[test]
fn volumes_are_materialized_and_harvested() {
    let project = tempfile::tempdir().unwrap();
    let map = project.path().join("emd_1.map");
    em_convert::mrc::write_f32(&map, [4, 4, 4], 2.5, &[0.5; 64]).unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let run_dir = run.run_dir().to_path_buf();

    let p = GenericCmdParams { use_particles: false,
                               use_volumes: true,
                               output_particles_pattern: String::new(),
                               ..params("cp $EXTRA_DIR/volume0.mrc $EXTRA_DIR/outputVolume0.mrc") };
    let inputs = GenericCmdInputs { particles: vec![],
                                    volumes: vec![Pointer::new("import.outputVolume", Volume::new("emd_1.map"))] };
    let protocol = GenericCmdProtocol::new(p, inputs, run, HostSettings::default());

    let mut registry = OutputRegistry::new();
    let outcome = protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap();
    assert_eq!(outcome.outputs, vec!["outputVol0"]);
    assert!(run_dir.join("tmp/emd_1.mrc").exists());
    match registry.output("outputVol0") {
        Some(OutputObject::Volume(v)) => {
            assert_eq!(v.dims, Some([4, 4, 4]));
            assert!((v.sampling_rate.unwrap() - 2.5).abs() < 1e-5);
        }
        other => panic!("unexpected output {other:?}"),
    }
    assert_eq!(registry.relations_to("outputVol0").count(), 1);
}

fn source_inputs(registry: &OutputRegistry, output: &str) -> Vec<String> {
    registry.relations_to(output)
            .filter(|r| r.kind == RelationKind::Source)
            .map(|r| r.input.clone())
            .collect()
}

#[test]
fn outputs_link_to_every_enabled_input_kind() {
    let project = tempfile::tempdir().unwrap();
    let map = project.path().join("ref.mrc");
    em_convert::mrc::write_f32(&map, [2, 2, 2], 1.5, &[1.0; 8]).unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();

    let p = GenericCmdParams { use_particles: true,
                               use_volumes: true,
                               ..params("cp $EXTRA_DIR/particles0.star $EXTRA_DIR/outputParticles0.star && \
                                         cp $EXTRA_DIR/volume0.mrc $EXTRA_DIR/outputVolume0.mrc") };
    let inputs = GenericCmdInputs { particles: vec![Pointer::new("import.outputParticles", particles(2))],
                                    volumes: vec![Pointer::new("import.outputVolume", Volume::new("ref.mrc"))] };
    let protocol = GenericCmdProtocol::new(p, inputs, run, HostSettings::default());

    let mut registry = OutputRegistry::new();
    let outcome = protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap();
    assert_eq!(outcome.outputs, vec!["outputParticles0", "outputVol0"]);
    for name in ["outputParticles0", "outputVol0"] {
        assert_eq!(source_inputs(&registry, name),
                   vec!["import.outputParticles".to_string(), "import.outputVolume".to_string()]);
    }
}

#[test]
fn disabled_volumes_are_neither_written_nor_linked() {
    let project = tempfile::tempdir().unwrap();
    let map = project.path().join("ref.mrc");
    em_convert::mrc::write_f32(&map, [2, 2, 2], 1.5, &[1.0; 8]).unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let run_dir = run.run_dir().to_path_buf();

    let p = GenericCmdParams { use_volumes: false,
                               ..params("cp $EXTRA_DIR/particles0.star $EXTRA_DIR/outputParticles0.star") };
    let inputs = GenericCmdInputs { particles: vec![Pointer::new("import.outputParticles", particles(2))],
                                    volumes: vec![Pointer::new("import.outputVolume", Volume::new("ref.mrc"))] };
    let protocol = GenericCmdProtocol::new(p, inputs, run, HostSettings::default());

    let mut registry = OutputRegistry::new();
    protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap();
    assert!(!run_dir.join("extra/volume0.mrc").exists());
    assert_eq!(source_inputs(&registry, "outputParticles0"),
               vec!["import.outputParticles".to_string()]);
}

#[tokio::test]
async fn launch_works_from_async_code() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "generic_cmd").unwrap();
    let protocol = GenericCmdProtocol::new(params("cp $EXTRA_DIR/particles0.star $EXTRA_DIR/outputParticles0.star"),
                                           GenericCmdInputs { particles: vec![Pointer::new("import.outputParticles",
                                                                                           particles(1))],
                                                              volumes: vec![] },
                                           run,
                                           HostSettings::default());

    let mut registry = OutputRegistry::new();
    let outcome = protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap();
    assert_eq!(outcome.outputs, vec!["outputParticles0"]);
}
