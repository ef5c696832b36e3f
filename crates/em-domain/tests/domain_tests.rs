use em_domain::{AlignType, EmSet, ImageLocation, Micrograph, MicrographSet, Particle, ParticleSet, SetKind, Volume,
                VolumeSet};

fn particles(n: usize) -> ParticleSet {
    let mut set = ParticleSet::new(Some(2.0), AlignType::Proj);
    for i in 1..=n {
        set.push(Particle::new(i as u64, ImageLocation::new(i, format!("stack_{i}.mrcs"))));
    }
    set
}

#[test]
fn output_keys_per_kind() {
    assert_eq!(EmSet::Particles(particles(1)).output_key(), "outputParticles");
    assert_eq!(EmSet::Micrographs(MicrographSet::new(None)).output_key(), "outputMicrographs");
    assert_eq!(EmSet::Volumes(VolumeSet::new(None)).output_key(), "outputVolumes");
}

#[test]
fn retain_mask_preserves_order_and_kind() {
    let set = EmSet::Particles(particles(4));
    let kept = set.retain_mask(&[true, false, true, true]).unwrap();
    assert_eq!(kept.kind(), SetKind::Particles);
    assert_eq!(kept.len(), 3);
    let files: Vec<String> = kept.item_files().iter().map(|p| p.display().to_string()).collect();
    assert_eq!(files, vec!["stack_1.mrcs", "stack_3.mrcs", "stack_4.mrcs"]);
    match kept {
        EmSet::Particles(p) => assert_eq!(p.sampling_rate(), Some(2.0)),
        other => panic!("unexpected kind {:?}", other.kind()),
    }
}

#[test]
fn retain_mask_rejects_wrong_length() {
    let mut mics = MicrographSet::new(Some(1.0));
    mics.push(Micrograph::new(1, "mic1.mrc"));
    assert!(EmSet::Micrographs(mics).retain_mask(&[]).is_err());
}

#[test]
fn volume_set_assigns_ids_and_serializes_tagged() {
    let mut vols = VolumeSet::new(Some(1.1));
    vols.push(Volume::new("a.mrc"));
    vols.push(Volume::new("b.mrc"));
    let ids: Vec<u64> = vols.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![1, 2]);
    let json = serde_json::to_value(EmSet::Volumes(vols)).unwrap();
    assert_eq!(json["kind"], "volumes");
}
