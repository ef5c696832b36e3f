//! Codec RELION 3.1: `data_optics` + `data_particles` con etiquetas `rln*`.
use std::fs;
use std::path::{Path, PathBuf};

use em_domain::{AlignType, Ctf, ImageLocation, Micrograph, MicrographSet, OpticsGroup, Particle, ParticleSet,
                Transform, Volume};

use crate::mrc::{self, MrcHeader};
use crate::star::{DataBlock, StarDocument, StarTable};
use crate::{ConvertError, ParticleCodec, VolumeCodec};

#[derive(Debug, Clone, Copy, Default)]
pub struct RelionCodec;

impl RelionCodec {
    pub fn new() -> Self {
        Self
    }
}

fn parse_f64(table: &StarTable, row: &[String], label: &str) -> Result<Option<f64>, ConvertError> {
    match table.column(label) {
        None => Ok(None),
        Some(i) => row[i].parse::<f64>()
                         .map(Some)
                         .map_err(|_| ConvertError::InvalidValue { label: label.to_string(),
                                                                   value: row[i].clone() }),
    }
}

fn fmt_f64(v: f64) -> String {
    format!("{v:.6}")
}

fn optics_table(set: &ParticleSet) -> Option<StarTable> {
    let mut groups: Vec<OpticsGroup> = set.optics().to_vec();
    if groups.is_empty() {
        groups.push(OpticsGroup::new(1, set.sampling_rate()?));
    }
    let mut labels = vec!["rlnOpticsGroupName", "rlnOpticsGroup", "rlnImagePixelSize"];
    let all = |f: fn(&OpticsGroup) -> bool| groups.iter().all(f);
    let with_size = all(|g| g.image_size.is_some());
    let with_voltage = all(|g| g.voltage.is_some());
    let with_cs = all(|g| g.spherical_aberration.is_some());
    let with_ac = all(|g| g.amplitude_contrast.is_some());
    if with_size {
        labels.push("rlnImageSize");
    }
    if with_voltage {
        labels.push("rlnVoltage");
    }
    if with_cs {
        labels.push("rlnSphericalAberration");
    }
    if with_ac {
        labels.push("rlnAmplitudeContrast");
    }
    let mut table = StarTable::new(labels);
    for g in &groups {
        let mut row = vec![g.name.clone(), g.number.to_string(), fmt_f64(g.pixel_size)];
        if let (true, Some(v)) = (with_size, g.image_size) {
            row.push(v.to_string());
        }
        if let (true, Some(v)) = (with_voltage, g.voltage) {
            row.push(fmt_f64(v));
        }
        if let (true, Some(v)) = (with_cs, g.spherical_aberration) {
            row.push(fmt_f64(v));
        }
        if let (true, Some(v)) = (with_ac, g.amplitude_contrast) {
            row.push(fmt_f64(v));
        }
        // push_row no puede fallar: mismas columnas que etiquetas
        let _ = table.push_row(row);
    }
    Some(table)
}

fn read_optics(doc: &StarDocument) -> Result<Vec<OpticsGroup>, ConvertError> {
    let Some(table) = doc.block("optics").and_then(|b| b.table.as_ref()) else {
        return Ok(Vec::new());
    };
    let mut groups = Vec::with_capacity(table.len());
    for row in table.rows() {
        let number = parse_f64(table, row, "rlnOpticsGroup")?.ok_or_else(|| ConvertError::MissingLabel("rlnOpticsGroup".into()))?;
        let pixel = parse_f64(table, row, "rlnImagePixelSize")?.ok_or_else(|| ConvertError::MissingLabel("rlnImagePixelSize".into()))?;
        let mut g = OpticsGroup::new(number as u32, pixel);
        if let Some(i) = table.column("rlnOpticsGroupName") {
            g.name = row[i].clone();
        }
        g.image_size = parse_f64(table, row, "rlnImageSize")?.map(|v| v as u32);
        g.voltage = parse_f64(table, row, "rlnVoltage")?;
        g.spherical_aberration = parse_f64(table, row, "rlnSphericalAberration")?;
        g.amplitude_contrast = parse_f64(table, row, "rlnAmplitudeContrast")?;
        groups.push(g);
    }
    Ok(groups)
}

/// Tabla de partículas: `data_particles` (3.1) o el primer bloque con tabla (3.0).
fn particles_table(doc: &StarDocument) -> Result<&StarTable, ConvertError> {
    doc.block("particles")
       .and_then(|b| b.table.as_ref())
       .or_else(|| doc.first_table().map(|(_, t)| t))
       .ok_or_else(|| ConvertError::MissingLabel("data_particles".into()))
}

/// Etiquetas que `read_particles` interpreta en campos propios de `Particle`
/// para esta tabla; el resto sólo sobrevive como `extra`.
fn modeled_labels(table: &StarTable, alignment: AlignType) -> Vec<&'static str> {
    let mut labels = vec!["rlnImageName", "rlnOpticsGroup", "rlnMicrographName"];
    if table.column("rlnDefocusU").is_some() && table.column("rlnDefocusV").is_some() {
        labels.extend(["rlnDefocusU", "rlnDefocusV", "rlnDefocusAngle"]);
    }
    if alignment.has_angles() && table.column("rlnAnglePsi").is_some() {
        if alignment == AlignType::Proj {
            labels.extend(["rlnAngleRot", "rlnAngleTilt"]);
        }
        labels.extend(["rlnAnglePsi", "rlnOriginXAngst", "rlnOriginYAngst", "rlnOriginX", "rlnOriginY"]);
    }
    labels
}

fn particles_from_doc(doc: &StarDocument,
                      path: &Path,
                      alignment: AlignType,
                      extra_labels: &[String])
                      -> Result<ParticleSet, ConvertError> {
    let optics = read_optics(doc)?;
    let table = particles_table(doc)?;
    let image_col = table.column("rlnImageName")
                         .ok_or_else(|| ConvertError::MissingLabel("rlnImageName".into()))?;

    let mut extra_cols = Vec::new();
    for label in extra_labels {
        match table.column(label) {
            Some(i) => extra_cols.push((label.trim_start_matches('_').to_string(), i)),
            None => log::warn!("extra label '{}' not present in {}", label, path.display()),
        }
    }

    let mut set = ParticleSet::new(None, alignment);
    for g in optics {
        set.add_optics_group(g)?;
    }
    let has_angles = alignment.has_angles() && table.column("rlnAnglePsi").is_some();

    for (n, row) in table.rows().iter().enumerate() {
        let location = ImageLocation::parse(&row[image_col])?;
        let mut p = Particle::new(n as u64 + 1, location);
        p.optics_group = parse_f64(table, row, "rlnOpticsGroup")?.map(|v| v as u32).unwrap_or(1);
        p.micrograph = table.column("rlnMicrographName").map(|i| row[i].clone());
        if let (Some(u), Some(v)) = (parse_f64(table, row, "rlnDefocusU")?, parse_f64(table, row, "rlnDefocusV")?) {
            p.ctf = Some(Ctf { defocus_u: u,
                               defocus_v: v,
                               defocus_angle: parse_f64(table, row, "rlnDefocusAngle")?.unwrap_or(0.0) });
        }
        if has_angles {
            let pixel = set.optics()
                           .iter()
                           .find(|g| g.number == p.optics_group)
                           .map(|g| g.pixel_size)
                           .unwrap_or(1.0);
            let shift = |angst: &str, px: &str| -> Result<f64, ConvertError> {
                Ok(match parse_f64(table, row, angst)? {
                    Some(v) => v,
                    None => parse_f64(table, row, px)?.map(|v| v * pixel).unwrap_or(0.0),
                })
            };
            let (rot, tilt) = if alignment == AlignType::Proj {
                (parse_f64(table, row, "rlnAngleRot")?.unwrap_or(0.0),
                 parse_f64(table, row, "rlnAngleTilt")?.unwrap_or(0.0))
            } else {
                (0.0, 0.0)
            };
            p.transform = Some(Transform { rot,
                                           tilt,
                                           psi: parse_f64(table, row, "rlnAnglePsi")?.unwrap_or(0.0),
                                           shift_x: shift("rlnOriginXAngst", "rlnOriginX")?,
                                           shift_y: shift("rlnOriginYAngst", "rlnOriginY")? });
        }
        for (key, i) in &extra_cols {
            p.extra.insert(key.clone(), row[*i].clone());
        }
        set.push(p);
    }
    log::debug!("read {} particles from {}", set.len(), path.display());
    Ok(set)
}

impl ParticleCodec for RelionCodec {
    fn write_particles(&self, set: &ParticleSet, path: &Path) -> Result<(), ConvertError> {
        let particles = set.particles();
        let align = set.alignment();
        let with_mic = !particles.is_empty() && particles.iter().all(|p| p.micrograph.is_some());
        let with_ctf = !particles.is_empty() && particles.iter().all(|p| p.ctf.is_some());
        let with_tr = align.has_angles() && !particles.is_empty() && particles.iter().all(|p| p.transform.is_some());
        let extra_keys: Vec<String> = particles.first()
                                               .map(|first| {
                                                   first.extra
                                                        .keys()
                                                        .filter(|k| particles.iter().all(|p| p.extra.contains_key(*k)))
                                                        .cloned()
                                                        .collect()
                                               })
                                               .unwrap_or_default();

        let mut labels: Vec<String> = vec!["rlnImageName".into()];
        if with_mic {
            labels.push("rlnMicrographName".into());
        }
        labels.push("rlnOpticsGroup".into());
        if with_ctf {
            labels.extend(["rlnDefocusU", "rlnDefocusV", "rlnDefocusAngle"].map(String::from));
        }
        if with_tr {
            if align == AlignType::Proj {
                labels.extend(["rlnAngleRot", "rlnAngleTilt"].map(String::from));
            }
            labels.extend(["rlnAnglePsi", "rlnOriginXAngst", "rlnOriginYAngst"].map(String::from));
        }
        labels.extend(extra_keys.iter().cloned());

        let mut table = StarTable::new(labels);
        for p in particles {
            let mut row = vec![p.location.to_string()];
            if let (true, Some(m)) = (with_mic, &p.micrograph) {
                row.push(m.clone());
            }
            row.push(p.optics_group.to_string());
            if let (true, Some(c)) = (with_ctf, &p.ctf) {
                row.extend([c.defocus_u, c.defocus_v, c.defocus_angle].map(fmt_f64));
            }
            if let (true, Some(t)) = (with_tr, &p.transform) {
                if align == AlignType::Proj {
                    row.extend([t.rot, t.tilt].map(fmt_f64));
                }
                row.extend([t.psi, t.shift_x, t.shift_y].map(fmt_f64));
            }
            row.extend(extra_keys.iter().map(|k| p.extra[k].clone()));
            table.push_row(row)?;
        }

        let mut doc = StarDocument::default();
        if let Some(optics) = optics_table(set) {
            doc.blocks.push(DataBlock::with_table("optics", optics));
        }
        doc.blocks.push(DataBlock::with_table("particles", table));
        doc.write(path)
    }

    fn read_particles(&self,
                      path: &Path,
                      alignment: AlignType,
                      extra_labels: &[String])
                      -> Result<ParticleSet, ConvertError> {
        let doc = StarDocument::read(path)?;
        particles_from_doc(&doc, path, alignment, extra_labels)
    }

    fn read_particles_keeping_all(&self, path: &Path, alignment: AlignType) -> Result<ParticleSet, ConvertError> {
        let doc = StarDocument::read(path)?;
        let table = particles_table(&doc)?;
        let modeled = modeled_labels(table, alignment);
        let unmodeled: Vec<String> = table.labels()
                                          .iter()
                                          .filter(|l| !modeled.contains(&l.as_str()))
                                          .cloned()
                                          .collect();
        particles_from_doc(&doc, path, alignment, &unmodeled)
    }

    fn read_micrographs(&self, path: &Path) -> Result<MicrographSet, ConvertError> {
        let doc = StarDocument::read(path)?;
        let optics = read_optics(&doc)?;
        let table = doc.block("micrographs")
                       .and_then(|b| b.table.as_ref())
                       .or_else(|| doc.first_table().map(|(_, t)| t))
                       .ok_or_else(|| ConvertError::MissingLabel("data_micrographs".into()))?;
        let col = table.column("rlnMicrographName")
                       .ok_or_else(|| ConvertError::MissingLabel("rlnMicrographName".into()))?;
        let mut set = MicrographSet::new(optics.first().map(|g| g.pixel_size));
        for (n, row) in table.rows().iter().enumerate() {
            set.push(Micrograph::new(n as u64 + 1, row[col].as_str()));
        }
        Ok(set)
    }
}

impl VolumeCodec for RelionCodec {
    fn convert_binary_volume(&self, volume: &Volume, dest_dir: &Path) -> Result<Volume, ConvertError> {
        let stem = volume.file
                         .file_stem()
                         .map(|s| s.to_string_lossy().into_owned())
                         .unwrap_or_else(|| "volume".to_string());
        fs::create_dir_all(dest_dir).map_err(ConvertError::io(dest_dir))?;
        let dest: PathBuf = dest_dir.join(format!("{stem}.mrc"));
        let header = mrc::rewrite(&volume.file, &dest, volume.sampling_rate)?;
        Ok(converted(volume, dest, &header))
    }

    fn write_volume(&self, volume: &Volume, dest: &Path) -> Result<Volume, ConvertError> {
        let header = mrc::rewrite(&volume.file, dest, volume.sampling_rate)?;
        Ok(converted(volume, dest.to_path_buf(), &header))
    }
}

fn converted(volume: &Volume, file: PathBuf, header: &MrcHeader) -> Volume {
    let mut out = Volume::new(file).with_dims(header.dims());
    out.id = volume.id;
    out.sampling_rate = volume.sampling_rate.or_else(|| header.voxel_size());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_relion30_single_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.star");
        fs::write(&path,
                  "data_\nloop_\n_rlnImageName #1\n_rlnAnglePsi #2\n_rlnOriginX #3\n_rlnOriginY #4\n1@a.mrcs 45 2 -1\n")
            .unwrap();
        let set = RelionCodec.read_particles(&path, AlignType::TwoD, &[]).unwrap();
        assert_eq!(set.len(), 1);
        let t = set.particles()[0].transform.unwrap();
        assert_eq!((t.psi, t.shift_x, t.shift_y), (45.0, 2.0, -1.0));
    }

    #[test]
    fn missing_image_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.star");
        fs::write(&path, "data_particles\nloop_\n_rlnAnglePsi #1\n10\n").unwrap();
        let err = RelionCodec.read_particles(&path, AlignType::Proj, &[]).unwrap_err();
        assert!(matches!(err, ConvertError::MissingLabel(_)));
    }

    #[test]
    fn unmodeled_columns_survive_a_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.star");
        fs::write(&src,
                  "data_particles\nloop_\n_rlnImageName #1\n_rlnCoordinateX #2\n_rlnClassNumber #3\n_rlnAnglePsi #4\n\
                   1@s.mrcs 120.5 3 10\n2@s.mrcs 88.0 1 20\n")
            .unwrap();
        let set = RelionCodec.read_particles_keeping_all(&src, AlignType::Proj).unwrap();
        let first = &set.particles()[0];
        assert_eq!(first.extra.get("rlnCoordinateX").map(String::as_str), Some("120.5"));
        assert_eq!(first.extra.get("rlnClassNumber").map(String::as_str), Some("3"));
        assert!(!first.extra.contains_key("rlnAnglePsi"));

        let out = dir.path().join("out.star");
        RelionCodec.write_particles(&set, &out).unwrap();
        let doc = StarDocument::read(&out).unwrap();
        let table = doc.block("particles").and_then(|b| b.table.as_ref()).unwrap();
        let x = table.column("rlnCoordinateX").unwrap();
        let class = table.column("rlnClassNumber").unwrap();
        assert_eq!(table.rows()[1][x], "88.0");
        assert_eq!(table.rows()[1][class], "1");
        assert_eq!(table.labels().iter().filter(|l| l.as_str() == "rlnAnglePsi").count(), 1);
    }

    #[test]
    fn converts_map_into_mrc() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("emd_1.map");
        mrc::write_f32(&src, [2, 2, 2], 3.0, &[1.0; 8]).unwrap();
        let out = RelionCodec.convert_binary_volume(&Volume::new(&src), &dir.path().join("tmp")).unwrap();
        assert!(out.is_mrc());
        assert_eq!(out.dims, Some([2, 2, 2]));
        assert!((out.sampling_rate.unwrap() - 3.0).abs() < 1e-6);
    }
}
