//! Cabecera MRC2014 (1024 bytes, little-endian) y acceso por secciones.
//!
//! Sólo se interpreta lo necesario para conocer dimensiones, modo y tamaño
//! de vóxel, y para copiar imágenes de un stack a otro.
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::ConvertError;

pub const HEADER_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct MrcHeader {
    pub nx: i32,
    pub ny: i32,
    pub nz: i32,
    pub mode: i32,
    pub mx: i32,
    pub my: i32,
    pub mz: i32,
    /// Tamaño de la celda en Å.
    pub cella: [f32; 3],
    /// Bytes de cabecera extendida tras los 1024 iniciales.
    pub nsymbt: i32,
    raw: Vec<u8>,
}

fn word_i32(buf: &[u8], word: usize) -> i32 {
    let o = word * 4;
    i32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]])
}

fn word_f32(buf: &[u8], word: usize) -> f32 {
    let o = word * 4;
    f32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]])
}

fn put_i32(buf: &mut [u8], word: usize, v: i32) {
    buf[word * 4..word * 4 + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut [u8], word: usize, v: f32) {
    buf[word * 4..word * 4 + 4].copy_from_slice(&v.to_le_bytes());
}

impl MrcHeader {
    /// Cabecera nueva en modo 2 (float32).
    pub fn new(dims: [u32; 3], voxel_size: f64) -> Self {
        let mut h = MrcHeader { nx: dims[0] as i32,
                                ny: dims[1] as i32,
                                nz: dims[2] as i32,
                                mode: 2,
                                mx: dims[0] as i32,
                                my: dims[1] as i32,
                                mz: dims[2] as i32,
                                cella: [0.0; 3],
                                nsymbt: 0,
                                raw: vec![0u8; HEADER_LEN] };
        h.set_voxel_size(voxel_size);
        h
    }

    pub fn from_bytes(buf: &[u8], path: &Path) -> Result<Self, ConvertError> {
        if buf.len() < HEADER_LEN {
            return Err(ConvertError::Mrc { path: path.to_path_buf(),
                                           message: format!("header too short ({} bytes)", buf.len()) });
        }
        let h = MrcHeader { nx: word_i32(buf, 0),
                            ny: word_i32(buf, 1),
                            nz: word_i32(buf, 2),
                            mode: word_i32(buf, 3),
                            mx: word_i32(buf, 7),
                            my: word_i32(buf, 8),
                            mz: word_i32(buf, 9),
                            cella: [word_f32(buf, 10), word_f32(buf, 11), word_f32(buf, 12)],
                            nsymbt: word_i32(buf, 23),
                            raw: buf[..HEADER_LEN].to_vec() };
        if h.nx <= 0 || h.ny <= 0 || h.nz <= 0 || h.nsymbt < 0 {
            return Err(ConvertError::Mrc { path: path.to_path_buf(),
                                           message: format!("invalid dimensions {}x{}x{}", h.nx, h.ny, h.nz) });
        }
        Ok(h)
    }

    pub fn read(path: &Path) -> Result<Self, ConvertError> {
        let mut f = File::open(path).map_err(ConvertError::io(path))?;
        let mut buf = vec![0u8; HEADER_LEN];
        f.read_exact(&mut buf).map_err(ConvertError::io(path))?;
        Self::from_bytes(&buf, path)
    }

    pub fn dims(&self) -> [u32; 3] {
        [self.nx as u32, self.ny as u32, self.nz as u32]
    }

    /// Tamaño de vóxel en Å/px (`cella.x / mx`); `None` si la cabecera no lo define.
    pub fn voxel_size(&self) -> Option<f64> {
        if self.mx > 0 && self.cella[0] > 0.0 {
            Some(f64::from(self.cella[0]) / f64::from(self.mx))
        } else {
            None
        }
    }

    pub fn set_voxel_size(&mut self, voxel_size: f64) {
        self.cella = [(voxel_size * f64::from(self.mx)) as f32,
                      (voxel_size * f64::from(self.my)) as f32,
                      (voxel_size * f64::from(self.mz)) as f32];
    }

    pub fn bytes_per_voxel(&self) -> Result<usize, ConvertError> {
        match self.mode {
            0 => Ok(1),
            1 | 6 | 12 => Ok(2),
            2 => Ok(4),
            other => Err(ConvertError::UnsupportedMode(other)),
        }
    }

    /// Bytes de una sección (imagen 2D).
    pub fn section_len(&self) -> Result<usize, ConvertError> {
        Ok(self.nx as usize * self.ny as usize * self.bytes_per_voxel()?)
    }

    pub fn data_offset(&self) -> u64 {
        HEADER_LEN as u64 + self.nsymbt as u64
    }

    /// Serializa la cabecera; se conservan los campos no interpretados
    /// (estadísticas, etiquetas) salvo la cabecera extendida, que se descarta.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.raw.clone();
        buf.resize(HEADER_LEN, 0);
        put_i32(&mut buf, 0, self.nx);
        put_i32(&mut buf, 1, self.ny);
        put_i32(&mut buf, 2, self.nz);
        put_i32(&mut buf, 3, self.mode);
        put_i32(&mut buf, 7, self.mx);
        put_i32(&mut buf, 8, self.my);
        put_i32(&mut buf, 9, self.mz);
        for (i, c) in self.cella.iter().enumerate() {
            put_f32(&mut buf, 10 + i, *c);
        }
        // mapc/mapr/maps
        if word_i32(&buf, 16) == 0 {
            put_i32(&mut buf, 16, 1);
            put_i32(&mut buf, 17, 2);
            put_i32(&mut buf, 18, 3);
        }
        put_i32(&mut buf, 23, 0);
        buf[208..212].copy_from_slice(b"MAP ");
        buf[212..216].copy_from_slice(&[0x44, 0x44, 0, 0]);
        buf
    }

    fn as_stack_of(&self, count: usize) -> MrcHeader {
        let mut h = self.clone();
        let voxel = self.voxel_size();
        h.nz = count as i32;
        h.mz = count as i32;
        h.nsymbt = 0;
        if let Some(v) = voxel {
            h.cella[2] = (v * count as f64) as f32;
        }
        h
    }
}

/// Escribe un volumen/stack float32 completo.
pub fn write_f32(path: &Path, dims: [u32; 3], voxel_size: f64, data: &[f32]) -> Result<(), ConvertError> {
    let expected = dims.iter().map(|d| *d as usize).product::<usize>();
    if data.len() != expected {
        return Err(ConvertError::Mrc { path: path.to_path_buf(),
                                       message: format!("{} values for dimensions {:?}", data.len(), dims) });
    }
    let header = MrcHeader::new(dims, voxel_size);
    let mut out = BufWriter::new(File::create(path).map_err(ConvertError::io(path))?);
    out.write_all(&header.to_bytes()).map_err(ConvertError::io(path))?;
    for v in data {
        out.write_all(&v.to_le_bytes()).map_err(ConvertError::io(path))?;
    }
    out.flush().map_err(ConvertError::io(path))
}

/// Lee la sección `index` (1-based) de un stack.
pub fn read_section(file: &mut File, header: &MrcHeader, index: usize, path: &Path) -> Result<Vec<u8>, ConvertError> {
    if index == 0 || index > header.nz as usize {
        return Err(ConvertError::Mrc { path: path.to_path_buf(),
                                       message: format!("section {index} out of range 1..={}", header.nz) });
    }
    let len = header.section_len()?;
    let offset = header.data_offset() + ((index - 1) * len) as u64;
    file.seek(SeekFrom::Start(offset)).map_err(ConvertError::io(path))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).map_err(ConvertError::io(path))?;
    Ok(buf)
}

/// Copia un fichero MRC a `dest` descartando la cabecera extendida y,
/// si se indica, fijando el tamaño de vóxel.
pub fn rewrite(src: &Path, dest: &Path, voxel_size: Option<f64>) -> Result<MrcHeader, ConvertError> {
    let bytes = fs::read(src).map_err(ConvertError::io(src))?;
    let mut header = MrcHeader::from_bytes(&bytes, src)?;
    let data_len = header.section_len()? * header.nz as usize;
    let start = header.data_offset() as usize;
    let data = bytes.get(start..start + data_len)
                    .ok_or_else(|| ConvertError::Mrc { path: src.to_path_buf(),
                                                       message: "truncated data".into() })?;
    if let Some(v) = voxel_size {
        header.set_voxel_size(v);
    }
    header.nsymbt = 0;
    let mut out = BufWriter::new(File::create(dest).map_err(ConvertError::io(dest))?);
    out.write_all(&header.to_bytes()).map_err(ConvertError::io(dest))?;
    out.write_all(data).map_err(ConvertError::io(dest))?;
    out.flush().map_err(ConvertError::io(dest))?;
    Ok(header)
}

/// Construye un stack nuevo en `dest` con las secciones `(fichero, índice)`
/// en el orden dado. Todas deben compartir tamaño y modo.
pub fn write_stack(dest: &Path, sections: &[(PathBuf, usize)]) -> Result<MrcHeader, ConvertError> {
    let mut opened: HashMap<&Path, (File, MrcHeader)> = HashMap::new();
    let mut template: Option<MrcHeader> = None;
    let mut payload = Vec::new();

    for (path, index) in sections {
        if !opened.contains_key(path.as_path()) {
            let header = MrcHeader::read(path)?;
            let file = File::open(path).map_err(ConvertError::io(path))?;
            opened.insert(path.as_path(), (file, header));
        }
        let Some((file, header)) = opened.get_mut(path.as_path()) else {
            continue;
        };
        match &template {
            None => template = Some(header.clone()),
            Some(t) if t.nx != header.nx || t.ny != header.ny || t.mode != header.mode => {
                return Err(ConvertError::Mrc { path: path.clone(),
                                               message: format!("image size {}x{} mode {} differs from stack {}x{} mode {}",
                                                                header.nx, header.ny, header.mode, t.nx, t.ny, t.mode) });
            }
            Some(_) => {}
        }
        payload.extend(read_section(file, header, *index, path)?);
    }

    let header = template.ok_or_else(|| ConvertError::Mrc { path: dest.to_path_buf(),
                                                            message: "empty stack".into() })?
                         .as_stack_of(sections.len());
    let mut out = BufWriter::new(File::create(dest).map_err(ConvertError::io(dest))?);
    out.write_all(&header.to_bytes()).map_err(ConvertError::io(dest))?;
    out.write_all(&payload).map_err(ConvertError::io(dest))?;
    out.flush().map_err(ConvertError::io(dest))?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_voxel_size_and_dims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.mrc");
        write_f32(&path, [4, 4, 2], 1.5, &[0.0; 32]).unwrap();
        let h = MrcHeader::read(&path).unwrap();
        assert_eq!(h.dims(), [4, 4, 2]);
        assert_eq!(h.mode, 2);
        assert!((h.voxel_size().unwrap() - 1.5).abs() < 1e-6);
        assert_eq!(fs::metadata(&path).unwrap().len(), 1024 + 32 * 4);
    }

    #[test]
    fn stack_from_sections_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.mrcs");
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        write_f32(&src, [2, 2, 3], 2.0, &data).unwrap();

        let dest = dir.path().join("sub.mrcs");
        let h = write_stack(&dest, &[(src.clone(), 3), (src.clone(), 1)]).unwrap();
        assert_eq!(h.dims(), [2, 2, 2]);

        let mut f = File::open(&dest).unwrap();
        let first = read_section(&mut f, &MrcHeader::read(&dest).unwrap(), 1, &dest).unwrap();
        let values: Vec<f32> = first.chunks(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
        assert_eq!(values, vec![8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn out_of_range_section_fails() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("one.mrcs");
        write_f32(&src, [2, 2, 1], 1.0, &[0.0; 4]).unwrap();
        assert!(write_stack(&dir.path().join("x.mrcs"), &[(src, 2)]).is_err());
    }

    #[test]
    fn short_file_is_not_mrc() {
        assert!(MrcHeader::from_bytes(&[0u8; 10], Path::new("x")).is_err());
    }
}
