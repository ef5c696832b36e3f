//! Documentos STAR: bloques `data_<nombre>` con pares clave/valor y, como
//! mucho, una tabla `loop_` por bloque (el subconjunto que usa RELION).
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::ConvertError;

pub const RELION_VERSION_HEADER: &str = "# version 30001";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StarTable {
    labels: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl StarTable {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self { labels: labels.into_iter().map(|l| normalize_label(&l.into())).collect(),
               rows: Vec::new() }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Índice de la columna `label` (acepta con o sin `_` inicial).
    pub fn column(&self, label: &str) -> Option<usize> {
        let label = normalize_label(label);
        self.labels.iter().position(|l| *l == label)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), ConvertError> {
        if row.len() != self.labels.len() {
            return Err(ConvertError::StarSyntax { line: self.rows.len() + 1,
                                                  message: format!("row has {} values, expected {}",
                                                                   row.len(),
                                                                   self.labels.len()) });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Tabla con las mismas columnas y sólo las filas indicadas (en ese orden).
    pub fn select_rows(&self, indices: &[usize]) -> StarTable {
        StarTable { labels: self.labels.clone(),
                    rows: indices.iter().filter_map(|i| self.rows.get(*i).cloned()).collect() }
    }

    pub fn rows_mut(&mut self) -> &mut [Vec<String>] {
        &mut self.rows
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataBlock {
    pub name: String,
    pub pairs: IndexMap<String, String>,
    pub table: Option<StarTable>,
}

impl DataBlock {
    pub fn with_table(name: impl Into<String>, table: StarTable) -> Self {
        Self { name: name.into(),
               pairs: IndexMap::new(),
               table: Some(table) }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StarDocument {
    pub blocks: Vec<DataBlock>,
}

impl StarDocument {
    pub fn read(path: &Path) -> Result<Self, ConvertError> {
        let text = fs::read_to_string(path).map_err(ConvertError::io(path))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConvertError> {
        let mut doc = StarDocument::default();
        // true mientras se leen las etiquetas de un loop_, false en sus filas
        let mut in_header = false;
        let mut in_loop = false;

        for (n, raw) in text.lines().enumerate() {
            let line_no = n + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix("data_") {
                doc.blocks.push(DataBlock { name: name.to_string(),
                                            ..Default::default() });
                in_loop = false;
                in_header = false;
                continue;
            }
            let block = doc.blocks
                           .last_mut()
                           .ok_or_else(|| ConvertError::StarSyntax { line: line_no,
                                                                     message: "content before any data_ block".into() })?;
            if line == "loop_" {
                if block.table.is_some() {
                    return Err(ConvertError::StarSyntax { line: line_no,
                                                          message: format!("second loop_ in block '{}'", block.name) });
                }
                block.table = Some(StarTable::default());
                in_loop = true;
                in_header = true;
                continue;
            }
            if line.starts_with('_') {
                let mut parts = line.split_whitespace();
                let label = parts.next().unwrap_or_default();
                if in_loop && in_header {
                    if let Some(table) = block.table.as_mut() {
                        table.labels.push(normalize_label(label));
                    }
                } else {
                    let value = parts.next().ok_or_else(|| ConvertError::StarSyntax { line: line_no,
                                                                                      message: format!("label {label} without value") })?;
                    block.pairs.insert(normalize_label(label), value.to_string());
                    in_loop = false;
                }
                continue;
            }
            if !in_loop {
                return Err(ConvertError::StarSyntax { line: line_no,
                                                      message: format!("unexpected content '{line}'") });
            }
            in_header = false;
            if let Some(table) = block.table.as_mut() {
                let row: Vec<String> = line.split_whitespace().map(str::to_string).collect();
                if row.len() != table.labels.len() {
                    return Err(ConvertError::StarSyntax { line: line_no,
                                                          message: format!("row has {} values, expected {}",
                                                                           row.len(),
                                                                           table.labels.len()) });
                }
                table.rows.push(row);
            }
        }
        Ok(doc)
    }

    pub fn block(&self, name: &str) -> Option<&DataBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// Primera tabla del documento, para ficheros de un solo bloque.
    pub fn first_table(&self) -> Option<(&DataBlock, &StarTable)> {
        self.blocks.iter().find_map(|b| b.table.as_ref().map(|t| (b, t)))
    }

    pub fn to_star_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n{RELION_VERSION_HEADER}\n");
        for block in &self.blocks {
            let _ = writeln!(out, "data_{}\n", block.name);
            for (k, v) in &block.pairs {
                let _ = writeln!(out, "_{k} {v}");
            }
            if !block.pairs.is_empty() {
                out.push('\n');
            }
            if let Some(table) = &block.table {
                out.push_str("loop_ \n");
                for (i, label) in table.labels.iter().enumerate() {
                    let _ = writeln!(out, "_{label} #{}", i + 1);
                }
                for row in &table.rows {
                    let _ = writeln!(out, "{}", row.join("\t"));
                }
                out.push('\n');
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<(), ConvertError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ConvertError::io(parent))?;
        }
        fs::write(path, self.to_star_string()).map_err(ConvertError::io(path))
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().trim_start_matches('_').to_string()
}
