//! Reparto de las partículas de un refinamiento en N subconjuntos.
//!
//! LocateDataStarStep elige el `*_data.star` más reciente del directorio del
//! refinamiento; SplitSubsetsStep escribe, por subconjunto, un STAR con stack
//! propio en `extra/subset_<i>/` y otro que apunta a los stacks originales en
//! `tmp/`, que es el que se registra como salida.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use em_convert::{mrc, DataBlock, StarDocument, StarTable};
use em_core::{StepKind, StepRunResultTyped, TypedStep};
use em_domain::{AlignType, ImageLocation};

use crate::artifacts::{HarvestReport, HarvestedOutput, SelectedDataStar};
use crate::protocols::split_subsets::{SplitSubsetsContext, SplitSubsetsParams};
use crate::run::OutputObject;
use crate::steps::harvest::glob_dir;
use crate::ProtocolError;

pub const DATA_STAR_PATTERN: &str = "*_data.star";

/// `[inicio, fin)` de cada subconjunto; el último se queda con el resto.
pub fn subset_bounds(total: usize, subsets: usize) -> Vec<(usize, usize)> {
    let per = total / subsets.max(1);
    (0..subsets).map(|i| {
                    let start = i * per;
                    let end = if i + 1 < subsets { start + per } else { total };
                    (start, end)
                })
                .collect()
}

fn particles_table(doc: &StarDocument) -> Result<(usize, &StarTable), ProtocolError> {
    doc.blocks
       .iter()
       .position(|b| b.name == "particles" && b.table.is_some())
       .or_else(|| doc.blocks.iter().position(|b| b.table.is_some()))
       .and_then(|i| doc.blocks[i].table.as_ref().map(|t| (i, t)))
       .ok_or_else(|| em_convert::ConvertError::MissingLabel("data_particles".into()).into())
}

/// El `*_data.star` modificado más recientemente (a igualdad, el último por nombre).
pub fn latest_data_star(dir: &Path) -> Result<PathBuf, ProtocolError> {
    let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
    for path in glob_dir(dir, DATA_STAR_PATTERN)? {
        let modified = fs::metadata(&path).and_then(|m| m.modified())
                                          .map_err(ProtocolError::io(&path))?;
        candidates.push((modified, path));
    }
    candidates.into_iter()
              .max()
              .map(|(_, p)| p)
              .ok_or_else(|| ProtocolError::InvalidParams(format!("no {DATA_STAR_PATTERN} found in {}", dir.display())))
}

pub fn locate_data_star(ctx: &SplitSubsetsContext) -> Result<SelectedDataStar, ProtocolError> {
    let dir = ctx.run.resolve(&ctx.input.value);
    let path = latest_data_star(&dir)?;
    let doc = StarDocument::read(&path)?;
    let (_, table) = particles_table(&doc)?;
    log::info!("splitting {} ({} particles)", path.display(), table.len());
    Ok(SelectedDataStar { particles: table.len(),
                          path,
                          schema_version: 1 })
}

fn with_table(doc: &StarDocument, block: usize, table: StarTable) -> StarDocument {
    let mut out = doc.clone();
    let name = out.blocks[block].name.clone();
    out.blocks[block] = DataBlock::with_table(name, table);
    out
}

pub fn split_subsets(ctx: &SplitSubsetsContext,
                     params: &SplitSubsetsParams,
                     selected: &SelectedDataStar)
                     -> Result<HarvestReport, ProtocolError> {
    let subsets = params.number_of_subsets;
    let doc = StarDocument::read(&selected.path)?;
    let (block, table) = particles_table(&doc)?;
    let total = table.len();
    if subsets == 0 || total < subsets {
        return Err(ProtocolError::InvalidParams(format!("cannot split {total} particles into {subsets} subsets")));
    }
    let image_col = table.column("rlnImageName")
                         .ok_or_else(|| em_convert::ConvertError::MissingLabel("rlnImageName".into()))?;

    let mut order: Vec<usize> = (0..total).collect();
    if params.randomize {
        log::info!("shuffling particle indices");
        match params.seed {
            Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => order.shuffle(&mut rand::thread_rng()),
        }
    }

    let mut outputs = Vec::with_capacity(subsets);
    for (i, (start, end)) in subset_bounds(total, subsets).into_iter().enumerate() {
        let rows = &order[start..end];
        let subset_dir = ctx.run.extra_path(format!("subset_{i}"));
        fs::create_dir_all(&subset_dir).map_err(ProtocolError::io(&subset_dir))?;
        log::info!("writing subset {i} ({} particles) in {}", rows.len(), subset_dir.display());

        // STAR con las rutas originales, base de la salida registrada
        let original = table.select_rows(rows);
        let tmp_star = ctx.run.tmp_path(format!("subset_{i}_particles.star"));
        with_table(&doc, block, original.clone()).write(&tmp_star)?;

        // stack nuevo + STAR con nombres de imagen sin directorio
        let stack_name = format!("particles_{i}.mrcs");
        let mut sections = Vec::with_capacity(rows.len());
        for row in original.rows() {
            let loc = ImageLocation::parse(&row[image_col])?;
            sections.push((ctx.run.resolve(&loc.path), loc.index));
        }
        mrc::write_stack(&subset_dir.join(&stack_name), &sections)?;

        let mut renamed = original;
        for (j, row) in renamed.rows_mut().iter_mut().enumerate() {
            row[image_col] = ImageLocation::new(j + 1, &stack_name).to_string();
        }
        with_table(&doc, block, renamed).write(&subset_dir.join(format!("particles_{i}.star")))?;

        let set = ctx.particle_codec.read_particles(&tmp_star, AlignType::Proj, &[])?;
        outputs.push(HarvestedOutput { index: i,
                                       name: format!("outputSubset_{i}"),
                                       file: Some(tmp_star),
                                       object: OutputObject::Particles(set) });
    }

    Ok(HarvestReport { outputs,
                       schema_version: 1 })
}

#[derive(Debug)]
pub struct LocateDataStarStep {
    ctx: Arc<SplitSubsetsContext>,
}

impl LocateDataStarStep {
    pub fn new(ctx: Arc<SplitSubsetsContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for LocateDataStarStep {
    type Params = SplitSubsetsParams;
    type Input = SelectedDataStar;
    type Output = SelectedDataStar;

    fn id(&self) -> &'static str {
        "locate_data_star"
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    fn params_default(&self) -> SplitSubsetsParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, _input: Option<SelectedDataStar>, _params: SplitSubsetsParams) -> StepRunResultTyped<SelectedDataStar> {
        StepRunResultTyped::from_result(locate_data_star(&self.ctx))
    }
}

#[derive(Debug)]
pub struct SplitSubsetsStep {
    ctx: Arc<SplitSubsetsContext>,
}

impl SplitSubsetsStep {
    pub fn new(ctx: Arc<SplitSubsetsContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for SplitSubsetsStep {
    type Params = SplitSubsetsParams;
    type Input = SelectedDataStar;
    type Output = HarvestReport;

    fn id(&self) -> &'static str {
        "split_subsets"
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    fn params_default(&self) -> SplitSubsetsParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, input: Option<SelectedDataStar>, params: SplitSubsetsParams) -> StepRunResultTyped<HarvestReport> {
        match input {
            Some(selected) => StepRunResultTyped::from_result(split_subsets(&self.ctx, &params, &selected)),
            None => StepRunResultTyped::Failure { error: em_core::CoreEngineError::MissingInputs },
        }
    }
}
