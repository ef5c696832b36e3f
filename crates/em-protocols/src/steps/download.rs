//! Descarga de mapas EMDB: FetchMapStep (Source) guarda el `.map.gz` y
//! ExtractMapStep lo descomprime y lee el tamaño de vóxel de la cabecera.
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::sync::Arc;

use em_convert::{ConvertError, MrcHeader};
use em_core::{StepKind, StepRunResultTyped, StepSignal, TypedStep};
use em_domain::Volume;

use crate::artifacts::{DownloadedArchive, HarvestReport, HarvestedOutput};
use crate::protocols::download_emdb::{DownloadEmdbContext, DownloadEmdbParams};
use crate::run::OutputObject;
use crate::ProtocolError;

pub const OUTPUT_VOLUME: &str = "outputVolume";

/// Obtiene el contenido de una URL. Separado para poder sustituir la red.
pub trait MapFetcher: std::fmt::Debug + Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ProtocolError>;
}

#[derive(Debug, Default)]
pub struct HttpMapFetcher {
    client: reqwest::blocking::Client,
}

impl HttpMapFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapFetcher for HttpMapFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ProtocolError> {
        let download_err = |message: String| ProtocolError::Download { url: url.to_string(),
                                                                      message };
        let response = self.client.get(url).send().map_err(|e| download_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_err(format!("HTTP status {status}")));
        }
        let body = response.bytes().map_err(|e| download_err(e.to_string()))?;
        Ok(body.to_vec())
    }
}

pub fn fetch_map(ctx: &DownloadEmdbContext, params: &DownloadEmdbParams) -> Result<DownloadedArchive, ProtocolError> {
    let id = params.validated_id()?;
    let url = ctx.settings.emdb_url(id);
    log::info!("Trying to download from {url}");
    let body = ctx.fetcher.fetch(&url)?;
    let archive = ctx.run.extra_path(format!("emd_{id}.map.gz"));
    fs::write(&archive, &body).map_err(ProtocolError::io(&archive))?;
    Ok(DownloadedArchive { url,
                           archive,
                           bytes: body.len() as u64,
                           schema_version: 1 })
}

pub fn extract_map(ctx: &DownloadEmdbContext, archive: &DownloadedArchive) -> Result<HarvestReport, ProtocolError> {
    let file_name = archive.archive
                           .file_name()
                           .map(|n| n.to_string_lossy().trim_end_matches(".gz").to_string())
                           .unwrap_or_else(|| "map.map".to_string());
    let map_path = ctx.run.extra_path(file_name);

    let input = File::open(&archive.archive).map_err(ProtocolError::io(&archive.archive))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut output = BufWriter::new(File::create(&map_path).map_err(ProtocolError::io(&map_path))?);
    io::copy(&mut decoder, &mut output).map_err(ProtocolError::io(&archive.archive))?;
    output.flush().map_err(ProtocolError::io(&map_path))?;

    let header = MrcHeader::read(&map_path)?;
    let sampling = header.voxel_size().ok_or_else(|| ConvertError::Mrc { path: map_path.clone(),
                                                                          message: "header has no voxel size".into() })?;
    let volume = Volume::new(&map_path).with_dims(header.dims()).with_sampling_rate(sampling)?;
    log::info!("downloaded map {} ({:?} px, {sampling:.3} Å/px)", map_path.display(), header.dims());

    Ok(HarvestReport { outputs: vec![HarvestedOutput { index: 0,
                                                       name: OUTPUT_VOLUME.to_string(),
                                                       file: Some(map_path),
                                                       object: OutputObject::Volume(volume) }],
                       schema_version: 1 })
}

#[derive(Debug)]
pub struct FetchMapStep {
    ctx: Arc<DownloadEmdbContext>,
}

impl FetchMapStep {
    pub fn new(ctx: Arc<DownloadEmdbContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for FetchMapStep {
    type Params = DownloadEmdbParams;
    type Input = DownloadedArchive;
    type Output = DownloadedArchive;

    fn id(&self) -> &'static str {
        "fetch_emdb_map"
    }

    fn kind(&self) -> StepKind {
        StepKind::Source
    }

    fn params_default(&self) -> DownloadEmdbParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, _input: Option<DownloadedArchive>, params: DownloadEmdbParams) -> StepRunResultTyped<DownloadedArchive> {
        StepRunResultTyped::with_signals(fetch_map(&self.ctx, &params).map(|archive| {
            let fetched = StepSignal::new("archive_downloaded",
                                          serde_json::json!({ "url": archive.url, "bytes": archive.bytes }));
            (archive, vec![fetched])
        }))
    }
}

#[derive(Debug)]
pub struct ExtractMapStep {
    ctx: Arc<DownloadEmdbContext>,
}

impl ExtractMapStep {
    pub fn new(ctx: Arc<DownloadEmdbContext>) -> Self {
        Self { ctx }
    }
}

impl TypedStep for ExtractMapStep {
    type Params = DownloadEmdbParams;
    type Input = DownloadedArchive;
    type Output = HarvestReport;

    fn id(&self) -> &'static str {
        "extract_emdb_map"
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    fn params_default(&self) -> DownloadEmdbParams {
        self.ctx.params.clone()
    }

    fn run_typed(&self, input: Option<DownloadedArchive>, _params: DownloadEmdbParams) -> StepRunResultTyped<HarvestReport> {
        match input {
            Some(archive) => StepRunResultTyped::from_result(extract_map(&self.ctx, &archive)),
            None => StepRunResultTyped::Failure { error: em_core::CoreEngineError::MissingInputs },
        }
    }
}
