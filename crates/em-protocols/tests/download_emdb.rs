use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::{Arc, Mutex};

use em_core::{ErrorClass, InMemoryEventStore};
use em_protocols::{DownloadEmdbParams, DownloadEmdbProtocol, HostSettings, MapFetcher, OutputObject, OutputRegistry,
                   ProtocolError, ProtocolRun};

#[derive(Debug, Default)]
struct StubFetcher {
    body: Option<Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl MapFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ProtocolError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.body.clone().ok_or_else(|| ProtocolError::Download { url: url.to_string(),
                                                                 message: "HTTP status 404 Not Found".into() })
    }
}

fn gzipped_map() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.map");
    em_convert::mrc::write_f32(&path, [3, 3, 3], 0.83, &[1.0; 27]).unwrap();
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&std::fs::read(&path).unwrap()).unwrap();
    enc.finish().unwrap()
}

fn params(id: &str) -> DownloadEmdbParams {
    DownloadEmdbParams { emdb_id: id.to_string() }
}

#[test]
fn downloads_decompresses_and_reads_voxel_size() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "download_emdb").unwrap();
    let extra = run.extra_dir();
    let fetcher = Arc::new(StubFetcher { body: Some(gzipped_map()),
                                         ..Default::default() });
    let protocol = DownloadEmdbProtocol::with_fetcher(params("1234"), run, HostSettings::default(), fetcher.clone());

    let mut registry = OutputRegistry::new();
    let outcome = protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap();

    assert_eq!(outcome.outputs, vec!["outputVolume"]);
    assert_eq!(fetcher.requested.lock().unwrap().as_slice(),
               ["https://ftp.ebi.ac.uk/pub/databases/emdb/structures/EMD-1234/map/emd_1234.map.gz"]);
    assert!(extra.join("emd_1234.map.gz").exists());
    match registry.output("outputVolume") {
        Some(OutputObject::Volume(v)) => {
            assert_eq!(v.file, extra.join("emd_1234.map"));
            assert!((v.sampling_rate.unwrap() - 0.83).abs() < 1e-5);
        }
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn http_failure_is_a_download_error() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "download_emdb").unwrap();
    let protocol = DownloadEmdbProtocol::with_fetcher(params("99999"),
                                                      run,
                                                      HostSettings::default(),
                                                      Arc::new(StubFetcher::default()));
    let mut registry = OutputRegistry::new();
    let err = protocol.launch(InMemoryEventStore::default(), &mut registry).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Download);
    assert!(registry.is_empty());
}

#[test]
fn non_numeric_id_is_rejected_without_fetching() {
    let project = tempfile::tempdir().unwrap();
    let run = ProtocolRun::create(project.path(), "download_emdb").unwrap();
    let fetcher = Arc::new(StubFetcher::default());
    let protocol = DownloadEmdbProtocol::with_fetcher(params("EMD-12a"), run, HostSettings::default(), fetcher.clone());
    let err = protocol.launch(InMemoryEventStore::default(), &mut OutputRegistry::new())
                      .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(fetcher.requested.lock().unwrap().is_empty());
}

#[test]
fn url_template_is_configurable() {
    let settings = HostSettings { emdb_url_template: "http://mirror.local/emd_{id}.map.gz".into(),
                                  ..Default::default() };
    assert_eq!(settings.emdb_url("42"), "http://mirror.local/emd_42.map.gz");
}
