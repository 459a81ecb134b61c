mod common;

use std::sync::Mutex;

use common::{sample_backend, vault_over};
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Collects warnings emitted by this crate
struct Capture {
    warnings: Mutex<Vec<String>>,
}

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target().starts_with("vault_ox")
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) && record.level() == Level::Warn {
            self.warnings.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture {
    warnings: Mutex::new(Vec::new()),
};

// One test per binary: the logger is process-global.
#[tokio::test]
async fn failed_mutation_warns_once() {
    log::set_logger(&CAPTURE).expect("first logger");
    log::set_max_level(LevelFilter::Debug);

    let backend = sample_backend();
    let vault = vault_over(backend.clone());
    let view = vault.files_view();
    view.apply().await;

    backend.fail("CreatePublicLink");
    assert!(view.create_public_link("f1").await.is_err());

    let warnings = CAPTURE.warnings.lock().unwrap().clone();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("CreatePublicLink"));
}
