use chrono::Duration;
use matri_admin::config::ConsoleConfig;
use matri_admin::directory::{InMemoryRecordStore, OperatorSession, SeedError};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Records served when no seed file is configured.
pub(crate) const SAMPLE_DIRECTORY: &str = include_str!("../fixtures/sample_directory.json");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn build_store(seed: Option<&Path>) -> Result<InMemoryRecordStore, SeedError> {
    match seed {
        Some(path) => InMemoryRecordStore::from_path(path),
        None => InMemoryRecordStore::from_fixture(SAMPLE_DIRECTORY.as_bytes()),
    }
}

pub(crate) fn operator_session(config: &ConsoleConfig) -> OperatorSession {
    let session = OperatorSession::new(config.operator.clone());
    match config.session_ttl_minutes {
        Some(minutes) => session.with_ttl(Duration::minutes(i64::from(minutes))),
        None => session,
    }
}
