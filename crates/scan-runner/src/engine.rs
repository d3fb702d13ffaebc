//! The engine boundary the Scan Runner drives. Implementations are free to
//! shell out, call a library, or do anything else; the runner only needs
//! one call per invocation and never reuses an engine instance across jobs.

use pipeline_core::{ConfigBundle, EngineMessage, ErrorPayload};

pub trait ScanEngine {
    /// Runs the engine against `url` with the given configuration bundle,
    /// returning the messages it produced. Errors surface as the engine
    /// error payload the Scan Runner reports back to the worker.
    fn scan(&self, url: &str, bundle: &ConfigBundle) -> Result<Vec<EngineMessage>, ErrorPayload>;
}
