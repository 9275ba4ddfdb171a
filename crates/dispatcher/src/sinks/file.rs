//! FileSink - one append-only log per event label

use contracts::{ContractError, OutputSink, PatientEvent};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// Append target for a single label
#[derive(Debug)]
struct LabelLog {
    path: PathBuf,
    /// Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl LabelLog {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Open, append one complete line, flush and close
    fn append(&self, line: &str) -> std::io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Sink that appends events to `<base_path>/<Label>.txt`
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    /// label -> log, populated on first use of a label
    registry: Mutex<HashMap<String, Arc<LabelLog>>>,
}

impl FileSink {
    /// Create a new FileSink
    ///
    /// The base directory is not touched until the first delivery.
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Create from params map (for factory)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> Self {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// File backing a label, if that label has been seen
    pub fn path_for(&self, label: &str) -> Option<PathBuf> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .map(|log| log.path.clone())
    }

    /// Number of distinct labels seen so far
    pub fn label_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Insert-if-absent under the registry lock
    fn resolve(&self, label: &str) -> Result<Arc<LabelLog>, ContractError> {
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(log) = registry.get(label) {
            return Ok(Arc::clone(log));
        }

        validate_label(label)?;
        let path = self.config.base_path.join(format!("{label}.txt"));
        debug!(sink = %self.name, label, path = %path.display(), "Registered label file");

        let log = Arc::new(LabelLog::new(path));
        registry.insert(label.to_string(), Arc::clone(&log));
        Ok(log)
    }

    fn append_event(&self, event: &PatientEvent) -> Result<(), ContractError> {
        if let Err(e) = fs::create_dir_all(&self.config.base_path) {
            error!(
                sink = %self.name,
                path = %self.config.base_path.display(),
                error = %e,
                "Failed to create base directory"
            );
            return Err(ContractError::sink_write(
                &self.name,
                format!("create {}: {e}", self.config.base_path.display()),
            ));
        }

        let log = self.resolve(event.label())?;
        log.append(&format_record(event)).map_err(|e| {
            error!(sink = %self.name, path = %log.path.display(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, format!("write {}: {e}", log.path.display()))
        })
    }
}

/// `Patient ID: <id>, Timestamp: <ts>, Label: <label>, Data: <data>\n`
fn format_record(event: &PatientEvent) -> String {
    format!(
        "Patient ID: {}, Timestamp: {}, Label: {}, Data: {}\n",
        event.patient_id(),
        event.timestamp(),
        event.label(),
        event.value()
    )
}

/// Labels become file names, so they must not escape the base directory
fn validate_label(label: &str) -> Result<(), ContractError> {
    let invalid = label.is_empty()
        || label == "."
        || label == ".."
        || label.contains(['/', '\\', '\0']);

    if invalid {
        return Err(ContractError::InvalidLabel {
            label: label.to_string(),
        });
    }
    Ok(())
}

impl OutputSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_deliver",
        skip(self, event),
        fields(sink = %self.name, patient_id = %event.patient_id(), label = event.label())
    )]
    async fn deliver(&self, event: &PatientEvent) -> Result<(), ContractError> {
        self.append_event(event)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&self) -> Result<(), ContractError> {
        // Every append is closed before deliver returns
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        debug!(sink = %self.name, labels = self.label_count(), "FileSink closed");
        Ok(())
    }
}
