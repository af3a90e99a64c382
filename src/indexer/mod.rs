use crate::config::Config;
use crate::error::AotError;
use crate::store::{Graph, Store};
use crate::util;
use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

pub mod descriptor;
pub mod log_line;
pub mod map_dump;
pub mod production;
pub mod training;

static BACKGROUND_LOADS: AtomicUsize = AtomicUsize::new(0);

/// Turns lines of one input format into graph mutations.
///
/// `accept_line` may fail on a malformed line; the loader logs and skips it.
/// `finish` runs once, after the last line of the file.
pub trait Adapter: Send {
    fn source(&self) -> &'static str;

    fn accept_line(&mut self, graph: &mut Graph, line: &str) -> Result<()>;

    fn finish(&mut self, _graph: &mut Graph) -> Result<()> {
        Ok(())
    }

    /// Non-fatal problems found while reading, reported with the load.
    fn take_diagnostics(&mut self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadKind {
    AotMap,
    TrainingLog,
    ProductionLog,
}

impl LoadKind {
    pub fn adapter(self) -> Box<dyn Adapter> {
        match self {
            LoadKind::AotMap => Box::new(map_dump::MapDumpAdapter::new()),
            LoadKind::TrainingLog => Box::new(training::TrainingLogAdapter::new()),
            LoadKind::ProductionLog => Box::new(production::ProductionLogAdapter::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub path: PathBuf,
    pub kind: LoadKind,
    pub lines: usize,
    pub skipped: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadReport {
    fn new(path: &Path, kind: LoadKind) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            lines: 0,
            skipped: 0,
            elapsed_ms: 0,
            diagnostics: Vec::new(),
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Feeds in-memory lines through an adapter. Used by tests and by `load_file`.
pub fn load_lines<'a, I>(store: &Store, kind: LoadKind, lines: I) -> LoadReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut adapter = kind.adapter();
    let mut report = LoadReport::new(Path::new("<memory>"), kind);
    let started = Instant::now();
    for line in lines {
        apply_line(store, adapter.as_mut(), line, &mut report);
    }
    finish(store, adapter.as_mut(), &mut report);
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    report
}

/// Streams a file through the adapter for `kind`. I/O failures end up in the report,
/// never as a panic or an early return, so one bad file does not stop a batch.
pub fn load_file(store: &Store, path: &Path, kind: LoadKind) -> LoadReport {
    let mut report = LoadReport::new(path, kind);
    let started = Instant::now();
    tracing::info!(path = %path.display(), ?kind, "loading file");

    if let Err(err) = stream_file(store, path, kind, &mut report) {
        tracing::error!(path = %path.display(), "{err}");
        report.error = Some(err.to_string());
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        path = %path.display(),
        lines = report.lines,
        skipped = report.skipped,
        elapsed_ms = report.elapsed_ms,
        "file loaded"
    );
    report
}

/// Same as `load_file` on a named worker thread.
pub fn spawn_load(
    store: Store,
    path: PathBuf,
    kind: LoadKind,
) -> std::io::Result<thread::JoinHandle<LoadReport>> {
    let n = BACKGROUND_LOADS.fetch_add(1, Ordering::Relaxed);
    thread::Builder::new()
        .name(format!("loading-file-{n}"))
        .spawn(move || load_file(&store, &path, kind))
}

/// Waits for a background load; a panicking loader becomes an error report.
pub fn join_load(
    handle: thread::JoinHandle<LoadReport>,
    path: &Path,
    kind: LoadKind,
) -> LoadReport {
    match handle.join() {
        Ok(report) => report,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let mut report = LoadReport::new(path, kind);
            report.error = Some(AotError::LoaderPanicked(message).to_string());
            report
        }
    }
}

/// Large files block the caller for a while; suggest running them in the background.
pub fn large_file_advice(path: &Path) -> Option<String> {
    let threshold = Config::get().large_file_mb.saturating_mul(1024 * 1024);
    let size = util::file_len(path).ok()?;
    if threshold > 0 && size > threshold {
        Some(format!(
            "{} is {} MB; consider loading it with --background",
            path.display(),
            size / (1024 * 1024)
        ))
    } else {
        None
    }
}

fn stream_file(
    store: &Store,
    path: &Path,
    kind: LoadKind,
    report: &mut LoadReport,
) -> Result<(), AotError> {
    let file = File::open(path).map_err(|source| AotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut adapter = kind.adapter();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| AotError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        apply_line(store, adapter.as_mut(), line, report);
    }
    finish(store, adapter.as_mut(), report);
    Ok(())
}

fn apply_line(store: &Store, adapter: &mut dyn Adapter, line: &str, report: &mut LoadReport) {
    report.lines += 1;
    let mut graph = store.write();
    if let Err(err) = adapter.accept_line(&mut graph, line) {
        report.skipped += 1;
        tracing::debug!(source = adapter.source(), line, "skipped line: {err:#}");
    }
}

fn finish(store: &Store, adapter: &mut dyn Adapter, report: &mut LoadReport) {
    {
        let mut graph = store.write();
        if let Err(err) = adapter.finish(&mut graph) {
            tracing::warn!(source = adapter.source(), "post-processing failed: {err:#}");
            report.diagnostics.push(format!("post-processing failed: {err}"));
        }
    }
    report.diagnostics.extend(adapter.take_diagnostics());
}
