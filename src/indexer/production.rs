use crate::indexer::Adapter;
use crate::indexer::log_line::LogLine;
use crate::model::{ElementKind, WhichRun};
use crate::store::Graph;
use crate::warnings::{Warning, WarningKind};
use anyhow::Result;

const SOURCE: &str = "Production log";

pub const CLASSES_LOADED: &str = "[LOG] Classes loaded from AOT Cache";
pub const CLASSES_NOT_LOADED: &str = "[LOG] Classes not loaded from AOT Cache";
pub const LAMBDAS_LOADED: &str = "[LOG] Lambda Methods loaded from AOT Cache";
pub const LAMBDAS_NOT_LOADED: &str = "[LOG] Lambda Methods not loaded from AOT Cache";
pub const CODE_ENTRIES_LOADED: &str = "[LOG] [CodeCache] Loaded AOT code entries";
pub const CODE_CACHE_SIZE: &str = "[LOG] [CodeCache] AOT code cache size";

const CACHE_LOAD_FAILURES: [&str; 4] = [
    "The AOT cache was created by a different",
    "An error has occurred while processing the AOT cache",
    "Loading static archive failed.",
    "Unable to map shared spaces",
];

/// Reads the `-Xlog:class+load,aot*` output of a run that uses the cache.
#[derive(Debug, Default)]
pub struct ProductionLogAdapter;

impl ProductionLogAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for ProductionLogAdapter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn accept_line(&mut self, graph: &mut Graph, content: &str) -> Result<()> {
        let line = LogLine::parse(content);
        if line.contains_tags(&["class", "load"]) {
            class_load(graph, &line);
        } else if line.contains_tags(&["aot", "codecache"]) {
            if line.contains_tags(&["init"]) {
                code_cache(graph, line.trimmed_message);
            }
        } else if line.is_level("warning") || line.is_level("error") {
            let message = line.trimmed_message;
            let warning = if CACHE_LOAD_FAILURES.iter().any(|f| message.starts_with(f)) {
                Warning::new(WarningKind::CacheLoad, Vec::new(), message)
            } else {
                Warning::unknown(message)
            };
            graph.warnings.push(warning);
        }
        Ok(())
    }
}

// [info][class,load] java.lang.invoke.DelegatingMethodHandle$Holder source: shared objects file
// [info][class,load] org.acme.Main source: file:/app/lib/app.jar
fn class_load(graph: &mut Graph, line: &LogLine<'_>) {
    let message = line.message;
    if !message.contains(" source: ") {
        return;
    }
    let Some(source_at) = message.find("source: ") else {
        return;
    };
    let class_name = message[..source_at].trim();
    let lambda = class_name.contains("$$Lambda/");
    let class = graph.get_or_create(class_name, ElementKind::Class, None);

    if message[source_at..].starts_with("source: shared objects file") {
        graph.add_to_cache(class, SOURCE);
        graph.statistics.increment(CLASSES_LOADED);
        if lambda {
            graph.statistics.increment(LAMBDAS_LOADED);
        }
    } else {
        graph.add_external(class, SOURCE);
        graph.statistics.increment(CLASSES_NOT_LOADED);
        if lambda {
            graph.statistics.increment(LAMBDAS_NOT_LOADED);
        }
    }
    graph.add_origin(class, format!("Loaded from {}", message[source_at..].trim_end()));
    graph.mark_loaded(class, WhichRun::Production);
}

// Loaded 493 AOT code entries from AOT Code Cache
//   Adapters:  total=493
//   AOT code cache size: 598432 bytes
fn code_cache(graph: &mut Graph, message: &str) {
    if let Some(rest) = message.strip_prefix("Loaded ") {
        if message.ends_with("AOT code entries from AOT Code Cache") {
            let count = rest.split(' ').next().unwrap_or_default();
            graph.statistics.add(CODE_ENTRIES_LOADED, count);
            return;
        }
    }
    if let Some(total) = message.find(" total=") {
        if let Some(colon) = message.find(':') {
            let name = message[..colon].trim();
            let value = message[total + " total=".len()..].trim();
            graph
                .statistics
                .add(&format!("[LOG] [CodeCache] Loaded {name}"), value);
        }
    } else if let Some(size) = message.strip_prefix("AOT code cache size:") {
        graph.statistics.add(CODE_CACHE_SIZE, size.trim());
    }
}
