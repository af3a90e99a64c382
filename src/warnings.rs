use crate::model::{ElementKind, Key};
use crate::store::Graph;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    CacheCreation,
    CacheCreationRevertedField,
    CacheCreationRevertedIndy,
    CacheCreationRevertedKlass,
    CacheCreationRevertedMethod,
    CacheLoad,
    Training,
    Unknown,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A problem storing or loading elements to or from the cache. The id is assigned
/// when the warning is recorded in a [`WarningLog`].
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub id: String,
    pub kind: WarningKind,
    pub affected: Vec<Key>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, affected: Vec<Key>, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind,
            affected,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Unknown, Vec::new(), message)
    }

    pub fn affects(&self, name: &str) -> bool {
        let name = name.trim();
        self.affected
            .iter()
            .any(|key| key.identifier.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.kind, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    entries: Vec<Warning>,
    auto: Vec<Warning>,
    next_id: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WarningQuery {
    pub name: Option<String>,
    pub limit: Option<usize>,
}

impl WarningLog {
    fn assign_id(&mut self, warning: &mut Warning) {
        warning.id = format!("{:04}", self.next_id);
        self.next_id += 1;
    }

    pub fn push(&mut self, mut warning: Warning) {
        self.assign_id(&mut warning);
        tracing::debug!(id = %warning.id, kind = %warning.kind, "recorded warning");
        self.entries.push(warning);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.entries.iter()
    }

    /// Warnings produced by checks rather than by ingestion.
    pub fn auto(&self) -> &[Warning] {
        &self.auto
    }

    pub fn replace_auto(&mut self, mut warnings: Vec<Warning>) {
        for warning in &mut warnings {
            self.assign_id(warning);
        }
        self.auto = warnings;
    }

    /// Ingestion warnings first, then check results; filtered by name, then truncated.
    pub fn query(&self, query: &WarningQuery) -> Vec<&Warning> {
        let name = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let matching = self
            .entries
            .iter()
            .chain(self.auto.iter())
            .filter(|w| name.is_none_or(|n| w.affects(n)));
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    /// Forgets every warning; ids start again from `0000`.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.auto.clear();
        self.next_id = 0;
    }
}

/// Methods that were invoked during training (they own MethodCounters) but never
/// got compile training data, grouped by package. Returns one warning per package
/// for the `top` packages with the most such methods.
pub fn used_and_not_trained(graph: &Graph, top: usize) -> Vec<Warning> {
    let mut by_package: BTreeMap<String, Vec<Key>> = BTreeMap::new();
    for element in graph.elements().filter(|e| e.kind == ElementKind::Method) {
        let Some(method) = element.as_method() else {
            continue;
        };
        if method.method_counters.is_none() || !method.compile_training_data.is_empty() {
            continue;
        }
        let package = method
            .class
            .and_then(|class| graph.get(class))
            .and_then(|class| class.as_class())
            .map(|info| info.package.clone())
            .unwrap_or_default();
        by_package
            .entry(package)
            .or_default()
            .push(element.full_key());
    }

    let mut packages: Vec<(String, Vec<Key>)> = by_package.into_iter().collect();
    packages.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
    packages
        .into_iter()
        .take(top)
        .map(|(package, mut methods)| {
            methods.sort();
            let package = if package.is_empty() {
                "<default>".to_string()
            } else {
                package
            };
            let message = format!(
                "Package '{}' contains {} methods that were used during training but not compiled.",
                package,
                methods.len()
            );
            Warning::new(WarningKind::Training, methods, message)
        })
        .collect()
}
