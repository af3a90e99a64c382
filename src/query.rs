use crate::error::AotError;
use crate::model::{Element, ElementId, ElementKind, WhichRun};
use crate::store::{Graph, lookup_key};
use crate::util::strip_quotes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Which keyed store(s) a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreSelection {
    Cached,
    NotCached,
    #[default]
    Both,
}

impl StoreSelection {
    pub fn includes_cached(self) -> bool {
        matches!(self, StoreSelection::Cached | StoreSelection::Both)
    }

    pub fn includes_external(self) -> bool {
        matches!(self, StoreSelection::NotCached | StoreSelection::Both)
    }
}

impl FromStr for StoreSelection {
    type Err = AotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "cached" => Ok(StoreSelection::Cached),
            "notcached" => Ok(StoreSelection::NotCached),
            "both" => Ok(StoreSelection::Both),
            _ => Err(AotError::InvalidSelection(s.to_string())),
        }
    }
}

/// `all` disables the loaded-run dimension, anything else must name a run.
pub fn parse_loaded(value: &str) -> Result<Option<WhichRun>, AotError> {
    if value.trim().eq_ignore_ascii_case("all") {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

/// Independent, conjunctive selection criteria.
///
/// `None`, empty lists and the `true` defaults of the shape flags all mean
/// "do not restrict on this dimension".
#[derive(Debug, Clone)]
pub struct Filter {
    pub identifier: Option<String>,
    pub address: Option<String>,
    pub packages: Vec<String>,
    pub exclude_packages: Vec<String>,
    pub kinds: Vec<ElementKind>,
    pub show_arrays: bool,
    pub store: StoreSelection,
    pub heap_root: Option<bool>,
    pub aot_inited: Option<bool>,
    pub loaded: Option<WhichRun>,
    pub referencing: Option<String>,
    pub instance_of: Option<String>,
    pub trained: bool,
    pub lambdas: bool,
    pub inner_classes: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            identifier: None,
            address: None,
            packages: Vec::new(),
            exclude_packages: Vec::new(),
            kinds: Vec::new(),
            show_arrays: true,
            store: StoreSelection::Both,
            heap_root: None,
            aot_inited: None,
            loaded: None,
            referencing: None,
            instance_of: None,
            trained: false,
            lambdas: true,
            inner_classes: true,
        }
    }
}

impl Filter {
    pub fn wants_kind(&self, kind: &ElementKind) -> bool {
        self.kinds.is_empty() || self.kinds.iter().any(|k| k.matches(kind.as_str()))
    }

    /// Every dimension except identity (identifier, address) and store selection.
    pub fn accepts(&self, graph: &Graph, element: &Element) -> bool {
        self.wants_kind(&element.kind)
            && self.in_scope(graph, element)
            && self.flags_allow(element)
            && self.relations_allow(graph, element)
    }

    /// Package and class-shape checks; the part of the filter that also prunes trees.
    pub fn in_scope(&self, graph: &Graph, element: &Element) -> bool {
        self.packages_allow(graph, element) && self.shape_allows(element)
    }

    fn packages_allow(&self, graph: &Graph, element: &Element) -> bool {
        let packages = nonblank(&self.packages);
        let excluded = nonblank(&self.exclude_packages);
        if packages.is_empty() && excluded.is_empty() {
            return true;
        }
        let names = package_names(graph, element);
        if !packages.is_empty() {
            let Some(names) = &names else {
                return false;
            };
            if !packages.iter().any(|p| names.iter().any(|n| n.starts_with(p))) {
                return false;
            }
        }
        match &names {
            Some(names) => !excluded.iter().any(|p| names.iter().any(|n| n.starts_with(p))),
            None => true,
        }
    }

    fn shape_allows(&self, element: &Element) -> bool {
        let Some(class) = class_info_for_shape(element) else {
            return true;
        };
        let (is_array, is_lambda, is_inner) = class;
        (self.show_arrays || !is_array || element.kind != ElementKind::Class)
            && (self.lambdas || !is_lambda)
            && (self.inner_classes || !is_inner)
    }

    fn flags_allow(&self, element: &Element) -> bool {
        if let Some(wanted) = self.heap_root {
            if element.heap_root != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.aot_inited {
            match element.as_instance() {
                Some(instance) if instance.aot_inited == wanted => {}
                _ => return false,
            }
        }
        if let Some(run) = self.loaded {
            match element.as_class() {
                Some(class) if class.loaded == run => {}
                _ => return false,
            }
        }
        !self.trained || (element.is_trainable() && element.is_trained())
    }

    fn relations_allow(&self, graph: &Graph, element: &Element) -> bool {
        if let Some(target) = nonblank_str(&self.referencing) {
            let target = strip_quotes(target);
            let hit = element.resolved_references().any(|r| {
                graph
                    .get(r)
                    .is_some_and(|referenced| names_element(referenced, target))
            });
            if !hit {
                return false;
            }
        }
        if let Some(class_name) = nonblank_str(&self.instance_of) {
            let class_name = lookup_key(strip_quotes(class_name), &ElementKind::Class).identifier;
            let hit = element
                .as_instance()
                .and_then(|instance| instance.instance_of)
                .and_then(|class| graph.get(class))
                .is_some_and(|class| class.key() == class_name);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Runs the filter and returns matching ids sorted by (key, kind), without duplicates.
pub fn select(graph: &Graph, filter: &Filter) -> Vec<ElementId> {
    if let Some(address) = nonblank_str(&filter.address) {
        return graph.lookup_by_address(address).into_iter().collect();
    }

    let identifier = nonblank_str(&filter.identifier).map(strip_quotes);
    // `Other` kinds are stored under the dump's spelling, so only the scan matches them
    let keyed = !filter.kinds.is_empty()
        && filter
            .kinds
            .iter()
            .all(|kind| !matches!(kind, ElementKind::Other(_)));
    let mut ids: Vec<ElementId> = match identifier {
        Some(identifier) if keyed => filter
            .kinds
            .iter()
            .filter_map(|kind| {
                let key = lookup_key(identifier, kind);
                match filter.store {
                    StoreSelection::Cached => graph.lookup_cached(&key),
                    StoreSelection::NotCached => graph.lookup_external(&key),
                    StoreSelection::Both => graph.lookup(&key),
                }
            })
            .filter(|id| graph.get(*id).is_some_and(|e| filter.accepts(graph, e)))
            .collect(),
        _ => candidates(graph, filter.store)
            .filter(|e| identifier.is_none_or(|i| names_element(e, i)))
            .filter(|e| filter.accepts(graph, e))
            .map(|e| e.id)
            .collect(),
    };

    sort_by_key_and_kind(graph, &mut ids);
    ids.dedup();
    ids
}

pub fn sort_by_key_and_kind(graph: &Graph, ids: &mut [ElementId]) {
    ids.sort_by(|a, b| {
        let (a, b) = (&graph[*a], &graph[*b]);
        a.key().cmp(b.key()).then_with(|| a.kind.cmp(&b.kind))
    });
}

/// Number of elements per kind in the selected store(s).
pub fn count_by_kind(graph: &Graph, store: StoreSelection) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for element in candidates(graph, store) {
        *counts.entry(element.kind.to_string()).or_insert(0) += 1;
    }
    counts
}

fn candidates(graph: &Graph, store: StoreSelection) -> Box<dyn Iterator<Item = &Element> + '_> {
    match store {
        StoreSelection::Cached => Box::new(graph.cached_elements()),
        StoreSelection::NotCached => Box::new(graph.external_elements()),
        StoreSelection::Both => Box::new(graph.elements()),
    }
}

/// Names a package filter is matched against; `None` for kinds with no package notion.
fn package_names<'g>(graph: &'g Graph, element: &'g Element) -> Option<Vec<&'g str>> {
    match element.kind {
        ElementKind::Class => element.as_class().map(|class| vec![class.package.as_str()]),
        ElementKind::Method => Some(vec![method_package(graph, element)]),
        ElementKind::ConstantPool => Some(vec![element.key()]),
        ElementKind::Object => {
            let key = element.key();
            // Object keys start with the narrow address: "(0xffe94558) java.lang.String ..."
            let typed = match key.strip_prefix('(').and_then(|rest| rest.split_once(") ")) {
                Some((_, rest)) => rest,
                None => key,
            };
            Some(vec![key, typed])
        }
        ref kind if kind.is_profile() => Some(
            element
                .resolved_references()
                .filter_map(|r| graph.get(r))
                .filter_map(|referenced| match referenced.kind {
                    ElementKind::Class => referenced.as_class().map(|c| c.package.as_str()),
                    ElementKind::Method => Some(method_package(graph, referenced)),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn method_package<'g>(graph: &'g Graph, method: &'g Element) -> &'g str {
    method
        .as_method()
        .and_then(|info| info.class)
        .and_then(|class| graph.get(class))
        .and_then(|class| class.as_class())
        .map(|class| class.package.as_str())
        .unwrap_or_else(|| method.key())
}

/// (array, lambda, inner) for Classes and Methods; methods take their owner's name.
fn class_info_for_shape(element: &Element) -> Option<(bool, bool, bool)> {
    match element.kind {
        ElementKind::Class => element
            .as_class()
            .map(|class| (class.is_array(), class.is_lambda(), class.is_inner())),
        ElementKind::Method => {
            let owner = crate::model::MethodInfo::owner_class_name(element.key())?;
            let simple = owner.rsplit('.').next().unwrap_or(owner);
            Some((false, simple.contains("$$Lambda"), simple.contains('$')))
        }
        _ => None,
    }
}

/// JVM names are case-sensitive; only the kind is matched loosely.
fn names_element(element: &Element, identifier: &str) -> bool {
    lookup_key(identifier, &element.kind).identifier == element.key()
}

fn nonblank(values: &[String]) -> Vec<&str> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect()
}

fn nonblank_str(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_selection_accepts_spellings() {
        assert_eq!("cached".parse::<StoreSelection>().unwrap(), StoreSelection::Cached);
        assert_eq!("not-cached".parse::<StoreSelection>().unwrap(), StoreSelection::NotCached);
        assert_eq!("notCached".parse::<StoreSelection>().unwrap(), StoreSelection::NotCached);
        assert_eq!("BOTH".parse::<StoreSelection>().unwrap(), StoreSelection::Both);
        assert!("somewhere".parse::<StoreSelection>().is_err());
    }

    #[test]
    fn loaded_all_means_unrestricted() {
        assert_eq!(parse_loaded("all").unwrap(), None);
        assert_eq!(parse_loaded("training").unwrap(), Some(WhichRun::Training));
        assert!(parse_loaded("sometimes").is_err());
    }

    #[test]
    fn kinds_match_case_insensitively() {
        let filter = Filter {
            kinds: vec![ElementKind::parse("class")],
            ..Filter::default()
        };
        assert!(filter.wants_kind(&ElementKind::Class));
        assert!(!filter.wants_kind(&ElementKind::Symbol));
    }
}
