use crate::model::{ClassInfo, Element, ElementId, ElementKind, Key};
use crate::stats::Bag;
use crate::warnings::WarningLog;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{HashMap, HashSet};
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Every entity lives in the arena; the two keyed stores only hold ids.
/// An id is in exactly one of `cached` and `external`.
#[derive(Debug, Default)]
pub struct Graph {
    elements: Vec<Element>,
    cached: HashMap<Key, ElementId>,
    external: HashMap<Key, ElementId>,
    by_address: HashMap<String, ElementId>,
    pending_heap_roots: HashSet<String>,
    heap_root: Option<ElementId>,
    pub configuration: Bag,
    pub statistics: Bag,
    pub allocation: Bag,
    pub warnings: WarningLog,
}

/// Builds the lookup key the same way the element computes its display key.
pub fn lookup_key(identifier: &str, kind: &ElementKind) -> Key {
    let identifier = identifier.trim();
    match kind {
        ElementKind::Class => Key::new(ClassInfo::parse(identifier).key(), ElementKind::Class),
        _ => Key::new(identifier, kind.clone()),
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0)
    }

    /// Allocates a new element in the arena and files it in the external store.
    /// Callers go through `get_or_create`, which checks both stores first.
    pub(crate) fn insert_new(
        &mut self,
        identifier: &str,
        kind: ElementKind,
        address: Option<&str>,
    ) -> ElementId {
        let id = ElementId(self.elements.len());
        let mut element = Element::new(id, identifier, kind);
        element.address = address.map(str::to_string);
        self.external.insert(element.full_key(), id);
        if let Some(address) = address {
            self.index_address(address, id);
        }
        self.elements.push(element);
        id
    }

    /// Cached entries win over external ones.
    pub fn lookup(&self, key: &Key) -> Option<ElementId> {
        self.cached
            .get(key)
            .or_else(|| self.external.get(key))
            .copied()
    }

    pub fn lookup_cached(&self, key: &Key) -> Option<ElementId> {
        self.cached.get(key).copied()
    }

    pub fn lookup_external(&self, key: &Key) -> Option<ElementId> {
        self.external.get(key).copied()
    }

    pub fn find(&self, identifier: &str, kind: impl Into<ElementKind>) -> Option<ElementId> {
        self.lookup(&lookup_key(identifier, &kind.into()))
    }

    pub fn find_element(&self, identifier: &str, kind: impl Into<ElementKind>) -> Option<&Element> {
        self.find(identifier, kind).and_then(|id| self.get(id))
    }

    pub fn is_cached(&self, id: ElementId) -> bool {
        self.get(id)
            .map(|e| self.cached.get(&e.full_key()) == Some(&id))
            .unwrap_or(false)
    }

    /// Promotes the element into the cache store, dropping any external entry with the same key.
    pub fn add_to_cache(&mut self, id: ElementId, source: &str) {
        let Some(element) = self.elements.get_mut(id.0) else {
            return;
        };
        element.add_source(source);
        let key = element.full_key();
        let address = element.address.clone();
        if let Some(previous) = self.external.remove(&key) {
            if previous != id {
                tracing::debug!(key = %key, "replacing external element with cached one");
            }
        }
        self.cached.insert(key, id);
        if let Some(address) = address {
            self.index_address(&address, id);
            if self.pending_heap_roots.remove(&address) {
                self.mark_heap_root(id);
            }
        }
    }

    /// No-op on the store when the key is already cached; the source is still recorded.
    pub fn add_external(&mut self, id: ElementId, source: &str) {
        let Some(element) = self.elements.get_mut(id.0) else {
            return;
        };
        element.add_source(source);
        let key = element.full_key();
        let address = element.address.clone();
        if self.cached.contains_key(&key) {
            return;
        }
        self.external.insert(key, id);
        if let Some(address) = address {
            self.index_address(&address, id);
        }
    }

    /// First element to claim an address keeps it.
    pub fn index_address(&mut self, address: &str, id: ElementId) {
        self.by_address.entry(address.to_string()).or_insert(id);
    }

    pub fn lookup_by_address(&self, address: &str) -> Option<ElementId> {
        self.by_address.get(address).copied()
    }

    pub fn add_pending_heap_root(&mut self, address: &str) {
        self.pending_heap_roots.insert(address.to_string());
    }

    pub fn is_pending_heap_root(&self, address: &str) -> bool {
        self.pending_heap_roots.contains(address)
    }

    pub fn heap_root(&self) -> Option<ElementId> {
        self.heap_root
    }

    pub fn set_heap_root_aggregate(&mut self, id: ElementId) {
        self.heap_root = Some(id);
        if let Some(element) = self.elements.get_mut(id.0) {
            element.heap_root = true;
        }
    }

    /// Flags the element and hangs it off the heap-root aggregate when one exists.
    pub fn mark_heap_root(&mut self, id: ElementId) {
        if let Some(element) = self.elements.get_mut(id.0) {
            element.heap_root = true;
        }
        if let Some(root) = self.heap_root {
            self.add_reference(root, id);
        }
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.cached.clear();
        self.external.clear();
        self.by_address.clear();
        self.pending_heap_roots.clear();
        self.heap_root = None;
        self.configuration.clear();
        self.statistics.clear();
        self.allocation.clear();
        self.warnings.clear();
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn cached_elements(&self) -> impl Iterator<Item = &Element> {
        self.cached.values().filter_map(|id| self.get(*id))
    }

    pub fn external_elements(&self) -> impl Iterator<Item = &Element> {
        self.external.values().filter_map(|id| self.get(*id))
    }

    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    pub fn external_len(&self) -> usize {
        self.external.len()
    }

    pub fn count_cached(&self, kind: &ElementKind) -> usize {
        self.cached.keys().filter(|key| &key.kind == kind).count()
    }

    pub fn count_external(&self, kind: &ElementKind) -> usize {
        self.external.keys().filter(|key| &key.kind == kind).count()
    }
}

impl Index<ElementId> for Graph {
    type Output = Element;

    fn index(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }
}

impl IndexMut<ElementId> for Graph {
    fn index_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }
}

/// Shared handle to one session's graph. Clones point at the same graph.
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<Graph>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Graph> {
        self.inner.write()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
