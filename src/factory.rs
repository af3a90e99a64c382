use crate::indexer::descriptor::{class_name_from_symbol, slash_name};
use crate::model::{ElementId, ElementKind, MethodInfo, Ref, WhichRun};
use crate::store::{Graph, lookup_key};
use std::collections::HashSet;

/// Outcome of one placeholder resolution pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: usize,
    pub dropped: usize,
}

impl Graph {
    /// Returns the entity for `(identifier, kind)`, creating it in the external store
    /// when neither store knows it. New Methods are attached to their owning Class and
    /// new Classes/Symbols are linked to any counterpart that already exists.
    pub fn get_or_create(
        &mut self,
        identifier: &str,
        kind: impl Into<ElementKind>,
        address: Option<&str>,
    ) -> ElementId {
        let kind = kind.into();
        if let Some(id) = self.lookup(&lookup_key(identifier, &kind)) {
            return id;
        }
        let id = self.insert_new(identifier.trim(), kind.clone(), address);
        match kind {
            ElementKind::Method => {
                if let Some(owner) = MethodInfo::owner_class_name(identifier) {
                    let owner = owner.to_string();
                    let class = self.get_or_create(&owner, ElementKind::Class, None);
                    self.link_method(class, id);
                }
            }
            ElementKind::Class => {
                let key = self[id].key().to_string();
                let slashed = slash_name(&key);
                let descriptor = format!("L{slashed};");
                for candidate in [key, slashed, descriptor] {
                    if let Some(symbol) = self.find(&candidate, ElementKind::Symbol) {
                        self.link_symbol(id, symbol);
                    }
                }
            }
            ElementKind::Symbol => {
                let class_name = class_name_from_symbol(identifier);
                if let Some(class) = self.find(&class_name, ElementKind::Class) {
                    self.link_symbol(class, id);
                }
            }
            _ => {}
        }
        id
    }

    pub fn add_source(&mut self, id: ElementId, source: &str) {
        if let Some(element) = self.get_mut(id) {
            element.add_source(source);
        }
    }

    pub fn add_origin(&mut self, id: ElementId, origin: impl Into<String>) {
        if let Some(element) = self.get_mut(id) {
            element.add_origin(origin);
        }
    }

    /// Idempotent. Self-edges and edges out of non-referencing kinds are ignored.
    pub fn add_reference(&mut self, from: ElementId, to: ElementId) -> bool {
        if from == to || self.get(to).is_none() {
            return false;
        }
        let Some(source) = self.get_mut(from) else {
            return false;
        };
        if !source.is_referencing() || source.references.contains(&Ref::Resolved(to)) {
            return false;
        }
        source.references.push(Ref::Resolved(to));
        self[to].referrers.insert(from);
        true
    }

    /// Records an edge to an address whose owner may not have been declared yet.
    pub fn add_pending_reference(&mut self, from: ElementId, address: &str) {
        let Some(source) = self.get_mut(from) else {
            return;
        };
        let pending = Ref::Pending(address.to_string());
        if source.is_referencing() && !source.references.contains(&pending) {
            source.references.push(pending);
        }
    }

    /// The Class lists the Symbol and the Symbol references the Class.
    pub fn link_symbol(&mut self, class: ElementId, symbol: ElementId) {
        if let Some(info) = self.get_mut(class).and_then(|c| c.as_class_mut()) {
            if !info.symbols.contains(&symbol) {
                info.symbols.push(symbol);
            }
        } else {
            return;
        }
        self[symbol].referrers.insert(class);
        self.add_reference(symbol, class);
    }

    pub fn link_method(&mut self, class: ElementId, method: ElementId) {
        if let Some(info) = self.get_mut(class).and_then(|c| c.as_class_mut()) {
            if !info.methods.contains(&method) {
                info.methods.push(method);
            }
        } else {
            return;
        }
        if let Some(info) = self.get_mut(method).and_then(|m| m.as_method_mut()) {
            info.class = Some(class);
        }
        self[method].referrers.insert(class);
    }

    pub fn set_pool_holder(&mut self, pool: ElementId, class: ElementId) {
        if let Some(info) = self.get_mut(pool).and_then(|p| p.as_constant_pool_mut()) {
            info.pool_holder = Some(class);
            self[class].referrers.insert(pool);
        }
    }

    pub fn set_cache_address(&mut self, pool: ElementId, address: &str) {
        if let Some(info) = self.get_mut(pool).and_then(|p| p.as_constant_pool_mut()) {
            info.cache_address = Some(address.to_string());
        }
    }

    pub fn set_instance_of(&mut self, object: ElementId, class: ElementId) {
        if let Some(info) = self.get_mut(object).and_then(|o| o.as_instance_mut()) {
            info.instance_of = Some(class);
        }
        self.add_reference(object, class);
    }

    pub fn set_aot_inited(&mut self, object: ElementId) {
        if let Some(info) = self.get_mut(object).and_then(|o| o.as_instance_mut()) {
            info.aot_inited = true;
        }
    }

    pub fn set_klass_training_data(&mut self, class: ElementId, ktd: ElementId) {
        if let Some(info) = self.get_mut(class).and_then(|c| c.as_class_mut()) {
            info.klass_training_data = Some(ktd);
        }
        self.add_reference(ktd, class);
    }

    /// Attaches a MethodCounters, MethodData or MethodTrainingData node to its Method.
    pub fn set_method_profile(&mut self, method: ElementId, profile: ElementId) {
        let kind = self[profile].kind.clone();
        let Some(info) = self.get_mut(method).and_then(|m| m.as_method_mut()) else {
            return;
        };
        match kind {
            ElementKind::MethodCounters => info.method_counters = Some(profile),
            ElementKind::MethodData => info.method_data = Some(profile),
            ElementKind::MethodTrainingData => info.method_training_data = Some(profile),
            _ => return,
        }
        self.add_reference(profile, method);
    }

    pub fn add_compile_training_data(&mut self, method: ElementId, tier: u8, ctd: ElementId) {
        if let Some(info) = self.get_mut(method).and_then(|m| m.as_method_mut()) {
            info.compile_training_data.insert(tier, ctd);
        }
        self.add_reference(ctd, method);
    }

    pub fn set_const_method(&mut self, method: ElementId, const_method: ElementId) {
        if let Some(info) = self.get_mut(method).and_then(|m| m.as_method_mut()) {
            info.const_method = Some(const_method);
            self[const_method].referrers.insert(method);
        }
    }

    pub fn mark_loaded(&mut self, class: ElementId, run: WhichRun) {
        if let Some(info) = self.get_mut(class).and_then(|c| c.as_class_mut()) {
            info.loaded = info.loaded.mark(run);
        }
    }

    /// `Outer$$Lambda/0x…` references `Outer`.
    pub fn link_enclosing_class(&mut self, class: ElementId) {
        let key = self[class].key().to_string();
        if let Some(idx) = key.find("$$") {
            let outer = self.get_or_create(&key[..idx], ElementKind::Class, None);
            self.add_reference(class, outer);
        }
    }

    /// Replaces every pending address reference with the element now indexed at that
    /// address. References that still cannot be resolved are dropped.
    pub fn resolve_placeholders(&mut self) -> Resolution {
        let owners: Vec<ElementId> = self
            .elements()
            .filter(|e| e.has_pending_references())
            .map(|e| e.id)
            .collect();
        self.resolve_placeholders_for(&owners)
    }

    /// Same as [`Graph::resolve_placeholders`], limited to `owners`. Pending references
    /// held by any other element are left for whoever recorded them.
    pub fn resolve_placeholders_for(&mut self, owners: &[ElementId]) -> Resolution {
        let mut outcome = Resolution::default();
        for &owner in owners {
            if !self.get(owner).is_some_and(|e| e.has_pending_references()) {
                continue;
            }
            let references = std::mem::take(&mut self[owner].references);
            let mut seen: HashSet<ElementId> = HashSet::new();
            let mut resolved = Vec::with_capacity(references.len());
            let mut targets = Vec::new();
            for reference in references {
                let target = match reference {
                    Ref::Resolved(id) => Some(id),
                    Ref::Pending(address) => match self.lookup_by_address(&address) {
                        Some(id) => {
                            outcome.resolved += 1;
                            targets.push(id);
                            Some(id)
                        }
                        None => {
                            outcome.dropped += 1;
                            None
                        }
                    },
                };
                if let Some(id) = target {
                    if id != owner && seen.insert(id) {
                        resolved.push(Ref::Resolved(id));
                    }
                }
            }
            self[owner].references = resolved;
            for target in targets {
                if target != owner {
                    self[target].referrers.insert(owner);
                }
            }
        }
        if outcome.dropped > 0 {
            tracing::debug!(dropped = outcome.dropped, "unresolved addresses dropped");
        }
        outcome
    }

    /// Outgoing references ordered by kind, then key.
    pub fn sorted_references(&self, id: ElementId) -> Vec<ElementId> {
        let Some(element) = self.get(id) else {
            return Vec::new();
        };
        let mut refs: Vec<ElementId> = element.resolved_references().collect();
        refs.sort_by(|a, b| {
            let (a, b) = (&self[*a], &self[*b]);
            a.kind.cmp(&b.kind).then_with(|| a.key().cmp(b.key()))
        });
        refs
    }

    /// Methods of a class, untrained ones first, then by key.
    pub fn class_methods(&self, class: ElementId) -> Vec<ElementId> {
        let Some(info) = self.get(class).and_then(|c| c.as_class()) else {
            return Vec::new();
        };
        let mut methods = info.methods.clone();
        methods.sort_by(|a, b| {
            let (a, b) = (&self[*a], &self[*b]);
            a.is_trained()
                .cmp(&b.is_trained())
                .then_with(|| a.key().cmp(b.key()))
        });
        methods
    }

    pub fn class_symbols(&self, class: ElementId) -> Vec<ElementId> {
        let Some(info) = self.get(class).and_then(|c| c.as_class()) else {
            return Vec::new();
        };
        let mut symbols = info.symbols.clone();
        symbols.sort_by(|a, b| self[*a].key().cmp(self[*b].key()));
        symbols
    }

    pub fn sorted_referrers(&self, id: ElementId) -> Vec<ElementId> {
        let Some(element) = self.get(id) else {
            return Vec::new();
        };
        let mut refs: Vec<ElementId> = element.referrers.iter().copied().collect();
        refs.sort_by(|a, b| {
            let (a, b) = (&self[*a], &self[*b]);
            a.kind.cmp(&b.kind).then_with(|| a.key().cmp(b.key()))
        });
        refs
    }
}
