use crate::indexer::Adapter;
use crate::indexer::descriptor::{
    class_name_from_symbol, generic_class_names, parameter_types, slash_name,
    split_method_descriptor,
};
use crate::model::{ElementId, ElementKind, WhichRun};
use crate::store::Graph;
use anyhow::{Context, Result, anyhow, bail};
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::LazyLock;

const SOURCE: &str = "AOT Map";

// 0x0000000800868d58: @@ Class             520 java.lang.constant.ClassDesc
// 0x00000008049a8410: @@ Misc data 1985520 bytes
// 0x00000000fff69c68: @@ Object (0xfff69c68) [B length: 45
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<address>0[xX][0-9a-fA-F]+): @@ (?P<kind>\w+)(?: data)?\s+(?P<mini>\(0[xX][0-9a-fA-F]+\))?(?P<size>\d+)?\s*(?P<identifier>.*)$",
    )
    .unwrap()
});

//  - klass: 'java/lang/Integer'[] 0x000000080081be80
static KLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ - klass: '(?P<class>[\w+/$?]+)'(?P<dims>(?:\[\])*) (?P<address>0[xX][0-9a-fA-F]+)$")
        .unwrap()
});

//  - klass: {type array byte} 0x00000008007f08c0
static KLASS_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ - klass: \{.*\} (?P<address>0[xX][0-9a-fA-F]+)$").unwrap()
});

//  -   0: 0x00000000ffe5c700 (0xffe5c700) java.lang.Integer
static ARRAY_SLOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ -\s*\d+: (?P<address>0[xX][0-9a-fA-F]+) .+$").unwrap()
});

//  root[   0]: 0x00000000ffd05450 (0xffd05450) [Ljava.lang.Integer; length: 256
static HEAP_ROOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ roots?\[\s*\d+\]: (?P<address>0[xX][0-9a-fA-F]+) \(0.*\) (?P<description>.+)$")
        .unwrap()
});

//  - resolved_references: 0x00000000ffd5dd18 (0xffd5dd18) [Ljava.lang.Object; length: 2
static RESOLVED_REFERENCES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ - resolved_references: (?P<address>0[xX][0-9a-fA-F]+)\s+\((?P<mini>0[xX][0-9a-fA-F]+)?\).*$",
    )
    .unwrap()
});

//  - private final 'sequence' 'Ljava/util/List;' @16 0x00000000ffd07550 (0xffd07550) java.util.ArrayList
static FIELD_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ - (?P<modifiers>[a-z\s]+)'(?P<variable>.+)'\s+'\[*[\[L](?P<classname>[^;']+);?'\s+(?P<index>@\d*)\s+\(?(?P<address>0[xX][0-9a-fA-F]+)?\)?\s*\(?(?P<mini>0[xX][0-9a-fA-F]+)?\)?(?P<end>.*)$",
    )
    .unwrap()
});

//  - injected 'klass' 'J' @16  34368850440 (0x00000008008b0a08)
static FIELD_PRIMITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ - (?P<modifiers>[a-z\s]+)'(?P<variable>.+)'\s+'(?P<classname>[^;']+)'\s+(?P<index>@\d*)\s*(?P<value>[^ ]+)\s*\(?(?P<address>0[xX][0-9a-fA-F]+)?\)?\s*\(?(?P<mini>0[xX][0-9a-fA-F]+)?\)?.*$",
    )
    .unwrap()
});

/// Reads the output of `-XX:AOTMapFile`. Header lines declare cache entities, the
/// indented lines after a header describe that entity.
#[derive(Debug, Default)]
pub struct MapDumpAdapter {
    current: Option<ElementId>,
    diagnostics: Vec<String>,
    // elements holding addresses this file has not resolved yet
    pending_owners: BTreeSet<ElementId>,
}

impl MapDumpAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn header(&mut self, graph: &mut Graph, caps: &Captures<'_>) -> Result<()> {
        let address = &caps["address"];
        let kind = &caps["kind"];
        let identifier = caps.name("identifier").map_or("", |m| m.as_str()).trim();
        let mini = caps.name("mini").map_or("", |m| m.as_str());
        let size = match caps.name("size") {
            Some(size) => Some(
                size.as_str()
                    .parse::<u64>()
                    .with_context(|| format!("size at {address}"))?,
            ),
            None => None,
        };

        let mut claims_address = true;
        let id = match ElementKind::parse(kind) {
            ElementKind::Class => class(graph, identifier, address),
            ElementKind::Method => graph.get_or_create(identifier, ElementKind::Method, Some(address)),
            ElementKind::ConstMethod => {
                let const_method =
                    graph.get_or_create(identifier, ElementKind::ConstMethod, Some(address));
                let method = graph.get_or_create(identifier, ElementKind::Method, None);
                graph.set_const_method(method, const_method);
                const_method
            }
            ElementKind::Symbol => symbol(graph, identifier, address),
            kind @ (ElementKind::MethodCounters
            | ElementKind::MethodData
            | ElementKind::MethodTrainingData) => {
                method_profile(graph, identifier, address, kind)
            }
            ElementKind::ConstantPool => constant_pool(graph, identifier, Some(address)),
            ElementKind::KlassTrainingData => klass_training_data(graph, identifier, address),
            ElementKind::CompileTrainingData => {
                compile_training_data(graph, identifier, address)?
            }
            ElementKind::Object => object(graph, identifier, mini, address),
            ElementKind::Other(kind) if kind.eq_ignore_ascii_case("ConstantPoolCache") => {
                claims_address = false;
                let pool = match graph.find(identifier, ElementKind::ConstantPool) {
                    Some(pool) => pool,
                    None => {
                        let pool = constant_pool(graph, identifier, None);
                        graph.add_source(pool, "Referenced by a ConstantPoolCache.");
                        pool
                    }
                };
                graph.set_cache_address(pool, address);
                pool
            }
            ElementKind::Other(kind) if kind.eq_ignore_ascii_case("Misc") => {
                graph.get_or_create(address, "Misc-data", Some(address))
            }
            ElementKind::Other(kind)
                if kind.starts_with("TypeArray")
                    || ["AdapterFingerPrint", "AdapterHandlerEntry", "RecordComponent", "Annotations"]
                        .iter()
                        .any(|k| k.eq_ignore_ascii_case(&kind)) =>
            {
                let key = if identifier.is_empty() { address } else { identifier };
                graph.get_or_create(key, ElementKind::Other(kind), Some(address))
            }
            other => {
                tracing::debug!(kind = %other, address, "unidentified element");
                graph.get_or_create(address, other, Some(address))
            }
        };

        let element = &mut graph[id];
        if claims_address && element.address.is_none() {
            element.address = Some(address.to_string());
        }
        if size.is_some() {
            element.size = size;
        }
        graph.add_to_cache(id, SOURCE);
        self.current = Some(id);
        Ok(())
    }

    fn pending(&mut self, graph: &mut Graph, owner: ElementId, address: &str) {
        graph.add_pending_reference(owner, address);
        self.pending_owners.insert(owner);
    }

    fn current(&self) -> Result<ElementId> {
        self.current.ok_or_else(|| anyhow!("detail line before any header"))
    }

    fn klass(&mut self, graph: &mut Graph, caps: &Captures<'_>) -> Result<()> {
        let current = self.current()?;
        let address = &caps["address"];
        let dims = caps.name("dims").map_or(0, |m| m.as_str().len() / 2);
        let dotted = caps["class"].replace('/', ".");
        let expected = if dims == 0 {
            dotted
        } else {
            format!("{}L{};", "[".repeat(dims), dotted)
        };
        match graph.lookup_by_address(address) {
            None => self.pending(graph, current, address),
            Some(found) => {
                let element = &graph[found];
                if element.kind != ElementKind::Class
                    || !element.key().eq_ignore_ascii_case(&expected)
                {
                    let message = format!(
                        "Was expecting class {expected} at address {address} but found {element}"
                    );
                    tracing::warn!("{message}");
                    self.diagnostics.push(message);
                } else {
                    graph.add_reference(current, found);
                }
            }
        }
        Ok(())
    }

    fn klass_array(&mut self, graph: &mut Graph, address: &str) -> Result<()> {
        let current = self.current()?;
        match graph.lookup_by_address(address) {
            Some(found) => {
                graph.add_reference(current, found);
            }
            None => self.pending(graph, current, address),
        }
        Ok(())
    }

    fn field(&mut self, graph: &mut Graph, caps: &Captures<'_>) -> Result<()> {
        let current = self.current()?;
        match caps.name("address") {
            Some(address) => self.pending(graph, current, address.as_str()),
            None => {
                let class_name = caps["classname"].replace('/', ".");
                if let Some(class) = graph.find(&class_name, ElementKind::Class) {
                    graph.add_reference(current, class);
                }
            }
        }

        let end = caps.name("end").map_or("", |m| m.as_str()).trim();
        if let Some(described) = end.strip_prefix("java.lang.Class") {
            let described = described.trim_start();
            let described = match described.find(';') {
                Some(semi) => &described[..=semi],
                None => described.split_whitespace().next().unwrap_or(""),
            };
            if let Some(symbol) = graph.find(described, ElementKind::Symbol) {
                graph.add_reference(current, symbol);
            }
        } else if !end.is_empty() && !end.eq_ignore_ascii_case("null") && !end.contains(' ') {
            // the runtime type may be a subclass of the declared one
            if let Some(class) = graph.find(end, ElementKind::Class) {
                graph.add_reference(current, class);
            }
        }
        Ok(())
    }

    fn heap_root(&mut self, graph: &mut Graph, address: &str) -> Result<()> {
        let current = self.current()?;
        if !graph[current].heap_root {
            graph.set_heap_root_aggregate(current);
            self.pending(graph, current, address);
        }
        match graph.lookup_by_address(address) {
            Some(root) => graph.mark_heap_root(root),
            None => graph.add_pending_heap_root(address),
        }
        Ok(())
    }
}

impl Adapter for MapDumpAdapter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn accept_line(&mut self, graph: &mut Graph, line: &str) -> Result<()> {
        if let Some(caps) = HEADER.captures(line) {
            return self.header(graph, &caps);
        }
        if let Some(caps) = KLASS.captures(line) {
            return self.klass(graph, &caps);
        }
        if let Some(caps) = KLASS_ARRAY.captures(line) {
            return self.klass_array(graph, &caps["address"]);
        }
        if let Some(caps) = FIELD_CLASS.captures(line) {
            return self.field(graph, &caps);
        }
        if let Some(caps) = FIELD_PRIMITIVE.captures(line) {
            if let Some(address) = caps.name("address") {
                let current = self.current()?;
                self.pending(graph, current, address.as_str());
            }
            return Ok(());
        }
        if let Some(caps) = ARRAY_SLOT.captures(line) {
            let current = self.current()?;
            self.pending(graph, current, &caps["address"]);
            return Ok(());
        }
        if let Some(caps) = RESOLVED_REFERENCES.captures(line) {
            let current = self.current()?;
            self.pending(graph, current, &caps["address"]);
            return Ok(());
        }
        if let Some(caps) = HEAP_ROOT.captures(line) {
            return self.heap_root(graph, &caps["address"]);
        }
        Ok(())
    }

    fn finish(&mut self, graph: &mut Graph) -> Result<()> {
        let owners: Vec<ElementId> = std::mem::take(&mut self.pending_owners)
            .into_iter()
            .collect();
        let outcome = graph.resolve_placeholders_for(&owners);
        tracing::debug!(
            resolved = outcome.resolved,
            dropped = outcome.dropped,
            "placeholders resolved"
        );
        self.current = None;
        Ok(())
    }

    fn take_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.diagnostics)
    }
}

fn class(graph: &mut Graph, identifier: &str, address: &str) -> ElementId {
    let id = graph.get_or_create(identifier, ElementKind::Class, Some(address));
    graph.add_source(id, SOURCE);
    for name in [slash_name(identifier), identifier.to_string()] {
        if let Some(symbol) = graph.find(&name, ElementKind::Symbol) {
            graph.link_symbol(id, symbol);
        }
    }
    graph.link_enclosing_class(id);
    graph.mark_loaded(id, WhichRun::Training);
    if let Some(pool) = graph.find(identifier, ElementKind::ConstantPool) {
        let orphan = graph[pool]
            .as_constant_pool()
            .is_some_and(|cp| cp.pool_holder.is_none());
        if orphan {
            graph.set_pool_holder(pool, id);
        }
    }
    id
}

fn symbol(graph: &mut Graph, identifier: &str, address: &str) -> ElementId {
    let id = graph.get_or_create(identifier, ElementKind::Symbol, Some(address));
    if identifier.starts_with('(') {
        // (Ljava/lang/Object;DJ)Ljava/lang/Object;
        if let Some((params, ret)) = split_method_descriptor(identifier) {
            let mut linked = vec![ret.to_string()];
            linked.extend(parameter_types(params));
            for name in linked {
                if let Some(target) = graph.find(&name, ElementKind::Symbol) {
                    graph.add_reference(id, target);
                }
            }
        }
    } else if identifier.contains('<') {
        for name in generic_class_names(identifier) {
            if let Some(class) = graph.find(&name, ElementKind::Class) {
                graph.add_reference(id, class);
            }
        }
    } else if let Some(class) = graph.find(&class_name_from_symbol(identifier), ElementKind::Class) {
        graph.link_symbol(class, id);
    }
    id
}

fn method_profile(graph: &mut Graph, identifier: &str, address: &str, kind: ElementKind) -> ElementId {
    let key = if identifier.is_empty() { address } else { identifier };
    let id = graph.get_or_create(key, kind, Some(address));
    if !identifier.is_empty() {
        let method = graph.get_or_create(identifier, ElementKind::Method, None);
        graph.set_method_profile(method, id);
    }
    id
}

fn constant_pool(graph: &mut Graph, identifier: &str, address: Option<&str>) -> ElementId {
    let id = graph.get_or_create(identifier, ElementKind::ConstantPool, address);
    let orphan = graph[id]
        .as_constant_pool()
        .is_some_and(|cp| cp.pool_holder.is_none());
    if orphan {
        if let Some(class) = graph.find(identifier, ElementKind::Class) {
            graph.set_pool_holder(id, class);
        }
    }
    id
}

fn klass_training_data(graph: &mut Graph, identifier: &str, address: &str) -> ElementId {
    let key = if identifier.is_empty() { address } else { identifier };
    let id = graph.get_or_create(key, ElementKind::KlassTrainingData, Some(address));
    if !identifier.is_empty() {
        let class = graph.get_or_create(identifier, ElementKind::Class, None);
        graph.set_klass_training_data(class, id);
        graph.add_source(class, "Referenced from a KlassTrainingData.");
    }
    id
}

// 0x0000000801cd5508: @@ CompileTrainingData 80 3 void java.lang.ref.Reference.reachabilityFence(java.lang.Object)
fn compile_training_data(graph: &mut Graph, content: &str, address: &str) -> Result<ElementId> {
    let key = if content.is_empty() { address } else { content };
    let id = graph.get_or_create(key, ElementKind::CompileTrainingData, Some(address));
    if !content.is_empty() {
        let Some((tier, signature)) = content.split_once(' ') else {
            bail!("compile training data without signature: {content}");
        };
        let tier: u8 = tier
            .parse()
            .with_context(|| format!("compile tier in {content}"))?;
        let method = graph.get_or_create(signature.trim(), ElementKind::Method, None);
        graph.add_compile_training_data(method, tier, id);
    }
    Ok(id)
}

// 0x00000000ffe94558: @@ Object (0xffe94558) java.lang.String "sun.util.locale.BaseLocale"
// 0x00000000ffef4720: @@ Object (0xffef4720) java.lang.Class Lsun/util/locale/BaseLocale$1;
// 0x00000007ffd666b0: @@ Object (0xfffaccd6) [Ljava.lang.ref.SoftReference; length: 26
fn object(graph: &mut Graph, identifier: &str, mini: &str, address: &str) -> ElementId {
    let key = format!("{mini} {identifier}");
    let id = graph.get_or_create(key.trim(), ElementKind::Object, Some(address));
    let identifier = match identifier.strip_suffix("(aot-inited)") {
        Some(rest) => {
            graph.set_aot_inited(id);
            rest.trim_end()
        }
        None => identifier,
    };

    let mut parts = identifier.split_whitespace();
    let Some(type_name) = parts.next() else {
        return id;
    };
    if !identifier.contains(' ') || type_name == "java.lang.String" {
        if let Some(class) = graph.find(type_name, ElementKind::Class) {
            graph.set_instance_of(id, class);
        }
    } else if type_name == "java.lang.Class" {
        if let Some(class) = graph.find("java.lang.Class", ElementKind::Class) {
            graph.set_instance_of(id, class);
        }
        if let Some(described) = parts.next() {
            let described = match described.find(';') {
                Some(semi) => &described[..=semi],
                None => described,
            };
            let stripped = described
                .strip_prefix('L')
                .and_then(|s| s.strip_suffix(';'))
                .unwrap_or(described);
            let symbol = graph
                .find(described, ElementKind::Symbol)
                .or_else(|| graph.find(stripped, ElementKind::Symbol))
                .or_else(|| graph.find(&stripped.replace('/', "."), ElementKind::Symbol));
            if let Some(symbol) = symbol {
                graph.add_reference(id, symbol);
            }
        }
    } else if type_name.starts_with('[') {
        if let Some(symbol) = graph.find(&slash_name(type_name), ElementKind::Symbol) {
            graph.add_reference(id, symbol);
        }
        if let Some(class) = graph.find(type_name, ElementKind::Class) {
            graph.set_instance_of(id, class);
        }
    }
    id
}
