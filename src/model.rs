use crate::error::AotError;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Index of an entity inside the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Class,
    Method,
    ConstMethod,
    ConstantPool,
    Symbol,
    KlassTrainingData,
    MethodTrainingData,
    CompileTrainingData,
    MethodData,
    MethodCounters,
    Object,
    Other(String),
}

impl ElementKind {
    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Class => "Class",
            ElementKind::Method => "Method",
            ElementKind::ConstMethod => "ConstMethod",
            ElementKind::ConstantPool => "ConstantPool",
            ElementKind::Symbol => "Symbol",
            ElementKind::KlassTrainingData => "KlassTrainingData",
            ElementKind::MethodTrainingData => "MethodTrainingData",
            ElementKind::CompileTrainingData => "CompileTrainingData",
            ElementKind::MethodData => "MethodData",
            ElementKind::MethodCounters => "MethodCounters",
            ElementKind::Object => "Object",
            ElementKind::Other(name) => name.as_str(),
        }
    }

    /// Case-insensitive; anything unrecognised becomes `Other` with the text kept verbatim.
    pub fn parse(value: &str) -> Self {
        const KNOWN: [ElementKind; 11] = [
            ElementKind::Class,
            ElementKind::Method,
            ElementKind::ConstMethod,
            ElementKind::ConstantPool,
            ElementKind::Symbol,
            ElementKind::KlassTrainingData,
            ElementKind::MethodTrainingData,
            ElementKind::CompileTrainingData,
            ElementKind::MethodData,
            ElementKind::MethodCounters,
            ElementKind::Object,
        ];
        let value = value.trim();
        KNOWN
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .unwrap_or_else(|| ElementKind::Other(value.to_string()))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(name.trim())
    }

    /// Kinds that own an outgoing reference list.
    pub fn is_referencing(&self) -> bool {
        matches!(
            self,
            ElementKind::Class
                | ElementKind::Symbol
                | ElementKind::KlassTrainingData
                | ElementKind::MethodTrainingData
                | ElementKind::CompileTrainingData
                | ElementKind::MethodData
                | ElementKind::MethodCounters
                | ElementKind::Object
        )
    }

    /// Training-data style nodes whose package comes from what they reference.
    pub fn is_profile(&self) -> bool {
        matches!(
            self,
            ElementKind::KlassTrainingData
                | ElementKind::MethodTrainingData
                | ElementKind::CompileTrainingData
                | ElementKind::MethodData
                | ElementKind::MethodCounters
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ElementKind {
    fn from(value: &str) -> Self {
        ElementKind::parse(value)
    }
}

impl Ord for ElementKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ElementKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for ElementKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Identity of an entity: the same text may name a Class and a Symbol at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Key {
    pub identifier: String,
    pub kind: ElementKind,
}

impl Key {
    pub fn new(identifier: impl Into<String>, kind: impl Into<ElementKind>) -> Self {
        Self {
            identifier: identifier.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.identifier)
    }
}

/// Which execution loaded a class. Only ever moves towards `Both`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum WhichRun {
    #[default]
    None,
    Training,
    Production,
    Both,
}

impl WhichRun {
    pub fn mark(self, run: WhichRun) -> WhichRun {
        match (self, run) {
            (current, WhichRun::None) => current,
            (WhichRun::None, run) => run,
            (WhichRun::Both, _) | (_, WhichRun::Both) => WhichRun::Both,
            (current, run) if current == run => current,
            _ => WhichRun::Both,
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            WhichRun::None => 0,
            WhichRun::Training | WhichRun::Production => 1,
            WhichRun::Both => 2,
        }
    }
}

impl FromStr for WhichRun {
    type Err = AotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(WhichRun::None),
            "training" => Ok(WhichRun::Training),
            "production" => Ok(WhichRun::Production),
            "both" => Ok(WhichRun::Both),
            _ => Err(AotError::InvalidRun(s.to_string())),
        }
    }
}

/// Outgoing edge. `Pending` holds an address seen before its owner was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ref {
    Resolved(ElementId),
    Pending(String),
}

#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    pub name: String,
    pub package: String,
    pub array_prefix: String,
    pub methods: Vec<ElementId>,
    pub symbols: Vec<ElementId>,
    pub klass_training_data: Option<ElementId>,
    pub loaded: WhichRun,
    pub class_loader: bool,
}

impl ClassInfo {
    pub fn parse(identifier: &str) -> Self {
        let (mut package, name) = match identifier.rfind('.') {
            Some(idx) if idx > 0 => (&identifier[..idx], &identifier[idx + 1..]),
            _ => ("", identifier),
        };
        let mut array_prefix = String::new();
        while package.starts_with('[') {
            if let Some(rest) = package.strip_prefix("[L") {
                array_prefix.push_str("[L");
                package = rest;
            } else {
                array_prefix.push('[');
                package = &package[1..];
            }
        }
        let class_loader =
            package.eq_ignore_ascii_case("jdk.internal.loader") && name.starts_with("ClassLoaders");
        Self {
            name: name.to_string(),
            package: package.to_string(),
            array_prefix,
            class_loader,
            ..Self::default()
        }
    }

    pub fn key(&self) -> String {
        if self.package.is_empty() {
            format!("{}{}", self.array_prefix, self.name)
        } else {
            format!("{}{}.{}", self.array_prefix, self.package, self.name)
        }
    }

    pub fn is_array(&self) -> bool {
        !self.array_prefix.is_empty()
    }

    pub fn array_dimensions(&self) -> usize {
        self.array_prefix.matches('[').count()
    }

    pub fn is_lambda(&self) -> bool {
        self.name.contains("$$Lambda")
    }

    pub fn is_inner(&self) -> bool {
        self.name.contains('$')
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodInfo {
    pub class: Option<ElementId>,
    pub method_counters: Option<ElementId>,
    pub method_data: Option<ElementId>,
    pub method_training_data: Option<ElementId>,
    pub const_method: Option<ElementId>,
    pub compile_training_data: BTreeMap<u8, ElementId>,
}

impl MethodInfo {
    /// `void pkg.A.m(int)` -> `pkg.A`. The return type is optional.
    pub fn owner_class_name(signature: &str) -> Option<&str> {
        let signature = signature.trim();
        let qualified = match signature.find(' ') {
            Some(space) if signature[..space].find('(').is_none() => &signature[space + 1..],
            _ => signature,
        };
        let qualified = match qualified.find('(') {
            Some(paren) => &qualified[..paren],
            None => qualified,
        };
        let dot = qualified.rfind('.')?;
        let owner = qualified[..dot].trim();
        if owner.is_empty() { None } else { Some(owner) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPoolInfo {
    pub cache_address: Option<String>,
    pub pool_holder: Option<ElementId>,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceInfo {
    pub aot_inited: bool,
    pub instance_of: Option<ElementId>,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Class(ClassInfo),
    Method(MethodInfo),
    ConstantPool(ConstantPoolInfo),
    Instance(InstanceInfo),
    /// Symbols and the training/profile nodes: all their value is in their edges.
    Linking,
    Basic,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    key: String,
    pub address: Option<String>,
    pub size: Option<u64>,
    pub heap_root: bool,
    pub sources: Vec<String>,
    pub origins: Vec<String>,
    pub referrers: BTreeSet<ElementId>,
    pub references: Vec<Ref>,
    pub payload: Payload,
}

impl Element {
    pub fn new(id: ElementId, identifier: &str, kind: ElementKind) -> Self {
        let (key, payload) = match kind {
            ElementKind::Class => {
                let info = ClassInfo::parse(identifier);
                (info.key(), Payload::Class(info))
            }
            ElementKind::Method => (identifier.to_string(), Payload::Method(MethodInfo::default())),
            ElementKind::ConstantPool => (
                identifier.to_string(),
                Payload::ConstantPool(ConstantPoolInfo::default()),
            ),
            ElementKind::Object => (
                identifier.to_string(),
                Payload::Instance(InstanceInfo::default()),
            ),
            ref other if other.is_referencing() => (identifier.to_string(), Payload::Linking),
            _ => (identifier.to_string(), Payload::Basic),
        };
        Self {
            id,
            kind,
            key,
            address: None,
            size: None,
            heap_root: false,
            sources: Vec::new(),
            origins: Vec::new(),
            referrers: BTreeSet::new(),
            references: Vec::new(),
            payload,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn full_key(&self) -> Key {
        Key::new(self.key.clone(), self.kind.clone())
    }

    pub fn add_source(&mut self, source: &str) {
        if !self.sources.iter().any(|s| s == source) {
            self.sources.push(source.to_string());
        }
    }

    pub fn add_origin(&mut self, origin: impl Into<String>) {
        let origin = origin.into();
        if !self.origins.contains(&origin) {
            self.origins.push(origin);
        }
    }

    pub fn is_referencing(&self) -> bool {
        self.kind.is_referencing()
    }

    pub fn is_trainable(&self) -> bool {
        matches!(self.payload, Payload::Class(_) | Payload::Method(_))
    }

    pub fn is_trained(&self) -> bool {
        match &self.payload {
            Payload::Class(info) => info.klass_training_data.is_some(),
            Payload::Method(info) => {
                info.method_training_data.is_some() || !info.compile_training_data.is_empty()
            }
            _ => false,
        }
    }

    pub fn resolved_references(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.references.iter().filter_map(|r| match r {
            Ref::Resolved(id) => Some(*id),
            Ref::Pending(_) => None,
        })
    }

    pub fn has_pending_references(&self) -> bool {
        self.references.iter().any(|r| matches!(r, Ref::Pending(_)))
    }

    pub fn as_class(&self) -> Option<&ClassInfo> {
        match &self.payload {
            Payload::Class(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassInfo> {
        match &mut self.payload {
            Payload::Class(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodInfo> {
        match &self.payload {
            Payload::Method(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_method_mut(&mut self) -> Option<&mut MethodInfo> {
        match &mut self.payload {
            Payload::Method(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_constant_pool(&self) -> Option<&ConstantPoolInfo> {
        match &self.payload {
            Payload::ConstantPool(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_constant_pool_mut(&mut self) -> Option<&mut ConstantPoolInfo> {
        match &mut self.payload {
            Payload::ConstantPool(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&InstanceInfo> {
        match &self.payload {
            Payload::Instance(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_instance_mut(&mut self) -> Option<&mut InstanceInfo> {
        match &mut self.payload {
            Payload::Instance(info) => Some(info),
            _ => None,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.key == other.key
    }
}

impl Eq for Element {}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.key)
    }
}

/// Compact, serializable view of one entity.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ElementRow {
    pub kind: ElementKind,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub heap_root: bool,
}

impl From<&Element> for ElementRow {
    fn from(e: &Element) -> Self {
        ElementRow {
            kind: e.kind.clone(),
            key: e.key.clone(),
            address: e.address.clone(),
            size: e.size,
            heap_root: e.heap_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_is_split_into_package_and_name() {
        let info = ClassInfo::parse("java.lang.constant.ClassDesc");
        assert_eq!(info.package, "java.lang.constant");
        assert_eq!(info.name, "ClassDesc");
        assert_eq!(info.key(), "java.lang.constant.ClassDesc");
        assert!(!info.is_array());
    }

    #[test]
    fn array_prefix_is_tracked_separately() {
        let info = ClassInfo::parse("[[Ljava.lang.Object;");
        assert_eq!(info.array_prefix, "[[L");
        assert_eq!(info.package, "java.lang");
        assert_eq!(info.array_dimensions(), 2);
        assert_eq!(info.key(), "[[Ljava.lang.Object;");
    }

    #[test]
    fn class_without_package_keeps_its_name_as_key() {
        let info = ClassInfo::parse("Main");
        assert_eq!(info.package, "");
        assert_eq!(info.key(), "Main");
    }

    #[test]
    fn class_loader_holder_is_detected() {
        assert!(ClassInfo::parse("jdk.internal.loader.ClassLoaders$AppClassLoader").class_loader);
        assert!(!ClassInfo::parse("jdk.internal.loader.BootLoader").class_loader);
    }

    #[test]
    fn owner_class_is_derived_from_signature() {
        assert_eq!(MethodInfo::owner_class_name("void pkg.A.m()"), Some("pkg.A"));
        assert_eq!(
            MethodInfo::owner_class_name(
                "org.infinispan.interceptors.InvocationStage org.infinispan.xsite.NoOpBackupSender.backupClear(org.infinispan.commands.write.ClearCommand)"
            ),
            Some("org.infinispan.xsite.NoOpBackupSender")
        );
        assert_eq!(MethodInfo::owner_class_name("pkg.A.m(int, long)"), Some("pkg.A"));
        assert_eq!(MethodInfo::owner_class_name("nothing"), None);
    }

    #[test]
    fn loaded_state_never_downgrades() {
        assert_eq!(WhichRun::None.mark(WhichRun::Training), WhichRun::Training);
        assert_eq!(WhichRun::Training.mark(WhichRun::Training), WhichRun::Training);
        assert_eq!(WhichRun::Training.mark(WhichRun::Production), WhichRun::Both);
        assert_eq!(WhichRun::Production.mark(WhichRun::Training), WhichRun::Both);
        assert_eq!(WhichRun::Both.mark(WhichRun::Production), WhichRun::Both);
        assert_eq!(WhichRun::Both.mark(WhichRun::None), WhichRun::Both);
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!(ElementKind::parse("class"), ElementKind::Class);
        assert_eq!(ElementKind::parse("METHODCOUNTERS"), ElementKind::MethodCounters);
        assert_eq!(
            ElementKind::parse("TypeArrayU1"),
            ElementKind::Other("TypeArrayU1".to_string())
        );
    }
}
