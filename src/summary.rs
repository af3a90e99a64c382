use crate::indexer::production::{
    CLASSES_LOADED, CLASSES_NOT_LOADED, CODE_CACHE_SIZE, CODE_ENTRIES_LOADED, LAMBDAS_LOADED,
    LAMBDAS_NOT_LOADED,
};
use crate::model::{ElementId, ElementKind, ElementRow, WhichRun};
use crate::query::{self, Filter, StoreSelection};
use crate::store::Graph;
use crate::util::percent;
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;

const CODE_CACHE_LOADED_PREFIX: &str = "[LOG] [CodeCache] Loaded ";

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum Section {
    Configuration,
    Summary,
    Count,
}

/// A count with its share of some total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ratio {
    pub count: u64,
    pub percent: String,
}

impl Ratio {
    pub fn of(count: u64, total: u64) -> Self {
        Self {
            count,
            percent: percent(count, total),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionSummary {
    pub classes_cached: Ratio,
    pub classes_not_cached: Ratio,
    /// Stored during training, never loaded by the production run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_and_unused: Option<Ratio>,
    pub lambda_methods: Ratio,
    pub lambdas_cached: Ratio,
    pub lambdas_not_cached: Ratio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_cache: Option<CodeCacheSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeCacheSummary {
    pub entries: u64,
    pub loaded: BTreeMap<String, Ratio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSummary {
    pub classes: u64,
    pub klass_training_data: Ratio,
    pub objects: u64,
    pub aot_inited: Ratio,
    pub class_instances: Ratio,
    pub string_instances: Ratio,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodTrainingSummary {
    pub methods: u64,
    pub method_counters: Ratio,
    pub method_data: Ratio,
    pub method_training_data: Ratio,
    /// Compile tier -> methods with training data for that tier.
    pub compile_training_data: BTreeMap<u8, Ratio>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Info {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production: Option<ProductionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_training: Option<MethodTrainingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<BTreeMap<String, usize>>,
    /// Summary parts that could not be computed from what was loaded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Builds the requested sections; no sections means all of them.
pub fn info(graph: &Graph, sections: &[Section]) -> Info {
    let wants = |section: Section| sections.is_empty() || sections.contains(&section);
    let mut info = Info::default();

    if wants(Section::Configuration) {
        info.configuration = Some(
            graph
                .configuration
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }
    if wants(Section::Summary) {
        let classes = count(graph, &cached_classes());
        info.production = production_summary(graph, classes);
        if info.production.is_none() {
            info.missing.push("production run".to_string());
        }
        info.cache = cache_summary(graph, classes);
        if info.cache.is_none() {
            info.missing.push("classes in the cache".to_string());
        }
        info.method_training = method_training_summary(graph);
        if info.method_training.is_none() {
            info.missing.push("method training".to_string());
        }
    }
    if wants(Section::Count) {
        info.counts = Some(query::count_by_kind(graph, StoreSelection::Both));
    }
    info
}

fn cached_classes() -> Filter {
    Filter {
        kinds: vec![ElementKind::Class],
        store: StoreSelection::Cached,
        show_arrays: false,
        ..Filter::default()
    }
}

fn count(graph: &Graph, filter: &Filter) -> u64 {
    query::select(graph, filter).len() as u64
}

fn production_summary(graph: &Graph, classes: u64) -> Option<ProductionSummary> {
    let stats = &graph.statistics;
    if stats.get(CLASSES_LOADED).is_none() && stats.get(CLASSES_NOT_LOADED).is_none() {
        return None;
    }
    let loaded = stats.get_count(CLASSES_LOADED);
    let not_loaded = stats.get_count(CLASSES_NOT_LOADED);
    let lambdas = stats.get_count(LAMBDAS_LOADED);
    let external_lambdas = stats.get_count(LAMBDAS_NOT_LOADED);
    let methods = graph.count_cached(&ElementKind::Method) as u64;

    let cached_and_unused = (classes > 0).then(|| {
        let unused = Filter {
            loaded: Some(WhichRun::Training),
            ..cached_classes()
        };
        Ratio::of(count(graph, &unused), classes)
    });

    let entries = stats.get_count(CODE_ENTRIES_LOADED);
    let code_cache = (entries > 0).then(|| CodeCacheSummary {
        entries,
        loaded: stats
            .iter()
            .filter(|(key, _)| *key != CODE_ENTRIES_LOADED)
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(CODE_CACHE_LOADED_PREFIX)?;
                let value = value.trim().parse().ok()?;
                Some((name.to_string(), Ratio::of(value, entries)))
            })
            .collect(),
        cache_size: stats.get(CODE_CACHE_SIZE).map(str::to_string),
    });

    Some(ProductionSummary {
        classes_cached: Ratio::of(loaded, loaded + not_loaded),
        classes_not_cached: Ratio::of(not_loaded, loaded + not_loaded),
        cached_and_unused,
        lambda_methods: Ratio::of(lambdas + external_lambdas, methods),
        lambdas_cached: Ratio::of(lambdas, lambdas + external_lambdas),
        lambdas_not_cached: Ratio::of(external_lambdas, lambdas + external_lambdas),
        code_cache,
    })
}

fn cache_summary(graph: &Graph, classes: u64) -> Option<CacheSummary> {
    if classes == 0 {
        return None;
    }
    let objects = Filter {
        kinds: vec![ElementKind::Object],
        store: StoreSelection::Cached,
        ..Filter::default()
    };
    let object_count = count(graph, &objects);
    let aot_inited = Filter {
        aot_inited: Some(true),
        ..objects.clone()
    };
    let class_instances = Filter {
        instance_of: Some("java.lang.Class".to_string()),
        ..objects.clone()
    };
    let string_instances = Filter {
        instance_of: Some("java.lang.String".to_string()),
        ..objects
    };
    Some(CacheSummary {
        classes,
        klass_training_data: Ratio::of(linked(graph, ElementKind::KlassTrainingData), classes),
        objects: object_count,
        aot_inited: Ratio::of(count(graph, &aot_inited), object_count),
        class_instances: Ratio::of(count(graph, &class_instances), object_count),
        string_instances: Ratio::of(count(graph, &string_instances), object_count),
    })
}

fn method_training_summary(graph: &Graph) -> Option<MethodTrainingSummary> {
    let method_counters = linked(graph, ElementKind::MethodCounters);
    if method_counters == 0 {
        return None;
    }
    let methods = graph.count_cached(&ElementKind::Method) as u64;
    let mut tiers: BTreeMap<u8, u64> = BTreeMap::new();
    for method in graph.cached_elements().filter_map(|e| e.as_method()) {
        for tier in method.compile_training_data.keys() {
            *tiers.entry(*tier).or_insert(0) += 1;
        }
    }
    Some(MethodTrainingSummary {
        methods,
        method_counters: Ratio::of(method_counters, methods),
        method_data: Ratio::of(linked(graph, ElementKind::MethodData), methods),
        method_training_data: Ratio::of(linked(graph, ElementKind::MethodTrainingData), methods),
        compile_training_data: tiers
            .into_iter()
            .map(|(tier, n)| (tier, Ratio::of(n, methods)))
            .collect(),
    })
}

/// Cached elements of `kind` that point at something; unlinked profile nodes are noise.
fn linked(graph: &Graph, kind: ElementKind) -> u64 {
    graph
        .cached_elements()
        .filter(|e| e.kind == kind && e.resolved_references().next().is_some())
        .count() as u64
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassFacts {
    pub package: String,
    pub class_loader: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub array_dimensions: usize,
    pub loaded: WhichRun,
    pub methods: usize,
    pub trained_methods: usize,
    pub symbols: usize,
    pub klass_training_data: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodFacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub trained: bool,
    pub method_counters: bool,
    pub method_data: bool,
    pub method_training_data: bool,
    pub const_method: bool,
    pub compile_tiers: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectFacts {
    pub aot_inited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_of: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstantPoolFacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_holder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Description {
    #[serde(flatten)]
    pub row: ElementRow,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ClassFacts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodFacts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectFacts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant_pool: Option<ConstantPoolFacts>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ElementRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub referrers: Vec<ElementRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

pub fn describe(graph: &Graph, filter: &Filter, verbose: bool) -> Vec<Description> {
    query::select(graph, filter)
        .into_iter()
        .map(|id| describe_one(graph, id, verbose))
        .collect()
}

pub fn describe_one(graph: &Graph, id: ElementId, verbose: bool) -> Description {
    let element = &graph[id];
    let key_of = |id: Option<ElementId>| id.and_then(|id| graph.get(id)).map(|e| e.key().to_string());
    let rows = |ids: Vec<ElementId>| -> Vec<ElementRow> {
        ids.into_iter().map(|id| ElementRow::from(&graph[id])).collect()
    };

    let class = element.as_class().map(|info| ClassFacts {
        package: info.package.clone(),
        class_loader: info.class_loader,
        array_dimensions: info.array_dimensions(),
        loaded: info.loaded,
        methods: info.methods.len(),
        trained_methods: info
            .methods
            .iter()
            .filter(|m| graph[**m].is_trained())
            .count(),
        symbols: info.symbols.len(),
        klass_training_data: info.klass_training_data.is_some(),
    });
    let method = element.as_method().map(|info| MethodFacts {
        class: key_of(info.class),
        trained: element.is_trained(),
        method_counters: info.method_counters.is_some(),
        method_data: info.method_data.is_some(),
        method_training_data: info.method_training_data.is_some(),
        const_method: info.const_method.is_some(),
        compile_tiers: info.compile_training_data.keys().copied().collect(),
    });
    let object = element.as_instance().map(|info| ObjectFacts {
        aot_inited: info.aot_inited,
        instance_of: key_of(info.instance_of),
    });
    let constant_pool = element.as_constant_pool().map(|info| ConstantPoolFacts {
        pool_holder: key_of(info.pool_holder),
        cache_address: info.cache_address.clone(),
    });

    let (references, referrers, origins, sources) = if verbose {
        (
            rows(graph.sorted_references(id)),
            rows(graph.sorted_referrers(id)),
            element.origins.clone(),
            element.sources.clone(),
        )
    } else {
        Default::default()
    };

    Description {
        row: ElementRow::from(element),
        cached: graph.is_cached(id),
        class,
        method,
        object,
        constant_pool,
        references,
        referrers,
        origins,
        sources,
    }
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}
