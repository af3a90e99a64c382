use aotscope::indexer::{self, LoadKind};
use aotscope::model::{ElementKind, WhichRun};
use aotscope::query::Filter;
use aotscope::store::{Graph, Store};
use aotscope::summary::{self, Ratio, Section};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn map_and_production() -> Store {
    let store = Store::new();
    for (name, kind) in [
        ("app.aot.map", LoadKind::AotMap),
        ("production.log", LoadKind::ProductionLog),
    ] {
        let report = indexer::load_file(&store, &fixture_path(name), kind);
        assert!(report.is_ok(), "{name}: {:?}", report.error);
    }
    store
}

fn ratio(count: u64, percent: &str) -> Ratio {
    Ratio {
        count,
        percent: percent.to_string(),
    }
}

#[test]
fn production_summary() {
    let store = map_and_production();
    let graph = store.read();
    let info = summary::info(&graph, &[Section::Summary]);
    assert!(info.missing.is_empty(), "{:?}", info.missing);
    assert!(info.configuration.is_none());
    assert!(info.counts.is_none());

    let production = info.production.expect("production section");
    assert_eq!(production.classes_cached, ratio(3, "60.00%"));
    assert_eq!(production.classes_not_cached, ratio(2, "40.00%"));
    assert_eq!(production.cached_and_unused, Some(ratio(4, "57.14%")));
    assert_eq!(production.lambda_methods, ratio(2, "50.00%"));
    assert_eq!(production.lambdas_cached, ratio(1, "50.00%"));

    let code = production.code_cache.expect("code cache");
    assert_eq!(code.entries, 10);
    assert_eq!(code.loaded.get("Adapters"), Some(&ratio(6, "60.00%")));
    assert_eq!(code.loaded.get("Stubs"), Some(&ratio(4, "40.00%")));
    assert_eq!(code.loaded.len(), 2);
    assert_eq!(code.cache_size.as_deref(), Some("598432 bytes"));
}

#[test]
fn cache_and_method_training_summary() {
    let store = map_and_production();
    let graph = store.read();
    let info = summary::info(&graph, &[Section::Summary]);

    let cache = info.cache.expect("cache section");
    assert_eq!(cache.classes, 7);
    assert_eq!(cache.klass_training_data, ratio(1, "14.29%"));
    assert_eq!(cache.objects, 2);
    assert_eq!(cache.aot_inited, ratio(1, "50.00%"));
    assert_eq!(cache.class_instances, ratio(1, "50.00%"));
    assert_eq!(cache.string_instances, ratio(1, "50.00%"));

    let training = info.method_training.expect("method training section");
    assert_eq!(training.methods, 4);
    assert_eq!(training.method_counters, ratio(2, "50.00%"));
    assert_eq!(training.method_data, ratio(0, "0.00%"));
    assert_eq!(training.compile_training_data.get(&3), Some(&ratio(1, "25.00%")));
}

#[test]
fn empty_graph_reports_what_is_missing() {
    let graph = Graph::new();
    let info = summary::info(&graph, &[]);
    assert_eq!(info.missing.len(), 3);
    assert!(info.production.is_none());
    assert_eq!(info.configuration, Some(Default::default()));
    assert_eq!(info.counts, Some(Default::default()));
}

#[test]
fn describe_class_and_method() {
    let store = map_and_production();
    let graph = store.read();

    let filter = Filter {
        identifier: Some("org.acme.Greeter".to_string()),
        kinds: vec![ElementKind::Class],
        ..Filter::default()
    };
    let described = summary::describe(&graph, &filter, false);
    assert_eq!(described.len(), 1);
    let class = described[0].class.as_ref().expect("class facts");
    assert_eq!(class.package, "org.acme");
    assert_eq!(class.methods, 2);
    assert_eq!(class.trained_methods, 1);
    assert_eq!(class.symbols, 1);
    assert!(class.klass_training_data);
    assert_eq!(class.loaded, WhichRun::Both);
    assert!(described[0].cached);
    assert!(described[0].references.is_empty());

    let method = graph
        .find(
            "java.lang.String org.acme.Greeter.greet(java.lang.String)",
            ElementKind::Method,
        )
        .expect("greet");
    let verbose = summary::describe_one(&graph, method, true);
    let facts = verbose.method.as_ref().expect("method facts");
    assert_eq!(facts.class.as_deref(), Some("org.acme.Greeter"));
    assert_eq!(facts.compile_tiers, vec![3]);
    assert!(facts.trained);
    let referrer_kinds: Vec<ElementKind> =
        verbose.referrers.iter().map(|r| r.kind.clone()).collect();
    assert_eq!(
        referrer_kinds,
        vec![
            ElementKind::Class,
            ElementKind::CompileTrainingData,
            ElementKind::MethodCounters
        ]
    );

    let json = serde_json::to_value(&verbose).unwrap();
    assert_eq!(json["kind"], "Method");
    assert_eq!(json["cached"], true);
}
