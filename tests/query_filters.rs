use aotscope::indexer::{self, LoadKind};
use aotscope::model::{ElementId, ElementKind, WhichRun};
use aotscope::query::{self, Filter, StoreSelection};
use aotscope::store::{Graph, Store};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(files: &[(&str, LoadKind)]) -> Store {
    let store = Store::new();
    for (name, kind) in files {
        let report = indexer::load_file(&store, &fixture_path(name), *kind);
        assert!(report.is_ok(), "{name}: {:?}", report.error);
    }
    store
}

fn map_only() -> Store {
    load(&[("app.aot.map", LoadKind::AotMap)])
}

fn keys(graph: &Graph, filter: &Filter) -> Vec<String> {
    query::select(graph, filter)
        .into_iter()
        .map(|id| graph[id].key().to_string())
        .collect()
}

fn of_kind(kind: ElementKind) -> Filter {
    Filter {
        kinds: vec![kind],
        ..Filter::default()
    }
}

#[test]
fn arrays_can_be_hidden() {
    let store = map_only();
    let graph = store.read();
    assert_eq!(query::select(&graph, &of_kind(ElementKind::Class)).len(), 8);
    let no_arrays = Filter {
        show_arrays: false,
        ..of_kind(ElementKind::Class)
    };
    assert_eq!(query::select(&graph, &no_arrays).len(), 7);
}

#[test]
fn package_filter_combines_with_class_shape() {
    let store = map_only();
    let graph = store.read();
    let acme = Filter {
        packages: vec!["org.acme".to_string()],
        ..of_kind(ElementKind::Class)
    };
    assert_eq!(
        keys(&graph, &acme),
        vec![
            "org.acme.Greeter",
            "org.acme.Main",
            "org.acme.Main$$Lambda/0x0000000800001800",
            "org.acme.Main$Inner"
        ]
    );

    let no_lambdas = Filter {
        lambdas: false,
        ..acme.clone()
    };
    assert_eq!(
        keys(&graph, &no_lambdas),
        vec!["org.acme.Greeter", "org.acme.Main", "org.acme.Main$Inner"]
    );

    let top_level = Filter {
        inner_classes: false,
        ..acme
    };
    assert_eq!(keys(&graph, &top_level), vec!["org.acme.Greeter", "org.acme.Main"]);
}

#[test]
fn excluded_packages_win() {
    let store = map_only();
    let graph = store.read();
    let filter = Filter {
        exclude_packages: vec!["java".to_string()],
        ..of_kind(ElementKind::Class)
    };
    let found = keys(&graph, &filter);
    assert_eq!(found.len(), 4);
    assert!(found.iter().all(|k| k.starts_with("org.acme")));
}

#[test]
fn methods_follow_their_owner() {
    let store = map_only();
    let graph = store.read();
    assert_eq!(query::select(&graph, &of_kind(ElementKind::Method)).len(), 4);

    let trained = Filter {
        trained: true,
        ..of_kind(ElementKind::Method)
    };
    assert_eq!(
        keys(&graph, &trained),
        vec!["java.lang.String org.acme.Greeter.greet(java.lang.String)"]
    );

    let no_lambdas = Filter {
        lambdas: false,
        packages: vec!["org.acme".to_string()],
        ..of_kind(ElementKind::Method)
    };
    let found = keys(&graph, &no_lambdas);
    assert_eq!(found.len(), 3);
    assert!(!found.iter().any(|k| k.contains("$$Lambda")));
}

#[test]
fn classes_and_methods_together() {
    let store = map_only();
    let graph = store.read();
    let filter = Filter {
        kinds: vec![ElementKind::Class, ElementKind::Method],
        packages: vec!["org.acme".to_string()],
        lambdas: false,
        ..Filter::default()
    };
    let found = query::select(&graph, &filter);
    assert_eq!(found.len(), 6);
    let classes = found
        .iter()
        .filter(|id| graph[**id].kind == ElementKind::Class)
        .count();
    assert_eq!(classes, 3);
}

#[test]
fn address_ignores_every_other_criterion() {
    let store = map_only();
    let graph = store.read();
    let filter = Filter {
        address: Some("0x0000000800001600".to_string()),
        lambdas: false,
        kinds: vec![ElementKind::Method],
        ..Filter::default()
    };
    assert_eq!(
        keys(&graph, &filter),
        vec!["org.acme.Main$$Lambda/0x0000000800001800"]
    );
}

#[test]
fn identifier_lookup() {
    let store = map_only();
    let graph = store.read();
    let quoted = Filter {
        identifier: Some("'org.acme.Greeter'".to_string()),
        ..of_kind(ElementKind::Class)
    };
    assert_eq!(keys(&graph, &quoted), vec!["org.acme.Greeter"]);

    // without kinds every element with that key matches
    let any_kind = Filter {
        identifier: Some("org.acme.Greeter".to_string()),
        ..Filter::default()
    };
    let kinds: Vec<ElementKind> = query::select(&graph, &any_kind)
        .into_iter()
        .map(|id| graph[id].kind.clone())
        .collect();
    assert_eq!(kinds, vec![ElementKind::Class, ElementKind::KlassTrainingData]);

    // JVM names are case-sensitive, with or without kinds
    for kinds in [vec![], vec![ElementKind::Class]] {
        let lower = Filter {
            identifier: Some("org.acme.greeter".to_string()),
            kinds,
            ..Filter::default()
        };
        assert!(query::select(&graph, &lower).is_empty());
    }
}

#[test]
fn keyed_lookup_agrees_with_the_scan() {
    let store = map_only();
    indexer::load_lines(
        &store,
        LoadKind::AotMap,
        ["0x00000008009a0000: @@ TypeArrayU1 600"],
    );
    let graph = store.read();

    let cases = [
        ("0x00000008009a0000", ElementKind::parse("typearrayu1")),
        ("0x00000008009a0000", ElementKind::parse("TypeArrayU1")),
        ("org.acme.Greeter", ElementKind::parse("class")),
        ("org.acme.Main$Inner", ElementKind::Class),
        ("org/acme/Greeter", ElementKind::Symbol),
    ];
    for (identifier, kind) in cases {
        let keyed = Filter {
            identifier: Some(identifier.to_string()),
            kinds: vec![kind.clone()],
            ..Filter::default()
        };
        let scanned: Vec<ElementId> = query::select(
            &graph,
            &Filter {
                identifier: Some(identifier.to_string()),
                ..Filter::default()
            },
        )
        .into_iter()
        .filter(|id| graph[*id].kind.matches(kind.as_str()))
        .collect();
        assert_eq!(scanned.len(), 1, "{identifier} as {kind}");
        assert_eq!(query::select(&graph, &keyed), scanned, "{identifier} as {kind}");
    }
}

#[test]
fn object_criteria() {
    let store = map_only();
    let graph = store.read();
    let hello = "(0xffe00000) java.lang.String \"hello\"";
    let mirror = "(0xffe00100) java.lang.Class Lorg/acme/Greeter; (aot-inited)";

    let strings = Filter {
        instance_of: Some("java.lang.String".to_string()),
        ..of_kind(ElementKind::Object)
    };
    assert_eq!(keys(&graph, &strings), vec![hello]);

    let inited = Filter {
        aot_inited: Some(true),
        ..of_kind(ElementKind::Object)
    };
    assert_eq!(keys(&graph, &inited), vec![mirror]);

    // only Objects carry the flag, so any kind narrows down to objects
    let not_inited = Filter {
        aot_inited: Some(false),
        ..Filter::default()
    };
    assert_eq!(keys(&graph, &not_inited), vec![hello]);

    let referencing = Filter {
        referencing: Some("org/acme/Greeter".to_string()),
        ..of_kind(ElementKind::Object)
    };
    assert_eq!(keys(&graph, &referencing), vec![mirror]);

    let by_type = Filter {
        packages: vec!["java.lang.String".to_string()],
        ..of_kind(ElementKind::Object)
    };
    assert_eq!(keys(&graph, &by_type), vec![hello]);
}

#[test]
fn store_and_loaded_dimensions() {
    let store = load(&[
        ("app.aot.map", LoadKind::AotMap),
        ("production.log", LoadKind::ProductionLog),
    ]);
    let graph = store.read();

    let external = Filter {
        store: StoreSelection::NotCached,
        ..of_kind(ElementKind::Class)
    };
    assert_eq!(
        keys(&graph, &external),
        vec!["org.acme.Extra", "org.acme.Extra$$Lambda/0x0000000801234567"]
    );
    let cached = Filter {
        store: StoreSelection::Cached,
        ..of_kind(ElementKind::Class)
    };
    assert_eq!(query::select(&graph, &cached).len(), 8);

    let acme_loaded = |run: WhichRun| Filter {
        loaded: Some(run),
        packages: vec!["org.acme".to_string()],
        ..of_kind(ElementKind::Class)
    };
    assert_eq!(
        keys(&graph, &acme_loaded(WhichRun::Training)),
        vec!["org.acme.Main", "org.acme.Main$Inner"]
    );
    assert_eq!(
        keys(&graph, &acme_loaded(WhichRun::Both)),
        vec!["org.acme.Greeter", "org.acme.Main$$Lambda/0x0000000800001800"]
    );
    assert_eq!(
        keys(&graph, &acme_loaded(WhichRun::Production)),
        vec!["org.acme.Extra", "org.acme.Extra$$Lambda/0x0000000801234567"]
    );
}

#[test]
fn counts_per_kind() {
    let store = map_only();
    let graph = store.read();
    let counts = query::count_by_kind(&graph, StoreSelection::Both);
    assert_eq!(counts.get("Class"), Some(&8));
    assert_eq!(counts.get("Method"), Some(&4));
    assert_eq!(counts.get("Symbol"), Some(&2));
    assert_eq!(counts.get("MethodCounters"), Some(&2));
    assert_eq!(counts.get("CompileTrainingData"), Some(&1));
    assert_eq!(counts.get("KlassTrainingData"), Some(&1));
    assert_eq!(counts.get("Object"), Some(&2));
    assert_eq!(counts.values().sum::<usize>(), graph.len());
}

#[test]
fn dimensions_compose_as_a_conjunction() {
    let store = load(&[
        ("app.aot.map", LoadKind::AotMap),
        ("production.log", LoadKind::ProductionLog),
    ]);
    let graph = store.read();
    let as_set = |filter: &Filter| -> BTreeSet<ElementId> {
        query::select(&graph, filter).into_iter().collect()
    };

    let single = vec![
        Filter {
            packages: vec!["org.acme".to_string()],
            ..of_kind(ElementKind::Class)
        },
        Filter {
            store: StoreSelection::Cached,
            ..of_kind(ElementKind::Class)
        },
        Filter {
            loaded: Some(WhichRun::Both),
            ..of_kind(ElementKind::Class)
        },
        Filter {
            lambdas: false,
            ..of_kind(ElementKind::Class)
        },
        Filter {
            show_arrays: false,
            ..of_kind(ElementKind::Class)
        },
    ];
    let full = Filter {
        packages: vec!["org.acme".to_string()],
        store: StoreSelection::Cached,
        loaded: Some(WhichRun::Both),
        lambdas: false,
        show_arrays: false,
        ..of_kind(ElementKind::Class)
    };

    let intersection = single
        .iter()
        .map(|filter| as_set(filter))
        .reduce(|acc, next| acc.intersection(&next).copied().collect())
        .unwrap_or_default();
    assert_eq!(intersection, as_set(&full));
    assert_eq!(keys(&graph, &full), vec!["org.acme.Greeter"]);
}
