use aotscope::indexer::{self, LoadKind};
use aotscope::model::{ElementKind, Key};
use aotscope::store::Store;
use aotscope::warnings::{WarningKind, WarningQuery};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn map_and_training() -> Store {
    let store = Store::new();
    for (name, kind) in [
        ("app.aot.map", LoadKind::AotMap),
        ("training.log", LoadKind::TrainingLog),
    ] {
        let report = indexer::load_file(&store, &fixture_path(name), kind);
        assert!(report.is_ok(), "{name}: {:?}", report.error);
        assert_eq!(report.skipped, 0, "{name}");
    }
    store
}

#[test]
fn archived_entries_link_symbols() {
    let store = map_and_training();
    let graph = store.read();

    let greeter_symbol = graph.find("org/acme/Greeter", ElementKind::Symbol).expect("symbol");
    let object_symbol = graph.find("java/lang/Object", ElementKind::Symbol).expect("symbol");
    let object_class = graph.find("java.lang.Object", ElementKind::Class).expect("class");
    assert!(graph[greeter_symbol].resolved_references().any(|r| r == object_symbol));
    assert_eq!(graph.class_symbols(object_class), vec![object_symbol]);
    assert!(graph[object_class]
        .origins
        .contains(&"Referenced by java/lang/Object.".to_string()));

    // archived field: the holder symbol points at the field type and the field name
    let main_symbol = graph.find("org/acme/Main", ElementKind::Symbol).expect("symbol");
    let descriptor = graph.find("Lorg/acme/Greeter;", ElementKind::Symbol).expect("descriptor");
    let field = graph.find("greeter", ElementKind::Symbol).expect("field name");
    let references: Vec<_> = graph[main_symbol].resolved_references().collect();
    assert!(references.contains(&descriptor));
    assert!(references.contains(&field));
    assert!(!references.contains(&main_symbol));

    let greeter = graph.find("org.acme.Greeter", ElementKind::Class).expect("class");
    assert_eq!(graph.class_symbols(greeter), vec![descriptor, greeter_symbol]);
}

#[test]
fn reverted_and_skipped_classes_become_warnings() {
    let store = map_and_training();
    let graph = store.read();

    let kinds: Vec<WarningKind> = graph.warnings.iter().map(|w| w.kind).collect();
    assert_eq!(
        kinds,
        vec![
            WarningKind::CacheCreationRevertedKlass,
            WarningKind::CacheCreation,
            WarningKind::Unknown
        ]
    );

    let reverted = graph.warnings.query(&WarningQuery {
        name: Some("org/acme/Missing".to_string()),
        limit: None,
    });
    assert_eq!(reverted.len(), 1);
    assert_eq!(
        reverted[0].affected,
        vec![
            Key::new("org/acme/Main", ElementKind::Symbol),
            Key::new("org/acme/Missing", ElementKind::Symbol)
        ]
    );

    let broken = graph.find("org.acme.Broken", ElementKind::Class).expect("skipped class");
    assert!(!graph.is_cached(broken));
    let skipped = graph.warnings.query(&WarningQuery {
        name: Some("org.acme.Broken".to_string()),
        limit: None,
    });
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].message, "Skipping org/acme/Broken: Failed verification");
}

#[test]
fn info_lines_fill_configuration_and_statistics() {
    let store = map_and_training();
    let graph = store.read();

    assert_eq!(graph.configuration.get("Core region alignment"), Some("4096"));
    assert_eq!(graph.configuration.get("UseCompressedOops"), Some("1"));
    assert_eq!(graph.configuration.get("UseCompressedClassPointers"), Some("1"));
    assert_eq!(graph.statistics.get("Number of classes"), Some("10857"));
    assert_eq!(graph.statistics.get("instance classes"), Some("10170"));
    assert_eq!(graph.statistics.get("instance classes aot-linked"), Some("3059"));
    assert_eq!(graph.statistics.get("instance classes inited"), Some("422"));
}

#[test]
fn malformed_entry_is_skipped_and_loading_goes_on() {
    let store = Store::new();
    let report = indexer::load_lines(
        &store,
        LoadKind::TrainingLog,
        [
            "[trace][aot,resolve] archived klass  CP entry without a marker",
            "[trace][aot,resolve] archived klass  CP entry [  2]: pkg/User unreg => pkg/Target boot",
        ],
    );
    assert_eq!(report.lines, 2);
    assert_eq!(report.skipped, 1);

    let graph = store.read();
    let user = graph.find("pkg/User", ElementKind::Symbol).expect("user symbol");
    let target = graph.find("pkg/Target", ElementKind::Symbol).expect("target symbol");
    assert!(graph[user].resolved_references().any(|r| r == target));
    // qualified names get a class even without a map dump
    assert!(graph.find("pkg.User", ElementKind::Class).is_some());
}

#[test]
fn lines_without_aot_tag_are_ignored() {
    let store = Store::new();
    let report = indexer::load_lines(
        &store,
        LoadKind::TrainingLog,
        [
            "[info][class,load] java.lang.Object source: jrt:/java.base",
            "[warning][gc] Something unrelated",
        ],
    );
    assert_eq!(report.skipped, 0);
    let graph = store.read();
    assert!(graph.is_empty());
    assert!(graph.warnings.is_empty());
}
