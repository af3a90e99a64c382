use aotscope::indexer::{self, LoadKind};
use aotscope::model::{ElementKind, Key};
use aotscope::store::Store;
use aotscope::warnings::{self, Warning, WarningKind, WarningQuery};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn used_but_not_compiled_methods_are_grouped_by_package() {
    let store = Store::new();
    indexer::load_file(&store, &fixture_path("app.aot.map"), LoadKind::AotMap);
    let graph = store.read();

    let found = warnings::used_and_not_trained(&graph, 10);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, WarningKind::Training);
    assert_eq!(
        found[0].affected,
        vec![Key::new(
            "void org.acme.Main.main(java.lang.String[])",
            ElementKind::Method
        )]
    );
    assert_eq!(
        found[0].message,
        "Package 'org.acme' contains 1 methods that were used during training but not compiled."
    );
}

#[test]
fn biggest_packages_come_first() {
    let store = Store::new();
    indexer::load_lines(
        &store,
        LoadKind::AotMap,
        [
            "0x0000000801001000: @@ MethodCounters    64 void org.big.A.a()",
            "0x0000000801001100: @@ MethodCounters    64 void org.big.A.b()",
            "0x0000000801001200: @@ MethodCounters    64 void org.small.B.c()",
        ],
    );
    let graph = store.read();

    let all = warnings::used_and_not_trained(&graph, 10);
    let affected: Vec<usize> = all.iter().map(|w| w.affected.len()).collect();
    assert_eq!(affected, vec![2, 1]);
    assert!(all[0].message.starts_with("Package 'org.big'"));

    let top = warnings::used_and_not_trained(&graph, 1);
    assert_eq!(top.len(), 1);
}

#[test]
fn query_filters_by_name_and_limits() {
    let store = Store::new();
    {
        let mut graph = store.write();
        graph.warnings.push(Warning::new(
            WarningKind::CacheCreation,
            vec![Key::new("org.acme.A", ElementKind::Class)],
            "Skipping org/acme/A: Failed verification",
        ));
        graph.warnings.push(Warning::unknown("Something odd"));
        graph.warnings.replace_auto(vec![Warning::new(
            WarningKind::Training,
            vec![Key::new("org.acme.A", ElementKind::Class)],
            "checked",
        )]);
    }
    let graph = store.read();

    let all = graph.warnings.query(&WarningQuery::default());
    let messages: Vec<&str> = all.iter().map(|w| w.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Skipping org/acme/A: Failed verification", "Something odd", "checked"]
    );

    let named = graph.warnings.query(&WarningQuery {
        name: Some("ORG.ACME.A".to_string()),
        limit: None,
    });
    assert_eq!(named.len(), 2);

    let limited = graph.warnings.query(&WarningQuery {
        name: None,
        limit: Some(1),
    });
    assert_eq!(limited.len(), 1);
    assert_eq!(graph.warnings.auto().len(), 1);
}
