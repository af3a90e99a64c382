use aotscope::config::Config;
use aotscope::error::AotError;
use aotscope::indexer::{self, LoadReport};
use aotscope::model::{ElementKind, ElementRow};
use aotscope::store::Store;
use aotscope::subgraph::{self, Direction, TraversalOptions};
use aotscope::warnings::{self, WarningQuery};
use aotscope::{cli, query, summary};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads every input into `store`. Background loads run side by side and are joined here.
fn load_inputs(store: &Store, inputs: &cli::Inputs) -> Vec<LoadReport> {
    let files = inputs.files();
    if !inputs.background {
        return files
            .iter()
            .map(|(path, kind)| {
                if let Some(advice) = indexer::large_file_advice(path) {
                    tracing::warn!("{advice}");
                }
                indexer::load_file(store, path, *kind)
            })
            .collect();
    }

    let mut pending = Vec::new();
    let mut reports = Vec::new();
    for (path, kind) in files {
        match indexer::spawn_load(store.clone(), path.clone(), kind) {
            Ok(handle) => pending.push((handle, path, kind)),
            Err(err) => {
                tracing::warn!(path = %path.display(), "could not start background load: {err}");
                reports.push(indexer::load_file(store, &path, kind));
            }
        }
    }
    for (handle, path, kind) in pending {
        reports.push(indexer::join_load(handle, &path, kind));
    }
    reports
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::get();
    init_tracing(config);
    let args = cli::Args::parse();
    let store = Store::new();

    match args.command {
        cli::Command::Load { inputs } => {
            let reports = load_inputs(&store, &inputs);
            print_json(&reports)
        }
        cli::Command::Ls { inputs, filter } => {
            load_inputs(&store, &inputs);
            let filter = filter.to_filter()?;
            let graph = store.read();
            let rows: Vec<ElementRow> = query::select(&graph, &filter)
                .into_iter()
                .map(|id| ElementRow::from(&graph[id]))
                .collect();
            print_json(&rows)
        }
        cli::Command::Describe {
            inputs,
            filter,
            verbose,
        } => {
            load_inputs(&store, &inputs);
            let filter = filter.to_filter()?;
            let graph = store.read();
            print_json(&summary::describe(&graph, &filter, verbose))
        }
        cli::Command::Tree {
            inputs,
            filter,
            level,
            max,
            reverse,
            json,
        } => {
            let identifier = filter
                .identifier
                .clone()
                .filter(|i| !i.trim().is_empty())
                .context("tree needs the class to start from (--identifier)")?;
            load_inputs(&store, &inputs);

            let mut kinds = filter.kinds();
            if kinds.is_empty() {
                kinds = vec![ElementKind::Class, ElementKind::Object];
            }
            if !kinds.contains(&ElementKind::Class) {
                kinds.push(ElementKind::Class);
            }
            let mut scope = filter.to_filter()?;
            scope.kinds = vec![ElementKind::Class];
            let opts = TraversalOptions {
                kinds,
                level: level.unwrap_or(config.tree_level),
                max: match max {
                    Some(max) => usize::try_from(max).ok().filter(|m| *m > 0),
                    None => config.tree_budget(),
                },
                direction: if reverse {
                    Direction::Reverse
                } else {
                    Direction::Forward
                },
                filter: scope.clone(),
            };

            let graph = store.read();
            let roots = query::select(&graph, &scope);
            if roots.is_empty() {
                return Err(AotError::ElementNotFound(identifier).into());
            }
            let trees: Vec<_> = roots
                .into_iter()
                .map(|root| subgraph::build_tree(&graph, root, &opts))
                .collect();
            if json {
                print_json(&trees)
            } else {
                for tree in &trees {
                    print!("{}", tree.render());
                }
                Ok(())
            }
        }
        cli::Command::Info { inputs, sections } => {
            load_inputs(&store, &inputs);
            let graph = store.read();
            print_json(&summary::info(&graph, &sections))
        }
        cli::Command::Warnings {
            inputs,
            name,
            limit,
            check,
        } => {
            load_inputs(&store, &inputs);
            if check {
                let mut graph = store.write();
                let found = warnings::used_and_not_trained(&graph, config.top_packages);
                graph.warnings.replace_auto(found);
            }
            let graph = store.read();
            let found = graph.warnings.query(&WarningQuery { name, limit });
            print_json(&found)
        }
    }
}
