use crate::error::AotError;
use crate::indexer::LoadKind;
use crate::model::ElementKind;
use crate::query::{self, Filter, StoreSelection};
use crate::summary::Section;
use crate::util::split_list;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aotscope",
    version,
    about = "Explore an AOT cache map dump and the training/production logs around it",
    after_help = r#"Examples:
  aotscope load --aot-map app.aot.map --training-log training.log
  aotscope ls --aot-map app.aot.map -t Class -p org.acme --use cached
  aotscope ls --aot-map app.aot.map --production-log prod.log --loaded production --use not-cached
  aotscope describe --aot-map app.aot.map -t Method -i "void org.acme.Main.main(java.lang.String[])" -v
  aotscope tree --aot-map app.aot.map -i org.acme.Main --level 2 --max 50
  aotscope tree --aot-map app.aot.map -i java.lang.Object --reverse
  aotscope info --aot-map app.aot.map --production-log prod.log --section summary
  aotscope warnings --training-log training.log --check --limit 20
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Files to ingest before answering. Repeat a flag to load several files of one kind.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Inputs {
    /// Cache map dump (-Xlog:aot+map=trace,aot+map+oops=trace).
    #[arg(long = "aot-map", value_name = "PATH")]
    pub aot_maps: Vec<PathBuf>,
    /// Log of the training run (-Xlog:class+load,aot*=info,aot+resolve*=trace).
    #[arg(long = "training-log", value_name = "PATH")]
    pub training_logs: Vec<PathBuf>,
    /// Log of a run that used the cache (-Xlog:class+load,aot*=info).
    #[arg(long = "production-log", value_name = "PATH")]
    pub production_logs: Vec<PathBuf>,
    /// Load every file on its own thread.
    #[arg(long)]
    pub background: bool,
}

impl Inputs {
    /// Map dumps first so log lines find the cached entities they talk about.
    pub fn files(&self) -> Vec<(PathBuf, LoadKind)> {
        let tagged = |paths: &[PathBuf], kind: LoadKind| {
            paths
                .iter()
                .cloned()
                .map(move |path| (path, kind))
                .collect::<Vec<_>>()
        };
        let mut files = tagged(&self.aot_maps, LoadKind::AotMap);
        files.extend(tagged(&self.training_logs, LoadKind::TrainingLog));
        files.extend(tagged(&self.production_logs, LoadKind::ProductionLog));
        files
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct FilterArgs {
    /// Exact key of the element; surrounding quotes are ignored.
    #[arg(short = 'i', long)]
    pub identifier: Option<String>,
    /// Address in the map dump; other filters are ignored when set.
    #[arg(short = 'a', long)]
    pub address: Option<String>,
    /// Package prefixes to include.
    #[arg(short = 'p', long = "package", value_name = "PREFIX")]
    pub packages: Vec<String>,
    /// Package prefixes to exclude.
    #[arg(short = 'e', long = "exclude-package", value_name = "PREFIX")]
    pub exclude_packages: Vec<String>,
    /// Element kinds, comma separated (Class, Method, Symbol, Object, ...).
    #[arg(short = 't', long = "type", value_name = "KIND")]
    pub types: Vec<String>,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub show_arrays: bool,
    /// cached|not-cached|both.
    #[arg(long = "use", default_value = "both")]
    pub use_store: StoreSelection,
    #[arg(long)]
    pub heap_root: Option<bool>,
    /// Only meaningful for Object elements.
    #[arg(long)]
    pub aot_inited: Option<bool>,
    /// none|training|production|both|all. Restricts to classes when not `all`.
    #[arg(long, default_value = "all")]
    pub loaded: String,
    /// Elements that reference the element with this key.
    #[arg(long)]
    pub referencing: Option<String>,
    /// Objects that are instances of this class.
    #[arg(long)]
    pub instance_of: Option<String>,
    /// Only classes and methods that have training data.
    #[arg(long)]
    pub trained: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub lambdas: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub inner_classes: bool,
}

impl FilterArgs {
    pub fn kinds(&self) -> Vec<ElementKind> {
        split_list(&self.types)
            .iter()
            .map(|t| ElementKind::parse(t))
            .collect()
    }

    pub fn to_filter(&self) -> Result<Filter, AotError> {
        Ok(Filter {
            identifier: self.identifier.clone(),
            address: self.address.clone(),
            packages: split_list(&self.packages),
            exclude_packages: split_list(&self.exclude_packages),
            kinds: self.kinds(),
            show_arrays: self.show_arrays,
            store: self.use_store,
            heap_root: self.heap_root,
            aot_inited: self.aot_inited,
            loaded: query::parse_loaded(&self.loaded)?,
            referencing: self.referencing.clone(),
            instance_of: self.instance_of.clone(),
            trained: self.trained,
            lambdas: self.lambdas,
            inner_classes: self.inner_classes,
        })
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Load files and print what each load did.
    Load {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// List matching elements sorted by key and kind.
    Ls {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Describe matching elements.
    Describe {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Include references, referrers, origins and sources.
        #[arg(short = 'v', long)]
        verbose: bool,
    },
    /// Show what an element uses, or with --reverse what uses it.
    Tree {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Depth of the tree (AOTSCOPE_TREE_LEVEL).
        #[arg(long)]
        level: Option<usize>,
        /// Maximum shown nodes, 0 or negative for unlimited (AOTSCOPE_TREE_MAX).
        #[arg(long, allow_negative_numbers = true)]
        max: Option<i64>,
        #[arg(long)]
        reverse: bool,
        /// Print the tree as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Summaries and statistics of what was loaded.
    Info {
        #[command(flatten)]
        inputs: Inputs,
        /// Sections to print; all of them when omitted.
        #[arg(long = "section", value_enum)]
        sections: Vec<Section>,
    },
    /// Warnings raised while loading, optionally with extra checks.
    Warnings {
        #[command(flatten)]
        inputs: Inputs,
        /// Only warnings affecting this element.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Run the "used and not trained" check (AOTSCOPE_TOP_PACKAGES packages).
        #[arg(long)]
        check: bool,
    },
}
