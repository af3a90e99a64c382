pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod indexer;
pub mod model;
pub mod query;
pub mod stats;
pub mod store;
pub mod subgraph;
pub mod summary;
pub mod util;
pub mod warnings;
