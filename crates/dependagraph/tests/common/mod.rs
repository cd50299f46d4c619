//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use dependagraph::domain::RepositoryReference;
use dependagraph::frontier::{DriverOptions, FrontierDriver};
use dependagraph::source::StubSource;
use dependagraph::store::GraphStore;
use dependagraph::store::in_memory::InMemoryGraphStore;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

/// Parse a reference that the test knows is valid.
pub fn reference(text: &str) -> RepositoryReference {
    RepositoryReference::parse(text).unwrap()
}

/// Build a driver over a stub source and an in-memory store.
pub fn driver(
    source: &StubSource,
    store: &InMemoryGraphStore,
    coalesce: bool,
    workers: usize,
) -> FrontierDriver {
    FrontierDriver::new(
        Arc::new(source.clone()),
        Arc::new(store.clone()) as Arc<dyn GraphStore>,
        DriverOptions {
            coalesce,
            max_concurrent_crawls: workers,
        },
    )
}

/// Edge list as `(dependent, dependency)` string pairs, for readable asserts.
pub fn pairs(edges: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = edges
        .iter()
        .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
        .collect();
    pairs.sort();
    pairs
}

/// Run the dependagraph binary in `dir` with only the given environment.
pub fn run_dependagraph(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dependagraph"));
    command.args(args).current_dir(dir).env_clear();
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("Failed to execute dependagraph binary")
}
