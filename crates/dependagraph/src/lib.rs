//! Dependagraph - crawls the repository dependency graph into a graph store.
//!
//! A crawl takes one repository, asks a [`DependencySource`](source::DependencySource)
//! for what it depends on and what depends on it, and saves the answer to a
//! [`GraphStore`](store::GraphStore) as one atomic window. The
//! [`FrontierDriver`](frontier::FrontierDriver) repeats this over the
//! repositories the store has seen but never crawled.

#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod crawl;
pub mod domain;
pub mod error;
pub mod frontier;
pub mod source;
pub mod store;

pub use error::{Error, Result};
