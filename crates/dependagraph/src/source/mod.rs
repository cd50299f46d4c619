//! Dependency sources.
//!
//! A [`DependencySource`] answers two independent questions about a
//! repository: what it depends on, and what depends on it. The crawl
//! orchestrator issues both concurrently and only persists a window when both
//! succeed.
//!
//! # Test Utilities
//!
//! [`StubSource`] returns scripted answers without network access. It is
//! available under `#[cfg(test)]` and with the `test-util` feature:
//!
//! ```toml
//! [dev-dependencies]
//! dependagraph = { version = "...", features = ["test-util"] }
//! ```

use crate::domain::{Repository, RepositoryReference};
use crate::error::SourceError;
use async_trait::async_trait;

pub mod github;

pub use github::GithubSource;

/// Read access to a repository's one-hop dependency neighborhood.
///
/// Implementations must be `Send + Sync`; the two methods may be called
/// concurrently for the same reference.
#[async_trait]
pub trait DependencySource: Send + Sync {
    /// Records the repository depends on, in source order.
    async fn get_dependencies(
        &self,
        reference: &RepositoryReference,
    ) -> Result<Vec<Repository>, SourceError>;

    /// Records that depend on the repository, in source order.
    async fn get_dependents(
        &self,
        reference: &RepositoryReference,
    ) -> Result<Vec<Repository>, SourceError>;
}

#[cfg(any(test, feature = "test-util"))]
pub use stub::StubSource;

#[cfg(any(test, feature = "test-util"))]
mod stub {
    use super::{DependencySource, Repository, RepositoryReference, SourceError};
    use crate::error::NeighborhoodQuery;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone)]
    enum Scripted {
        Names(Vec<String>),
        Fail(String),
    }

    #[derive(Default)]
    struct StubState {
        dependencies: HashMap<String, Scripted>,
        dependents: HashMap<String, Scripted>,
        calls: Vec<(NeighborhoodQuery, String)>,
    }

    /// Scripted [`DependencySource`] for tests.
    ///
    /// Unscripted references answer with an empty list. Clones share state, so
    /// a test can keep a handle for inspecting [`calls`](Self::calls) after
    /// handing the source to a driver.
    #[derive(Clone, Default)]
    pub struct StubSource {
        state: Arc<Mutex<StubState>>,
        delay: Option<Duration>,
        in_flight: Arc<AtomicUsize>,
        peak_in_flight: Arc<AtomicUsize>,
    }

    impl StubSource {
        /// A source that knows nothing; every query returns an empty list.
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the dependencies of `reference`.
        #[must_use]
        pub fn with_dependencies(self, reference: &str, names: &[&str]) -> Self {
            self.script(NeighborhoodQuery::Dependencies, reference, names_of(names))
        }

        /// Script the dependents of `reference`.
        #[must_use]
        pub fn with_dependents(self, reference: &str, names: &[&str]) -> Self {
            self.script(NeighborhoodQuery::Dependents, reference, names_of(names))
        }

        /// Make the dependencies query for `reference` fail.
        #[must_use]
        pub fn failing_dependencies(self, reference: &str, message: &str) -> Self {
            self.script(
                NeighborhoodQuery::Dependencies,
                reference,
                Scripted::Fail(message.to_string()),
            )
        }

        /// Make the dependents query for `reference` fail.
        #[must_use]
        pub fn failing_dependents(self, reference: &str, message: &str) -> Self {
            self.script(
                NeighborhoodQuery::Dependents,
                reference,
                Scripted::Fail(message.to_string()),
            )
        }

        /// Sleep this long inside every query before answering.
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Every query received so far, in arrival order.
        pub fn calls(&self) -> Vec<(NeighborhoodQuery, String)> {
            self.lock().calls.clone()
        }

        /// How many queries of `query` kind were made for `reference`.
        pub fn call_count(&self, query: NeighborhoodQuery, reference: &str) -> usize {
            self.lock()
                .calls
                .iter()
                .filter(|(q, r)| *q == query && r == reference)
                .count()
        }

        /// The highest number of queries that were running at the same time.
        pub fn peak_in_flight(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }

        fn script(self, query: NeighborhoodQuery, reference: &str, answer: Scripted) -> Self {
            {
                let mut state = self.lock();
                let table = match query {
                    NeighborhoodQuery::Dependencies => &mut state.dependencies,
                    NeighborhoodQuery::Dependents => &mut state.dependents,
                };
                table.insert(reference.to_string(), answer);
            }
            self
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
            self.state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }

        async fn answer(
            &self,
            query: NeighborhoodQuery,
            reference: &RepositoryReference,
        ) -> Result<Vec<Repository>, SourceError> {
            let key = reference.to_string();
            let scripted = {
                let mut state = self.lock();
                state.calls.push((query, key.clone()));
                let table = match query {
                    NeighborhoodQuery::Dependencies => &state.dependencies,
                    NeighborhoodQuery::Dependents => &state.dependents,
                };
                table.get(&key).cloned()
            };

            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match scripted {
                None => Ok(Vec::new()),
                Some(Scripted::Names(names)) => {
                    Ok(names.into_iter().map(Repository::new).collect())
                }
                Some(Scripted::Fail(message)) => Err(SourceError::Other(message)),
            }
        }
    }

    fn names_of(names: &[&str]) -> Scripted {
        Scripted::Names(names.iter().map(ToString::to_string).collect())
    }

    #[async_trait]
    impl DependencySource for StubSource {
        async fn get_dependencies(
            &self,
            reference: &RepositoryReference,
        ) -> Result<Vec<Repository>, SourceError> {
            self.answer(NeighborhoodQuery::Dependencies, reference).await
        }

        async fn get_dependents(
            &self,
            reference: &RepositoryReference,
        ) -> Result<Vec<Repository>, SourceError> {
            self.answer(NeighborhoodQuery::Dependents, reference).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NeighborhoodQuery;

    #[tokio::test]
    async fn stub_source_is_object_safe_and_scripted() {
        let stub = StubSource::new()
            .with_dependencies("acme/widgets", &["acme/gears"])
            .failing_dependents("acme/widgets", "rate limited");
        let source: Box<dyn DependencySource> = Box::new(stub.clone());
        let widgets = RepositoryReference::parse("acme/widgets").unwrap();

        let deps = source.get_dependencies(&widgets).await.unwrap();
        assert_eq!(deps, vec![Repository::new("acme/gears")]);

        let err = source.get_dependents(&widgets).await.unwrap_err();
        assert_eq!(err.to_string(), "rate limited");

        assert_eq!(stub.call_count(NeighborhoodQuery::Dependencies, "acme/widgets"), 1);
        assert_eq!(stub.calls().len(), 2);
    }

    #[tokio::test]
    async fn stub_source_defaults_to_empty() {
        let source = StubSource::new();
        let reference = RepositoryReference::parse("nobody/nothing").unwrap();
        assert!(source.get_dependencies(&reference).await.unwrap().is_empty());
        assert!(source.get_dependents(&reference).await.unwrap().is_empty());
    }
}
