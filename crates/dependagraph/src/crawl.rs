//! One crawl: fetch a repository's neighborhood and save it as a window.

use crate::domain::RepositoryReference;
use crate::error::{Error, NeighborhoodQuery, Result};
use crate::source::DependencySource;
use crate::store::GraphStore;

/// What one successful crawl wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// The crawled repository.
    pub reference: RepositoryReference,
    /// Number of dependencies saved.
    pub dependencies: usize,
    /// Number of dependents saved.
    pub dependents: usize,
}

/// Crawl `reference`: query both directions concurrently, then save one window.
///
/// Nothing is written unless both queries succeed, so a failed crawl leaves
/// the repository on the frontier.
///
/// # Errors
///
/// - `Error::Fetch` if either query fails (the dependencies failure wins when
///   both fail; the other is logged)
/// - `Error::Persistence` if the store rejects the window
pub async fn crawl_repository(
    reference: &RepositoryReference,
    source: &dyn DependencySource,
    store: &dyn GraphStore,
) -> Result<CrawlSummary> {
    tracing::debug!(repository = %reference, "Crawling");

    let (dependencies, dependents) = tokio::join!(
        source.get_dependencies(reference),
        source.get_dependents(reference)
    );

    let (dependencies, dependents) = match (dependencies, dependents) {
        (Ok(dependencies), Ok(dependents)) => (dependencies, dependents),
        (Err(source), Ok(_)) => {
            return Err(fetch_error(reference, NeighborhoodQuery::Dependencies, source));
        }
        (Ok(_), Err(source)) => {
            return Err(fetch_error(reference, NeighborhoodQuery::Dependents, source));
        }
        (Err(source), Err(other)) => {
            tracing::warn!(
                repository = %reference,
                error = %other,
                "Dependents query also failed"
            );
            return Err(fetch_error(reference, NeighborhoodQuery::Dependencies, source));
        }
    };

    store
        .save_window(reference, &dependencies, &dependents)
        .await?;

    let summary = CrawlSummary {
        reference: reference.clone(),
        dependencies: dependencies.len(),
        dependents: dependents.len(),
    };
    tracing::info!(
        repository = %reference,
        dependencies = summary.dependencies,
        dependents = summary.dependents,
        "Crawled repository"
    );
    Ok(summary)
}

fn fetch_error(
    reference: &RepositoryReference,
    query: NeighborhoodQuery,
    source: crate::error::SourceError,
) -> Error {
    Error::Fetch {
        reference: reference.clone(),
        query,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StubSource;
    use crate::store::in_memory::InMemoryGraphStore;
    use std::collections::HashSet;

    fn widgets() -> RepositoryReference {
        RepositoryReference::parse("acme/widgets").unwrap()
    }

    #[tokio::test]
    async fn crawl_saves_one_window() {
        let source = StubSource::new()
            .with_dependencies("acme/widgets", &["acme/gears"])
            .with_dependents("acme/widgets", &["acme/app"]);
        let store = InMemoryGraphStore::new();

        let summary = crawl_repository(&widgets(), &source, &store).await.unwrap();

        assert_eq!(summary.dependencies, 1);
        assert_eq!(summary.dependents, 1);
        let stats = store.stats().await.unwrap();
        assert_eq!((stats.nodes, stats.edges, stats.targeted), (3, 2, 1));
    }

    #[tokio::test]
    async fn failed_dependents_writes_nothing() {
        let source = StubSource::new()
            .with_dependencies("acme/widgets", &["acme/gears"])
            .failing_dependents("acme/widgets", "rate limited");
        let store = InMemoryGraphStore::new();

        let err = crawl_repository(&widgets(), &source, &store).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Fetch {
                query: NeighborhoodQuery::Dependents,
                ..
            }
        ));
        assert_eq!(store.stats().await.unwrap().nodes, 0);
        assert_eq!(store.get_untargeted_node(&HashSet::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn both_failing_reports_dependencies() {
        let source = StubSource::new()
            .failing_dependencies("acme/widgets", "boom")
            .failing_dependents("acme/widgets", "bang");
        let store = InMemoryGraphStore::new();

        let err = crawl_repository(&widgets(), &source, &store).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Fetch {
                query: NeighborhoodQuery::Dependencies,
                ..
            }
        ));
        assert_eq!(err.to_string(), "failed to fetch dependencies of acme/widgets");
    }

    #[tokio::test]
    async fn both_queries_are_issued() {
        let source = StubSource::new();
        let store = InMemoryGraphStore::new();

        crawl_repository(&widgets(), &source, &store).await.unwrap();

        assert_eq!(source.call_count(NeighborhoodQuery::Dependencies, "acme/widgets"), 1);
        assert_eq!(source.call_count(NeighborhoodQuery::Dependents, "acme/widgets"), 1);
        assert_eq!(store.stats().await.unwrap().targeted, 1);
    }
}
