//! GitHub-backed dependency source.
//!
//! Dependencies come from the GraphQL dependency graph
//! (`dependencyGraphManifests`). GitHub has no API for dependents, so those
//! are read from the repository's "network dependents" web listing.

use super::DependencySource;
use crate::config::GithubSettings;
use crate::domain::{Repository, RepositoryReference};
use crate::error::SourceError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Preview media type that unlocks the dependency graph on the GraphQL API.
pub const DEPENDENCY_GRAPH_ACCEPT: &str = "application/vnd.github.hawkgirl-preview+json";

const USER_AGENT: &str = concat!("dependagraph/", env!("CARGO_PKG_VERSION"));

const DEPENDENCIES_QUERY: &str = r"
query GetDependencies($org: String!, $name: String!) {
  repository(owner: $org, name: $name) {
    dependencyGraphManifests(first: 100) {
      edges {
        node {
          blobPath
          dependencies(first: 100) {
            nodes {
              packageName
              requirements
              packageManager
              repository { nameWithOwner url }
            }
          }
        }
      }
    }
  }
}";

static DEPENDENT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-hovercard-type="repository"[^>]*?href="/([^/"?#]+)/([^/"?#]+)""#)
        .expect("dependent link pattern is valid")
});

static NEXT_PAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="([^"]*dependents_after=[^"]*)"[^>]*>\s*Next\s*<"#)
        .expect("next page pattern is valid")
});

/// Dependency source backed by github.com.
#[derive(Debug, Clone)]
pub struct GithubSource {
    client: Client,
    settings: GithubSettings,
}

impl GithubSource {
    /// Build a source with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Http` if the HTTP client cannot be constructed.
    pub fn new(settings: GithubSettings) -> Result<Self, SourceError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, settings })
    }

    async fn fetch_dependents_page(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DependencySource for GithubSource {
    async fn get_dependencies(
        &self,
        reference: &RepositoryReference,
    ) -> Result<Vec<Repository>, SourceError> {
        let body = json!({
            "query": DEPENDENCIES_QUERY,
            "variables": {
                "org": reference.organization(),
                "name": reference.name(),
            },
        });

        let response = self
            .client
            .post(&self.settings.api_url)
            .header(reqwest::header::ACCEPT, DEPENDENCY_GRAPH_ACCEPT)
            .bearer_auth(&self.settings.api_secret)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: self.settings.api_url.clone(),
            });
        }

        let payload: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        let dependencies = dependencies_from_response(reference, payload)?;

        tracing::debug!(
            repository = %reference,
            count = dependencies.len(),
            "Fetched dependencies"
        );
        Ok(dependencies)
    }

    async fn get_dependents(
        &self,
        reference: &RepositoryReference,
    ) -> Result<Vec<Repository>, SourceError> {
        let web_root = self.settings.web_url.trim_end_matches('/');
        let mut url = format!("{web_root}/{reference}/network/dependents");
        let mut seen = HashSet::new();
        let mut dependents = Vec::new();

        for page in 1..=self.settings.dependent_pages.max(1) {
            let html = match self.fetch_dependents_page(&url).await {
                Err(SourceError::Status { status, .. })
                    if page == 1 && status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    return Err(SourceError::RepositoryNotFound(reference.clone()));
                }
                other => other?,
            };

            for dependent in dependents_from_html(&html) {
                if dependent != *reference && seen.insert(dependent.clone()) {
                    dependents.push(Repository::from_reference(&dependent));
                }
            }

            match next_page_url(&html, web_root) {
                Some(next) => url = next,
                None => break,
            }
        }

        tracing::debug!(
            repository = %reference,
            count = dependents.len(),
            "Fetched dependents"
        );
        Ok(dependents)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    dependency_graph_manifests: Connection<ManifestEdge>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ManifestEdge {
    node: Manifest,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    dependencies: DependencyNodes,
}

#[derive(Debug, Deserialize)]
struct DependencyNodes {
    #[serde(default)]
    nodes: Vec<DependencyNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyNode {
    package_name: String,
    requirements: Option<String>,
    package_manager: Option<String>,
    repository: Option<HostedRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostedRepository {
    name_with_owner: String,
    url: Option<String>,
}

/// Flatten every manifest's dependencies, first occurrence of a package wins.
fn dependencies_from_response(
    reference: &RepositoryReference,
    payload: GraphQlResponse,
) -> Result<Vec<Repository>, SourceError> {
    if !payload.errors.is_empty() {
        let messages: Vec<_> = payload.errors.into_iter().map(|e| e.message).collect();
        return Err(SourceError::GraphQl(messages.join("; ")));
    }

    let repository = payload
        .data
        .ok_or_else(|| SourceError::Decode("response has no data".to_string()))?
        .repository
        .ok_or_else(|| SourceError::RepositoryNotFound(reference.clone()))?;

    let mut seen = HashSet::new();
    let mut dependencies = Vec::new();
    for edge in repository.dependency_graph_manifests.edges {
        for node in edge.node.dependencies.nodes {
            if !seen.insert(node.package_name.clone()) {
                continue;
            }

            let mut record = Repository::new(node.package_name);
            record.version = node.requirements.filter(|r| !r.is_empty());
            record.language = node.package_manager;
            if let Some(hosted) = node.repository {
                if let Ok(resolved) = RepositoryReference::parse(&hosted.name_with_owner) {
                    record.organization = Some(resolved.organization().to_string());
                    record.name = Some(resolved.name().to_string());
                }
                record.url = hosted.url;
            }
            dependencies.push(record);
        }
    }

    Ok(dependencies)
}

/// Every dependent repository linked from one listing page, in page order.
fn dependents_from_html(html: &str) -> Vec<RepositoryReference> {
    DEPENDENT_LINK
        .captures_iter(html)
        .filter_map(|caps| RepositoryReference::new(&caps[1], &caps[2]).ok())
        .collect()
}

fn next_page_url(html: &str, web_root: &str) -> Option<String> {
    let href = NEXT_PAGE_LINK.captures(html)?.get(1)?.as_str().replace("&amp;", "&");
    if href.starts_with('/') {
        Some(format!("{web_root}{href}"))
    } else {
        Some(href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> RepositoryReference {
        RepositoryReference::parse("acme/widgets").unwrap()
    }

    fn decode(body: &str) -> GraphQlResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn flattens_manifests_and_dedups_packages() {
        let payload = decode(
            r#"{"data":{"repository":{"dependencyGraphManifests":{"edges":[
                {"node":{"blobPath":"/Cargo.toml","dependencies":{"nodes":[
                    {"packageName":"serde","requirements":"= 1.0","packageManager":"RUST",
                     "repository":{"nameWithOwner":"serde-rs/serde","url":"https://github.com/serde-rs/serde"}},
                    {"packageName":"acme/gears","requirements":"","packageManager":"GO","repository":null}
                ]}}},
                {"node":{"blobPath":"/fuzz/Cargo.toml","dependencies":{"nodes":[
                    {"packageName":"serde","requirements":"= 1.0.1","packageManager":"RUST","repository":null}
                ]}}}
            ]}}}}"#,
        );

        let deps = dependencies_from_response(&widgets(), payload).unwrap();

        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].fully_qualified_name, "serde");
        assert_eq!(deps[0].version.as_deref(), Some("= 1.0"));
        assert_eq!(deps[0].language.as_deref(), Some("RUST"));
        assert_eq!(deps[0].organization.as_deref(), Some("serde-rs"));
        assert_eq!(deps[0].url.as_deref(), Some("https://github.com/serde-rs/serde"));
        assert_eq!(deps[1].fully_qualified_name, "acme/gears");
        assert!(deps[1].version.is_none());
    }

    #[test]
    fn graphql_errors_are_reported() {
        let payload = decode(
            r#"{"data":null,"errors":[{"message":"Bad credentials"},{"message":"again"}]}"#,
        );
        let err = dependencies_from_response(&widgets(), payload).unwrap_err();
        assert!(matches!(err, SourceError::GraphQl(ref m) if m == "Bad credentials; again"));
    }

    #[test]
    fn missing_repository_is_not_found() {
        let payload = decode(r#"{"data":{"repository":null}}"#);
        let err = dependencies_from_response(&widgets(), payload).unwrap_err();
        assert!(matches!(err, SourceError::RepositoryNotFound(r) if r == widgets()));
    }

    const LISTING: &str = r#"
        <div class="Box-row">
          <a data-hovercard-type="user" href="/alice">alice</a> /
          <a class="text-bold" data-hovercard-type="repository"
             data-hovercard-url="/acme/app/hovercard" href="/acme/app">app</a>
        </div>
        <div class="Box-row">
          <a data-hovercard-type="repository" data-hovercard-url="/bob/tool/hovercard" href="/bob/tool">tool</a>
        </div>
        <div class="paginate-container">
          <button disabled="disabled">Previous</button>
          <a rel="nofollow" href="https://github.com/acme/widgets/network/dependents?dependent_type=REPOSITORY&amp;dependents_after=MTIz">Next</a>
        </div>"#;

    #[test]
    fn extracts_dependent_repositories() {
        let found = dependents_from_html(LISTING);
        let names: Vec<String> = found.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["acme/app", "bob/tool"]);
    }

    #[test]
    fn follows_next_link_and_unescapes() {
        let next = next_page_url(LISTING, "https://github.com").unwrap();
        assert_eq!(
            next,
            "https://github.com/acme/widgets/network/dependents?dependent_type=REPOSITORY&dependents_after=MTIz"
        );
    }

    #[test]
    fn relative_next_link_is_rooted() {
        let html = r#"<a href="/acme/widgets/network/dependents?dependents_after=abc">Next</a>"#;
        assert_eq!(
            next_page_url(html, "http://localhost:8080").as_deref(),
            Some("http://localhost:8080/acme/widgets/network/dependents?dependents_after=abc")
        );
    }

    #[test]
    fn last_page_has_no_next_link() {
        let html = r#"<button disabled="disabled">Next</button>"#;
        assert!(next_page_url(html, "https://github.com").is_none());
    }
}
