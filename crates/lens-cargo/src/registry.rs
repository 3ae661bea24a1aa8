//! Sparse registry index client.
//!
//! Speaks the sparse index protocol (RFC 2789) for crates.io and any
//! alternate registry configured with a `sparse+` index. Git-protocol
//! indexes are reported as unsupported rather than cloned.
//!
//! # Examples
//!
//! ```no_run
//! use lens_cargo::SparseIndexClient;
//! use lens_core::{RegistryIndex, VersionSource};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SparseIndexClient::new("crate-lens/0.3.0", Duration::from_secs(30))?;
//! let versions = client
//!     .fetch_versions("serde", &RegistryIndex::crates_io())
//!     .await?;
//! println!("serde has {} published versions", versions.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use lens_core::{
    IndexProtocol, PublishedVersion, RegistryIndex, ResolutionError, ResolvedVersion,
    VersionSource,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Base URL for crate pages on crates.io.
pub const CRATES_IO_URL: &str = "https://crates.io/crates";

/// Returns the URL for a crate's page on crates.io.
pub fn crate_url(name: &str) -> String {
    format!("{}/{}", CRATES_IO_URL, name)
}

/// HTTP client for sparse registry indexes.
#[derive(Clone)]
pub struct SparseIndexClient {
    client: Client,
}

impl SparseIndexClient {
    /// Builds a client with the given user agent and per-request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VersionSource for SparseIndexClient {
    async fn fetch_versions(
        &self,
        crate_name: &str,
        index: &RegistryIndex,
    ) -> Result<Vec<PublishedVersion>, ResolutionError> {
        if index.protocol == IndexProtocol::Git {
            return Err(ResolutionError::UnsupportedIndex {
                registry: index.registry.to_string(),
                index: index.url.clone(),
            });
        }

        let url = format!("{}{}", index.url, sparse_index_path(crate_name));
        tracing::debug!("fetching index entry: {}", url);

        let transport = |message: String| ResolutionError::Transport {
            package: crate_name.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE | StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS => {
                return Err(ResolutionError::NotFound {
                    package: crate_name.to_string(),
                    registry: index.registry.to_string(),
                });
            }
            status if !status.is_success() => {
                return Err(transport(format!("HTTP {} for {}", status, url)));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let versions = parse_index_lines(&body);
        if versions.is_empty() {
            return Err(ResolutionError::NoVersions {
                package: crate_name.to_string(),
            });
        }
        Ok(versions)
    }
}

/// Converts a crate name to its sparse index path.
///
/// - 1 char: `1/{name}`
/// - 2 chars: `2/{name}`
/// - 3 chars: `3/{first_char}/{name}`
/// - 4+ chars: `{first_2}/{next_2}/{name}`
pub fn sparse_index_path(name: &str) -> String {
    let name = name.to_lowercase();
    let segment = |skip: usize, take: usize| name.chars().skip(skip).take(take).collect::<String>();
    match name.chars().count() {
        1 => format!("1/{}", name),
        2 => format!("2/{}", name),
        3 => format!("3/{}/{}", segment(0, 1), name),
        _ => format!("{}/{}/{}", segment(0, 2), segment(2, 2), name),
    }
}

/// One line of the newline-delimited JSON index file.
#[derive(Deserialize)]
struct IndexEntry {
    vers: String,
    #[serde(default)]
    yanked: bool,
}

/// Parses an index file, skipping lines that are not valid entries.
fn parse_index_lines(body: &str) -> Vec<PublishedVersion> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let entry: IndexEntry = serde_json::from_str(line).ok()?;
            let version = ResolvedVersion::parse(&entry.vers).ok()?;
            Some(PublishedVersion {
                version,
                yanked: entry.yanked,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::{RegistryId, find_latest, find_latest_stable};

    fn client() -> SparseIndexClient {
        SparseIndexClient::new("crate-lens-test", Duration::from_secs(5)).unwrap()
    }

    fn index(server: &mockito::ServerGuard) -> RegistryIndex {
        RegistryIndex::parse(
            RegistryId::Named("test".into()),
            &format!("sparse+{}/", server.url()),
        )
    }

    #[test]
    fn test_sparse_index_path() {
        assert_eq!(sparse_index_path("a"), "1/a");
        assert_eq!(sparse_index_path("ab"), "2/ab");
        assert_eq!(sparse_index_path("abc"), "3/a/abc");
        assert_eq!(sparse_index_path("serde"), "se/rd/serde");
        assert_eq!(sparse_index_path("Inflector"), "in/fl/inflector");
    }

    #[test]
    fn test_parse_index_lines() {
        let body = r#"{"name":"demo","vers":"0.1.0","yanked":false,"deps":[]}
{"name":"demo","vers":"0.2.0","yanked":true,"deps":[]}
not json at all
{"name":"demo","vers":"0.3.0-beta.1","deps":[]}
{"name":"demo","vers":"bogus","deps":[]}
"#;
        let versions = parse_index_lines(body);
        assert_eq!(versions.len(), 3);
        assert_eq!(find_latest(&versions).unwrap().to_string(), "0.3.0-beta.1");
        assert_eq!(find_latest_stable(&versions).unwrap().to_string(), "0.1.0");
    }

    #[tokio::test]
    async fn test_fetch_versions() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/se/rd/serde")
            .with_status(200)
            .with_body(
                "{\"name\":\"serde\",\"vers\":\"1.0.0\"}\n{\"name\":\"serde\",\"vers\":\"1.0.195\"}\n",
            )
            .create_async()
            .await;

        let versions = client()
            .fetch_versions("serde", &index(&server))
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/no/ne/nonexistent")
            .with_status(404)
            .create_async()
            .await;

        let err = client()
            .fetch_versions("nonexistent", &index(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_transport() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/se/rd/serde")
            .with_status(503)
            .create_async()
            .await;

        let err = client()
            .fetch_versions("serde", &index(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Transport { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_empty_index_file() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/em/pt/empty")
            .with_status(200)
            .with_body("\n")
            .create_async()
            .await;

        let err = client()
            .fetch_versions("empty", &index(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NoVersions { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_registry() {
        let unreachable = RegistryIndex::parse(RegistryId::CratesIo, "sparse+http://127.0.0.1:1/");
        let err = client()
            .fetch_versions("serde", &unreachable)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_git_index_is_unsupported() {
        let git = RegistryIndex::parse(
            RegistryId::Named("legacy".into()),
            "https://git.example.com/index.git",
        );
        let err = client().fetch_versions("serde", &git).await.unwrap_err();
        assert!(matches!(err, ResolutionError::UnsupportedIndex { .. }));
    }

    #[test]
    fn test_crate_url() {
        assert_eq!(crate_url("serde"), "https://crates.io/crates/serde");
    }
}
