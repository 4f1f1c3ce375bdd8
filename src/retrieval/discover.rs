//! Link discovery
//!
//! Turns a source URI into the ordered list of resource URIs to fetch, either
//! by taking the URI itself (single-resource mode) or by reading the index page
//! it points at (index-page mode).

use crate::config::RetrievalConfig;
use crate::retrieval::parser::extract_table_links;
use crate::url::looks_like_file;
use crate::GetterError;
use reqwest::Client;

/// How a source URI is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// The URI names one resource directly
    SingleResource,
    /// The URI names an index page listing resources in a table
    IndexPage,
}

impl DiscoveryMode {
    /// Picks the mode for a source URI
    pub fn for_uri(source_uri: &str) -> Self {
        if looks_like_file(source_uri) {
            Self::SingleResource
        } else {
            Self::IndexPage
        }
    }
}

/// Resolves source URIs into resource URIs
pub struct LinkDiscoverer<'a> {
    client: &'a Client,
    config: &'a RetrievalConfig,
}

impl<'a> LinkDiscoverer<'a> {
    pub fn new(client: &'a Client, config: &'a RetrievalConfig) -> Self {
        Self { client, config }
    }

    /// Produces the resource URIs for `source_uri`, in discovery order
    ///
    /// # Errors
    ///
    /// * `GetterError::Discovery` - the index page could not be fetched, answered
    ///   with a non-success status, or has no table
    /// * `GetterError::TooManyResources` - more links than `max-retrieval-size`
    pub async fn discover(&self, source_uri: &str) -> Result<Vec<String>, GetterError> {
        let mode = DiscoveryMode::for_uri(source_uri);
        tracing::debug!("Discovering {} as {:?}", source_uri, mode);

        let links = match mode {
            DiscoveryMode::SingleResource => vec![source_uri.to_string()],
            DiscoveryMode::IndexPage => self.discover_index(source_uri).await?,
        };

        tracing::info!("Retrieved {} links from {}", links.len(), source_uri);

        if links.len() > self.config.max_retrieval_size {
            tracing::error!(
                "Unable to continue: {} resources requested, at most {} allowed",
                links.len(),
                self.config.max_retrieval_size
            );
            return Err(GetterError::TooManyResources {
                found: links.len(),
                max: self.config.max_retrieval_size,
            });
        }

        Ok(links)
    }

    async fn discover_index(&self, source_uri: &str) -> Result<Vec<String>, GetterError> {
        let discovery_error = |message: String| GetterError::Discovery {
            uri: source_uri.to_string(),
            message,
        };

        // Index pages are small, so the timeout covers the whole request
        let mut request = self.client.get(source_uri);
        if let Some(timeout) = self.config.fetch_timeout() {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| discovery_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(discovery_error(format!("index page answered HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| discovery_error(format!("failed to read index page: {}", e)))?;

        let candidates = extract_table_links(&body).map_err(|e| discovery_error(e.to_string()))?;

        let mut links = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            tracing::debug!("{}| Link: {}", candidate.display_text, candidate.href);
            match self.config.link_join.join(source_uri, &candidate.href) {
                Ok(uri) => links.push(uri),
                Err(e) => tracing::warn!("Skipping link {}: {}", candidate.href, e),
            }
        }

        Ok(links)
    }
}
