//! Fetching route and stop source documents.
//!
//! Locations are either HTTP(S) URLs or local file paths (optionally
//! `file://`-prefixed). Parsing lives in the core crate; this layer only
//! moves bytes.

use std::future::Future;
use std::pin::Pin;

use tracing::{info, warn};

use shuttle_sim_core::source::{SourceDocument, resolve_sources};
use shuttle_sim_core::{Coordinate, Stop};

use crate::config::SimConfig;
use crate::error::{Result, SimulatorError};

/// Fetch raw source text from a location.
pub trait SourceFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        location: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Production fetcher: HTTP for `http(s)://` locations, the filesystem for
/// everything else.
pub struct FileOrHttpFetcher {
    client: reqwest::Client,
}

impl FileOrHttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for FileOrHttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher for FileOrHttpFetcher {
    fn fetch<'a>(
        &'a self,
        location: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if location.starts_with("http") {
                let body = self
                    .client
                    .get(location)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|err| SimulatorError::SourceLoad(err.to_string()))?
                    .text()
                    .await
                    .map_err(|err| SimulatorError::SourceLoad(err.to_string()))?;
                info!(location, "retrieved source");
                Ok(body)
            } else {
                let path = location.strip_prefix("file://").unwrap_or(location);
                let body = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|err| SimulatorError::SourceLoad(format!("{path}: {err}")))?;
                info!(location, "read source file");
                Ok(body)
            }
        })
    }
}

/// Load and parse both configured sources.
///
/// A single missing or malformed source is tolerated and logged; the load
/// fails only when neither location yields a usable document.
pub async fn load_sources(
    fetcher: &dyn SourceFetcher,
    config: &SimConfig,
) -> Result<(Vec<Coordinate>, Vec<Stop>)> {
    let route_document = fetch_document(fetcher, &config.route_source).await;
    let stops_document = fetch_document(fetcher, &config.stops_source).await;

    let (route, stops) = resolve_sources(route_document, stops_document)
        .map_err(|err| SimulatorError::SourceLoad(err.to_string()))?;
    info!(
        waypoints = route.len(),
        stops = stops.len(),
        "loaded route and stop sources"
    );
    Ok((route, stops))
}

async fn fetch_document(fetcher: &dyn SourceFetcher, location: &str) -> Option<SourceDocument> {
    let raw = match fetcher.fetch(location).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(location, %err, "source unavailable");
            return None;
        }
    };
    match SourceDocument::parse(&raw) {
        Ok(document) => Some(document),
        Err(err) => {
            warn!(location, %err, "source unparsable");
            None
        }
    }
}
