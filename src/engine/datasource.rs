// SPDX-License-Identifier: Apache-2.0

//! URL-backed JDBC data source
//!
//! A connection factory described only by its JDBC URL and credentials.
//! Opening a connection proves the store is reachable: network URLs get a
//! TCP handshake, embedded/in-memory URLs are accepted as-is.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, instrument};
use url::Url;

use vdbgate_core::{ConnectionFactory, GatewayError, GatewayResult, JdbcConnection, JdbcDataSource};

use crate::engine::registry::known_default_port;
use crate::observability::Sensitive;

const JDBC_PREFIX: &str = "jdbc:";

/// Host and port a network JDBC URL points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEndpoint {
    pub host: String,
    pub port: u16,
}

/// Extracts the network endpoint of a JDBC URL.
///
/// Returns `Ok(None)` for URLs without an authority section
/// (`jdbc:h2:mem:x`, `jdbc:derby:memory:x`, `jdbc:oracle:thin:@…`).
pub fn network_endpoint(url: &str) -> GatewayResult<Option<NetworkEndpoint>> {
    let Some(idx) = url.find("://") else {
        return Ok(None);
    };

    let rest = &url[idx + 3..];
    let authority = rest
        .split(|c: char| c == '/' || c == ';' || c == '?')
        .next()
        .unwrap_or_default();
    if authority.is_empty() {
        return Ok(None);
    }

    let parsed = Url::parse(&format!("probe://{authority}"))
        .map_err(|e| GatewayError::validation(format!("Invalid JDBC URL authority: {e}")))?;

    let host = match parsed.host_str().filter(|h| !h.is_empty()) {
        Some(host) => host.trim_start_matches('[').trim_end_matches(']').to_string(),
        None => return Ok(None),
    };

    let port = parsed
        .port()
        .or_else(|| known_default_port(url))
        .ok_or_else(|| GatewayError::validation(format!("JDBC URL has no port for host {host}")))?;

    Ok(Some(NetworkEndpoint { host, port }))
}

/// JDBC data source identified by URL
#[derive(Debug, Clone)]
pub struct JdbcUrlDataSource {
    name: String,
    url: String,
    username: Option<String>,
    password: Option<Sensitive<String>>,
}

impl JdbcUrlDataSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(Sensitive::new(password.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose().as_str())
    }
}

impl ConnectionFactory for JdbcUrlDataSource {
    fn kind(&self) -> &str {
        "jdbc"
    }

    fn as_jdbc(&self) -> Option<&dyn JdbcDataSource> {
        Some(self)
    }
}

#[async_trait]
impl JdbcDataSource for JdbcUrlDataSource {
    #[instrument(skip(self), fields(data_source = %self.name))]
    async fn get_connection(&self) -> GatewayResult<Box<dyn JdbcConnection>> {
        if !self.url.starts_with(JDBC_PREFIX) {
            return Err(GatewayError::probe_failed(
                &self.name,
                format!("'{}' is not a JDBC URL", self.url),
            ));
        }

        let endpoint = network_endpoint(&self.url)
            .map_err(|e| GatewayError::probe_failed(&self.name, e.to_string()))?;

        let stream = match endpoint {
            Some(NetworkEndpoint { host, port }) => {
                debug!(host = %host, port, "Opening probe connection");
                let stream = TcpStream::connect((host.as_str(), port)).await.map_err(|e| {
                    GatewayError::probe_failed(&self.name, format!("{host}:{port}: {e}"))
                })?;
                Some(stream)
            }
            None => {
                debug!("Embedded JDBC URL, no network probe needed");
                None
            }
        };

        Ok(Box::new(UrlConnection {
            url: self.url.clone(),
            stream,
        }))
    }
}

/// Connection handed out by [`JdbcUrlDataSource`]
struct UrlConnection {
    url: String,
    stream: Option<TcpStream>,
}

#[async_trait]
impl JdbcConnection for UrlConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&mut self) -> GatewayResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .shutdown()
                .await
                .map_err(|e| GatewayError::internal(format!("Failed to close probe connection: {e}")))?;
        }
        Ok(())
    }
}
