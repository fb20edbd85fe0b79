// SPDX-License-Identifier: Apache-2.0

//! Endpoint Adapter
//!
//! Sits in front of the base query-endpoint factory. When an endpoint lists
//! several data sources it federates them through the gateway and points
//! the endpoint at the federated URL; otherwise it passes the single data
//! source through untouched. Placeholder rewriting applies either way.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use vdbgate_core::{ConnectionFactory, GatewayError, GatewayResult, ReferenceResolver};

use crate::endpoint::params::{parse_endpoint_uri, EndpointParameters};
use crate::endpoint::placeholder::{self, DEFAULT_PLACEHOLDER};
use crate::federation::gateway::FederationGateway;

pub const KEY_DATA_SOURCES: &str = "dataSources";
pub const KEY_DATA_SOURCE_REFS: &str = "dataSourceRefs";
pub const KEY_DATA_SOURCE: &str = "dataSource";
pub const KEY_DATA_SOURCE_REF: &str = "dataSourceRef";
pub const KEY_PLACEHOLDER: &str = "placeholder";
pub const KEY_USE_PLACEHOLDER: &str = "usePlaceholder";
pub const TEMPLATE_PREFIX: &str = "template.";

const ON_CONSUME_KEYS: [&str; 2] = ["consumer.onConsume", "onConsume"];
const ON_CONSUME_FAILED_KEYS: [&str; 2] = ["consumer.onConsumeFailed", "onConsumeFailed"];
const ON_CONSUME_BATCH_COMPLETE_KEYS: [&str; 2] = [
    "consumer.onConsumeBatchComplete",
    "onConsumeBatchComplete",
];

/// What the query endpoint connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointTarget {
    /// The deployed default VDB
    Federated { driver_class: String, url: String },
    /// A single data source reference, resolved by the endpoint factory
    DataSource { name: String },
    /// Whatever data source the endpoint factory falls back to
    Default,
}

/// SQL run by a polling consumer around each row or batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleSql {
    pub on_consume: Option<String>,
    pub on_consume_failed: Option<String>,
    pub on_consume_batch_complete: Option<String>,
}

impl LifecycleSql {
    fn rewrite(&self, token: &str) -> Self {
        let apply = |sql: &Option<String>| sql.as_deref().map(|s| placeholder::rewrite(s, token));
        Self {
            on_consume: apply(&self.on_consume),
            on_consume_failed: apply(&self.on_consume_failed),
            on_consume_batch_complete: apply(&self.on_consume_batch_complete),
        }
    }
}

/// Options read from the endpoint parameters, independent of federation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FederatedEndpointConfig {
    pub query_text: String,
    pub placeholder: String,
    pub use_placeholder: bool,
    pub lifecycle: LifecycleSql,
    /// `template.*` options with the prefix stripped
    pub template_options: BTreeMap<String, String>,
}

impl FederatedEndpointConfig {
    /// Consumes the placeholder, lifecycle and template keys
    pub fn from_parameters(
        query_text: impl Into<String>,
        parameters: &mut EndpointParameters,
    ) -> GatewayResult<Self> {
        let placeholder = parameters
            .take(KEY_PLACEHOLDER)
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());
        let use_placeholder = parameters.take_bool(KEY_USE_PLACEHOLDER, true)?;

        let lifecycle = LifecycleSql {
            on_consume: parameters.take_first(&ON_CONSUME_KEYS),
            on_consume_failed: parameters.take_first(&ON_CONSUME_FAILED_KEYS),
            on_consume_batch_complete: parameters.take_first(&ON_CONSUME_BATCH_COMPLETE_KEYS),
        };

        Ok(Self {
            query_text: query_text.into(),
            placeholder,
            use_placeholder,
            lifecycle,
            template_options: parameters.take_prefixed(TEMPLATE_PREFIX),
        })
    }

    pub fn rewritten_query(&self) -> String {
        if self.use_placeholder {
            placeholder::rewrite(&self.query_text, &self.placeholder)
        } else {
            self.query_text.clone()
        }
    }

    pub fn rewritten_lifecycle(&self) -> LifecycleSql {
        if self.use_placeholder {
            self.lifecycle.rewrite(&self.placeholder)
        } else {
            self.lifecycle.clone()
        }
    }
}

/// Everything the base endpoint factory needs to build a query endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryEndpointSpec {
    pub uri: String,
    pub query: String,
    pub target: EndpointTarget,
    pub lifecycle: LifecycleSql,
    pub template_options: BTreeMap<String, String>,
    /// Parameters the adapter did not consume
    pub parameters: BTreeMap<String, String>,
}

/// Base query-endpoint factory the adapter delegates to
pub trait QueryEndpointFactory: Send + Sync {
    type Endpoint;

    fn create_query_endpoint(&self, spec: QueryEndpointSpec) -> GatewayResult<Self::Endpoint>;
}

/// Reads the data-source keys, rejecting a multi-source list combined
/// with a single-source reference.
///
/// `dataSources` wins over `dataSourceRefs`; the loser stays in the
/// parameters and reaches the endpoint factory unchanged.
fn take_data_source_keys(
    parameters: &mut EndpointParameters,
) -> GatewayResult<(Option<String>, Option<String>)> {
    let multi_key = [KEY_DATA_SOURCES, KEY_DATA_SOURCE_REFS]
        .into_iter()
        .find(|k| parameters.contains(k));
    let single_key = [KEY_DATA_SOURCE, KEY_DATA_SOURCE_REF]
        .into_iter()
        .find(|k| parameters.contains(k));

    if let (Some(key), Some(conflicting_key)) = (multi_key, single_key) {
        return Err(GatewayError::conflict(key, conflicting_key));
    }

    let multi = match parameters.take(KEY_DATA_SOURCES) {
        Some(list) => {
            if parameters.contains(KEY_DATA_SOURCE_REFS) {
                warn!(
                    ignored = KEY_DATA_SOURCE_REFS,
                    "Both {KEY_DATA_SOURCES} and {KEY_DATA_SOURCE_REFS} given, federating {KEY_DATA_SOURCES}"
                );
            }
            Some(list)
        }
        None => parameters.take(KEY_DATA_SOURCE_REFS),
    };
    let single = parameters.take_first(&[KEY_DATA_SOURCE, KEY_DATA_SOURCE_REF]);
    Ok((multi, single))
}

fn split_names(list: &str) -> GatewayResult<Vec<String>> {
    let names: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect();

    if names.is_empty() {
        return Err(GatewayError::validation(format!(
            "{KEY_DATA_SOURCES} must name at least one data source"
        )));
    }
    Ok(names)
}

/// Creates query endpoints, federating multi-source ones first
pub struct EndpointAdapter<F> {
    gateway: Arc<FederationGateway>,
    resolver: Arc<dyn ReferenceResolver>,
    factory: F,
}

impl<F: QueryEndpointFactory> EndpointAdapter<F> {
    pub fn new(
        gateway: Arc<FederationGateway>,
        resolver: Arc<dyn ReferenceResolver>,
        factory: F,
    ) -> Self {
        Self {
            gateway,
            resolver,
            factory,
        }
    }

    pub fn gateway(&self) -> &Arc<FederationGateway> {
        &self.gateway
    }

    /// Parses `scheme:query?params` and creates the endpoint
    pub async fn create_endpoint_from_uri(&self, uri: &str) -> GatewayResult<F::Endpoint> {
        let parsed = parse_endpoint_uri(uri)?;
        self.create_endpoint(uri, &parsed.remaining, parsed.parameters)
            .await
    }

    /// Creates an endpoint for `remaining` (the query text).
    ///
    /// A data-source list federates every listed reference and targets the
    /// federated URL. All failures abort creation; no endpoint is produced.
    #[instrument(skip(self, remaining, parameters), fields(params = parameters.len()))]
    pub async fn create_endpoint(
        &self,
        uri: &str,
        remaining: &str,
        mut parameters: EndpointParameters,
    ) -> GatewayResult<F::Endpoint> {
        let (multi, single) = take_data_source_keys(&mut parameters)?;
        let config = FederatedEndpointConfig::from_parameters(remaining, &mut parameters)?;

        let target = match (multi, single) {
            (Some(list), _) => self.federate(&split_names(&list)?).await?,
            (None, Some(name)) => {
                debug!(data_source = %name, "Single data source, no federation");
                EndpointTarget::DataSource { name }
            }
            (None, None) => EndpointTarget::Default,
        };

        let spec = QueryEndpointSpec {
            uri: uri.to_string(),
            query: config.rewritten_query(),
            target,
            lifecycle: config.rewritten_lifecycle(),
            template_options: config.template_options,
            parameters: parameters.into_inner(),
        };

        self.factory.create_query_endpoint(spec)
    }

    /// Stops the gateway when the owning context shuts down
    pub async fn shutdown(&self) {
        self.gateway.stop().await;
    }

    async fn federate(&self, names: &[String]) -> GatewayResult<EndpointTarget> {
        self.gateway.ensure_started().await?;

        let mut registrations: Vec<(String, Arc<dyn ConnectionFactory>)> =
            Vec::with_capacity(names.len());
        for name in names {
            registrations.push((name.clone(), self.resolver.resolve(name)?));
        }

        let url = self.gateway.federate(&registrations).await?;
        info!(sources = ?names, url = %url, "Endpoint federated");

        Ok(EndpointTarget::Federated {
            driver_class: self.gateway.driver_class().to_string(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::endpoint::registry::BeanRegistry;
    use crate::engine::datasource::JdbcUrlDataSource;
    use crate::engine::memory::InMemoryEngineFactory;
    use crate::federation::gateway::GatewayStatus;

    struct EchoFactory;

    impl QueryEndpointFactory for EchoFactory {
        type Endpoint = QueryEndpointSpec;

        fn create_query_endpoint(&self, spec: QueryEndpointSpec) -> GatewayResult<QueryEndpointSpec> {
            Ok(spec)
        }
    }

    fn adapter() -> (Arc<InMemoryEngineFactory>, EndpointAdapter<EchoFactory>) {
        let engines = Arc::new(InMemoryEngineFactory::new());
        let gateway = Arc::new(FederationGateway::new(
            engines.clone(),
            GatewayConfig::default(),
        ));
        let registry = BeanRegistry::new();
        for name in ["dbA", "dbB"] {
            registry
                .bind(
                    name,
                    Arc::new(JdbcUrlDataSource::new(name, format!("jdbc:h2:mem:{name}"))),
                )
                .unwrap();
        }
        (engines, EndpointAdapter::new(gateway, Arc::new(registry), EchoFactory))
    }

    fn params(pairs: &[(&str, &str)]) -> EndpointParameters {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_conflict_in_every_combination() {
        let (engines, adapter) = adapter();
        for multi in [KEY_DATA_SOURCES, KEY_DATA_SOURCE_REFS] {
            for single in [KEY_DATA_SOURCE, KEY_DATA_SOURCE_REF] {
                let err = adapter
                    .create_endpoint("teiid:q", "q", params(&[(single, "dbA"), (multi, "dbA,dbB")]))
                    .await
                    .unwrap_err();
                assert_eq!(err, GatewayError::conflict(multi, single));
            }
        }
        // Rejected before any engine interaction.
        assert!(engines.latest().is_none());
    }

    #[tokio::test]
    async fn test_multi_source_targets_federated_url() {
        let (engines, adapter) = adapter();
        let spec = adapter
            .create_endpoint(
                "teiid:select 1",
                "select * from t where id = #",
                params(&[(KEY_DATA_SOURCES, "dbA, dbB")]),
            )
            .await
            .unwrap();

        assert_eq!(
            spec.target,
            EndpointTarget::Federated {
                driver_class: "org.teiid.jdbc.TeiidDriver".to_string(),
                url: "jdbc:teiid:default".to_string(),
            }
        );
        assert_eq!(spec.query, "select * from t where id = ?");
        let deployed = engines.latest().unwrap().deployed("default", "1.0.0").unwrap();
        assert_eq!(deployed.descriptor.len(), 2);
    }

    #[tokio::test]
    async fn test_data_sources_wins_and_refs_alias_is_forwarded() {
        let (engines, adapter) = adapter();
        let spec = adapter
            .create_endpoint(
                "teiid:q",
                "q",
                params(&[(KEY_DATA_SOURCES, "dbA"), (KEY_DATA_SOURCE_REFS, "dbB")]),
            )
            .await
            .unwrap();

        assert!(matches!(spec.target, EndpointTarget::Federated { .. }));
        assert_eq!(
            spec.parameters.get(KEY_DATA_SOURCE_REFS).map(String::as_str),
            Some("dbB")
        );
        let deployed = engines.latest().unwrap().deployed("default", "1.0.0").unwrap();
        assert!(deployed.descriptor.has_model("dbA"));
        assert!(!deployed.descriptor.has_model("dbB"));
    }

    #[tokio::test]
    async fn test_unknown_reference_fails_whole_creation() {
        let (_, adapter) = adapter();
        let err = adapter
            .create_endpoint("teiid:q", "q", params(&[(KEY_DATA_SOURCE_REFS, "dbA,ghost")]))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::reference_not_found("ghost"));
        assert!(adapter.gateway().federated_url().await.is_err());
        assert!(adapter.gateway().descriptor().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_source_list_rejected() {
        let (_, adapter) = adapter();
        let err = adapter
            .create_endpoint("teiid:q", "q", params(&[(KEY_DATA_SOURCES, " , ")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_single_source_passes_through_without_engine() {
        let (engines, adapter) = adapter();
        let spec = adapter
            .create_endpoint("teiid:q", "select #", params(&[(KEY_DATA_SOURCE_REF, "dbA")]))
            .await
            .unwrap();
        assert_eq!(
            spec.target,
            EndpointTarget::DataSource {
                name: "dbA".to_string()
            }
        );
        assert_eq!(spec.query, "select ?");
        assert!(engines.latest().is_none());
        assert_eq!(adapter.gateway().status().await, GatewayStatus::Uninitialized);
    }

    #[tokio::test]
    async fn test_no_source_uses_default_target() {
        let (_, adapter) = adapter();
        let spec = adapter
            .create_endpoint("teiid:q", "select 1", EndpointParameters::new())
            .await
            .unwrap();
        assert_eq!(spec.target, EndpointTarget::Default);
    }

    #[tokio::test]
    async fn test_placeholder_disabled_leaves_query_untouched() {
        let (_, adapter) = adapter();
        let spec = adapter
            .create_endpoint(
                "teiid:q",
                "select * from t where a = :p",
                params(&[
                    (KEY_PLACEHOLDER, ":p"),
                    (KEY_USE_PLACEHOLDER, "false"),
                    ("onConsume", "update t set done = true where a = :p"),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(spec.query, "select * from t where a = :p");
        assert_eq!(
            spec.lifecycle.on_consume.as_deref(),
            Some("update t set done = true where a = :p")
        );
    }

    #[tokio::test]
    async fn test_lifecycle_and_template_options() {
        let (_, adapter) = adapter();
        let spec = adapter
            .create_endpoint(
                "teiid:q",
                "select * from t",
                params(&[
                    ("consumer.onConsume", "delete from t where id = #"),
                    ("onConsumeFailed", "update t set failed = true where id = #"),
                    ("consumer.onConsumeBatchComplete", "delete from batch"),
                    ("template.maxRows", "10"),
                    ("outputType", "StreamList"),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(
            spec.lifecycle,
            LifecycleSql {
                on_consume: Some("delete from t where id = ?".to_string()),
                on_consume_failed: Some("update t set failed = true where id = ?".to_string()),
                on_consume_batch_complete: Some("delete from batch".to_string()),
            }
        );
        assert_eq!(spec.template_options.get("maxRows").map(String::as_str), Some("10"));
        assert_eq!(
            spec.parameters.into_iter().collect::<Vec<_>>(),
            vec![("outputType".to_string(), "StreamList".to_string())]
        );
    }

    #[tokio::test]
    async fn test_create_from_uri_and_shutdown() {
        let (engines, adapter) = adapter();
        let spec = adapter
            .create_endpoint_from_uri("teiid:select * from t where id = #?dataSources=dbA")
            .await
            .unwrap();
        assert_eq!(spec.query, "select * from t where id = ?");
        assert!(matches!(spec.target, EndpointTarget::Federated { .. }));

        adapter.shutdown().await;
        adapter.shutdown().await;
        assert!(!engines.latest().unwrap().is_running());
        assert_eq!(adapter.gateway().status().await, GatewayStatus::Stopped);
    }
}
