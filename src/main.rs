//! vdbgate CLI
//!
//! Builds an endpoint the way a routing context would and shows what the
//! gateway made of it: the target, the rewritten query and the deployed VDB.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use vdbgate::config::GatewayConfig;
use vdbgate::endpoint::{EndpointTarget, QueryEndpointFactory, QueryEndpointSpec};
use vdbgate::engine::JdbcUrlDataSource;
use vdbgate::federation::descriptor;
use vdbgate::{metrics, observability, GatewayContext, GatewayResult};
use vdbgate_core::{dialect, TranslatorBinding, VdbDescriptor};

#[derive(Parser)]
#[command(name = "vdbgate")]
#[command(author, version, about = "Query-federation gateway")]
#[command(propagate_version = true)]
struct Cli {
    /// Gateway configuration file (JSON)
    #[arg(short, long, env = "VDBGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an endpoint and describe the resulting federation
    Describe {
        /// Endpoint URI, e.g. "teiid:select * from t where id = #?dataSources=a,b"
        uri: String,

        /// Data source to bind, as name=jdbc-url (repeatable)
        #[arg(short, long = "source", value_name = "NAME=URL")]
        sources: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the driver classes the gateway can infer a translator for
    Translators {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Endpoint factory that returns the endpoint description unchanged
struct DescribeFactory;

impl QueryEndpointFactory for DescribeFactory {
    type Endpoint = QueryEndpointSpec;

    fn create_query_endpoint(&self, spec: QueryEndpointSpec) -> GatewayResult<QueryEndpointSpec> {
        Ok(spec)
    }
}

#[derive(Serialize)]
struct DescribeReport {
    endpoint: QueryEndpointSpec,
    vdb: Option<VdbDescriptor>,
    vdb_xml: Option<String>,
    generated_at: chrono::DateTime<chrono::Utc>,
    metrics: metrics::GatewayMetricsSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };
    config.apply_env_overrides()?;

    match cli.command {
        Commands::Describe { uri, sources, json } => describe(config, &uri, &sources, json).await,
        Commands::Translators { json } => translators(json),
    }
}

fn parse_source(arg: &str) -> Result<(String, String)> {
    let Some((name, url)) = arg.split_once('=') else {
        bail!("invalid --source '{arg}', expected NAME=URL");
    };
    let (name, url) = (name.trim(), url.trim());
    if name.is_empty() || url.is_empty() {
        bail!("invalid --source '{arg}', expected NAME=URL");
    }
    Ok((name.to_string(), url.to_string()))
}

async fn describe(config: GatewayConfig, uri: &str, sources: &[String], json: bool) -> Result<()> {
    let ctx = GatewayContext::in_memory(config);
    for arg in sources {
        let (name, url) = parse_source(arg)?;
        ctx.registry
            .bind(&name, Arc::new(JdbcUrlDataSource::new(name.as_str(), url)))?;
    }

    let adapter = ctx.adapter(DescribeFactory);
    let created = adapter.create_endpoint_from_uri(uri).await;

    let vdb = ctx.gateway.descriptor().await;
    let vdb_xml = match &vdb {
        Some(vdb) => Some(
            String::from_utf8(descriptor::marshal(vdb)?).context("descriptor is not UTF-8")?,
        ),
        None => None,
    };
    adapter.shutdown().await;

    let endpoint = created.with_context(|| format!("failed to create endpoint for {uri}"))?;

    let report = DescribeReport {
        endpoint,
        vdb,
        vdb_xml,
        generated_at: chrono::Utc::now(),
        metrics: metrics::snapshot(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &DescribeReport) {
    let endpoint = &report.endpoint;
    match &endpoint.target {
        EndpointTarget::Federated { driver_class, url } => {
            println!("Target:      {url} ({driver_class})");
        }
        EndpointTarget::DataSource { name } => println!("Target:      data source '{name}'"),
        EndpointTarget::Default => println!("Target:      default data source"),
    }
    println!("Query:       {}", endpoint.query);

    let lifecycle = [
        ("onConsume", &endpoint.lifecycle.on_consume),
        ("onConsumeFailed", &endpoint.lifecycle.on_consume_failed),
        (
            "onConsumeBatchComplete",
            &endpoint.lifecycle.on_consume_batch_complete,
        ),
    ];
    for (key, sql) in lifecycle {
        if let Some(sql) = sql {
            println!("{key}: {sql}");
        }
    }
    for (key, value) in &endpoint.template_options {
        println!("template.{key} = {value}");
    }
    for (key, value) in &endpoint.parameters {
        println!("{key} = {value}");
    }

    if let Some(vdb) = &report.vdb {
        println!();
        println!("VDB {} {} ({} models)", vdb.name, vdb.version, vdb.len());
        for model in vdb.models() {
            println!("  {:<20} {}", model.name, model.translator_id());
        }
    }
    if let Some(xml) = &report.vdb_xml {
        println!();
        print!("{xml}");
    }
}

fn translators(json: bool) -> Result<()> {
    let bindings: Vec<TranslatorBinding> = dialect::bindings().collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&bindings)?);
        return Ok(());
    }
    for binding in &bindings {
        println!("{:<45} {}", binding.driver_class_name, binding.translator_id);
    }
    Ok(())
}
