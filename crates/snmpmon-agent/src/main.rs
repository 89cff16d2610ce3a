mod config;
mod connector;
mod transport;

use anyhow::{Context, Result};
use connector::{ConnectorSettings, SnmpConnector};
use snmpmon_collector::cache::SampleCache;
use snmpmon_collector::nedi::NediClient;
use snmpmon_collector::secdata::{NediConfResolver, XorCipher};
use snmpmon_collector::snmp::SnmpClient;
use snmpmon_collector::state::MonitoringState;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;
use transport::{HttpTransport, LogTransport, Transport};

fn secret_store(config: &config::AgentConfig) -> Result<NediConfResolver> {
    match &config.nedi_conf_path {
        Some(dir) => Ok(NediConfResolver::new(dir, XorCipher::from_env())),
        None => NediConfResolver::from_env().context("No secret store configured"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("snmpmon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/snmpmon.toml".to_string());

    let config = config::AgentConfig::load(&config_path)?;
    tracing::info!(agent_id = %config.agent_id, "snmpmon-agent starting");

    let views = config.views();
    for view in views.keys() {
        tracing::info!(view = %view, suggestions = ?connector::list_suggestions(view, ""), "View configured");
    }

    let directory = NediClient::new(&config.nedi_server)?;
    let resolver = secret_store(&config)?;
    tracing::info!(path = %resolver.path().display(), "Using secret store");

    let transport: Box<dyn Transport> = match &config.transport_url {
        Some(url) => Box::new(HttpTransport::new(url)?),
        None => {
            tracing::warn!("No transport_url configured, logging resources only");
            Box::new(LogTransport)
        }
    };

    let mut connector = SnmpConnector::new(
        Arc::new(directory),
        Arc::new(resolver),
        Arc::new(SnmpClient::default()),
        MonitoringState::new(Arc::new(SampleCache::new())),
        ConnectorSettings::from(&config),
    );

    let mut tick = interval(Duration::from_secs(config.check_interval_secs));

    tracing::info!(
        interval_secs = config.check_interval_secs,
        nedi = %config.nedi_server,
        views = views.len(),
        "Starting collection loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(e) = connector.run_cycle(&views, transport.as_ref()).await {
                    tracing::error!(error = %e, "Collection cycle failed");
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!(cached = connector.state().cache().len(), "Shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}
