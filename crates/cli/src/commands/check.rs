//! `staticip check`: end-to-end diagnostics against a deployed proxy.
//!
//! Each probe yields a [`Probe`] with a PASS/WARN/FAIL [`Outcome`]. A WARN
//! means the proxy answered, but not the way a healthy deployment does.

use std::fmt;
use std::sync::Arc;

use clap::Args;
use proxy::{routes, ConnectionId, HttpMethod, ProxyError, Transport, TransportRequest};
use relay::{FunctionRelayClient, RelayClient, RelayOptions};
use serde_json::json;
use tracing::{info, instrument};

/// Relay target used when `--probe-url` is not given.
pub const DEFAULT_PROBE_URL: &str = "https://httpbin.org/ip";

const UNKNOWN_CONNECTION: &str = "test-connection";

/// Arguments of `staticip check`.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Static IP the proxy is expected to report
    #[arg(long, value_name = "IP")]
    pub expected_ip: Option<String>,

    /// URL fetched through the relay
    #[arg(long, value_name = "URL")]
    pub probe_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        })
    }
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub name: &'static str,
    pub outcome: Outcome,
    pub detail: String,
}

impl Probe {
    fn new(name: &'static str, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            name,
            outcome,
            detail: detail.into(),
        }
    }

    fn failed(name: &'static str, error: &ProxyError) -> Self {
        Self::new(name, Outcome::Fail, error.to_string())
    }
}

/// All probe results, in the order they ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub probes: Vec<Probe>,
}

impl Report {
    fn count(&self, outcome: Outcome) -> usize {
        self.probes.iter().filter(|p| p.outcome == outcome).count()
    }

    /// `true` when no probe failed. Warnings do not fail the run.
    pub fn passed(&self) -> bool {
        self.count(Outcome::Fail) == 0
    }

    /// One line per probe followed by a summary line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for probe in &self.probes {
            out.push_str(&format!("{}  {:<14} {}\n", probe.outcome, probe.name, probe.detail));
        }
        out.push_str(&format!(
            "\n{} passed, {} warnings, {} failed\n",
            self.count(Outcome::Pass),
            self.count(Outcome::Warn),
            self.count(Outcome::Fail)
        ));
        out
    }
}

/// Runs every probe against the proxy behind `transport`, plus the hosted
/// relay function behind `function` when one is configured.
///
/// Probes are independent: one failing does not skip the rest.
#[instrument(skip_all)]
pub async fn run<T: Transport>(
    transport: Arc<T>,
    function: Option<Arc<T>>,
    args: &CheckArgs,
) -> Report {
    let relay = RelayClient::new(Arc::clone(&transport));
    let probe_url = args.probe_url.as_deref().unwrap_or(DEFAULT_PROBE_URL);

    let mut probes = vec![
        health(&relay).await,
        server_info(&relay).await,
        static_ip(&relay, args.expected_ip.as_deref()).await,
        relay_probe(&relay, probe_url).await,
        sftp_connect_probe(transport.as_ref()).await,
        sftp_list_probe(transport.as_ref()).await,
    ];
    if let Some(function) = function {
        let function = FunctionRelayClient::new(function);
        probes.push(function_probe(&function, probe_url, args.expected_ip.as_deref()).await);
    }

    let report = Report { probes };
    info!(
        passed = report.count(Outcome::Pass),
        warnings = report.count(Outcome::Warn),
        failed = report.count(Outcome::Fail),
        "diagnostics finished"
    );
    report
}

async fn health<T: Transport>(relay: &RelayClient<T>) -> Probe {
    match relay.health().await {
        Ok(report) => Probe::new(
            "health",
            Outcome::Pass,
            format!("{} (uptime {:.2}s)", report.status, report.uptime),
        ),
        Err(error) => Probe::failed("health", &error),
    }
}

async fn server_info<T: Transport>(relay: &RelayClient<T>) -> Probe {
    match relay.server_info().await {
        Ok(info) => Probe::new(
            "server info",
            Outcome::Pass,
            format!(
                "version {}, features [{}]",
                info.version.as_deref().unwrap_or("unknown"),
                info.features.join(", ")
            ),
        ),
        Err(error) => Probe::failed("server info", &error),
    }
}

async fn static_ip<T: Transport>(relay: &RelayClient<T>, expected: Option<&str>) -> Probe {
    match relay.static_ip().await {
        Ok(ip) => match expected {
            Some(expected) if !ip.contains(expected) => Probe::new(
                "static ip",
                Outcome::Warn,
                format!("{ip} (expected {expected})"),
            ),
            _ => Probe::new("static ip", Outcome::Pass, ip),
        },
        Err(error) => Probe::failed("static ip", &error),
    }
}

async fn relay_probe<T: Transport>(relay: &RelayClient<T>, url: &str) -> Probe {
    match relay
        .proxy_request(url, HttpMethod::Get, RelayOptions::new())
        .await
    {
        Ok(_) => Probe::new("relay", Outcome::Pass, format!("GET {url}")),
        Err(error) => Probe::failed("relay", &error),
    }
}

/// Relays `url` through the hosted function. A reply whose `origin` does not
/// mention the expected IP only warns.
async fn function_probe<T: Transport>(
    function: &FunctionRelayClient<T>,
    url: &str,
    expected: Option<&str>,
) -> Probe {
    match function.relay(url).await {
        Ok(data) => {
            let origin = data.get("origin").and_then(|o| o.as_str());
            match (expected, origin) {
                (Some(expected), Some(origin)) if !origin.contains(expected) => Probe::new(
                    "function relay",
                    Outcome::Warn,
                    format!("origin {origin} (expected {expected})"),
                ),
                _ => Probe::new("function relay", Outcome::Pass, format!("GET {url}")),
            }
        }
        Err(error) => Probe::failed("function relay", &error),
    }
}

/// A connect without credentials must be refused by the bridge.
///
/// Sent raw: the client library rejects it before reaching the network.
async fn sftp_connect_probe<T: Transport>(transport: &T) -> Probe {
    let request = TransportRequest::post(routes::SFTP_CONNECT)
        .json(json!({ "host": "test.example.com", "username": "test" }));
    status_probe("sftp connect", transport, request, &[400, 500]).await
}

/// Listing an unknown connection must answer 404.
async fn sftp_list_probe<T: Transport>(transport: &T) -> Probe {
    let path = ConnectionId::new(UNKNOWN_CONNECTION)
        .map(|id| routes::sftp_list(&id))
        .unwrap_or_default();
    status_probe("sftp list", transport, TransportRequest::get(path), &[404]).await
}

async fn status_probe<T: Transport>(
    name: &'static str,
    transport: &T,
    request: TransportRequest,
    expected: &[u16],
) -> Probe {
    match transport.send(request).await {
        Ok(response) if expected.contains(&response.status) => Probe::new(
            name,
            Outcome::Pass,
            format!("endpoint available (HTTP {})", response.status),
        ),
        Ok(response) => Probe::new(
            name,
            Outcome::Warn,
            format!("unexpected HTTP {}", response.status),
        ),
        Err(error) => Probe::failed(name, &error.into()),
    }
}
