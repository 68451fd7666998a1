//! `staticip`: command-line client for the static-IP proxy.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Resolve configuration** from defaults, `staticip.toml`, the
//!    environment, and flags ([`config`]).
//! 2. **Wire observability**: a `tracing-subscriber` fmt layer (pretty or
//!    JSON) and, when an OTLP endpoint is configured, an OpenTelemetry
//!    exporter ([`observability`]).
//! 3. **Construct infrastructure**: one [`ReqwestTransport`] shared by the
//!    relay and SFTP clients, and a second one for the hosted relay function
//!    when `function_url` is set.
//! 4. **Dispatch** the subcommand inside a root span tagged with a fresh
//!    [`RunId`].

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxy::RunId;
use relay::RelayClient;
use sftp::SftpClient;
use tracing::{info_span, Instrument};
use transport::ReqwestTransport;

mod commands;
mod config;
mod observability;

use commands::check::CheckArgs;
use commands::relay::ProxyArgs;
use commands::sftp::SftpArgs;
use config::{CliConfig, LogFormat, Overrides};

/// Client for the static-IP proxy: relay HTTP requests and move files over
/// SFTP from a fixed outbound address.
#[derive(Parser, Debug)]
#[command(name = "staticip", version, about, long_about = None)]
struct Cli {
    /// Configuration file [default: staticip.toml, if present]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Proxy base URL
    #[arg(long, global = true, env = "STATICIP_BASE_URL")]
    base_url: Option<String>,

    /// User-Agent sent to the proxy
    #[arg(long, global = true, env = "STATICIP_CLIENT_NAME")]
    client_name: Option<String>,

    /// Log filter when RUST_LOG is unset (e.g. `info`, `sftp=debug`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log line format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Hosted relay function URL, probed by `check`
    #[arg(long, global = true, env = "STATICIP_FUNCTION_URL")]
    function_url: Option<String>,

    /// OTLP gRPC endpoint for trace export
    #[arg(long, global = true, env = "STATICIP_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the proxy's outbound static IP
    Ip,

    /// Send one HTTP request through the proxy
    Proxy(ProxyArgs),

    /// Run diagnostics against the proxy
    Check(CheckArgs),

    /// Run one SFTP operation through the proxy
    Sftp(SftpArgs),
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            client_name: self.client_name.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            otlp_endpoint: self.otlp_endpoint.clone(),
            function_url: self.function_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = CliConfig::resolve(cli.config.as_deref(), cli.overrides())
        .context("invalid configuration")?;
    let telemetry = observability::init(&config)?;

    let client_name = config.client_name()?;
    let transport = Arc::new(
        ReqwestTransport::new(config.endpoint()?, &client_name)
            .context("failed to build HTTP client")?,
    );
    let function = config
        .function_endpoint()?
        .map(|endpoint| ReqwestTransport::new(endpoint, &client_name).map(Arc::new))
        .transpose()
        .context("failed to build HTTP client for the relay function")?;

    let run_id = RunId::new_random();
    let span = info_span!("staticip", %run_id, endpoint = %config.base_url);
    let result = dispatch(cli.command, transport, function, &config).instrument(span).await;

    telemetry.shutdown();
    result
}

async fn dispatch(
    command: Commands,
    transport: Arc<ReqwestTransport>,
    function: Option<Arc<ReqwestTransport>>,
    config: &CliConfig,
) -> Result<ExitCode> {
    match command {
        Commands::Ip => {
            let relay = RelayClient::new(transport);
            println!("{}", commands::relay::ip(&relay).await?);
        }
        Commands::Proxy(args) => {
            let relay = RelayClient::new(transport);
            println!("{}", commands::relay::proxy(&relay, args).await?);
        }
        Commands::Check(mut args) => {
            if args.expected_ip.is_none() {
                args.expected_ip = config.expected_ip.clone();
            }
            println!("Checking {}", config.base_url);
            let report = commands::check::run(transport, function, &args).await;
            print!("{}", report.render());
            if !report.passed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Sftp(args) => {
            let request = args.connect_request()?;
            let mut client = SftpClient::new(transport);
            for line in commands::sftp::run(&mut client, request, args.operation).await? {
                println!("{line}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn sftp_requires_exactly_one_credential_source() {
        let parse = |args: &[&str]| Cli::try_parse_from(args);

        assert!(parse(&["staticip", "sftp", "--host", "h", "-u", "u", "ls"]).is_err());
        assert!(parse(&[
            "staticip", "sftp", "--host", "h", "-u", "u", "--password-env", "P", "--key-file",
            "k", "ls",
        ])
        .is_err());

        let cli = parse(&[
            "staticip", "sftp", "--host", "h", "-u", "u", "--password-env", "P", "get", "/a.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Sftp(args) => {
                assert_eq!(args.port, proxy::DEFAULT_SFTP_PORT);
                assert!(matches!(
                    args.operation,
                    commands::sftp::SftpOperation::Get { ref remote, local: None } if remote == "/a.txt"
                ));
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn proxy_accepts_method_headers_and_global_flags() {
        let cli = Cli::try_parse_from([
            "staticip",
            "proxy",
            "https://api.example.com",
            "-X",
            "post",
            "-H",
            "A: 1",
            "-H",
            "B: 2",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.log_format, Some(LogFormat::Json));
        match cli.command {
            Commands::Proxy(args) => {
                assert_eq!(args.method, proxy::HttpMethod::Post);
                assert_eq!(args.headers, ["A: 1", "B: 2"]);
            }
            other => panic!("parsed {other:?}"),
        }
    }
}
