//! `staticip sftp`: one file operation through the proxy's SFTP bridge.
//!
//! The operation runs inside [`SftpClient::scoped`], so the remote session is
//! closed whether the operation succeeds, fails, or panics.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Subcommand};
use proxy::{ConnectRequest, ProxyError, Transport, DEFAULT_SFTP_PORT};
use secrecy::SecretString;
use sftp::{SftpClient, DEFAULT_REMOTE_DIR};

/// Arguments of `staticip sftp`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("credential").required(true).args(["password_env", "key_file"])))]
pub struct SftpArgs {
    /// SFTP server host name
    #[arg(long)]
    pub host: String,

    /// SFTP server port
    #[arg(long, default_value_t = DEFAULT_SFTP_PORT)]
    pub port: u16,

    /// Login name
    #[arg(short, long)]
    pub username: String,

    /// Environment variable holding the password
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,

    /// PEM private key file
    #[arg(long, value_name = "FILE")]
    pub key_file: Option<PathBuf>,

    #[command(subcommand)]
    pub operation: SftpOperation,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SftpOperation {
    /// List a remote directory
    Ls {
        /// Remote directory
        #[arg(default_value = DEFAULT_REMOTE_DIR)]
        path: String,
    },

    /// Download a remote file
    Get {
        /// Remote file
        remote: String,
        /// Local destination (defaults to the remote file name)
        local: Option<PathBuf>,
    },

    /// Upload a local file
    Put {
        /// Local file
        local: PathBuf,
        /// Remote destination
        remote: String,
    },
}

impl SftpArgs {
    /// Builds the connect request, reading the credential it names.
    pub fn connect_request(&self) -> Result<ConnectRequest> {
        let request = ConnectRequest::new(&self.host, &self.username).with_port(self.port);
        if let Some(var) = &self.password_env {
            let password = std::env::var(var)
                .with_context(|| format!("password variable {var} is not set"))?;
            return Ok(request.with_password(SecretString::from(password)));
        }
        if let Some(path) = &self.key_file {
            let key = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read private key {}", path.display()))?;
            return Ok(request.with_private_key(SecretString::from(key)));
        }
        Ok(request)
    }
}

/// Connects, runs `operation`, disconnects, and returns the lines to print.
pub async fn run<T: Transport>(
    client: &mut SftpClient<T>,
    request: ConnectRequest,
    operation: SftpOperation,
) -> Result<Vec<String>> {
    let lines = client
        .scoped(move |client| {
            Box::pin(async move {
                client.connect(&request).await?;
                perform(client, operation).await
            })
        })
        .await?;
    Ok(lines)
}

async fn perform<T: Transport>(
    client: &SftpClient<T>,
    operation: SftpOperation,
) -> Result<Vec<String>, ProxyError> {
    match operation {
        SftpOperation::Ls { path } => {
            let entries = client.list(&path).await?;
            Ok(entries
                .into_iter()
                .map(|entry| format!("{:<9} {}", entry.kind.to_string(), entry.name))
                .collect())
        }
        SftpOperation::Get { remote, local } => {
            let written = client.download(&remote, local.as_deref()).await?;
            Ok(vec![format!("{remote} -> {}", written.display())])
        }
        SftpOperation::Put { local, remote } => {
            client.upload(&local, &remote).await?;
            Ok(vec![format!("{} -> {remote}", local.display())])
        }
    }
}
