//! tftpc - Command-line TFTP client
//!
//! Downloads and uploads single files over TFTP with a fixed 256-byte
//! negotiated block size and timeout-driven retransmission.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use tftpc::driver::{DriverConfig, MAX_RETRIES, TIMEOUT_SECS, fetch_file, store_file};

#[derive(FromArgs, Debug)]
#[argh(
    description = "TFTP client - download and upload files in octet mode",
    example = "Download a file:\n  {command_name} --server 192.168.1.64 get GAME.PRG",
    example = "Upload to an unprivileged server:\n  {command_name} --server 127.0.0.1 --port 6969 put OUT.PRG -i build/out.prg"
)]
struct CliConfig {
    #[argh(option, short = 's', description = "tftp server address")]
    server: String,

    #[argh(
        option,
        short = 'p',
        description = "server request port",
        default = "tftp_client::TFTP_PORT"
    )]
    port: u16,

    #[argh(
        option,
        description = "local udp port to bind (0 for ephemeral)",
        default = "tftp_client::DEFAULT_SOURCE_PORT"
    )]
    source_port: u16,

    #[argh(option, description = "receive timeout in seconds", default = "TIMEOUT_SECS")]
    timeout: u64,

    #[argh(
        option,
        description = "retransmissions before giving up",
        default = "MAX_RETRIES"
    )]
    retries: usize,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Get(GetCommand),
    Put(PutCommand),
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "get", description = "download a file from the server")]
struct GetCommand {
    #[argh(positional, description = "remote filename")]
    filename: String,

    #[argh(
        option,
        short = 'o',
        description = "local path to write (defaults to the remote name)"
    )]
    output: Option<PathBuf>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "put", description = "upload a file to the server")]
struct PutCommand {
    #[argh(positional, description = "remote filename")]
    filename: String,

    #[argh(
        option,
        short = 'i',
        description = "local path to read (defaults to the remote name)"
    )]
    input: Option<PathBuf>,
}

impl CliConfig {
    fn driver_config(&self) -> Result<DriverConfig> {
        let server: IpAddr = self
            .server
            .parse()
            .with_context(|| format!("Invalid server address: {}", self.server))?;

        Ok(DriverConfig {
            server,
            server_port: self.port,
            source_port: self.source_port,
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.retries,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli: CliConfig = argh::from_env();
    let config = cli.driver_config()?;

    match cli.command {
        Command::Get(get) => {
            let content = fetch_file(&config, &get.filename).await?;
            let output = get.output.unwrap_or_else(|| PathBuf::from(&get.filename));
            tokio::fs::write(&output, &content)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!("saved {} bytes to {}", content.len(), output.display());
        }
        Command::Put(put) => {
            let input = put.input.unwrap_or_else(|| PathBuf::from(&put.filename));
            let content = tokio::fs::read(&input)
                .await
                .with_context(|| format!("failed to read {}", input.display()))?;
            store_file(&config, &put.filename, &content).await?;
        }
    }

    Ok(())
}
