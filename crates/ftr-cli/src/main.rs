use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use ftr_core::config::{DEFAULT_LIST_TIMEOUT, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_PORT};
use ftr_core::passkey::DEFAULT_PASS_KEY_LEN;
use ftr_core::{receiver, PassKey, ReceiverConfig, TransferRequest};
use mdns_core::{trim_host_name, Announcer, ServiceAnnouncement, SERVICE_TYPE};

#[derive(Parser, Debug)]
#[command(name = "ftr", version, about = "Send files and directories to peers on the local network")]
struct Cli {
    /// Set log level: error,warn,info,debug,trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Join the network and receive files into the drop directory
    Join {
        /// Name to advertise (defaults to the host name)
        #[arg(long)]
        name: Option<String>,

        /// Port the receiver listens on
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Directory received files are written to (defaults to ~/Downloads)
        #[arg(long)]
        dropdir: Option<PathBuf>,

        /// Pre-shared key senders must present (random if omitted)
        #[arg(long)]
        key: Option<String>,

        /// Only advertise the addresses of this network interface
        #[arg(long)]
        interface: Option<String>,
    },

    /// List peers on the local network
    List {
        /// Discovery window in seconds
        #[arg(long, default_value_t = DEFAULT_LIST_TIMEOUT.as_secs())]
        timeout: u64,

        /// Output one JSON object per peer
        #[arg(long)]
        json: bool,
    },

    /// Send a file or directory to a peer
    Send {
        /// Pre-shared key of the receiving peer
        #[arg(long, visible_alias = "psk", default_value = "")]
        key: String,

        /// How long to look for the peer, in milliseconds
        #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64)]
        timeout_ms: u64,

        /// File or directory to send
        path: PathBuf,

        /// Name of the receiving peer
        peer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_target(false)
        .init();

    let result = match cli.cmd {
        Commands::Join { name, port, dropdir, key, interface } => {
            join(name, port, dropdir, key, interface).await
        }

        Commands::List { timeout, json } => list_peers(Duration::from_secs(timeout), json).await,

        Commands::Send { key, timeout_ms, path, peer } => {
            send_to_peer(key, Duration::from_millis(timeout_ms), path, &peer).await
        }
    };

    if let Err(e) = result {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn default_drop_dir() -> Result<PathBuf> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .context("Cannot determine the home directory, pass --dropdir")
}

async fn join(
    name: Option<String>,
    port: u16,
    dropdir: Option<PathBuf>,
    key: Option<String>,
    interface: Option<String>,
) -> Result<()> {
    use mdns_core::net::{advertisable_ipv4, list_interface_ips_result};

    let name = name.unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned());
    let name = trim_host_name(name.trim()).to_string();
    if name.is_empty() {
        anyhow::bail!("The name to advertise is empty");
    }

    let drop_dir = match dropdir {
        Some(dir) => dir,
        None => default_drop_dir()?,
    };
    let key = key.unwrap_or_else(|| PassKey::generate(DEFAULT_PASS_KEY_LEN).to_string());
    let cfg = ReceiverConfig::new(drop_dir, &key, port).context("Invalid receiver settings")?;

    let listener = receiver::bind(&cfg)
        .await
        .with_context(|| format!("Failed to listen on port {}", cfg.port))?;
    let port = listener.local_addr()?.port();

    let interface_ips = list_interface_ips_result()?;
    let addresses = advertisable_ipv4(&interface_ips, interface.as_deref());
    if addresses.is_empty() {
        match &interface {
            Some(interface) => anyhow::bail!("No IPv4 address found on interface: {}", interface),
            None => anyhow::bail!("No non-loopback IPv4 address found"),
        }
    }

    let ann = ServiceAnnouncement {
        service_type: SERVICE_TYPE.to_string(),
        instance_name: name.clone(),
        host_name: format!("{}.local.", name),
        addresses,
        port,
        metadata: vec![cfg.drop_dir.display().to_string()],
    };

    let announcer = Announcer::register(ann).context("Failed to advertise on the local network")?;
    tracing::info!("Announcing: {}", announcer.fullname());
    println!("✓ Advertise within the network with name {}, port {} and key {}", name, port, key);
    println!("  Drop directory: {}", cfg.drop_dir.display());
    println!("  Press Ctrl+C to stop");

    receiver::serve(listener, cfg).await.context("Receiver server error")?;
    drop(announcer);

    Ok(())
}

async fn list_peers(timeout: Duration, json: bool) -> Result<()> {
    let mut entries = mdns_core::browse(SERVICE_TYPE, timeout).context("Failed to list peers")?;

    if !json {
        println!("{:<20} {:<15} {:<5} {:<20}", "HostName", "IPv4", "Port", "DropDir");
    }

    while let Some(entry) = entries.recv().await {
        if json {
            println!("{}", serde_json::to_string(&entry)?);
            continue;
        }
        let ip = entry
            .primary_address()
            .map(|ip| ip.to_string())
            .unwrap_or_default();
        println!("{:<20} {:<15} {:<5} {:<20}", entry.host_name, ip, entry.port, entry.drop_dir());
    }

    Ok(())
}

async fn send_to_peer(key: String, timeout: Duration, path: PathBuf, peer: &str) -> Result<()> {
    if key.is_empty() {
        tracing::warn!("No --key given, the peer will reject the transfer");
    }

    let entry = mdns_core::resolve(SERVICE_TYPE, peer, timeout)
        .await
        .with_context(|| format!("Failed to find the peer {}", peer))?;
    let ip = entry
        .primary_address()
        .with_context(|| format!("Peer {} advertised no IPv4 address", entry.host_name))?;
    println!("Found the peer {} with ip {} and port {}", entry.host_name, ip, entry.port);

    let request = TransferRequest::new(&path, key, IpAddr::V4(ip), entry.port)
        .with_context(|| format!("Failed to stat the source {}", path.display()))?;

    println!("Start sending {} ({})...", path.display(), request.kind);
    let report = ftr_core::send(&request)
        .await
        .with_context(|| format!("Failed to send {}", path.display()))?;

    println!("✓ Sent {} ({} bytes)", report.file_name, report.bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_send_with_psk_alias() {
        let cli = Cli::try_parse_from(["ftr", "send", "--psk", "k1", "report.txt", "alice"]).unwrap();
        match cli.cmd {
            Commands::Send { key, timeout_ms, path, peer } => {
                assert_eq!(key, "k1");
                assert_eq!(timeout_ms, DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64);
                assert_eq!(path, PathBuf::from("report.txt"));
                assert_eq!(peer, "alice");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_join_defaults() {
        let cli = Cli::try_parse_from(["ftr", "join"]).unwrap();
        match cli.cmd {
            Commands::Join { name, port, dropdir, key, interface } => {
                assert_eq!(port, DEFAULT_PORT);
                assert!(name.is_none() && dropdir.is_none() && key.is_none() && interface.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_send_requires_path_and_peer() {
        assert!(Cli::try_parse_from(["ftr", "send", "--key", "k1", "report.txt"]).is_err());
    }
}
