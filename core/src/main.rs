//! Skiff CLI
//!
//! Run a skiff node: an in-memory content cache, the peer file-exchange
//! protocol, and optionally a FUSE mount exposing the cache as a directory.
//!
//! Usage:
//!   skiff-cli --serve                         # Run a node (no mount)
//!   skiff-cli --serve --mount /mnt/skiff      # Mount the cache
//!   skiff-cli --serve --capacity 1GB          # Set cache capacity
//!   skiff-cli --serve --peer <hex-id>         # Dial a known peer

use std::env;
use std::path::PathBuf;

use tracing::info;

use skiff_core::{Node, NodeConfig};

fn print_usage() {
    println!("Skiff Node v0.1.0");
    println!();
    println!("Usage:");
    println!("  skiff-cli --serve                         Run a node");
    println!("  skiff-cli --serve --mount <PATH>          Mount the cache at PATH");
    println!("  skiff-cli --serve --peer <ID>             Dial a peer at startup");
    println!();
    println!("Options:");
    println!("  --serve, -s                 Run in serve mode (required)");
    println!("  --mount <PATH>              Mount point for the filesystem bridge");
    println!("  --capacity <SIZE>           Cache capacity (default: 256MB, e.g., 1GB, 64MB)");
    println!("  --peer <ID>                 Peer endpoint id (64 hex chars), repeatable");
    println!("  --testing                   Use testing config (small cache, short timeouts)");
    println!("  --help, -h                  Show this help");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                    Set log level (e.g., info, debug)");
}

/// Parse a human-readable size string into bytes (e.g., "1GB", "64MB")
fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();

    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num_str, unit) = s.split_at(num_end);

    let num: f64 = num_str.parse().ok()?;

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "KB" | "K" => 1024,
        "MB" | "M" => 1024 * 1024,
        "GB" | "G" => 1024 * 1024 * 1024,
        _ => return None,
    };

    Some((num * multiplier as f64) as u64)
}

/// Parse a peer argument: a 64-hex-char endpoint id.
fn parse_peer_arg(arg: &str) -> Option<iroh::EndpointAddr> {
    if arg.len() != 64 || !arg.chars().all(|c| c.is_ascii_hexdigit()) {
        eprintln!("Invalid peer id: {} (expected 64 hex chars)", arg);
        return None;
    }
    let bytes = hex::decode(arg).ok()?;
    let mut id_bytes = [0u8; 32];
    id_bytes.copy_from_slice(&bytes);
    let id = iroh::EndpointId::from_bytes(&id_bytes).ok()?;
    Some(iroh::EndpointAddr::from(id))
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let show_help = args.iter().any(|a| a == "--help" || a == "-h");
    let serve_mode = args.iter().any(|a| a == "--serve" || a == "-s");
    let testing_mode = args.iter().any(|a| a == "--testing");

    let mount_path: Option<PathBuf> = args
        .windows(2)
        .find(|w| w[0] == "--mount")
        .map(|w| PathBuf::from(&w[1]));

    let capacity: Option<u64> = args
        .windows(2)
        .find(|w| w[0] == "--capacity")
        .and_then(|w| parse_size(&w[1]));

    let peers: Vec<iroh::EndpointAddr> = args
        .windows(2)
        .filter(|w| w[0] == "--peer")
        .filter_map(|w| parse_peer_arg(&w[1]))
        .collect();

    if show_help {
        print_usage();
        return;
    }

    if !serve_mode {
        print_usage();
        println!();
        println!("Run with --serve to start a node");
        return;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("Skiff Node v0.1.0");
    println!();

    let mut config = if testing_mode {
        NodeConfig::for_testing()
    } else {
        NodeConfig::default()
    };
    if let Some(bytes) = capacity {
        config = config.with_cache_capacity(bytes);
    }
    if let Some(ref path) = mount_path {
        config = config.with_mount_path(path.clone());
    }

    println!("Cache capacity: {} bytes", config.cache_capacity_bytes);

    let node = match Node::start(config).await {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Failed to start node: {}", e);
            return;
        }
    };

    let endpoint_hex = hex::encode(node.endpoint_id().as_bytes());
    println!();
    println!("=== Local Node Identity ===");
    println!("EndpointID: {}", endpoint_hex);

    // Dial any peers given on the command line
    for addr in peers {
        let peer_hex = hex::encode(addr.id.as_bytes());
        match node.connect_to_peer(addr).await {
            Ok(()) => println!("Peer connected: {}...", &peer_hex[..16]),
            Err(e) => eprintln!("Peer {}... unreachable: {}", &peer_hex[..16], e),
        }
    }

    // Mount the filesystem bridge if requested
    let session = match mount_path {
        Some(ref path) => match node.mount(path) {
            Ok(session) => {
                println!("Mounted at {}", path.display());
                Some(session)
            }
            Err(e) => {
                eprintln!("Failed to mount: {}", e);
                node.stop().await;
                return;
            }
        },
        None => None,
    };

    println!();
    println!("Skiff node running");
    println!("Press Ctrl+C to stop...");
    println!();

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to wait for shutdown signal: {}", e);
    }
    println!();
    info!("received shutdown signal");

    println!("Shutting down...");
    if let Some(session) = session {
        session.join();
    }
    node.stop().await;
    println!("Done");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("100"), Some(100));
        assert_eq!(parse_size("1KB"), Some(1024));
        assert_eq!(parse_size("64MB"), Some(64 * 1024 * 1024));
        assert_eq!(parse_size("1GB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("1.5KB"), Some(1536));
        assert_eq!(parse_size("nonsense"), None);
    }

    #[test]
    fn test_parse_peer_arg() {
        // A valid ed25519 public key in hex (all-zero is not valid, so use a
        // generated one's format check only for the reject cases).
        assert!(parse_peer_arg("too-short").is_none());
        assert!(parse_peer_arg(&"g".repeat(64)).is_none());

        let key = iroh::SecretKey::from_bytes(&[1u8; 32]).public();
        let hex_id = hex::encode(key.as_bytes());
        let addr = parse_peer_arg(&hex_id).unwrap();
        assert_eq!(addr.id, key);
    }
}
