use std::{path::Path, time::Duration};

use anyhow::{Result, anyhow};
use movies_server::config::{Parser, ServerConfig};
use rand::Rng as _;
use reqwest::Url;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub mod rest;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, std::time::Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str, base_dir: &Path) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix_in(format!("{}_", test_name), base_dir)?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?;
    let port = port.to_string();
    let base_url = format!("http://localhost:{}", port);
    let args = &[
        "movies-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--base-url",
        &base_url,
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

/// Config with fresh data directory and migrated database,
/// so tests can seed records before server is launched
pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let base_dir = std::env::temp_dir();
    let (args, guard) = test_config(test_name, &base_dir)?;
    let pool = movies_dal::new_pool(&args.database_url()).await?;
    movies_dal::migrate(&pool).await?;
    pool.close().await;
    debug!("Prepared environment in {:?}", args.data_dir());
    Ok((args, guard))
}

/// Starts server in background and waits until it reports healthy
pub async fn launch_env(args: ServerConfig) -> Result<(reqwest::Client, JoinHandle<()>)> {
    let health_url = args.base_url.join("health")?;
    let server = tokio::spawn(async move {
        if let Err(e) = movies_server::run::run(args).await {
            tracing::error!("Server failed: {e}");
        }
    });

    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(response) = client.get(health_url.clone()).send().await {
            if response.status().is_success() {
                info!("Server is ready");
                return Ok((client, server));
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    server.abort();
    Err(anyhow!("Server did not start in time"))
}

pub fn extend_url(url: &Url, segment: impl ToString) -> Url {
    let mut url = url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.push(&segment.to_string());
    }
    url
}
