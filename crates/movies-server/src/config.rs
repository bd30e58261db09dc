use std::path::PathBuf;

use crate::error::Result;
pub use clap::Parser;
use movies_app::state::AppConfig;
use url::Url;

#[derive(Debug, Clone, clap::Parser)]
#[command(version, about = "Movie catalogue REST service")]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "MOVIES_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "MOVIES_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "MOVIES_BASE_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of server as visible to clients, used for Location headers"
    )]
    pub base_url: Url,

    #[arg(
        long,
        env = "MOVIES_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db, default is sqlite://[data-dir]/movies.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "MOVIES_DATA_DIR",
        help = "Data directory for database, default is system default like ~/.local/share/movies",
        default_value_t = default_data_dir()
    )]
    data_dir: String,

    #[arg(
        long,
        env = "MOVIES_DEFAULT_PAGE_SIZE",
        default_value = "50",
        help = "Number of movies returned by listing when take is not given"
    )]
    pub default_page_size: u32,

    #[arg(long, env = "MOVIES_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("movies"))
        .unwrap_or_else(|| PathBuf::from("movies"))
        .to_string_lossy()
        .to_string()
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/movies.db", self.data_dir))
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            base_url: config.base_url.clone(),
            default_page_size: config.default_page_size,
        }
    }
}
