use std::sync::Arc;

use movies_dal::Pool;
use url::Url;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool) -> Self {
        AppState {
            state: Arc::new(AppStateInner { pool, app_config }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn build_url(&self, relative_url: &str) -> Result<Url, url::ParseError> {
        self.config().base_url.join(relative_url)
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }
}

struct AppStateInner {
    pool: Pool,
    app_config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: Url,
    pub default_page_size: u32,
}
