use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use threadline_api_client::{ApiClient, RetryConfig};
use threadline_core::{
    ConversationRuntime, CreationTimeCache, DirectoryOptions, SessionBackend, ThreadDirectory,
    ThreadLabeler,
};
use threadline_render::{Theme, ToolResultRenderer};
use threadline_runtime_config::ClientConfig;

/// Everything one CLI invocation talks to, built once from the resolved
/// config.
pub struct Session {
    pub config: ClientConfig,
    pub client: ApiClient,
    pub directory: Arc<ThreadDirectory>,
    pub runtime: Arc<ConversationRuntime>,
    pub labeler: ThreadLabeler,
    pub renderer: ToolResultRenderer,
    pub theme: Theme,
}

impl Session {
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let api_url = config.api_url();
        tracing::debug!("Using API at {api_url} (assistant {})", config.server.assistant_id);

        let client = ApiClient::new(
            &api_url,
            Duration::from_secs(config.server.connect_timeout_secs),
        )?
        .with_retry(RetryConfig::with_max_retries(config.server.max_retries as usize));
        let backend: Arc<dyn SessionBackend> = Arc::new(client.clone());

        let mut options = DirectoryOptions::new(config.server.assistant_id.clone());
        options.page_limit = config.directory.page_limit;
        let directory = Arc::new(ThreadDirectory::new(
            backend.clone(),
            CreationTimeCache::new(),
            options,
        ));
        let runtime = Arc::new(ConversationRuntime::new(
            backend,
            config.server.assistant_id.clone(),
        ));
        let theme = theme_for(&config);

        Ok(Self {
            config,
            client,
            directory,
            runtime,
            labeler: ThreadLabeler::local(),
            renderer: ToolResultRenderer::default(),
            theme,
        })
    }

    /// Periodic refresh interval, `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.config.directory.refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

pub fn theme_for(config: &ClientConfig) -> Theme {
    let colorfgbg = std::env::var("COLORFGBG").ok();
    if config.render.theme.is_dark(colorfgbg.as_deref()) {
        Theme::Dark
    } else {
        Theme::Light
    }
}
