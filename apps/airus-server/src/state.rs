//! Application state shared by all handlers

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::assistant::gemini::{GeminiClient, GeminiConfig};
use crate::assistant::{Assistant, CompletionService};
use crate::config::ServerConfig;
use crate::dispatcher::pipelines::FontSource;
use crate::dispatcher::Dispatcher;
use crate::store::TransientStore;

pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: TransientStore,
    pub dispatcher: Dispatcher,
    pub assistant: Assistant,
}

impl AppState {
    /// Wire up the production services described by `config`.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let gemini = GeminiClient::new(
            GeminiConfig::new(config.api_key())
                .with_model(config.model.clone())
                .with_base_url(config.ai_base_url.clone())
                .with_timeout(config.ai_timeout()),
        )
        .context("Failed to create completion client")?;

        let fonts = match config.font_url() {
            Some(url) => {
                let client = reqwest::Client::builder()
                    .timeout(config.ai_timeout())
                    .build()
                    .context("Failed to create font client")?;
                FontSource::remote(url, client)
            }
            None => FontSource::Builtin,
        };

        Self::with_services(config, Arc::new(gemini), fonts)
    }

    /// Build state around an explicit completion service and font source.
    pub fn with_services(
        config: Arc<ServerConfig>,
        completion: Arc<dyn CompletionService>,
        fonts: FontSource,
    ) -> Result<Self> {
        let upload_dir = config.upload_dir();
        let store = TransientStore::open(&upload_dir)
            .with_context(|| format!("Cannot create upload directory {}", upload_dir.display()))?;
        info!("Transient uploads in {}", upload_dir.display());

        Ok(Self {
            config,
            store,
            dispatcher: Dispatcher::new(fonts),
            assistant: Assistant::new(completion),
        })
    }
}
