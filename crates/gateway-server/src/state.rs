//! Shared application state.

use gateway_config::GatewayConfig;
use gateway_core::{AttemptSink, GatewayResult, ModelCatalog, UploadSink};
use gateway_providers::{
    DataUrlUploadSink, GeminiClient, GeminiClientConfig, PacingConfig, ProtocolTranslator,
    StaticModelCatalog, StreamRelay, TranslatorConfig,
};
use gateway_resilience::RetryOrchestrator;
use gateway_routing::CredentialPool;
use gateway_telemetry::TracingAttemptSink;
use std::sync::Arc;

use crate::auth::AuthState;

/// State shared by every handler
///
/// One pool is built at startup and shared by the handlers, the health
/// checker and the config watcher.
#[derive(Clone)]
pub struct AppState {
    /// Configuration the state was built from
    pub config: Arc<GatewayConfig>,
    /// Upstream keys
    pub pool: Arc<CredentialPool>,
    /// Backend client
    pub client: GeminiClient,
    /// Request and response translation
    pub translator: Arc<ProtocolTranslator>,
    /// Stream decoding and framing
    pub relay: StreamRelay,
    /// Failover loop
    pub orchestrator: RetryOrchestrator,
    /// Served models
    pub catalog: Arc<dyn ModelCatalog>,
    /// Client access check
    pub auth: Arc<AuthState>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool", &self.pool)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Start building state
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Attempt budget per client request
    pub fn max_retries(&self) -> u32 {
        self.config.credentials.max_retries
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    pool: Option<Arc<CredentialPool>>,
    attempt_sink: Option<Arc<dyn AttemptSink>>,
    upload_sink: Option<Arc<dyn UploadSink>>,
    catalog: Option<Arc<dyn ModelCatalog>>,
}

impl AppStateBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing pool instead of building one from the config
    #[must_use]
    pub fn pool(mut self, pool: Arc<CredentialPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the attempt sink (defaults to log events)
    #[must_use]
    pub fn attempt_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.attempt_sink = Some(sink);
        self
    }

    /// Set the upload sink (defaults to `data:` URLs)
    #[must_use]
    pub fn upload_sink(mut self, sink: Arc<dyn UploadSink>) -> Self {
        self.upload_sink = Some(sink);
        self
    }

    /// Set the model catalog (defaults to the configured lists)
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns a configuration error if the pool or client cannot be built
    pub fn build(self) -> GatewayResult<AppState> {
        let config = self.config.unwrap_or_default();

        let pool = match self.pool {
            Some(pool) => pool,
            None => Arc::new(CredentialPool::new(
                config.credentials.api_key_strings(),
                config.credentials.max_failures,
            )?),
        };

        let client = GeminiClient::new(client_config(&config))?;
        let uploader = self
            .upload_sink
            .unwrap_or_else(|| Arc::new(DataUrlUploadSink));
        let translator = Arc::new(ProtocolTranslator::new(translator_config(&config), uploader));
        let relay = StreamRelay::new(Arc::clone(&translator), pacing_config(&config));

        let sink = self
            .attempt_sink
            .unwrap_or_else(|| Arc::new(TracingAttemptSink::new()));
        let orchestrator = RetryOrchestrator::new(Arc::clone(&pool), sink);

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(catalog_from(&config)));
        let auth = Arc::new(AuthState::from_settings(&config.auth));

        Ok(AppState {
            config: Arc::new(config),
            pool,
            client,
            translator,
            relay,
            orchestrator,
            catalog,
            auth,
        })
    }
}

/// Backend client settings from the config
pub fn client_config(config: &GatewayConfig) -> GeminiClientConfig {
    GeminiClientConfig {
        base_url: config.backend.base_url.clone(),
        api_version: config.backend.api_version.clone(),
        timeout: config.backend.timeout,
        probe_model: config.backend.probe_model.clone(),
    }
}

/// Translator settings from the config
pub fn translator_config(config: &GatewayConfig) -> TranslatorConfig {
    TranslatorConfig {
        code_execution: config.translator.code_execution,
        show_thinking: config.translator.show_thinking,
        show_search_link: config.translator.show_search_link,
        thinking_models: config.models.thinking.clone(),
        thinking_budgets: config.translator.thinking_budgets.clone(),
    }
}

/// Pacing settings from the config
pub fn pacing_config(config: &GatewayConfig) -> PacingConfig {
    let stream = &config.stream;
    PacingConfig {
        enabled: stream.optimize,
        short_threshold: stream.short_threshold,
        long_threshold: stream.long_threshold,
        min_delay: stream.min_delay,
        max_delay: stream.max_delay,
        chunk_size: stream.chunk_size,
    }
}

/// Static catalog from the configured model lists
pub fn catalog_from(config: &GatewayConfig) -> StaticModelCatalog {
    StaticModelCatalog::new(config.models.supported.clone())
        .with_search_models(config.models.search.clone())
        .with_image_models(config.models.image.clone())
        .with_thinking_models(config.models.thinking.clone())
}
