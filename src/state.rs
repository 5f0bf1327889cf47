use crate::api::LLMApiProvider;
use crate::auth::AuthProvider;
use crate::models::ModelConfig;
use crate::ocr::OcrProvider;
use crate::storage::StorageManager;
use std::sync::Arc;

// Core application state shared by every request handler.
// Nothing here is mutated per request; the pool serialises database access.
pub struct AppState {
    pub storage: StorageManager,
    pub api_provider: Arc<dyn LLMApiProvider>,
    pub ocr_provider: Arc<dyn OcrProvider>,
    pub auth_provider: Arc<dyn AuthProvider>,
    pub model_config: ModelConfig,
    pub api_key: String,
    pub seed_example_chat: bool,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        storage: StorageManager,
        api_provider: Arc<dyn LLMApiProvider>,
        ocr_provider: Arc<dyn OcrProvider>,
        auth_provider: Arc<dyn AuthProvider>,
        model_config: ModelConfig,
        api_key: String,
    ) -> Self {
        Self {
            storage,
            api_provider,
            ocr_provider,
            auth_provider,
            model_config,
            api_key,
            seed_example_chat: false,
        }
    }

    pub fn with_seed_example_chat(mut self, enabled: bool) -> Self {
        self.seed_example_chat = enabled;
        self
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
