use std::sync::Arc;

use darkroom_config::ModelsConfig;
use darkroom_images::{ImageNormalizer, ReferenceContext, TempImageStore};
use darkroom_replicate::ResilientCaller;

use crate::fetch::ImageFetcher;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub normalizer: ImageNormalizer,
    pub caller: ResilientCaller,
    pub fetcher: ImageFetcher,
    pub models: Arc<ModelsConfig>,
}

impl AppState {
    pub fn store(&self) -> &TempImageStore {
        self.normalizer.store()
    }

    pub fn context(&self) -> &ReferenceContext {
        self.normalizer.context()
    }
}
