use std::sync::Arc;

use ft_core::Storage;
use ft_scrapers::PipelineManager;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub pipeline: Arc<PipelineManager>,
}
