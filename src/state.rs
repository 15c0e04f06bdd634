use std::sync::Arc;

use crate::pipeline::Pipeline;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pipeline: Pipeline,
}
