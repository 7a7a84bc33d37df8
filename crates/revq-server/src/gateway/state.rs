use std::sync::Arc;

use revq::customers::CustomerDirectory;
use revq::pipeline::Pipeline;

#[derive(Clone)]
pub struct HandlerState {
    pub pipeline: Arc<Pipeline>,

    pub customers: Arc<dyn CustomerDirectory>,
}

impl HandlerState {
    pub fn new(pipeline: Arc<Pipeline>, customers: Arc<dyn CustomerDirectory>) -> Self {
        Self {
            pipeline,
            customers,
        }
    }
}
