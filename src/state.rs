use crate::pipeline::SummaryPipeline;

// app's shared state
pub struct AppState {
    pub pipeline: SummaryPipeline,
    pub trust_proxy: bool, // key rate limits on forwarded headers
}
