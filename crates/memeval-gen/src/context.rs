//! Explicit runtime context. Built once by the caller, passed down by
//! reference; no global singletons or lazy statics anywhere in the
//! pipeline. Dropping the context ends the run's lifecycle.

use crate::config::GenConfig;
use memeval_core::GenerationStats;
use memeval_llm::LlmClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct RuntimeContext {
    pub config: GenConfig,
    /// Produces dataset content: scenarios, cores, conversations.
    pub generator: Arc<dyn LlmClient>,
    /// Verifies correctness/necessity of evidence; never produces content.
    pub judge: Arc<dyn LlmClient>,
    pub stats: Arc<GenerationStats>,
    pub output_dir: PathBuf,
}

impl RuntimeContext {
    pub fn new(
        config: GenConfig,
        generator: Arc<dyn LlmClient>,
        judge: Arc<dyn LlmClient>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            config,
            generator,
            judge,
            stats: Arc::new(GenerationStats::new()),
            output_dir,
        }
    }

    /// Log the final snapshot and consume the context.
    pub fn shutdown(self) {
        info!("run finished\n{}", self.stats.snapshot());
    }
}
