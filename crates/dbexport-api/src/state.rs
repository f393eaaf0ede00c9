use std::sync::Arc;

use dbexport_core::{ExportConfig, QueryExecutor, SqlValidator, TaskRegistry};

#[derive(Clone)]
pub struct ApiState {
    pub registry: TaskRegistry,
    pub executor: Arc<dyn QueryExecutor>,
    pub validator: Arc<dyn SqlValidator>,
    pub config: Arc<ExportConfig>,
}

impl ApiState {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        validator: Arc<dyn SqlValidator>,
        config: ExportConfig,
    ) -> Self {
        Self {
            registry: TaskRegistry::new(config.max_concurrent_per_owner),
            executor,
            validator,
            config: Arc::new(config),
        }
    }
}
