pub mod config;
pub mod encoder;
pub mod error;
pub mod estimator;
pub mod registry;
pub mod row;
pub mod task;

// Re-exports
pub use config::ExportConfig;
pub use encoder::RowEncoder;
pub use error::{Error, Result};
pub use estimator::{Confidence, EstimateMethod, ExportCheck, SizeEstimate, SizeEstimator};
pub use registry::{RegistryStats, TaskRegistry};
pub use row::{Column, QueryExecutor, Row, RowSource, SqlValidator, ValidationOutcome, Value};
pub use task::{ExportFormat, ExportScope, ExportTask, TaskStatus};
