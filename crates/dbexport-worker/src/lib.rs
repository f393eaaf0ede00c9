pub mod sweeper;
pub mod worker;

// Re-exports
pub use sweeper::RetentionSweeper;
pub use worker::ExportWorker;
