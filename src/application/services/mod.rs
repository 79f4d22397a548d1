pub mod lifecycle;
pub mod log_retriever;

// Re-export commonly used services
pub use lifecycle::ScheduledJobManager;
pub use log_retriever::ExecutionLogRetriever;
