pub mod aggregator;
pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod diff;
pub mod fetch;
pub mod models;
pub mod notifiers;
pub mod pipeline;
pub mod retention;
pub mod scheduler;
pub mod shutdown;
pub mod status;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use pipeline::Pipeline;
pub use scheduler::Scheduler;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
