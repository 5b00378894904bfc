pub mod config;
pub mod driver;
pub mod error;
pub mod flow;
pub mod report;

// Re-export common items
pub use config::Config;
pub use error::FlowError;
pub use flow::runner::{run_all, run_flow};
pub use report::types::{FlowResult, FlowStatus};
