pub mod traits;
pub mod web;

pub use traits::PageDriver;
pub use web::{BrowserSession, BrowserSessionConfig};
