pub mod commit;
pub mod runner;
pub mod spec;
pub mod verify;

#[cfg(test)]
pub mod testutil;

pub use spec::{builtin_flows, FlowSpec, Selectors};
