pub mod actions;
pub mod core;
pub mod history;
pub mod llm;
pub mod lookup;
pub mod navigator;
pub mod pipeline;
pub mod rag;
pub mod vector_math;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::config::{AppPaths, ConfigService, NavigatorConfig};
pub use crate::core::errors::{NavigatorError, Rejection};
pub use crate::navigator::{NavigatorStats, PolicyNavigator};
