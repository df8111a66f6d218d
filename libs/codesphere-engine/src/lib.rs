pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod judge;
pub mod recipe;
pub mod sandbox;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use executor::Engine;
pub use sandbox::{DockerSandbox, Sandbox};
