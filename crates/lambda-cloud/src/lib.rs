//! Lambda Cloud GPU rental client.
//!
//! Lists instance types with live per-region capacity, launches instances
//! (optionally retrying until capacity appears), terminates them, and keeps
//! `~/.ssh/config` entries for them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────────┐
//! │  CLI / menu  │──►│    RetryEngine     │──►│ LaunchCoordinator│
//! │    (App)     │   │ interval, budget,  │   │  one attempt     │
//! └──────┬───────┘   │ cancellation token │   └────────┬─────────┘
//!        │           └────────────────────┘            │
//!        │                                    ┌────────▼─────────┐
//!        ├───────────────────────────────────►│  InventoryModel  │
//!        │                                    │  type snapshot   │
//!        │                                    └────────┬─────────┘
//!        │    ┌────────────────────────┐      ┌────────▼─────────┐
//!        └───►│ TerminationCoordinator │─────►│   GpuProvider    │
//!             └────────────────────────┘      │  (LambdaCloud)   │
//!                                             └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use lambda_cloud::{Config, LambdaCloud, LaunchCoordinator, LaunchRequest, RetryEngine, RetryPolicy};
//!
//! let provider = Arc::new(LambdaCloud::new(&Config::from_env()?)?);
//! let request = LaunchRequest::new("gpu_1x_a10").ssh_key("laptop");
//!
//! let engine = RetryEngine::new(LaunchCoordinator::new(provider), RetryPolicy::default());
//! let handle = engine.spawn(request, lambda_cloud::retry::NoopObserver);
//! let outcome = handle.join().await?;
//! ```

pub mod app;
pub mod config;
pub mod interrupt;
pub mod inventory;
pub mod launch;
pub mod menu;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod ssh_config;
pub mod terminate;
pub mod ui;

#[cfg(test)]
mod test_support;

pub use app::{App, LaunchOptions};
pub use config::{Config, ConfigError};
pub use inventory::InventoryModel;
pub use launch::{LaunchCoordinator, LaunchOutcome, LaunchRequest};
pub use providers::lambda::LambdaCloud;
pub use providers::traits::{
    ErrorKind, GpuProvider, Instance, InstanceType, ProviderError, RegionAvailability, SshKey,
};
pub use retry::{RetryEngine, RetryHandle, RetryOutcome, RetryPolicy};
pub use terminate::{TerminationCoordinator, TerminationResult, TerminationTarget};
