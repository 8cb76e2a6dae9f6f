//! Lambda Cloud GPU provider.
//!
//! Implements the [`GpuProvider`](crate::providers::traits::GpuProvider) trait
//! for the Lambda Cloud public API (`https://cloud.lambda.ai/api/v1`).
//!
//! ## Example
//!
//! ```ignore
//! use lambda_cloud::config::Config;
//! use lambda_cloud::providers::lambda::LambdaCloud;
//! use lambda_cloud::providers::traits::GpuProvider;
//!
//! let provider = LambdaCloud::new(&Config::from_env()?)?;
//!
//! // List instance types and their capacity
//! let types = provider.list_instance_types().await?;
//! ```

mod client;
mod models;

pub use client::LambdaCloud;
