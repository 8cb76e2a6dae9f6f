//! GPU provider implementations.
//!
//! This module contains the [`GpuProvider`] trait and the Lambda Cloud
//! implementation of it.

pub mod lambda;
pub mod traits;

pub use traits::{
    ErrorKind, GpuProvider, Instance, InstanceSpecs, InstanceType, LaunchSpec, ProviderError,
    RegionAvailability, SshKey,
};
