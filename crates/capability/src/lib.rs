//! Capability registry for the CloudLens agent.
//!
//! Core principle: **the model can only call what is registered here, and
//! everything registered here is read-only.**
//!
//! A [`Capability`] pairs a [`CapabilityName`] with a description, an
//! ordered parameter schema ([`ParamSpec`]) and an async executor. The
//! [`Registry`] resolves names coming back from the model and produces the
//! declarations sent to it. Arguments are validated with clamping: values
//! outside a parameter's bounds are pulled back inside them instead of
//! failing the call.

mod capability;
mod catalog;
mod error;
mod params;
mod registry;

pub use capability::{Capability, CapabilityDescriptor, CapabilityName, ExecutorFuture};
pub use catalog::cloud_registry;
pub use error::{Error, Result};
pub use params::{Arguments, ParamKind, ParamSpec};
pub use registry::Registry;
