//! Server module: table registry, generic REST handlers, router builder

pub mod builder;
pub mod registry;
pub mod rest;

pub use builder::ServerBuilder;
pub use registry::{ResourceDescriptor, TableRegistry};
pub use rest::AppState;
