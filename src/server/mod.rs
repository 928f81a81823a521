//! Accept loop, per-connection workers and virtual-host application dispatch.

mod registry;
#[allow(clippy::module_inception)]
mod server;

pub use registry::{AppFactory, AppRegistry, Registration};
pub use server::{Server, ServerHandle};
