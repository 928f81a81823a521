//! Per-client connection state machine.
//!
//! This module provides the [`Connection`] type that owns one accepted
//! socket, performs the opening handshake and dispatches decoded frames to
//! the bound application through a [`Session`].
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - Socket accepted, waiting for the handshake
//! 2. **Open** - Handshake answered, frames flow both ways
//! 3. **Closing** - Close frame sent, waiting for peer close
//! 4. **Closed** - Connection fully closed

#[allow(clippy::module_inception)]
mod connection;
mod session;
mod state;

pub use connection::Connection;
pub use session::Session;
pub use state::ConnectionState;
