//! # hybi - WebSocket server for the hybi-17 / RFC 6455 protocol
//!
//! `hybi` accepts TCP clients, answers the HTTP Upgrade handshake, decodes
//! WebSocket frames and dispatches messages to an [`Application`] chosen by
//! the request's `Host` header.
//!
//! ## Features
//!
//! - **Bit-exact frame codec** with 7/16/64-bit payload lengths and masking
//! - **Per-connection state machine** with a well-defined close handshake
//! - **Virtual-host dispatch** through an [`AppRegistry`]
//! - **One task per client**, with controlled shutdown of the whole server
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hybi::{Application, CloseFrame, Message, Server, Session};
//!
//! struct Shout;
//!
//! impl Application for Shout {
//!     fn on_message(&mut self, session: &mut Session<'_>, message: Message) {
//!         if let Some(text) = message.as_text() {
//!             let _ = session.send(text.to_uppercase());
//!         }
//!     }
//!
//!     fn on_close(&mut self, _session: &mut Session<'_>, _frame: Option<CloseFrame>) {}
//! }
//!
//! # async fn demo() -> hybi::Result<()> {
//! let mut server = Server::new("localhost", "12345")?;
//! server.register_app("shout", None, |_request: &hybi::HandshakeRequest| {
//!     Box::new(Shout) as Box<dyn Application>
//! });
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod message;
pub mod protocol;
pub mod server;

pub use app::Application;
pub use config::{Config, Limits};
pub use connection::{Connection, ConnectionState, Session};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{HandshakeRequest, OpCode, WS_GUID, compute_accept_key};
pub use server::{AppRegistry, Server, ServerHandle};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<Message>();
        assert_send::<CloseCode>();
        assert_send::<CloseFrame>();
        assert_send::<ConnectionState>();
        assert_send::<AppRegistry>();
        assert_send::<Server>();
        assert_send::<Connection<tokio::net::TcpStream>>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Limits>();
        assert_sync::<Message>();
        assert_sync::<ConnectionState>();
        assert_sync::<AppRegistry>();
    }
}
