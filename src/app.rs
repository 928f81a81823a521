//! Application callback contract.
//!
//! An [`Application`] is bound to a single connection once its handshake
//! completes. The connection calls back into it for every decoded data
//! frame, for errors, and once when the peer closes. Applications talk back
//! through the [`Session`] they are handed.

use crate::connection::Session;
use crate::error::Error;
use crate::message::{CloseFrame, Message};

/// Per-connection application logic.
///
/// Callbacks run on the connection's worker task, in frame arrival order.
/// Any frames queued on the session are flushed after the callback returns.
///
/// # Example
///
/// ```
/// use hybi::{Application, CloseFrame, Message, Session};
///
/// struct Echo;
///
/// impl Application for Echo {
///     fn on_message(&mut self, session: &mut Session<'_>, message: Message) {
///         let _ = session.send(message);
///     }
///
///     fn on_close(&mut self, _session: &mut Session<'_>, _frame: Option<CloseFrame>) {}
/// }
/// ```
pub trait Application: Send {
    /// Called once per decoded text or binary frame.
    fn on_message(&mut self, session: &mut Session<'_>, message: Message);

    /// Called on a decode or dispatch error associated with this connection.
    fn on_error(&mut self, session: &mut Session<'_>, error: &Error) {
        let _ = (session, error);
    }

    /// Called exactly once when a close frame is received, before the
    /// acknowledgment is sent.
    fn on_close(&mut self, session: &mut Session<'_>, frame: Option<CloseFrame>);
}
