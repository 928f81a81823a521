use std::net::SocketAddr;

use crate::connection::ConnectionState;
use crate::error::{Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::{Frame, HandshakeRequest, OpCode};

/// An application's handle on its bound connection.
///
/// Frames sent through a session are queued and written to the socket when
/// the current callback returns.
pub struct Session<'a> {
    state: &'a mut ConnectionState,
    outbox: &'a mut Vec<u8>,
    peer: SocketAddr,
    request: Option<&'a HandshakeRequest>,
    mask_outgoing: bool,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        state: &'a mut ConnectionState,
        outbox: &'a mut Vec<u8>,
        peer: SocketAddr,
        request: Option<&'a HandshakeRequest>,
        mask_outgoing: bool,
    ) -> Self {
        Self {
            state,
            outbox,
            peer,
            request,
            mask_outgoing,
        }
    }

    /// Queue a text or binary message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] unless the connection is open.
    pub fn send(&mut self, message: impl Into<Message>) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::NotConnected(*self.state));
        }
        let message = message.into();
        self.push(message.as_bytes(), message.opcode());
        Ok(())
    }

    /// Start the close handshake.
    ///
    /// Sends an empty close frame and moves `Open -> Closing`. A connection
    /// still `Connecting` goes straight to `Closed`. Repeated calls are no-ops.
    pub fn close(&mut self) {
        match *self.state {
            ConnectionState::Open => {
                self.push(&[], OpCode::Close);
                *self.state = ConnectionState::Closing;
            }
            ConnectionState::Connecting => *self.state = ConnectionState::Closed,
            ConnectionState::Closing | ConnectionState::Closed => {}
        }
    }

    /// Start the close handshake with a status code and reason.
    ///
    /// Behaves like [`Session::close`]; a reserved code is sent without a status.
    pub fn close_with(&mut self, code: CloseCode, reason: &str) {
        if *self.state != ConnectionState::Open {
            self.close();
            return;
        }
        let frame = if code.is_reserved() {
            Frame::close(None, "")
        } else {
            Frame::close(Some(code.as_u16()), reason)
        };
        self.push(frame.payload(), OpCode::Close);
        *self.state = ConnectionState::Closing;
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state
    }

    /// The peer's `address:port`.
    #[must_use]
    pub fn address_string(&self) -> String {
        self.peer.to_string()
    }

    /// The handshake request this connection was opened with.
    #[must_use]
    pub fn request(&self) -> Option<&HandshakeRequest> {
        self.request
    }

    fn push(&mut self, payload: &[u8], opcode: OpCode) {
        self.outbox
            .extend_from_slice(&Frame::encode(payload, opcode, self.mask_outgoing));
    }
}
