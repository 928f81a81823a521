use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::app::Application;
use crate::config::{Config, Limits};
use crate::connection::{ConnectionState, Session};
use crate::error::{Error, Result};
use crate::message::{CloseFrame, Message};
use crate::protocol::handshake::{find_request_end, render_upgrade_response};
use crate::protocol::{Frame, HandshakeRequest, OpCode};
use crate::server::AppRegistry;

/// Server side of one WebSocket conversation.
///
/// `Connection` owns the client socket and drives the protocol state
/// machine: it accumulates inbound bytes, performs the opening handshake,
/// binds an [`Application`] chosen by the request's `Host`, decodes frames
/// and dispatches them to the application in arrival order.
///
/// ## Type Parameters
///
/// - `T`: The underlying async I/O stream (e.g., `TcpStream`)
///
/// ## Example
///
/// ```rust,ignore
/// let (stream, peer) = listener.accept().await?;
/// let mut conn = Connection::new(stream, peer, registry.clone(), &config);
///
/// let mut buf = vec![0u8; 4096];
/// loop {
///     let n = conn.get_mut().read(&mut buf).await?;
///     if n == 0 {
///         conn.handle_eof();
///         break;
///     }
///     conn.process_inbound(&buf[..n]).await?;
/// }
/// ```
pub struct Connection<T> {
    io: T,
    peer: SocketAddr,
    state: ConnectionState,
    read_buf: BytesMut,
    outbox: Vec<u8>,
    request: Option<HandshakeRequest>,
    app: Option<Box<dyn Application>>,
    registry: Arc<AppRegistry>,
    limits: Limits,
    mask_outgoing: bool,
    strict_handshake: bool,
}

impl<T> Connection<T> {
    /// Wrap an accepted socket. The connection starts in `Connecting`.
    pub fn new(io: T, peer: SocketAddr, registry: Arc<AppRegistry>, config: &Config) -> Self {
        Self {
            io,
            peer,
            state: ConnectionState::Connecting,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            outbox: Vec::new(),
            request: None,
            app: None,
            registry,
            limits: config.limits.clone(),
            mask_outgoing: config.mask_outgoing,
            strict_handshake: config.strict_handshake,
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection is in an open state.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Returns `true` once the handshake has completed.
    pub fn is_established(&self) -> bool {
        self.request.is_some()
    }

    /// Returns `true` if an application is bound to this connection.
    pub fn has_app(&self) -> bool {
        self.app.is_some()
    }

    /// The peer's socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The peer's `address:port`, for logging and identification.
    pub fn address_string(&self) -> String {
        self.peer.to_string()
    }

    /// The handshake request, once received.
    pub fn request(&self) -> Option<&HandshakeRequest> {
        self.request.as_ref()
    }

    /// The requested `Host`, once the handshake has been received.
    pub fn host(&self) -> Option<&str> {
        self.request.as_ref()?.host.as_deref()
    }

    /// The `ws://` URI the client connected to.
    pub fn uri(&self) -> Option<String> {
        let request = self.request.as_ref()?;
        Some(format!(
            "ws://{}{}",
            request.host.as_deref().unwrap_or_default(),
            request.resource
        ))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.io
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.io
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> T {
        self.io
    }

    /// Handle the peer closing its end of the socket.
    ///
    /// A partially received frame is reported to the application as
    /// [`Error::IncompleteFrame`]. The connection ends up `Closed`.
    pub fn handle_eof(&mut self) {
        if self.state.can_receive() && !self.read_buf.is_empty() {
            let needed = match Frame::decode(&self.read_buf) {
                Err(Error::IncompleteFrame { needed }) => needed,
                _ => 0,
            };
            self.report_error(&Error::IncompleteFrame { needed });
        } else if self.state == ConnectionState::Connecting && !self.read_buf.is_empty() {
            debug!(
                peer = %self.peer,
                buffered = self.read_buf.len(),
                "peer left before completing handshake"
            );
        }
        self.read_buf.clear();
        self.state = ConnectionState::Closed;
    }

    fn drain_inbound(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connecting && !self.try_handshake()? {
            return Ok(());
        }

        while self.state.can_receive() && !self.read_buf.is_empty() {
            let next = Frame::declared_payload_len(&self.read_buf)
                .and_then(|len| self.limits.check_frame_size(len))
                .and_then(|()| Frame::decode(&self.read_buf));
            match next {
                Ok((frame, consumed)) => {
                    self.read_buf.advance(consumed);
                    self.dispatch(frame);
                }
                Err(Error::IncompleteFrame { .. }) => break,
                Err(e) => return Err(e),
            }
        }

        if self.state == ConnectionState::Closed {
            self.read_buf.clear();
        }
        Ok(())
    }

    /// Returns `Ok(false)` while the header block is still incomplete.
    fn try_handshake(&mut self) -> Result<bool> {
        let Some(end) = find_request_end(&self.read_buf) else {
            self.limits.check_handshake_size(self.read_buf.len())?;
            return Ok(false);
        };
        self.limits.check_handshake_size(end)?;

        let head = self.read_buf.split_to(end);
        let request = HandshakeRequest::parse(&head)?;
        if self.strict_handshake {
            request.validate()?;
        }

        let response = render_upgrade_response(&request.accept_key());
        self.outbox.extend_from_slice(response.as_bytes());
        self.state = ConnectionState::Open;

        let host = request.host.as_deref().unwrap_or("default");
        info!(peer = %self.peer, host, resource = %request.resource, "handshake complete");

        match self.registry.lookup(request.host.as_deref()) {
            Some(registration) => {
                info!(peer = %self.peer, app = registration.name(), host, "app found");
                self.app = Some(registration.instantiate(&request));
            }
            None => warn!(peer = %self.peer, host, "no app registered"),
        }

        self.request = Some(request);
        Ok(true)
    }

    fn dispatch(&mut self, frame: Frame) {
        debug!(peer = %self.peer, "inbound frame\n{frame}");

        match frame.opcode {
            OpCode::Text => match String::from_utf8(frame.into_payload()) {
                Ok(text) => self.with_app(|app, session| {
                    app.on_message(session, Message::Text(text));
                }),
                Err(_) => self.report_error(&Error::InvalidUtf8),
            },
            OpCode::Binary => {
                let data = frame.into_payload();
                self.with_app(|app, session| app.on_message(session, Message::Binary(data)));
            }
            OpCode::Close => self.handle_close(&frame),
            OpCode::Ping | OpCode::Pong => {
                debug!(peer = %self.peer, opcode = %frame.opcode, "heartbeat frame ignored");
            }
            other => {
                info!(peer = %self.peer, opcode = %other, "unhandled opcode");
            }
        }
    }

    fn handle_close(&mut self, frame: &Frame) {
        let close = CloseFrame::from_payload(frame.payload());
        let code = close.as_ref().map(|c| c.code);
        info!(peer = %self.peer, code = ?code.map(|c| c.as_u16()), "received close");

        self.with_app(|app, session| app.on_close(session, close));

        if self.state == ConnectionState::Open {
            let status = code.filter(|c| !c.is_reserved()).map(|c| c.as_u16());
            let ack = Frame::close(status, "");
            self.outbox.extend_from_slice(&Frame::encode(
                ack.payload(),
                OpCode::Close,
                self.mask_outgoing,
            ));
        }
        self.state = ConnectionState::Closed;
    }

    fn report_error(&mut self, err: &Error) {
        warn!(peer = %self.peer, error = %err, "connection error");
        self.with_app(|app, session| app.on_error(session, err));
    }

    fn with_app<F>(&mut self, f: F)
    where
        F: FnOnce(&mut dyn Application, &mut Session<'_>),
    {
        let Some(app) = self.app.as_deref_mut() else {
            return;
        };
        let mut session = Session::new(
            &mut self.state,
            &mut self.outbox,
            self.peer,
            self.request.as_ref(),
            self.mask_outgoing,
        );
        f(app, &mut session);
    }

    fn session(&mut self) -> Session<'_> {
        Session::new(
            &mut self.state,
            &mut self.outbox,
            self.peer,
            self.request.as_ref(),
            self.mask_outgoing,
        )
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Feed bytes read from the socket through the state machine.
    ///
    /// While `Connecting`, bytes accumulate until the blank line ending the
    /// HTTP request arrives; the upgrade response is written and any bytes
    /// after the request are decoded as frames. While `Open` or `Closing`,
    /// every complete frame in the buffer is dispatched; a trailing partial
    /// frame waits for the next call.
    ///
    /// ## Errors
    ///
    /// Malformed handshakes and frames are reported to the bound application
    /// (if any) and returned; the caller should drop the connection.
    /// I/O errors from writing queued frames are returned as-is.
    pub async fn process_inbound(&mut self, data: &[u8]) -> Result<()> {
        self.read_buf.extend_from_slice(data);

        let result = self.drain_inbound();
        if let Err(ref err) = result {
            self.report_error(err);
        }

        self.flush().await?;
        result
    }

    /// Send a text or binary message.
    ///
    /// ## Errors
    ///
    /// - `Error::NotConnected` unless the connection is open
    /// - I/O errors from the underlying stream
    pub async fn send(&mut self, message: impl Into<Message>) -> Result<()> {
        self.session().send(message)?;
        self.flush().await
    }

    /// Initiate the close handshake.
    ///
    /// `Open` sends a close frame and becomes `Closing`; `Connecting`
    /// becomes `Closed` without writing. Further calls are no-ops.
    pub async fn close(&mut self) -> Result<()> {
        self.session().close();
        self.flush().await
    }

    /// Write queued frames to the socket.
    pub async fn flush(&mut self) -> Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }
        let result = self.io.write_all(&self.outbox).await;
        self.outbox.clear();
        result?;
        self.io.flush().await?;
        Ok(())
    }
}
