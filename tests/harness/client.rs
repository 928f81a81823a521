//! Raw WebSocket test client.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use hybi::Error;
use hybi::protocol::handshake::find_request_end;
use hybi::protocol::{Frame, OpCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Key from RFC 6455 Section 1.3.
pub const UPGRADE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

/// The response every handshake using [`UPGRADE_KEY`] must receive.
pub const UPGRADE_RESPONSE: &[u8] = b"HTTP/1.1 101 Switching Protocols\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
    \r\n";

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Build an upgrade request for `/chat`, with an optional `Host` header.
pub fn upgrade_request(host: Option<&str>) -> String {
    let mut request = String::from("GET /chat HTTP/1.1\r\n");
    if let Some(host) = host {
        request.push_str(&format!("Host: {host}\r\n"));
    }
    request.push_str("Upgrade: websocket\r\n");
    request.push_str("Connection: Upgrade\r\n");
    request.push_str(&format!("Sec-WebSocket-Key: {UPGRADE_KEY}\r\n"));
    request.push_str("Sec-WebSocket-Origin: http://example.com\r\n");
    request.push_str("Sec-WebSocket-Version: 13\r\n\r\n");
    request
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "test client timed out")
}

/// A client that completed the opening handshake.
pub struct TestClient {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TestClient {
    /// Connect and handshake with `Host: localhost`.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        Self::connect_with_host(addr, Some("localhost")).await
    }

    /// Connect and handshake with the given `Host` header.
    pub async fn connect_with_host(addr: SocketAddr, host: Option<&str>) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut client = Self {
            stream,
            buf: Vec::new(),
        };
        client.write_raw(upgrade_request(host).as_bytes()).await?;
        let response = client.read_response().await?;
        if response != UPGRADE_RESPONSE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected response: {}", String::from_utf8_lossy(&response)),
            ));
        }
        Ok(client)
    }

    /// Wrap a stream without handshaking.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// Read up to and including the blank line ending the HTTP response.
    pub async fn read_response(&mut self) -> io::Result<Vec<u8>> {
        loop {
            if let Some(end) = find_request_end(&self.buf) {
                return Ok(self.buf.drain(..end).collect());
            }
            if self.fill().await? == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
        }
    }

    /// Write bytes as-is.
    pub async fn write_raw(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Send one masked frame.
    pub async fn send_frame(&mut self, opcode: OpCode, payload: &[u8]) -> io::Result<()> {
        self.write_raw(&Frame::encode(payload, opcode, true)).await
    }

    /// Send a masked text frame.
    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send_frame(OpCode::Text, text.as_bytes()).await
    }

    /// Read raw bytes until `n` are buffered, returning exactly `n`.
    pub async fn recv_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
        }
        Ok(self.buf.drain(..n).collect())
    }

    /// Receive one frame, or `None` if the server closed the socket.
    pub async fn recv_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            match Frame::decode(&self.buf) {
                Ok((frame, consumed)) => {
                    self.buf.drain(..consumed);
                    return Ok(Some(frame));
                }
                Err(Error::IncompleteFrame { .. }) => {}
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
            if self.fill().await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Receive a text frame's payload.
    pub async fn recv_text(&mut self) -> io::Result<Option<String>> {
        match self.recv_frame().await? {
            Some(frame) if frame.opcode == OpCode::Text => String::from_utf8(frame.into_payload())
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Some(frame) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected text frame, got {}", frame.opcode),
            )),
            None => Ok(None),
        }
    }

    /// Send a close frame with `code` and return the server's reply.
    pub async fn close(&mut self, code: u16) -> io::Result<Option<Frame>> {
        self.send_frame(OpCode::Close, &code.to_be_bytes()).await?;
        self.recv_frame().await
    }

    /// Returns `true` once the server has closed the socket with nothing buffered.
    pub async fn is_closed_by_server(&mut self) -> io::Result<bool> {
        Ok(self.buf.is_empty() && self.fill().await? == 0)
    }

    async fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; 4096];
        let n = timeout(IO_TIMEOUT, self.stream.read(&mut chunk))
            .await
            .map_err(|_| timed_out())??;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}
