//! WebSocket opening handshake (RFC 6455 Section 4).
//!
//! This module parses the client's HTTP Upgrade request, derives the accept
//! key and renders the `101 Switching Protocols` response.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version accepted by strict validation.
pub const WS_VERSION: u8 = 13;

/// Terminator of the HTTP header block.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Parse HTTP header lines into a map keyed by lowercase header name.
///
/// The first occurrence of a header wins; later duplicates are ignored.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers
                .entry(name.trim().to_ascii_lowercase())
                .or_insert_with(|| value.trim().to_string());
        }
    }

    headers
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use hybi::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Render the `101 Switching Protocols` response for `accept_key`.
///
/// Clients compare this byte for byte, including the trailing blank line.
#[must_use]
pub fn render_upgrade_response(accept_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n\
         \r\n"
    )
}

/// Find the end of the HTTP header block in `buf`.
///
/// Returns the number of bytes up to and including the blank line, or
/// `None` if the terminator has not arrived yet.
#[must_use]
pub fn find_request_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Parsed WebSocket handshake request from client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The requested resource (e.g., "/chat").
    pub resource: String,
    /// The Host header value.
    pub host: Option<String>,
    /// The Sec-WebSocket-Origin or Origin header value.
    pub origin: Option<String>,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// The Sec-WebSocket-Version header value.
    pub version: Option<u8>,
    /// The Sec-WebSocket-Protocol values.
    pub protocols: Vec<String>,
}

impl HandshakeRequest {
    /// Parse a WebSocket handshake request from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The request line is not `GET <resource> HTTP/1.1`.
    /// - The `Sec-WebSocket-Key` header is missing.
    /// - The `Sec-WebSocket-Version` is present but not a number.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(Error::InvalidHandshake("Invalid request line".into()));
        }

        if parts[0] != "GET" {
            return Err(Error::InvalidHandshake(format!(
                "Expected GET method, got {}",
                parts[0]
            )));
        }

        if parts[2] != "HTTP/1.1" {
            return Err(Error::InvalidHandshake(format!(
                "Expected HTTP/1.1, got {}",
                parts[2]
            )));
        }

        let resource = parts[1].to_string();
        let headers = parse_headers(lines);

        let key = headers
            .get("sec-websocket-key")
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Key header".into()))?
            .clone();

        let version = headers
            .get("sec-websocket-version")
            .map(|v| {
                v.parse::<u8>()
                    .map_err(|_| Error::InvalidHandshake(format!("Invalid version: {}", v)))
            })
            .transpose()?;

        let host = headers.get("host").filter(|h| !h.is_empty()).cloned();

        let origin = headers
            .get("sec-websocket-origin")
            .or_else(|| headers.get("origin"))
            .cloned();

        let protocols = headers
            .get("sec-websocket-protocol")
            .map(|p| {
                p.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            resource,
            host,
            origin,
            key,
            version,
            protocols,
        })
    }

    /// Validate the handshake request according to RFC 6455.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The WebSocket version is missing or not 13.
    /// - The `Sec-WebSocket-Key` is not valid Base64.
    /// - The decoded `Sec-WebSocket-Key` is not exactly 16 bytes.
    pub fn validate(&self) -> Result<()> {
        match self.version {
            Some(WS_VERSION) => {}
            Some(v) => {
                return Err(Error::InvalidHandshake(format!(
                    "Unsupported WebSocket version: {} (expected {})",
                    v, WS_VERSION
                )));
            }
            None => {
                return Err(Error::InvalidHandshake(
                    "Missing Sec-WebSocket-Version header".into(),
                ));
            }
        }

        match BASE64.decode(&self.key) {
            Ok(decoded) if decoded.len() == 16 => Ok(()),
            Ok(decoded) => Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Key must be 16 bytes, got {}",
                decoded.len()
            ))),
            Err(_) => Err(Error::InvalidHandshake(
                "Invalid Sec-WebSocket-Key: not valid Base64".into(),
            )),
        }
    }

    /// The accept key for this request.
    #[must_use]
    pub fn accept_key(&self) -> String {
        compute_accept_key(&self.key)
    }
}
