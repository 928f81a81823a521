//! Configuration and limits for the WebSocket server.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default listen backlog for the accept socket.
pub const DEFAULT_BACKLOG: u32 = 15;

/// Default size of a single socket read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Resource limits for a single connection.
///
/// These bound the memory a misbehaving client can make a worker allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of the handshake request in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024, // 16 MB
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_handshake_size: usize) -> Self {
        Self {
            max_frame_size,
            max_handshake_size,
        }
    }

    /// Validate that frame size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_size {
            Err(Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<()> {
        if size > self.max_handshake_size {
            Err(Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Parse a textual port number.
///
/// # Errors
///
/// Returns [`Error::InvalidPort`] if `port` is not a decimal number in `0..=65535`.
pub fn parse_port(port: &str) -> Result<u16> {
    port.trim()
        .parse::<u16>()
        .map_err(|_| Error::InvalidPort(port.to_string()))
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the server binds to (host name or IP literal).
    pub address: String,

    /// Port the server binds to. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Listen backlog.
    ///
    /// Default: 15
    pub backlog: u32,

    /// Size of each socket read (in bytes).
    ///
    /// Default: 4 KB (4096)
    pub read_buffer_size: usize,

    /// Mask frames sent by the server.
    ///
    /// Server-to-client frames are unmasked per RFC 6455; enable only for
    /// testing against peers that expect masking.
    ///
    /// Default: false
    pub mask_outgoing: bool,

    /// Reject handshakes whose version is not 13 or whose key does not
    /// decode to 16 bytes.
    ///
    /// Default: false
    pub strict_handshake: bool,

    /// Resource limits.
    pub limits: Limits,

    /// Log file. `None` logs to stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 0,
            backlog: DEFAULT_BACKLOG,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            mask_outgoing: false,
            strict_handshake: false,
            limits: Limits::default(),
            log_file: None,
        }
    }
}

impl Config {
    /// Create a configuration for `address:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] if `port` is not numeric.
    pub fn new(address: impl Into<String>, port: &str) -> Result<Self> {
        Ok(Self {
            address: address.into(),
            port: parse_port(port)?,
            ..Default::default()
        })
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the listen backlog.
    #[must_use]
    pub const fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Mask outgoing frames.
    #[must_use]
    pub const fn with_mask_outgoing(mut self, mask: bool) -> Self {
        self.mask_outgoing = mask;
        self
    }

    /// Enable strict handshake validation.
    #[must_use]
    pub const fn with_strict_handshake(mut self, strict: bool) -> Self {
        self.strict_handshake = strict;
        self
    }

    /// Log to a file instead of stderr.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// The `address:port` bind target as written in the configuration.
    #[must_use]
    pub fn bind_target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(limits.max_handshake_size, 8192);
    }

    #[test]
    fn test_limits_check_handshake_size() {
        let limits = Limits::default();
        assert!(limits.check_handshake_size(1024).is_ok());
        assert!(limits.check_handshake_size(8192).is_ok());
        assert!(matches!(
            limits.check_handshake_size(10000),
            Err(Error::HandshakeTooLarge {
                size: 10000,
                max: 8192
            })
        ));
    }

    #[test]
    fn test_limits_check_frame_size() {
        let limits = Limits::new(1024, 512);
        assert!(limits.check_frame_size(1024).is_ok());
        assert!(matches!(
            limits.check_frame_size(1025),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("12345").unwrap(), 12345);
        assert_eq!(parse_port(" 80 ").unwrap(), 80);
        assert!(matches!(parse_port("http"), Err(Error::InvalidPort(_))));
        assert!(matches!(parse_port("70000"), Err(Error::InvalidPort(_))));
        assert!(matches!(parse_port(""), Err(Error::InvalidPort(_))));
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("localhost", "12345").unwrap();
        assert_eq!(config.address, "localhost");
        assert_eq!(config.port, 12345);
        assert_eq!(config.backlog, DEFAULT_BACKLOG);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert!(!config.mask_outgoing);
        assert!(!config.strict_handshake);
        assert!(config.log_file.is_none());
        assert_eq!(config.bind_target(), "localhost:12345");
    }

    #[test]
    fn test_config_rejects_non_numeric_port() {
        assert!(matches!(
            Config::new("localhost", "abc"),
            Err(Error::InvalidPort(p)) if p == "abc"
        ));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::default()
            .with_limits(Limits::new(64 * 1024, 4096))
            .with_backlog(64)
            .with_read_buffer_size(1024)
            .with_mask_outgoing(true)
            .with_strict_handshake(true)
            .with_log_file("/tmp/hybi.log");

        assert_eq!(config.limits.max_frame_size, 64 * 1024);
        assert_eq!(config.backlog, 64);
        assert_eq!(config.read_buffer_size, 1024);
        assert!(config.mask_outgoing);
        assert!(config.strict_handshake);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/hybi.log")));
    }
}
