//! WebSocket frame decoding and encoding (RFC 6455 Section 5.2).

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask, apply_mask_fast, random_mask};

/// Largest payload that fits the 7-bit literal length field.
pub const MAX_LITERAL_PAYLOAD: usize = 125;

/// Largest payload that fits the 16-bit extended length field.
pub const MAX_EXTENDED16_PAYLOAD: usize = 65535;

/// Longest close reason that keeps a close frame within the control-frame limit.
pub const MAX_CLOSE_REASON: usize = MAX_LITERAL_PAYLOAD - 2;

/// Fixed part of a frame, up to and including the masking key.
#[derive(Debug, Clone)]
struct FrameHeader {
    byte0: u8,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    header_len: usize,
}

/// Fail with `IncompleteFrame` unless `buf` holds at least `len` bytes.
#[inline]
fn require(buf: &[u8], len: usize) -> Result<()> {
    match len.checked_sub(buf.len()) {
        Some(needed) if needed > 0 => Err(Error::IncompleteFrame { needed }),
        _ => Ok(()),
    }
}

impl FrameHeader {
    /// Read the header at the front of `buf`.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` with the bytes still missing from the header
    /// - `Error::PayloadTooLargeForPlatform` if the 64-bit length overflows `usize`
    #[inline]
    fn parse(buf: &[u8]) -> Result<Self> {
        require(buf, 2)?;
        let opcode = OpCode::from_u8(buf[0] & 0x0F)?;
        let masked = buf[1] & 0x80 != 0;

        let (payload_len, len_end) = match buf[1] & 0x7F {
            short @ 0..=125 => (usize::from(short), 2),
            126 => {
                require(buf, 4)?;
                (usize::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
            }
            _ => {
                require(buf, 10)?;
                let mut wide = [0u8; 8];
                wide.copy_from_slice(&buf[2..10]);
                let size = u64::from_be_bytes(wide);
                let len = usize::try_from(size).map_err(|_| Error::PayloadTooLargeForPlatform {
                    size,
                    max: usize::MAX as u64,
                })?;
                (len, 10)
            }
        };

        let (mask, header_len) = if masked {
            require(buf, len_end + 4)?;
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[len_end..len_end + 4]);
            (Some(key), len_end + 4)
        } else {
            (None, len_end)
        };

        Ok(Self {
            byte0: buf[0],
            opcode,
            mask,
            payload_len,
            header_len,
        })
    }
}

/// A single WebSocket frame.
///
/// Decoded frames carry the unmasked payload and, when the frame arrived
/// masked, the key that was used. Reserved bits are captured as-is.
///
/// ## Frame Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new unmasked frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload,
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    ///
    /// The reason is cut at a character boundary to at most
    /// [`MAX_CLOSE_REASON`] bytes so the payload never exceeds 125 bytes.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = code.map_or_else(Vec::new, |code| {
            let mut end = reason.len().min(MAX_CLOSE_REASON);
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            let mut data = Vec::with_capacity(2 + end);
            data.extend_from_slice(&code.to_be_bytes());
            data.extend_from_slice(&reason.as_bytes()[..end]);
            data
        });
        Self::new(true, OpCode::Close, payload)
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Length of the (unmasked) payload.
    #[inline]
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Returns `true` if the frame arrived masked.
    #[inline]
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// The masking key the frame arrived with.
    #[must_use]
    pub fn mask_key(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Payload length declared by the frame header at the front of `buf`.
    ///
    /// Only the header has to be present, so callers can reject an oversized
    /// frame before its payload has arrived.
    ///
    /// ## Errors
    ///
    /// As [`Frame::decode`] for an incomplete or unrepresentable header.
    #[inline]
    pub fn declared_payload_len(buf: &[u8]) -> Result<usize> {
        FrameHeader::parse(buf).map(|header| header.payload_len)
    }

    /// Decode a frame from the front of `buf`.
    ///
    /// Returns the decoded frame and the number of bytes consumed.
    ///
    /// ## Errors
    ///
    /// - `Error::IncompleteFrame` if the buffer is shorter than the header implies
    /// - `Error::PayloadTooLargeForPlatform` if the 64-bit length does not fit in memory
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;

        let total_size = header.header_len.checked_add(header.payload_len).ok_or(
            Error::PayloadTooLargeForPlatform {
                size: header.payload_len as u64,
                max: usize::MAX as u64,
            },
        )?;

        if buf.len() < total_size {
            return Err(Error::IncompleteFrame {
                needed: total_size - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total_size].to_vec();
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }

        let bits = header.byte0;
        let frame = Frame {
            fin: bits & 0x80 != 0,
            rsv1: bits & 0x40 != 0,
            rsv2: bits & 0x20 != 0,
            rsv3: bits & 0x10 != 0,
            opcode: header.opcode,
            mask: header.mask,
            payload,
        };

        Ok((frame, total_size))
    }

    /// Encode `payload` as a single final frame.
    ///
    /// When `masked` is set a fresh key is generated and emitted before the
    /// masked payload.
    #[must_use]
    pub fn encode(payload: &[u8], opcode: OpCode, masked: bool) -> Vec<u8> {
        let mask = masked.then(random_mask);
        Self::new(true, opcode, payload.to_vec()).to_bytes(mask)
    }

    /// Serialize this frame into a freshly allocated buffer.
    #[must_use]
    pub fn to_bytes(&self, mask: Option<[u8; 4]>) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_size(mask.is_some())];
        // The buffer is sized by wire_size, so write cannot run short.
        let written = self.write(&mut buf, mask).unwrap_or(0);
        buf.truncate(written);
        buf
    }

    /// Write the frame to a buffer.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Arguments
    ///
    /// * `buf` - The buffer to write to
    /// * `mask` - Optional masking key
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    pub fn write(&self, buf: &mut [u8], mask: Option<[u8; 4]>) -> Result<usize> {
        let payload = self.payload();
        let payload_len = payload.len();

        let (len_bytes, extended_len_size) = length_selector(payload_len);

        let mask_size = if mask.is_some() { 4 } else { 0 };
        let header_size = 2 + extended_len_size + mask_size;
        let total_size = header_size + payload_len;

        if buf.len() < total_size {
            return Err(Error::InvalidFrame(format!(
                "Buffer too small: need {} bytes, have {}",
                total_size,
                buf.len()
            )));
        }

        let flags: [(bool, u8); 4] = [
            (self.fin, 0x80),
            (self.rsv1, 0x40),
            (self.rsv2, 0x20),
            (self.rsv3, 0x10),
        ];
        buf[0] = flags
            .iter()
            .filter(|(set, _)| *set)
            .fold(self.opcode.as_u8(), |byte, (_, bit)| byte | *bit);
        buf[1] = if mask.is_some() { len_bytes | 0x80 } else { len_bytes };

        let mut offset = 2;
        if extended_len_size == 2 {
            buf[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
        } else if extended_len_size == 8 {
            buf[2..10].copy_from_slice(&(payload_len as u64).to_be_bytes());
        }
        offset += extended_len_size;

        if let Some(mask_key) = mask {
            buf[offset..offset + 4].copy_from_slice(&mask_key);
            offset += 4;
        }

        buf[offset..offset + payload_len].copy_from_slice(payload);

        if let Some(mask_key) = mask {
            apply_mask(&mut buf[offset..offset + payload_len], mask_key);
        }

        Ok(total_size)
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload().len();
        let (_, extended_len_size) = length_selector(payload_len);
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}

/// The 7-bit length field value and the number of extended length bytes.
#[inline]
const fn length_selector(payload_len: usize) -> (u8, usize) {
    if payload_len <= MAX_LITERAL_PAYLOAD {
        (payload_len as u8, 0)
    } else if payload_len <= MAX_EXTENDED16_PAYLOAD {
        (126, 2)
    } else {
        (127, 8)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FIN:    {}", u8::from(self.fin))?;
        writeln!(f, "RSRV1:  {}", u8::from(self.rsv1))?;
        writeln!(f, "RSRV2:  {}", u8::from(self.rsv2))?;
        writeln!(f, "RSRV3:  {}", u8::from(self.rsv3))?;
        writeln!(f, "OPCODE: {}", self.opcode.label())?;
        writeln!(f, "MASK:   {}", u8::from(self.is_masked()))?;
        writeln!(f, "LEN:    {}", self.payload_len())?;
        if let Some(k) = self.mask {
            writeln!(f, "KEY:    0x{:02x}{:02x}{:02x}{:02x}", k[0], k[1], k[2], k[3])?;
        }
        write!(f, "DATA:   '{}'", String::from_utf8_lossy(&self.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_unmasked_text_frame() {
        // FIN=1, opcode=1 (text), unmasked, payload="Hello"
        let data = &[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        let (frame, len) = Frame::decode(data).unwrap();
        assert_eq!(len, 7);
        assert!(frame.fin);
        assert!(!frame.rsv1);
        assert!(!frame.rsv2);
        assert!(!frame.rsv3);
        assert!(!frame.is_masked());
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");
        assert_eq!(frame.payload_len(), 5);
    }

    #[test]
    fn test_decode_masked_text_frame() {
        let data = &[
            0x81, 0x85, // FIN + Text, MASK + len=5
            0x37, 0xfa, 0x21, 0x3d, // Mask key
            0x7f, 0x9f, 0x4d, 0x51, 0x58, // Masked "Hello"
        ];
        let (frame, len) = Frame::decode(data).unwrap();
        assert_eq!(len, 11);
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.mask_key(), Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_decode_binary_frame() {
        let data = &[0x82, 0x03, 0x01, 0x02, 0x03];
        let (frame, len) = Frame::decode(data).unwrap();
        assert_eq!(len, 5);
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_decode_close_frame() {
        // payload=[0x03, 0xe8] (1000 = normal close)
        let data = &[0x88, 0x02, 0x03, 0xe8];
        let (frame, len) = Frame::decode(data).unwrap();
        assert_eq!(len, 4);
        assert_eq!(frame.opcode, OpCode::Close);
        assert_eq!(frame.payload(), &[0x03, 0xe8]);
    }

    #[test]
    fn test_decode_fragmented_frame() {
        // FIN=0, opcode=1 (text), payload="Hel"
        let data = &[0x01, 0x03, 0x48, 0x65, 0x6c];
        let (frame, _) = Frame::decode(data).unwrap();
        assert!(!frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
    }

    #[test]
    fn test_decode_extended_length_126() {
        let mut data = vec![0x82, 0x7e, 0x01, 0x00]; // len=256
        data.extend(vec![0xab; 256]);

        let (frame, len) = Frame::decode(&data).unwrap();
        assert_eq!(len, 4 + 256);
        assert_eq!(frame.payload_len(), 256);
        assert!(frame.payload().iter().all(|&b| b == 0xab));
    }

    #[test]
    fn test_decode_extended_length_127_reads_all_eight_bytes() {
        let mut data = vec![0x82, 0x7f];
        data.extend(65536u64.to_be_bytes());
        data.extend(vec![0xcd; 65536]);

        let (frame, len) = Frame::decode(&data).unwrap();
        assert_eq!(len, 10 + 65536);
        assert_eq!(frame.payload_len(), 65536);
        assert!(frame.payload().iter().all(|&b| b == 0xcd));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_decode_extended_length_127_high_bytes() {
        // 2^32 + 1: a decoder reading only 4 length bytes would see 0.
        let mut data = vec![0x82, 0x7f];
        data.extend(((1u64 << 32) | 1).to_be_bytes());
        let result = Frame::decode(&data);
        assert!(matches!(
            result,
            Err(Error::IncompleteFrame { needed }) if needed == (1usize << 32) + 1
        ));
    }

    #[test]
    fn test_decode_empty_payload() {
        let data = &[0x81, 0x00];
        let (frame, len) = Frame::decode(data).unwrap();
        assert_eq!(len, 2);
        assert_eq!(frame.payload(), b"");
    }

    #[test]
    fn test_decode_reserved_opcode_is_captured() {
        let (frame, _) = Frame::decode(&[0x83, 0x00]).unwrap();
        assert_eq!(frame.opcode, OpCode::Reserved3);

        let (frame, _) = Frame::decode(&[0x8b, 0x00]).unwrap();
        assert_eq!(frame.opcode, OpCode::ReservedB);
    }

    #[test]
    fn test_decode_rsv_bits_not_rejected() {
        // 0xc1 = FIN + RSV1 + Text
        let (frame, _) = Frame::decode(&[0xc1, 0x00]).unwrap();
        assert!(frame.rsv1);
        assert!(!frame.rsv2);
        assert!(!frame.rsv3);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let result = Frame::decode(&[0x81]);
        assert!(matches!(result, Err(Error::IncompleteFrame { needed: 1 })));
    }

    #[test]
    fn test_decode_incomplete_payload() {
        // len=5 but only 3 bytes of payload
        let result = Frame::decode(&[0x81, 0x05, 0x48, 0x65, 0x6c]);
        assert!(matches!(result, Err(Error::IncompleteFrame { needed: 2 })));
    }

    #[test]
    fn test_decode_incomplete_extended_length() {
        let result = Frame::decode(&[0x82, 0x7e, 0x01]);
        assert!(matches!(result, Err(Error::IncompleteFrame { needed: 1 })));

        let result = Frame::decode(&[0x82, 0x7f, 0x00, 0x00, 0x00]);
        assert!(matches!(result, Err(Error::IncompleteFrame { needed: 5 })));
    }

    #[test]
    fn test_decode_incomplete_mask_key() {
        let result = Frame::decode(&[0x81, 0x85, 0x37, 0xfa]);
        assert!(matches!(result, Err(Error::IncompleteFrame { needed: 2 })));
    }

    #[test]
    fn test_declared_payload_len_needs_only_header() {
        let data = [0x82, 0x7e, 0x01, 0x00]; // declares 256, no payload yet
        assert_eq!(Frame::declared_payload_len(&data), Ok(256));
        assert!(matches!(
            Frame::decode(&data),
            Err(Error::IncompleteFrame { needed: 256 })
        ));

        let masked = [0x81, 0x85, 0x37];
        assert!(matches!(
            Frame::declared_payload_len(&masked),
            Err(Error::IncompleteFrame { needed: 3 })
        ));
    }

    #[test]
    fn test_payload_exceeds_platform_max() {
        let mut data = vec![0x82, 0xFF];
        data.extend_from_slice(&u64::MAX.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        // 64-bit: header + len overflows; 32-bit: length itself does not fit.
        assert!(matches!(
            Frame::decode(&data),
            Err(Error::PayloadTooLargeForPlatform { .. })
        ));
    }

    #[test]
    fn test_write_unmasked_text_frame() {
        let frame = Frame::text(b"Hello".to_vec());
        let mut buf = vec![0u8; 32];

        let len = frame.write(&mut buf, None).unwrap();

        assert_eq!(len, 7);
        assert_eq!(&buf[..7], &[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[test]
    fn test_write_masked_text_frame() {
        let frame = Frame::text(b"Hello".to_vec());
        let mask = [0x37, 0xfa, 0x21, 0x3d];

        let buf = frame.to_bytes(Some(mask));

        assert_eq!(buf.len(), 11);
        assert_eq!(buf[0], 0x81);
        assert_eq!(buf[1], 0x85);
        assert_eq!(&buf[2..6], &mask);
        assert_eq!(&buf[6..11], &[0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_encode_length_boundaries() {
        let at_125 = Frame::encode(&[0u8; 125], OpCode::Text, false);
        assert_eq!(at_125[1], 125);
        assert_eq!(at_125.len(), 2 + 125);

        let at_126 = Frame::encode(&[0u8; 126], OpCode::Text, false);
        assert_eq!(at_126[1], 126);
        assert_eq!(&at_126[2..4], &126u16.to_be_bytes());
        assert_eq!(at_126.len(), 4 + 126);

        let at_65535 = Frame::encode(&vec![0u8; 65535], OpCode::Binary, false);
        assert_eq!(at_65535[1], 126);
        assert_eq!(&at_65535[2..4], &[0xff, 0xff]);
        assert_eq!(at_65535.len(), 4 + 65535);

        let at_65536 = Frame::encode(&vec![0u8; 65536], OpCode::Binary, false);
        assert_eq!(at_65536[1], 127);
        assert_eq!(&at_65536[2..10], &65536u64.to_be_bytes());
        assert_eq!(at_65536.len(), 10 + 65536);
    }

    #[test]
    fn test_encode_uses_opcode_and_fin() {
        let bytes = Frame::encode(b"abc", OpCode::Binary, false);
        assert_eq!(bytes[0], 0x82);

        let bytes = Frame::encode(b"", OpCode::Close, false);
        assert_eq!(bytes, vec![0x88, 0x00]);
    }

    #[test]
    fn test_encode_masked_round_trip() {
        let bytes = Frame::encode(b"masked payload", OpCode::Text, true);
        assert_eq!(bytes[1] & 0x80, 0x80);

        let (frame, consumed) = Frame::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert!(frame.is_masked());
        assert_eq!(frame.payload(), b"masked payload");
    }

    #[test]
    fn test_write_buffer_too_small() {
        let frame = Frame::text(b"Hello".to_vec());
        let mut buf = vec![0u8; 4];

        let result = frame.write(&mut buf, None);
        assert!(matches!(result, Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn test_wire_size() {
        let frame = Frame::text(b"Hello".to_vec());
        assert_eq!(frame.wire_size(false), 7);
        assert_eq!(frame.wire_size(true), 11);

        let frame = Frame::binary(vec![0u8; 256]);
        assert_eq!(frame.wire_size(false), 260);

        let frame = Frame::binary(vec![0u8; 65536]);
        assert_eq!(frame.wire_size(false), 65546);
        assert_eq!(frame.wire_size(true), 65550);
    }

    #[test]
    fn test_close_frame_with_reason() {
        let frame = Frame::close(Some(1000), "Normal closure");
        assert_eq!(frame.opcode, OpCode::Close);
        assert!(frame.fin);

        let payload = frame.payload();
        assert_eq!(u16::from_be_bytes([payload[0], payload[1]]), 1000);
        assert_eq!(&payload[2..], b"Normal closure");
    }

    #[test]
    fn test_close_reason_truncated_to_control_limit() {
        let long = "x".repeat(200);
        let frame = Frame::close(Some(1000), &long);
        assert_eq!(frame.payload_len(), MAX_LITERAL_PAYLOAD);
        assert_eq!(&frame.payload()[2..], "x".repeat(MAX_CLOSE_REASON).as_bytes());

        let bytes = frame.to_bytes(None);
        assert_eq!(bytes[1], 125);

        // 'é' is two bytes; the cut must not split it.
        let accented = "é".repeat(100);
        let frame = Frame::close(Some(1000), &accented);
        assert_eq!(frame.payload_len(), 2 + 122);
        assert!(std::str::from_utf8(&frame.payload()[2..]).is_ok());

        let frame = Frame::close(None, &long);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_display_dump() {
        let data = &[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let (frame, _) = Frame::decode(data).unwrap();
        let dump = frame.to_string();
        assert!(dump.contains("FIN:    1"));
        assert!(dump.contains("OPCODE: text frame"));
        assert!(dump.contains("MASK:   1"));
        assert!(dump.contains("LEN:    5"));
        assert!(dump.contains("KEY:    0x37fa213d"));
        assert!(dump.ends_with("DATA:   'Hello'"));
    }
}
