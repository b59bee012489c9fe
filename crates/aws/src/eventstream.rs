//! AWS event-stream binary framing (`application/vnd.amazon.eventstream`).
//!
//! Each frame has the layout:
//!
//! ```text
//! [total_len:4][headers_len:4][prelude_crc:4][headers...][payload...][msg_crc:4]
//! ```
//!
//! and each header is `[name_len:1][name][type:1][value]`, where the value's
//! size depends on its type. Checksums are not verified: TLS already
//! protects the bytes in transit.

use crate::AwsError;

const PRELUDE_LEN: usize = 12;
const MIN_FRAME_LEN: usize = PRELUDE_LEN + 4;
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A typed header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub headers: Vec<(String, HeaderValue)>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn string_header(&self, name: &str) -> Option<&str> {
        match self.header(name) {
            Some(HeaderValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// `event`, `exception` or `error`.
    pub fn message_type(&self) -> Option<&str> {
        self.string_header(":message-type")
    }

    /// The event or exception name (e.g. `contentBlockDelta`,
    /// `throttlingException`).
    pub fn event_type(&self) -> Option<&str> {
        self.string_header(":event-type")
            .or_else(|| self.string_header(":exception-type"))
            .or_else(|| self.string_header(":error-code"))
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.message_type(), Some("exception") | Some("error"))
    }
}

/// Incremental frame decoder: push bytes as they arrive, pull whole frames.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buf: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received that do not yet form a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next complete frame, or `Ok(None)` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, AwsError> {
        if self.buf.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let total_len = read_u32(&self.buf[0..4]) as usize;
        let headers_len = read_u32(&self.buf[4..8]) as usize;

        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total_len) {
            return Err(AwsError::Frame(format!("invalid frame length {total_len}")));
        }
        if headers_len > total_len - MIN_FRAME_LEN {
            return Err(AwsError::Frame(format!(
                "headers length {headers_len} exceeds frame length {total_len}"
            )));
        }
        if self.buf.len() < total_len {
            return Ok(None);
        }

        let frame: Vec<u8> = self.buf.drain(..total_len).collect();
        let headers_end = PRELUDE_LEN + headers_len;
        let headers = parse_headers(&frame[PRELUDE_LEN..headers_end])?;
        let payload = frame[headers_end..total_len - 4].to_vec();

        Ok(Some(Frame { headers, payload }))
    }
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8], AwsError> {
    if buf.len() < n {
        return Err(AwsError::Frame("truncated header".into()));
    }
    let (head, rest) = buf.split_at(n);
    *buf = rest;
    Ok(head)
}

fn take_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N], AwsError> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(buf, N)?);
    Ok(out)
}

fn parse_headers(mut buf: &[u8]) -> Result<Vec<(String, HeaderValue)>, AwsError> {
    let mut headers = Vec::new();
    while !buf.is_empty() {
        let name_len = take(&mut buf, 1)?[0] as usize;
        let name = String::from_utf8_lossy(take(&mut buf, name_len)?).into_owned();
        let value = match take(&mut buf, 1)?[0] {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(i8::from_be_bytes(take_array(&mut buf)?)),
            3 => HeaderValue::Short(i16::from_be_bytes(take_array(&mut buf)?)),
            4 => HeaderValue::Int(i32::from_be_bytes(take_array(&mut buf)?)),
            5 => HeaderValue::Long(i64::from_be_bytes(take_array(&mut buf)?)),
            6 => {
                let len = u16::from_be_bytes(take_array(&mut buf)?) as usize;
                HeaderValue::Bytes(take(&mut buf, len)?.to_vec())
            }
            7 => {
                let len = u16::from_be_bytes(take_array(&mut buf)?) as usize;
                HeaderValue::String(String::from_utf8_lossy(take(&mut buf, len)?).into_owned())
            }
            8 => HeaderValue::Timestamp(i64::from_be_bytes(take_array(&mut buf)?)),
            9 => HeaderValue::Uuid(take_array(&mut buf)?),
            other => {
                return Err(AwsError::Frame(format!(
                    "unknown header type {other} for {name}"
                )));
            }
        };
        headers.push((name, value));
    }
    Ok(headers)
}

/// Encode a frame with string headers.
///
/// Checksum fields are written as zero; this is meant for building test
/// fixtures and fakes, not for talking to AWS.
pub fn encode_frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_bytes = Vec::new();
    for (name, value) in headers {
        header_bytes.push(name.len() as u8);
        header_bytes.extend_from_slice(name.as_bytes());
        header_bytes.push(7);
        header_bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_bytes.extend_from_slice(value.as_bytes());
    }

    let total_len = MIN_FRAME_LEN + header_bytes.len() + payload.len();
    let mut frame = Vec::with_capacity(total_len);
    frame.extend_from_slice(&(total_len as u32).to_be_bytes());
    frame.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    frame.extend_from_slice(&[0; 4]);
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0; 4]);
    frame
}

/// Encode a Bedrock-style event frame.
pub fn encode_event(event_type: &str, payload: &[u8]) -> Vec<u8> {
    encode_frame(
        &[
            (":event-type", event_type),
            (":content-type", "application/json"),
            (":message-type", "event"),
        ],
        payload,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_event() {
        let bytes = encode_event("contentBlockDelta", br#"{"delta":{"text":"Hi"}}"#);
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&bytes);

        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.event_type(), Some("contentBlockDelta"));
        assert_eq!(frame.message_type(), Some("event"));
        assert!(!frame.is_exception());
        assert_eq!(frame.payload, br#"{"delta":{"text":"Hi"}}"#);
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn waits_for_split_frames() {
        let mut bytes = encode_event("messageStart", br#"{"role":"assistant"}"#);
        bytes.extend(encode_event("messageStop", br#"{"stopReason":"end_turn"}"#));

        let mut decoder = EventStreamDecoder::new();
        let (first, rest) = bytes.split_at(7);
        decoder.push(first);
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.push(rest);
        let a = decoder.next_frame().unwrap().unwrap();
        let b = decoder.next_frame().unwrap().unwrap();
        assert_eq!(a.event_type(), Some("messageStart"));
        assert_eq!(b.event_type(), Some("messageStop"));
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn exception_frames() {
        let bytes = encode_frame(
            &[
                (":exception-type", "throttlingException"),
                (":message-type", "exception"),
            ],
            br#"{"message":"slow down"}"#,
        );
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&bytes);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert!(frame.is_exception());
        assert_eq!(frame.event_type(), Some("throttlingException"));
    }

    #[test]
    fn skips_non_string_headers_by_size() {
        // [name_len][name][type=4 int][4 bytes] then a string header
        let mut headers = vec![4u8];
        headers.extend_from_slice(b"seq!");
        headers.push(4);
        headers.extend_from_slice(&7i32.to_be_bytes());
        headers.push(11);
        headers.extend_from_slice(b":event-type");
        headers.push(7);
        headers.extend_from_slice(&4u16.to_be_bytes());
        headers.extend_from_slice(b"ping");

        let parsed = parse_headers(&headers).unwrap();
        assert_eq!(parsed[0], ("seq!".to_string(), HeaderValue::Int(7)));
        assert_eq!(parsed[1].1, HeaderValue::String("ping".into()));
    }

    #[test]
    fn rejects_impossible_lengths() {
        let mut decoder = EventStreamDecoder::new();
        let mut bytes = vec![0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(&[0; 8]);
        decoder.push(&bytes);
        assert!(matches!(decoder.next_frame(), Err(AwsError::Frame(_))));
    }

    #[test]
    fn rejects_unknown_header_type() {
        let headers = [1u8, b'x', 42];
        assert!(parse_headers(&headers).is_err());
    }
}
