//! Line codecs
//!
//! A supervised process talks in newline-delimited lines. A [`LineCodec`] turns one
//! line (newline already stripped) into a typed item and back. Two codecs ship with
//! the crate:
//!
//! - [`RawCodec`]: every line is an opaque [`Message`]
//! - [`FrameCodec`]: every line is `<key><SEP><value>`, decoded into a [`Frame`]

use std::fmt;

use crate::error::CodecError;

/// Default separator between a frame's key and value
pub const DEFAULT_SEPARATOR: u8 = b'\t';

/// Opaque line of bytes
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Message(Vec<u8>);

impl Message {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Key/value message of the framed line protocol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    key: String,
    value: Vec<u8>,
}

impl Frame {
    /// Create a frame, rejecting keys that contain `separator`
    pub fn new(
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        separator: u8,
    ) -> Result<Self, CodecError> {
        let key = key.into();
        if key.as_bytes().contains(&separator) {
            return Err(CodecError::InvalidKey(format!(
                "key {key:?} contains separator {separator:#04x}"
            )));
        }
        Ok(Self {
            key,
            value: value.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.key, self.value)
    }
}

/// Converts between a single line and a typed item
pub trait LineCodec: Send + Sync + 'static {
    /// Item carried on the channels
    type Item: Send + 'static;

    /// Decode a line with its newline already stripped
    fn decode(&self, line: &[u8]) -> Result<Self::Item, CodecError>;

    /// Append the encoded item to `buf`, without the trailing newline
    fn encode(&self, item: &Self::Item, buf: &mut Vec<u8>);
}

/// Passes lines through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl LineCodec for RawCodec {
    type Item = Message;

    fn decode(&self, line: &[u8]) -> Result<Message, CodecError> {
        Ok(Message::from(line))
    }

    fn encode(&self, item: &Message, buf: &mut Vec<u8>) {
        buf.extend_from_slice(item.as_bytes());
    }
}

/// `<key><SEP><value>` framing
///
/// The line is split at the first separator, so values may contain it; keys may not.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    separator: u8,
}

impl FrameCodec {
    pub fn new(separator: u8) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Build a frame that this codec can encode
    pub fn frame(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Result<Frame, CodecError> {
        Frame::new(key, value, self.separator)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl LineCodec for FrameCodec {
    type Item = Frame;

    fn decode(&self, line: &[u8]) -> Result<Frame, CodecError> {
        let pos = line
            .iter()
            .position(|&b| b == self.separator)
            .ok_or(CodecError::MissingSeparator {
                separator: self.separator,
                len: line.len(),
            })?;
        let key = std::str::from_utf8(&line[..pos])
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        Ok(Frame {
            key: key.to_string(),
            value: line[pos + 1..].to_vec(),
        })
    }

    fn encode(&self, item: &Frame, buf: &mut Vec<u8>) {
        buf.extend_from_slice(item.key.as_bytes());
        buf.push(self.separator);
        buf.extend_from_slice(&item.value);
    }
}
