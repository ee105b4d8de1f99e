//! Serial frame codec
//!
//! Replies are split on a single delimiter byte. Commands go out verbatim.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::link::TransportError;

pub const DEFAULT_DELIMITER: u8 = b'x';
pub const DEFAULT_MAX_FRAME_LEN: usize = 256;

#[derive(Debug, Clone)]
pub struct FrameCodec {
    delimiter: u8,
    max_length: usize,
    /// Skipping an oversized frame until the next delimiter
    discarding: bool,
}

impl FrameCodec {
    pub fn new(delimiter: u8, max_length: usize) -> Self {
        Self {
            delimiter,
            max_length,
            discarding: false,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER, DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        loop {
            let Some(pos) = src.iter().position(|b| *b == self.delimiter) else {
                if src.len() > self.max_length {
                    if !self.discarding {
                        tracing::warn!(max = self.max_length, "Dropping oversized serial frame");
                    }
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let frame = src.split_to(pos);
            src.advance(1);

            if std::mem::take(&mut self.discarding) || frame.len() > self.max_length {
                tracing::warn!(max = self.max_length, "Dropped oversized serial frame");
                continue;
            }
            if frame.is_empty() {
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(&frame).into_owned()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        let frame = self.decode(src)?;
        if frame.is_none() && !src.is_empty() {
            tracing::debug!(bytes = src.len(), "Discarding partial frame at end of stream");
            src.clear();
        }
        Ok(frame)
    }
}

impl Encoder<String> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), TransportError> {
        dst.reserve(line.len());
        dst.put_slice(line.as_bytes());
        Ok(())
    }
}
