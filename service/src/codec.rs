//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Newline-delimited text codec

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodecError};

/// A codec that splits a byte stream into text lines
///
/// Lines end at `\n`; a trailing `\r` is stripped. Bytes that are not valid
/// UTF-8 decode to U+FFFD. Lines longer than `max_length` bytes are an error.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Buffer offset already scanned for a newline
    next_index: usize,
}

impl LineCodec {
    /// Create a codec that accepts lines up to `max_length` bytes
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    /// Get the longest accepted line in bytes
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        let read_to = src.len().min(self.max_length.saturating_add(1));
        let newline = src[self.next_index..read_to]
            .iter()
            .position(|byte| *byte == b'\n');

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let line = src.split_to(end + 1);
                Ok(Some(decode_line(&line[..end])))
            }
            None if src.len() > self.max_length => Err(LinesCodecError::MaxLineLengthExceeded),
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                self.next_index = 0;
                let rest = src.split();
                Ok(Some(decode_line(&rest)))
            }
        }
    }
}

impl<T> Encoder<T> for LineCodec
where
    T: AsRef<str>,
{
    type Error = LinesCodecError;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = line.as_ref();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
