//! # Stream splitters
//! A [`Splitter`] cuts a chunked byte stream into complete top-level
//! values. Chunk boundaries may fall anywhere, including inside a token.
//!
//! - JSON: [`JsonSplitter`] scans every byte once, tracking nesting and
//!   string state between chunks, and only parses a value once its last
//!   byte has arrived.
//! - MessagePack: [`BinarySplitter`] retries the pending value once the
//!   buffer has grown enough to make the retry worthwhile.
//!
//! With `stream_array`, the elements of a top-level array are emitted one
//! by one as soon as each is complete, without waiting for the array to
//! close.

use std::io;

#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use crate::{
    config::DEFAULT_MAX_DEPTH,
    error::{Error, Result},
    json,
    types::Node,
};

/// Frames complete values out of a chunked byte stream.
pub trait Splitter: Send {
    /// Consumes the next chunk and returns every value it completed.
    ///
    /// # Errors
    /// [`Error::MalformedInput`] once the stream can no longer form valid
    /// values.
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Node>>;

    /// Ends the stream and returns the values completed by its last bytes.
    ///
    /// # Errors
    /// [`Error::MalformedInput`] if the stream ends inside a value.
    fn finish(&mut self) -> Result<Vec<Node>>;
}

/// What may follow inside a streamed top-level array
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expect {
    ValueOrClose,
    Value,
    CommaOrClose,
}

/// Incremental JSON framer
#[derive(Debug)]
pub struct JsonSplitter {
    stream_array: bool,
    max_depth: usize,
    buffer: Vec<u8>,
    /// Next byte to scan
    scan: usize,
    /// Start of the value being framed
    start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    scalar: bool,
    /// Set while inside a streamed top-level array
    array: Option<Expect>,
}

impl JsonSplitter {
    /// Creates a splitter. With `stream_array`, top-level arrays are split
    /// into their elements.
    #[must_use]
    pub fn new(stream_array: bool) -> Self {
        JsonSplitter {
            stream_array,
            max_depth: DEFAULT_MAX_DEPTH,
            buffer: Vec::new(),
            scan: 0,
            start: None,
            depth: 0,
            in_string: false,
            escaped: false,
            scalar: false,
            array: None,
        }
    }

    fn scan(&mut self, nodes: &mut Vec<Node>) -> Result<()> {
        while let Some(&byte) = self.buffer.get(self.scan) {
            let at = self.scan;
            match self.start {
                Some(start) => {
                    if let Some(end) = self.value_byte(byte, at) {
                        nodes.push(json::read_node(&self.buffer[start..end], self.max_depth)?);
                        self.start = None;
                        self.scalar = false;
                        // A scalar ends before its delimiter, which is scanned again
                        self.scan = end;
                        continue;
                    }
                }
                None => self.between_values(byte, at)?,
            }
            self.scan += 1;
        }
        Ok(())
    }

    /// Scans one byte of the value being framed, returning the end of the
    /// value if this byte completes it.
    fn value_byte(&mut self, byte: u8, at: usize) -> Option<usize> {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
                if self.depth == 0 {
                    return Some(at + 1);
                }
            }
            return None;
        }

        if self.scalar {
            let delimiter = byte.is_ascii_whitespace()
                || matches!(byte, b',' | b':' | b'[' | b']' | b'{' | b'}' | b'"');
            return delimiter.then_some(at);
        }

        match byte {
            b'"' => self.in_string = true,
            b'[' | b'{' => self.depth += 1,
            b']' | b'}' => {
                self.depth -= 1;
                if self.depth == 0 {
                    return Some(at + 1);
                }
            }
            _ => {}
        }
        None
    }

    fn between_values(&mut self, byte: u8, at: usize) -> Result<()> {
        if byte.is_ascii_whitespace() {
            return Ok(());
        }

        match (self.array, byte) {
            (Some(Expect::CommaOrClose), b',') => self.array = Some(Expect::Value),
            (Some(Expect::CommaOrClose | Expect::ValueOrClose), b']') => {
                trace!("Streamed array closed");
                self.array = None;
            }
            (Some(Expect::Value | Expect::ValueOrClose), _) => {
                self.begin_value(byte, at)?;
                self.array = Some(Expect::CommaOrClose);
            }
            (Some(Expect::CommaOrClose), _) => {
                return Err(Error::malformed(format!(
                    "expected `,` or `]` between array elements, found `{}`",
                    char::from(byte)
                )));
            }
            (None, b'[') if self.stream_array => self.array = Some(Expect::ValueOrClose),
            (None, _) => self.begin_value(byte, at)?,
        }
        Ok(())
    }

    fn begin_value(&mut self, byte: u8, at: usize) -> Result<()> {
        match byte {
            b'"' => self.in_string = true,
            b'[' | b'{' => self.depth = 1,
            b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => self.scalar = true,
            _ => {
                return Err(Error::malformed(format!(
                    "unexpected `{}` where a value should start",
                    char::from(byte)
                )));
            }
        }
        self.start = Some(at);
        Ok(())
    }

    /// Drops the bytes no pending value needs.
    fn compact(&mut self) {
        let keep = self.start.unwrap_or(self.scan);
        self.buffer.drain(..keep);
        self.scan -= keep;
        self.start = self.start.map(|start| start - keep);
    }
}

impl Splitter for JsonSplitter {
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Node>> {
        self.buffer.extend_from_slice(chunk);
        let mut nodes = Vec::new();
        self.scan(&mut nodes)?;
        self.compact();
        Ok(nodes)
    }

    fn finish(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        self.scan(&mut nodes)?;

        if let Some(start) = self.start {
            if !self.scalar {
                return Err(Error::malformed("stream ended inside a value"));
            }
            nodes.push(json::read_node(&self.buffer[start..], self.max_depth)?);
            self.start = None;
            self.scalar = false;
        }
        if self.array.is_some() {
            return Err(Error::malformed("stream ended inside an array"));
        }

        self.buffer.clear();
        self.scan = 0;
        Ok(nodes)
    }
}

/// Header of the value at the front of a MessagePack buffer
enum Header {
    Array { len: usize, size: usize },
    Other,
    Incomplete,
}

fn array_header(input: &[u8]) -> Header {
    let Some(&marker) = input.first() else {
        return Header::Incomplete;
    };
    let size = match marker {
        0x90..=0x9f => {
            return Header::Array {
                len: usize::from(marker & 0x0f),
                size: 1,
            };
        }
        0xdc => 3,
        0xdd => 5,
        _ => return Header::Other,
    };
    let Some(bytes) = input.get(1..size) else {
        return Header::Incomplete;
    };
    let len = bytes
        .iter()
        .fold(0usize, |len, byte| (len << 8) | usize::from(*byte));
    Header::Array { len, size }
}

fn is_truncated(err: &rmp_serde::decode::Error) -> bool {
    use rmp_serde::decode::Error as DecodeError;

    match err {
        DecodeError::InvalidMarkerRead(source) | DecodeError::InvalidDataRead(source) => {
            source.kind() == io::ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

/// MessagePack framer
#[derive(Debug)]
pub struct BinarySplitter {
    stream_array: bool,
    buffer: Vec<u8>,
    /// Elements left in the streamed top-level array
    array_left: Option<usize>,
    /// Buffered bytes needed before the pending value is parsed again
    retry_at: usize,
}

impl BinarySplitter {
    /// Creates a splitter. With `stream_array`, top-level arrays are split
    /// into their elements.
    #[must_use]
    pub fn new(stream_array: bool) -> Self {
        BinarySplitter {
            stream_array,
            buffer: Vec::new(),
            array_left: None,
            retry_at: 0,
        }
    }

    fn drain(&mut self, final_chunk: bool) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut pos = 0;

        loop {
            if self.array_left == Some(0) {
                self.array_left = None;
            }
            let pending = &self.buffer[pos..];
            if pending.is_empty() {
                break;
            }

            if self.stream_array && self.array_left.is_none() {
                match array_header(pending) {
                    Header::Array { len, size } => {
                        self.array_left = Some(len);
                        pos += size;
                        continue;
                    }
                    Header::Incomplete if final_chunk => {
                        return Err(Error::malformed("stream ended inside a value"));
                    }
                    Header::Incomplete => break,
                    Header::Other => {}
                }
            }

            if !final_chunk && pending.len() < self.retry_at {
                break;
            }

            let mut cursor = io::Cursor::new(pending);
            match rmp_serde::from_read::<_, Node>(&mut cursor) {
                Ok(node) => {
                    pos += usize::try_from(cursor.position()).unwrap_or(pending.len());
                    nodes.push(node);
                    self.retry_at = 0;
                    if let Some(left) = &mut self.array_left {
                        *left -= 1;
                    }
                }
                Err(err) if is_truncated(&err) => {
                    if final_chunk {
                        return Err(Error::malformed("stream ended inside a value"));
                    }
                    self.retry_at = pending.len() * 2;
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.buffer.drain(..pos);
        Ok(nodes)
    }
}

impl Splitter for BinarySplitter {
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Node>> {
        self.buffer.extend_from_slice(chunk);
        self.drain(false)
    }

    fn finish(&mut self) -> Result<Vec<Node>> {
        let nodes = self.drain(true)?;
        if self.array_left.is_some() {
            return Err(Error::malformed("stream ended inside an array"));
        }
        Ok(nodes)
    }
}

/// Splitter for a [`DynCodec`](crate::codecs::DynCodec)
#[derive(Debug)]
pub enum DynSplitter {
    #[allow(missing_docs)]
    Binary(BinarySplitter),
    #[allow(missing_docs)]
    Naive(JsonSplitter),
}

impl Splitter for DynSplitter {
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Node>> {
        match self {
            DynSplitter::Binary(splitter) => splitter.feed(chunk),
            DynSplitter::Naive(splitter) => splitter.feed(chunk),
        }
    }

    fn finish(&mut self) -> Result<Vec<Node>> {
        match self {
            DynSplitter::Binary(splitter) => splitter.finish(),
            DynSplitter::Naive(splitter) => splitter.finish(),
        }
    }
}
