//! # Built-in codecs
//! - JSON: [`NaiveCodec`]
//! - MessagePack: [`BinaryCodec`]
//!
//! ## What does a codec do?
//! Codecs turn tokens into their over the wire representation and back.
//! Writing goes through a [`Generator`], which hands out the root
//! [`Encoder`] and must be closed once the value is complete. Reading hands
//! a [`Decoder`] positioned on the input to the caller, and chunked input
//! is cut into values by the codec's [`Splitter`].

use std::io::{self, Read, Write};

use serde_json::ser::{CompactFormatter, Formatter};
#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use crate::{
    config::DEFAULT_MAX_DEPTH,
    error::{Error, Result},
    json::{self, JsonDecoder},
    protocol::{Decoder, Encoder},
    splitter::{BinarySplitter, DynSplitter, JsonSplitter, Splitter},
    tree::{NodeDecoder, NodeEncoder},
    types::{BigDecimal, BigInteger, Node, Value},
    utils::enter_structure,
};

/// Wire format able to write tokens and parse complete values.
#[allow(clippy::missing_errors_doc)]
pub trait Codec: Send + Sync + Copy {
    /// Frames values out of chunked input in this format.
    type Splitter: Splitter;

    /// Opens a generator writing a single root value to `out`.
    fn generator<'w>(&self, out: &'w mut dyn Write, max_depth: usize)
    -> Box<dyn Generator + 'w>;

    /// Runs `read` on a decoder positioned on the single value in `input`.
    ///
    /// Fails if `read` leaves part of the value unread or anything but
    /// whitespace follows it.
    fn decode_slice(
        &self,
        input: &[u8],
        max_depth: usize,
        read: &mut dyn FnMut(&mut dyn Decoder) -> Result<Value>,
    ) -> Result<Value>;

    /// Creates a splitter for a chunked stream. With `stream_array`, the
    /// elements of a top-level array are emitted individually.
    fn splitter(&self, stream_array: bool) -> Self::Splitter;

    /// Parses `input` as exactly one value.
    fn read_slice(&self, input: &[u8]) -> Result<Node>;

    /// Reads exactly one value from `input`.
    fn read_node(&self, input: &mut dyn Read) -> Result<Node>;
}

/// Scoped access to an output stream.
///
/// [`Generator::close`] flushes the stream and checks that exactly one
/// complete value was written. A generator dropped without being closed
/// still flushes what it can.
pub trait Generator {
    /// Root encoder of this generator.
    fn encoder(&mut self) -> &mut dyn Encoder;

    /// Flushes the output and releases it.
    ///
    /// # Errors
    /// Fails if flushing fails or the written value is incomplete. The
    /// output is flushed in both cases.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Basic codec that writes JSON with a streaming generator and reads it
/// with a [`JsonDecoder`]
///
/// Numbers keep their exact text, so big integers and big decimals are
/// never rounded through `f64`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaiveCodec {}

impl Codec for NaiveCodec {
    type Splitter = JsonSplitter;

    fn generator<'w>(
        &self,
        out: &'w mut dyn Write,
        max_depth: usize,
    ) -> Box<dyn Generator + 'w> {
        Box::new(JsonGenerator {
            encoder: JsonEncoder::root(out, max_depth),
            closed: false,
        })
    }

    fn decode_slice(
        &self,
        input: &[u8],
        max_depth: usize,
        read: &mut dyn FnMut(&mut dyn Decoder) -> Result<Value>,
    ) -> Result<Value> {
        let mut decoder = JsonDecoder::new(input, max_depth);
        let value = read(&mut decoder)?;
        decoder.finish()?;
        Ok(value)
    }

    fn splitter(&self, stream_array: bool) -> JsonSplitter {
        JsonSplitter::new(stream_array)
    }

    fn read_slice(&self, input: &[u8]) -> Result<Node> {
        json::read_node(input, DEFAULT_MAX_DEPTH)
    }

    fn read_node(&self, input: &mut dyn Read) -> Result<Node> {
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;
        self.read_slice(&buffer)
    }
}

/// Codec that writes MessagePack using [`rmp_serde`]
///
/// The value is buffered as a [`Node`] and written when the generator is
/// closed. Big numbers are carried as strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec {}

impl Codec for BinaryCodec {
    type Splitter = BinarySplitter;

    fn generator<'w>(
        &self,
        out: &'w mut dyn Write,
        max_depth: usize,
    ) -> Box<dyn Generator + 'w> {
        Box::new(BufferedGenerator {
            encoder: NodeEncoder::with_max_depth(max_depth),
            out,
            closed: false,
        })
    }

    fn decode_slice(
        &self,
        input: &[u8],
        max_depth: usize,
        read: &mut dyn FnMut(&mut dyn Decoder) -> Result<Value>,
    ) -> Result<Value> {
        let node = self.read_slice(input)?;
        read(&mut NodeDecoder::with_max_depth(&node, max_depth))
    }

    fn splitter(&self, stream_array: bool) -> BinarySplitter {
        BinarySplitter::new(stream_array)
    }

    fn read_slice(&self, input: &[u8]) -> Result<Node> {
        let mut cursor = io::Cursor::new(input);
        let node = rmp_serde::from_read::<_, Node>(&mut cursor)?;
        let consumed = usize::try_from(cursor.position()).unwrap_or(input.len());
        if consumed != input.len() {
            return Err(Error::malformed(format!(
                "{} trailing bytes after the value",
                input.len() - consumed
            )));
        }
        Ok(node)
    }

    fn read_node(&self, input: &mut dyn Read) -> Result<Node> {
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;
        self.read_slice(&buffer)
    }
}

/// An enum that represents any built-in codec
///
/// # Why does this exist?
/// The [`Codec`] trait is not object safe, so this enum is provided as a
/// convenience for format-agnostic code that cannot use a generic.
///
/// 3rd party codec implementations don't work with DynCodec.
#[derive(Clone, Copy, Debug)]
pub enum DynCodec {
    #[allow(missing_docs)]
    Binary(BinaryCodec),
    #[allow(missing_docs)]
    Naive(NaiveCodec),
}

impl Codec for DynCodec {
    type Splitter = DynSplitter;

    fn generator<'w>(
        &self,
        out: &'w mut dyn Write,
        max_depth: usize,
    ) -> Box<dyn Generator + 'w> {
        match self {
            DynCodec::Binary(binary_codec) => binary_codec.generator(out, max_depth),
            DynCodec::Naive(naive_codec) => naive_codec.generator(out, max_depth),
        }
    }

    fn decode_slice(
        &self,
        input: &[u8],
        max_depth: usize,
        read: &mut dyn FnMut(&mut dyn Decoder) -> Result<Value>,
    ) -> Result<Value> {
        match self {
            DynCodec::Binary(binary_codec) => binary_codec.decode_slice(input, max_depth, read),
            DynCodec::Naive(naive_codec) => naive_codec.decode_slice(input, max_depth, read),
        }
    }

    fn splitter(&self, stream_array: bool) -> DynSplitter {
        match self {
            DynCodec::Binary(binary_codec) => {
                DynSplitter::Binary(binary_codec.splitter(stream_array))
            }
            DynCodec::Naive(naive_codec) => DynSplitter::Naive(naive_codec.splitter(stream_array)),
        }
    }

    fn read_slice(&self, input: &[u8]) -> Result<Node> {
        match self {
            DynCodec::Binary(binary_codec) => binary_codec.read_slice(input),
            DynCodec::Naive(naive_codec) => naive_codec.read_slice(input),
        }
    }

    fn read_node(&self, input: &mut dyn Read) -> Result<Node> {
        match self {
            DynCodec::Binary(binary_codec) => binary_codec.read_node(input),
            DynCodec::Naive(naive_codec) => naive_codec.read_node(input),
        }
    }
}

enum Scope {
    Root { written: bool },
    Array { first: bool },
    Object { first: bool, key_pending: bool },
}

/// Streaming JSON encoder.
///
/// Tokens are written to the output as soon as they are encoded. Child
/// encoders for arrays and objects write through their parent's stream
/// and emit the closing bracket in [`Encoder::finish_structure`].
pub struct JsonEncoder<'a> {
    out: &'a mut dyn Write,
    formatter: CompactFormatter,
    scope: Scope,
    open_child: bool,
    parent_open: Option<&'a mut bool>,
    depth: usize,
    max_depth: usize,
}

impl<'a> JsonEncoder<'a> {
    /// Creates an encoder writing one root value to `out`.
    pub fn root(out: &'a mut dyn Write, max_depth: usize) -> Self {
        JsonEncoder {
            out,
            formatter: CompactFormatter,
            scope: Scope::Root { written: false },
            open_child: false,
            parent_open: None,
            depth: 0,
            max_depth,
        }
    }

    /// Checks that a root encoder holds exactly one finished value.
    fn check_complete(&self) -> Result<()> {
        match self.scope {
            Scope::Root { written: false } => Err(Error::malformed("no value was written")),
            _ if self.open_child => Err(Error::malformed("a structure was left open")),
            _ => Ok(()),
        }
    }
}

impl JsonEncoder<'_> {
    /// Writes the separator preceding a value in the current scope.
    fn begin_value(&mut self) -> Result<()> {
        match &mut self.scope {
            Scope::Root { written } => {
                if *written {
                    return Err(Error::malformed("root value already written"));
                }
                *written = true;
            }
            Scope::Array { first } => {
                self.formatter.begin_array_value(&mut *self.out, *first)?;
                *first = false;
            }
            Scope::Object { key_pending, .. } => {
                if !*key_pending {
                    return Err(Error::malformed("object value written without a key"));
                }
                self.formatter.begin_object_value(&mut *self.out)?;
                *key_pending = false;
            }
        }
        Ok(())
    }

    fn child(&mut self, scope: Scope) -> Result<Box<dyn Encoder + '_>> {
        let depth = enter_structure(self.depth, self.max_depth)?;
        self.begin_value()?;
        match scope {
            Scope::Array { .. } => self.formatter.begin_array(&mut *self.out)?,
            _ => self.formatter.begin_object(&mut *self.out)?,
        }
        self.open_child = true;

        Ok(Box::new(JsonEncoder {
            out: &mut *self.out,
            formatter: CompactFormatter,
            scope,
            open_child: false,
            parent_open: Some(&mut self.open_child),
            depth,
            max_depth: self.max_depth,
        }))
    }

    fn write_escaped(&mut self, value: &str) -> Result<()> {
        serde_json::to_writer(&mut *self.out, value)?;
        Ok(())
    }
}

impl Encoder for JsonEncoder<'_> {
    fn encode_null(&mut self) -> Result<()> {
        self.begin_value()?;
        Ok(self.formatter.write_null(&mut *self.out)?)
    }

    fn encode_bool(&mut self, value: bool) -> Result<()> {
        self.begin_value()?;
        Ok(self.formatter.write_bool(&mut *self.out, value)?)
    }

    fn encode_long(&mut self, value: i64) -> Result<()> {
        self.begin_value()?;
        Ok(self.formatter.write_i64(&mut *self.out, value)?)
    }

    fn encode_double(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::malformed(format!(
                "{value} cannot be represented in JSON"
            )));
        }
        self.begin_value()?;
        Ok(self.formatter.write_f64(&mut *self.out, value)?)
    }

    fn encode_string(&mut self, value: &str) -> Result<()> {
        self.begin_value()?;
        self.write_escaped(value)
    }

    fn encode_big_integer(&mut self, value: &BigInteger) -> Result<()> {
        self.begin_value()?;
        Ok(self.formatter.write_number_str(&mut *self.out, value.as_str())?)
    }

    fn encode_big_decimal(&mut self, value: &BigDecimal) -> Result<()> {
        self.begin_value()?;
        Ok(self.formatter.write_number_str(&mut *self.out, value.as_str())?)
    }

    fn encode_key(&mut self, key: &str) -> Result<()> {
        let Scope::Object { first, key_pending } = &mut self.scope else {
            return Err(Error::malformed(format!(
                "key `{key}` written outside of an object"
            )));
        };
        if *key_pending {
            return Err(Error::malformed(format!(
                "key `{key}` written while another key awaits its value"
            )));
        }

        self.formatter.begin_object_key(&mut *self.out, *first)?;
        *first = false;
        *key_pending = true;
        serde_json::to_writer(&mut *self.out, key)?;
        Ok(self.formatter.end_object_key(&mut *self.out)?)
    }

    fn encode_array(&mut self) -> Result<Box<dyn Encoder + '_>> {
        self.child(Scope::Array { first: true })
    }

    fn encode_object(&mut self) -> Result<Box<dyn Encoder + '_>> {
        self.child(Scope::Object {
            first: true,
            key_pending: false,
        })
    }

    fn finish_structure(mut self: Box<Self>) -> Result<()> {
        if self.open_child {
            return Err(Error::malformed("a nested structure was left open"));
        }
        match self.scope {
            Scope::Root { .. } => return Err(Error::malformed("no open structure to finish")),
            Scope::Array { .. } => self.formatter.end_array(&mut *self.out)?,
            Scope::Object {
                key_pending: true, ..
            } => {
                return Err(Error::malformed("object closed while a key awaits its value"));
            }
            Scope::Object { .. } => self.formatter.end_object(&mut *self.out)?,
        }

        if let Some(parent_open) = self.parent_open.take() {
            *parent_open = false;
        }
        Ok(())
    }
}

/// [`Generator`] streaming JSON tokens
pub struct JsonGenerator<'w> {
    encoder: JsonEncoder<'w>,
    closed: bool,
}

impl Generator for JsonGenerator<'_> {
    fn encoder(&mut self) -> &mut dyn Encoder {
        &mut self.encoder
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.closed = true;
        self.encoder.out.flush()?;
        self.encoder.check_complete()
    }
}

impl Drop for JsonGenerator<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("JSON generator dropped without being closed");
            if let Err(err) = self.encoder.out.flush() {
                debug!(%err, "flush of unclosed generator failed");
            }
        }
    }
}

/// [`Generator`] buffering the value as a [`Node`] before writing it
struct BufferedGenerator<'w> {
    encoder: NodeEncoder<'static>,
    out: &'w mut dyn Write,
    closed: bool,
}

impl Generator for BufferedGenerator<'_> {
    fn encoder(&mut self) -> &mut dyn Encoder {
        &mut self.encoder
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.closed = true;
        let node = std::mem::take(&mut self.encoder).into_node();
        let written = node.and_then(|node| {
            let bytes = rmp_serde::to_vec(&node)?;
            self.out.write_all(&bytes)?;
            Ok(())
        });
        self.out.flush()?;
        written
    }
}

impl Drop for BufferedGenerator<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("MessagePack generator dropped without being closed");
            if let Err(err) = self.out.flush() {
                debug!(%err, "flush of unclosed generator failed");
            }
        }
    }
}
