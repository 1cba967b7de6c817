//! # Tree-model bridge
//! [`NodeEncoder`] builds a [`Node`] through the [`Encoder`] contract and
//! [`NodeDecoder`] walks an existing [`Node`] through the [`Decoder`]
//! contract, as if it were a live token stream. Object key order and array
//! element order are preserved exactly.

use crate::{
    config::DEFAULT_MAX_DEPTH,
    error::{Error, Result},
    protocol::{Decoder, Encoder},
    types::{BigDecimal, BigInteger, Node, Number},
    utils::{Entries, enter_structure},
};

/// Structure being built by a [`NodeEncoder`]
enum Frame {
    Root(Option<Node>),
    Array(Vec<Node>),
    Object {
        entries: Entries<Node>,
        pending_key: Option<String>,
    },
}

impl Frame {
    fn push(&mut self, node: Node) -> Result<()> {
        match self {
            Frame::Root(slot) => {
                if slot.is_some() {
                    return Err(Error::malformed("root value already written"));
                }
                *slot = Some(node);
            }
            Frame::Array(items) => items.push(node),
            Frame::Object {
                entries,
                pending_key,
            } => {
                let Some(key) = pending_key.take() else {
                    return Err(Error::malformed("object value written without a key"));
                };
                entries.insert(key, node);
            }
        }
        Ok(())
    }
}

/// Encoder producing a [`Node`].
///
/// The root encoder is created with [`NodeEncoder::new`] and yields its
/// tree through [`NodeEncoder::into_node`]. Structure encoders returned by
/// [`Encoder::encode_array`] and [`Encoder::encode_object`] hand their
/// finished node to the parent when closed.
pub struct NodeEncoder<'p> {
    parent: Option<&'p mut Frame>,
    frame: Frame,
    depth: usize,
    max_depth: usize,
}

impl NodeEncoder<'static> {
    /// Creates a root encoder with the default nesting limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Creates a root encoder refusing structures nested deeper than `max_depth`.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        NodeEncoder {
            parent: None,
            frame: Frame::Root(None),
            depth: 0,
            max_depth,
        }
    }

    /// Returns the completed tree.
    ///
    /// # Errors
    /// Fails if no value was written.
    pub fn into_node(self) -> Result<Node> {
        match self.frame {
            Frame::Root(Some(node)) => Ok(node),
            _ => Err(Error::malformed("no complete value was written")),
        }
    }
}

impl Default for NodeEncoder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeEncoder<'_> {
    fn child(&mut self, frame: Frame) -> Result<Box<dyn Encoder + '_>> {
        let depth = enter_structure(self.depth, self.max_depth)?;
        if let Frame::Object {
            pending_key: None, ..
        } = self.frame
        {
            return Err(Error::malformed("object value written without a key"));
        }

        Ok(Box::new(NodeEncoder {
            parent: Some(&mut self.frame),
            frame,
            depth,
            max_depth: self.max_depth,
        }))
    }
}

impl Encoder for NodeEncoder<'_> {
    fn encode_null(&mut self) -> Result<()> {
        self.frame.push(Node::Null)
    }

    fn encode_bool(&mut self, value: bool) -> Result<()> {
        self.frame.push(Node::Bool(value))
    }

    fn encode_long(&mut self, value: i64) -> Result<()> {
        self.frame.push(Node::Number(Number::Int(value)))
    }

    fn encode_double(&mut self, value: f64) -> Result<()> {
        self.frame.push(Node::Number(Number::Float(value)))
    }

    fn encode_string(&mut self, value: &str) -> Result<()> {
        self.frame.push(Node::String(value.to_string()))
    }

    fn encode_big_integer(&mut self, value: &BigInteger) -> Result<()> {
        self.frame.push(Node::Number(Number::BigInteger(value.clone())))
    }

    fn encode_big_decimal(&mut self, value: &BigDecimal) -> Result<()> {
        self.frame.push(Node::Number(Number::BigDecimal(value.clone())))
    }

    fn encode_key(&mut self, key: &str) -> Result<()> {
        match &mut self.frame {
            Frame::Object {
                pending_key: pending @ None,
                ..
            } => {
                *pending = Some(key.to_string());
                Ok(())
            }
            Frame::Object { .. } => Err(Error::malformed(format!(
                "key `{key}` written while another key awaits its value"
            ))),
            _ => Err(Error::malformed(format!(
                "key `{key}` written outside of an object"
            ))),
        }
    }

    fn encode_array(&mut self) -> Result<Box<dyn Encoder + '_>> {
        self.child(Frame::Array(Vec::new()))
    }

    fn encode_object(&mut self) -> Result<Box<dyn Encoder + '_>> {
        self.child(Frame::Object {
            entries: Entries::new(),
            pending_key: None,
        })
    }

    fn finish_structure(self: Box<Self>) -> Result<()> {
        let NodeEncoder { parent, frame, .. } = *self;
        let Some(parent) = parent else {
            return Err(Error::malformed("no open structure to finish"));
        };

        let node = match frame {
            Frame::Array(items) => Node::Array(items),
            Frame::Object {
                pending_key: Some(key),
                ..
            } => {
                return Err(Error::malformed(format!(
                    "object closed while key `{key}` awaits its value"
                )));
            }
            Frame::Object { entries, .. } => Node::Object(entries.into_vec()),
            Frame::Root(_) => return Err(Error::malformed("no open structure to finish")),
        };

        parent.push(node)
    }
}

/// Position of a [`NodeDecoder`] inside the tree
enum Cursor<'n> {
    Root(Option<&'n Node>),
    Array {
        items: &'n [Node],
        pos: usize,
    },
    Object {
        entries: &'n [(String, Node)],
        pos: usize,
        pending: Option<&'n Node>,
    },
}

/// Decoder walking an existing [`Node`].
pub struct NodeDecoder<'n> {
    cursor: Cursor<'n>,
    depth: usize,
    max_depth: usize,
}

impl<'n> NodeDecoder<'n> {
    /// Creates a root decoder over `node` with the default nesting limit.
    #[must_use]
    pub fn new(node: &'n Node) -> Self {
        Self::with_max_depth(node, DEFAULT_MAX_DEPTH)
    }

    /// Creates a root decoder refusing structures nested deeper than `max_depth`.
    #[must_use]
    pub fn with_max_depth(node: &'n Node, max_depth: usize) -> Self {
        NodeDecoder {
            cursor: Cursor::Root(Some(node)),
            depth: 0,
            max_depth,
        }
    }

    fn peek(&self) -> Option<&'n Node> {
        match &self.cursor {
            Cursor::Root(node) => *node,
            Cursor::Array { items, pos } => items.get(*pos),
            Cursor::Object { pending, .. } => *pending,
        }
    }

    fn next_value(&mut self) -> Result<&'n Node> {
        match &mut self.cursor {
            Cursor::Root(node) => node
                .take()
                .ok_or_else(|| Error::malformed("no more values to read")),
            Cursor::Array { items, pos } => {
                let items: &'n [Node] = *items;
                let node = items
                    .get(*pos)
                    .ok_or_else(|| Error::malformed("read past the end of an array"))?;
                *pos += 1;
                Ok(node)
            }
            Cursor::Object { pending, .. } => pending
                .take()
                .ok_or_else(|| Error::malformed("object value read before its key")),
        }
    }

    fn number(&mut self, expected: &str) -> Result<&'n Number> {
        match self.next_value()? {
            Node::Number(n) => Ok(n),
            other => Err(unexpected(expected, other)),
        }
    }
}

fn unexpected(expected: &str, found: &Node) -> Error {
    Error::malformed(format!("expected {expected}, found {}", found.kind_name()))
}

impl<'n> Decoder for NodeDecoder<'n> {
    fn decode_null(&mut self) -> Result<bool> {
        if self.peek().is_some_and(Node::is_null) {
            self.next_value()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn decode_bool(&mut self) -> Result<bool> {
        match self.next_value()? {
            Node::Bool(v) => Ok(*v),
            other => Err(unexpected("boolean", other)),
        }
    }

    fn decode_long(&mut self) -> Result<i64> {
        let number = self.number("integer")?;
        number
            .as_i64()
            .ok_or_else(|| Error::malformed(format!("{number} is not a 64 bit integer")))
    }

    fn decode_double(&mut self) -> Result<f64> {
        Ok(self.number("number")?.as_f64())
    }

    fn decode_string(&mut self) -> Result<String> {
        match self.next_value()? {
            Node::String(v) => Ok(v.clone()),
            other => Err(unexpected("string", other)),
        }
    }

    fn decode_char(&mut self) -> Result<char> {
        match self.next_value()? {
            Node::String(v) => {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(Error::malformed(format!(
                        "expected a single character, found {v:?}"
                    ))),
                }
            }
            Node::Number(n) => n
                .as_i64()
                .and_then(|code| u32::try_from(code).ok())
                .and_then(char::from_u32)
                .ok_or_else(|| Error::malformed(format!("{n} is not a character code point"))),
            other => Err(unexpected("character", other)),
        }
    }

    fn decode_big_integer(&mut self) -> Result<BigInteger> {
        match self.next_value()? {
            Node::Number(n) => n
                .to_big_integer()
                .ok_or_else(|| Error::malformed(format!("{n} is not an integer"))),
            Node::String(v) => v.parse(),
            other => Err(unexpected("big integer", other)),
        }
    }

    fn decode_big_decimal(&mut self) -> Result<BigDecimal> {
        match self.next_value()? {
            Node::Number(n) => n.to_big_decimal(),
            Node::String(v) => v.parse(),
            other => Err(unexpected("big decimal", other)),
        }
    }

    fn decode_array(&mut self) -> Result<Box<dyn Decoder + '_>> {
        let depth = enter_structure(self.depth, self.max_depth)?;
        match self.next_value()? {
            Node::Array(items) => Ok(Box::new(NodeDecoder {
                cursor: Cursor::Array { items, pos: 0 },
                depth,
                max_depth: self.max_depth,
            })),
            other => Err(unexpected("array", other)),
        }
    }

    fn has_next_array_value(&mut self) -> Result<bool> {
        match &self.cursor {
            Cursor::Array { items, pos } => Ok(*pos < items.len()),
            _ => Err(Error::malformed("not positioned inside an array")),
        }
    }

    fn decode_object(&mut self) -> Result<Box<dyn Decoder + '_>> {
        let depth = enter_structure(self.depth, self.max_depth)?;
        match self.next_value()? {
            Node::Object(entries) => Ok(Box::new(NodeDecoder {
                cursor: Cursor::Object {
                    entries,
                    pos: 0,
                    pending: None,
                },
                depth,
                max_depth: self.max_depth,
            })),
            other => Err(unexpected("object", other)),
        }
    }

    fn decode_key(&mut self) -> Result<Option<String>> {
        match &mut self.cursor {
            Cursor::Object {
                pending: Some(_), ..
            } => Err(Error::malformed("key read before the previous value")),
            Cursor::Object {
                entries,
                pos,
                pending,
            } => {
                let entries: &'n [(String, Node)] = *entries;
                let Some((key, value)) = entries.get(*pos) else {
                    return Ok(None);
                };
                *pos += 1;
                *pending = Some(value);
                Ok(Some(key.clone()))
            }
            _ => Err(Error::malformed("not positioned inside an object")),
        }
    }

    fn skip_value(&mut self) -> Result<()> {
        self.next_value().map(|_| ())
    }

    fn decode_arbitrary(&mut self) -> Result<Node> {
        self.next_value().cloned()
    }

    fn finish_structure(self: Box<Self>) -> Result<()> {
        match self.cursor {
            Cursor::Root(_) => Err(Error::malformed("no open structure to finish")),
            Cursor::Array { items, pos } if pos < items.len() => Err(Error::malformed(format!(
                "array closed with {} unread elements",
                items.len() - pos
            ))),
            Cursor::Object {
                entries,
                pos,
                pending,
            } if pos < entries.len() || pending.is_some() => {
                Err(Error::malformed("object closed with unread entries"))
            }
            _ => Ok(()),
        }
    }
}
