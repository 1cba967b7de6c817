//! # Encoder / Decoder contract
//! Codecs walk a value through these traits and never see how tokens are
//! physically represented. The same codec therefore works against the
//! streaming [`JsonGenerator`](crate::codecs::JsonGenerator) and against
//! the in-memory [`NodeEncoder`](crate::tree::NodeEncoder)/
//! [`NodeDecoder`](crate::tree::NodeDecoder).
//!
//! ## Structures
//! [`Encoder::encode_array`] and [`Encoder::encode_object`] return a child
//! that mutably borrows its parent, so the parent cannot be written to
//! while the child is open. The child is closed with
//! [`Encoder::finish_structure`], which consumes it. Closing a root
//! encoder is an error.
//!
//! Inside an object every value must be preceded by
//! [`Encoder::encode_key`].

use crate::{
    error::{Error, Result},
    types::{BigDecimal, BigInteger, Node, Number, PrimitiveKind, Value},
};

/// Writes tokens.
pub trait Encoder {
    /// Writes a null token.
    fn encode_null(&mut self) -> Result<()>;

    #[allow(missing_docs)]
    fn encode_bool(&mut self, value: bool) -> Result<()>;

    #[allow(missing_docs)]
    fn encode_long(&mut self, value: i64) -> Result<()>;

    #[allow(missing_docs)]
    fn encode_double(&mut self, value: f64) -> Result<()>;

    #[allow(missing_docs)]
    fn encode_string(&mut self, value: &str) -> Result<()>;

    #[allow(missing_docs)]
    fn encode_big_integer(&mut self, value: &BigInteger) -> Result<()>;

    #[allow(missing_docs)]
    fn encode_big_decimal(&mut self, value: &BigDecimal) -> Result<()>;

    #[allow(missing_docs)]
    fn encode_byte(&mut self, value: i8) -> Result<()> {
        self.encode_long(i64::from(value))
    }

    #[allow(missing_docs)]
    fn encode_short(&mut self, value: i16) -> Result<()> {
        self.encode_long(i64::from(value))
    }

    #[allow(missing_docs)]
    fn encode_int(&mut self, value: i32) -> Result<()> {
        self.encode_long(i64::from(value))
    }

    #[allow(missing_docs)]
    fn encode_float(&mut self, value: f32) -> Result<()> {
        self.encode_double(widen_f32(value))
    }

    /// Chars are written as one character strings.
    fn encode_char(&mut self, value: char) -> Result<()> {
        self.encode_string(value.encode_utf8(&mut [0; 4]))
    }

    /// Writes the key of the next object entry.
    fn encode_key(&mut self, key: &str) -> Result<()>;

    /// Opens an array and returns the encoder for its elements.
    fn encode_array(&mut self) -> Result<Box<dyn Encoder + '_>>;

    /// Opens an object and returns the encoder for its entries.
    fn encode_object(&mut self) -> Result<Box<dyn Encoder + '_>>;

    /// Closes the structure this encoder was returned for.
    fn finish_structure(self: Box<Self>) -> Result<()>;

    /// Writes one scalar token of the given kind.
    ///
    /// [`Value::Null`] is written as a null token for every kind.
    fn encode_primitive(&mut self, kind: PrimitiveKind, value: &Value) -> Result<()> {
        match (kind, value) {
            (_, Value::Null) => self.encode_null(),
            (PrimitiveKind::Boolean, Value::Bool(v)) => self.encode_bool(*v),
            (PrimitiveKind::Byte, Value::Byte(v)) => self.encode_byte(*v),
            (PrimitiveKind::Short, Value::Short(v)) => self.encode_short(*v),
            (PrimitiveKind::Int, Value::Int(v)) => self.encode_int(*v),
            (PrimitiveKind::Long, Value::Long(v)) => self.encode_long(*v),
            (PrimitiveKind::Float, Value::Float(v)) => self.encode_float(*v),
            (PrimitiveKind::Double, Value::Double(v)) => self.encode_double(*v),
            (PrimitiveKind::Char, Value::Char(v)) => self.encode_char(*v),
            (PrimitiveKind::String, Value::String(v)) => self.encode_string(v),
            (PrimitiveKind::BigInteger, Value::BigInteger(v)) => self.encode_big_integer(v),
            (PrimitiveKind::BigDecimal, Value::BigDecimal(v)) => self.encode_big_decimal(v),
            (kind, other) => Err(Error::type_mismatch(kind, other.kind_name())),
        }
    }

    /// Writes a complete tree.
    fn encode_node(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Null => self.encode_null(),
            Node::Bool(v) => self.encode_bool(*v),
            Node::Number(Number::Int(v)) => self.encode_long(*v),
            Node::Number(Number::Float(v)) => self.encode_double(*v),
            Node::Number(Number::BigInteger(v)) => self.encode_big_integer(v),
            Node::Number(Number::BigDecimal(v)) => self.encode_big_decimal(v),
            Node::String(v) => self.encode_string(v),
            Node::Array(items) => {
                let mut array = self.encode_array()?;
                for item in items {
                    array.encode_node(item)?;
                }
                array.finish_structure()
            }
            Node::Object(entries) => {
                let mut object = self.encode_object()?;
                for (key, value) in entries {
                    object.encode_key(key)?;
                    object.encode_node(value)?;
                }
                object.finish_structure()
            }
        }
    }
}

/// Reads tokens.
pub trait Decoder {
    /// Consumes the next token if it is null and reports whether it was.
    fn decode_null(&mut self) -> Result<bool>;

    #[allow(missing_docs)]
    fn decode_bool(&mut self) -> Result<bool>;

    #[allow(missing_docs)]
    fn decode_long(&mut self) -> Result<i64>;

    #[allow(missing_docs)]
    fn decode_double(&mut self) -> Result<f64>;

    #[allow(missing_docs)]
    fn decode_string(&mut self) -> Result<String>;

    #[allow(missing_docs)]
    fn decode_big_integer(&mut self) -> Result<BigInteger>;

    #[allow(missing_docs)]
    fn decode_big_decimal(&mut self) -> Result<BigDecimal>;

    #[allow(missing_docs)]
    fn decode_byte(&mut self) -> Result<i8> {
        let value = self.decode_long()?;
        i8::try_from(value).map_err(|_| out_of_range(value, PrimitiveKind::Byte))
    }

    #[allow(missing_docs)]
    fn decode_short(&mut self) -> Result<i16> {
        let value = self.decode_long()?;
        i16::try_from(value).map_err(|_| out_of_range(value, PrimitiveKind::Short))
    }

    #[allow(missing_docs)]
    fn decode_int(&mut self) -> Result<i32> {
        let value = self.decode_long()?;
        i32::try_from(value).map_err(|_| out_of_range(value, PrimitiveKind::Int))
    }

    #[allow(missing_docs)]
    #[allow(clippy::cast_possible_truncation)]
    fn decode_float(&mut self) -> Result<f32> {
        Ok(self.decode_double()? as f32)
    }

    /// Reads a one character string.
    fn decode_char(&mut self) -> Result<char> {
        let value = self.decode_string()?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::malformed(format!(
                "expected a single character, found {value:?}"
            ))),
        }
    }

    /// Opens an array and returns the decoder for its elements.
    fn decode_array(&mut self) -> Result<Box<dyn Decoder + '_>>;

    /// Returns `true` while the array this decoder was returned for has
    /// unread elements.
    fn has_next_array_value(&mut self) -> Result<bool>;

    /// Opens an object and returns the decoder for its entries.
    fn decode_object(&mut self) -> Result<Box<dyn Decoder + '_>>;

    /// Reads the key of the next object entry, `None` once exhausted.
    fn decode_key(&mut self) -> Result<Option<String>>;

    /// Skips the next value, including any nested structure.
    fn skip_value(&mut self) -> Result<()>;

    /// Reads the next value without a target type.
    fn decode_arbitrary(&mut self) -> Result<Node>;

    /// Closes the structure this decoder was returned for.
    fn finish_structure(self: Box<Self>) -> Result<()>;

    /// Reads one scalar token of the given kind.
    fn decode_primitive(&mut self, kind: PrimitiveKind) -> Result<Value> {
        Ok(match kind {
            PrimitiveKind::Boolean => Value::Bool(self.decode_bool()?),
            PrimitiveKind::Byte => Value::Byte(self.decode_byte()?),
            PrimitiveKind::Short => Value::Short(self.decode_short()?),
            PrimitiveKind::Int => Value::Int(self.decode_int()?),
            PrimitiveKind::Long => Value::Long(self.decode_long()?),
            PrimitiveKind::Float => Value::Float(self.decode_float()?),
            PrimitiveKind::Double => Value::Double(self.decode_double()?),
            PrimitiveKind::Char => Value::Char(self.decode_char()?),
            PrimitiveKind::String => Value::String(self.decode_string()?),
            PrimitiveKind::BigInteger => Value::BigInteger(self.decode_big_integer()?),
            PrimitiveKind::BigDecimal => Value::BigDecimal(self.decode_big_decimal()?),
        })
    }
}

fn out_of_range(value: i64, kind: PrimitiveKind) -> Error {
    Error::malformed(format!("{value} is out of range for {kind}"))
}

/// Widens an `f32` through its shortest text form, so `0.1f32` becomes
/// `0.1` rather than `0.10000000149011612`.
pub(crate) fn widen_f32(value: f32) -> f64 {
    if value.is_finite() {
        format!("{value:?}").parse().unwrap_or(f64::from(value))
    } else {
        f64::from(value)
    }
}
