//! Runtime values handled by codecs
//!
//! The registry never looks inside a [`Value`] itself. Only the codec it
//! resolved for a [`TypeSignature`] does.

use std::{
    any::Any,
    fmt::Debug,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::types::{BigDecimal, BigInteger, Node, Number, PrimitiveKind, TypeSignature};

/// A dynamically typed value.
#[derive(Clone)]
pub enum Value {
    /// The null reference
    Null,
    #[allow(missing_docs)]
    Bool(bool),
    #[allow(missing_docs)]
    Byte(i8),
    #[allow(missing_docs)]
    Short(i16),
    #[allow(missing_docs)]
    Int(i32),
    #[allow(missing_docs)]
    Long(i64),
    #[allow(missing_docs)]
    Float(f32),
    #[allow(missing_docs)]
    Double(f64),
    #[allow(missing_docs)]
    Char(char),
    #[allow(missing_docs)]
    String(String),
    #[allow(missing_docs)]
    BigInteger(BigInteger),
    #[allow(missing_docs)]
    BigDecimal(BigDecimal),
    /// A point in time, encoded as epoch milliseconds
    Date(SystemTime),
    /// Array of boxed values; the component type comes from the signature
    Array(Vec<Value>),
    #[allow(missing_docs)]
    BooleanArray(Vec<bool>),
    #[allow(missing_docs)]
    ByteArray(Vec<i8>),
    #[allow(missing_docs)]
    ShortArray(Vec<i16>),
    #[allow(missing_docs)]
    IntArray(Vec<i32>),
    #[allow(missing_docs)]
    LongArray(Vec<i64>),
    #[allow(missing_docs)]
    FloatArray(Vec<f32>),
    #[allow(missing_docs)]
    DoubleArray(Vec<f64>),
    #[allow(missing_docs)]
    CharArray(Vec<char>),
    /// Ordered sequence; the element type comes from the signature
    Sequence(Vec<Value>),
    /// String keyed map, insertion order preserved
    Map(Vec<(String, Value)>),
    /// Value owned by a user-registered codec
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::BigInteger(_) => "BigInteger",
            Value::BigDecimal(_) => "BigDecimal",
            Value::Date(_) => "Date",
            Value::Array(_) => "Array",
            Value::BooleanArray(_) => "Boolean[]",
            Value::ByteArray(_) => "Byte[]",
            Value::ShortArray(_) => "Short[]",
            Value::IntArray(_) => "Int[]",
            Value::LongArray(_) => "Long[]",
            Value::FloatArray(_) => "Float[]",
            Value::DoubleArray(_) => "Double[]",
            Value::CharArray(_) => "Char[]",
            Value::Sequence(_) => "Sequence",
            Value::Map(_) => "Map",
            Value::Custom(_) => "Custom",
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Derives a signature from the runtime value.
    ///
    /// Used when a value is written without an explicit type. Sequences and
    /// maps carry no element information at runtime, so they derive a raw
    /// signature and their codecs refuse them. Boxed arrays derive `Any[]`.
    /// Returns `None` for [`Value::Null`] and [`Value::Custom`] values.
    #[must_use]
    pub fn signature(&self) -> Option<TypeSignature> {
        let primitive = |kind| Some(TypeSignature::Primitive(kind));
        let primitive_array =
            |kind| Some(TypeSignature::array(TypeSignature::Primitive(kind)));

        match self {
            Value::Null | Value::Custom(_) => None,
            Value::Bool(_) => primitive(PrimitiveKind::Boolean),
            Value::Byte(_) => primitive(PrimitiveKind::Byte),
            Value::Short(_) => primitive(PrimitiveKind::Short),
            Value::Int(_) => primitive(PrimitiveKind::Int),
            Value::Long(_) => primitive(PrimitiveKind::Long),
            Value::Float(_) => primitive(PrimitiveKind::Float),
            Value::Double(_) => primitive(PrimitiveKind::Double),
            Value::Char(_) => primitive(PrimitiveKind::Char),
            Value::String(_) => primitive(PrimitiveKind::String),
            Value::BigInteger(_) => primitive(PrimitiveKind::BigInteger),
            Value::BigDecimal(_) => primitive(PrimitiveKind::BigDecimal),
            Value::Date(_) => Some(TypeSignature::date()),
            Value::Array(_) => Some(TypeSignature::array(TypeSignature::any())),
            Value::BooleanArray(_) => primitive_array(PrimitiveKind::Boolean),
            Value::ByteArray(_) => primitive_array(PrimitiveKind::Byte),
            Value::ShortArray(_) => primitive_array(PrimitiveKind::Short),
            Value::IntArray(_) => primitive_array(PrimitiveKind::Int),
            Value::LongArray(_) => primitive_array(PrimitiveKind::Long),
            Value::FloatArray(_) => primitive_array(PrimitiveKind::Float),
            Value::DoubleArray(_) => primitive_array(PrimitiveKind::Double),
            Value::CharArray(_) => primitive_array(PrimitiveKind::Char),
            Value::Sequence(_) => Some(TypeSignature::named(TypeSignature::SEQUENCE)),
            Value::Map(_) => Some(TypeSignature::named(TypeSignature::MAP)),
        }
    }

    /// Builds a [`Value::Date`] from epoch milliseconds.
    #[must_use]
    pub fn date_from_millis(millis: i64) -> Value {
        let offset = Duration::from_millis(millis.unsigned_abs());
        let time = if millis >= 0 {
            UNIX_EPOCH + offset
        } else {
            UNIX_EPOCH - offset
        };
        Value::Date(time)
    }

    /// Returns the epoch milliseconds of a [`Value::Date`].
    #[must_use]
    pub fn date_millis(&self) -> Option<i64> {
        let Value::Date(time) = self else {
            return None;
        };
        let millis = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).ok()?,
            Err(before) => -i64::try_from(before.duration().as_millis()).ok()?,
        };
        Some(millis)
    }

    /// Natural mapping from a tree to a value, used when the target type is
    /// `Any`.
    ///
    /// Integers become [`Value::Long`], floats [`Value::Double`], arrays
    /// [`Value::Sequence`] and objects [`Value::Map`].
    #[must_use]
    pub fn from_node(node: &Node) -> Value {
        match node {
            Node::Null => Value::Null,
            Node::Bool(v) => Value::Bool(*v),
            Node::Number(Number::Int(v)) => Value::Long(*v),
            Node::Number(Number::Float(v)) => Value::Double(*v),
            Node::Number(Number::BigInteger(v)) => Value::BigInteger(v.clone()),
            Node::Number(Number::BigDecimal(v)) => Value::BigDecimal(v.clone()),
            Node::String(v) => Value::String(v.clone()),
            Node::Array(items) => Value::Sequence(items.iter().map(Value::from_node).collect()),
            Node::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from_node(value)))
                    .collect(),
            ),
        }
    }

    /// Downcasts a [`Value::Custom`] payload.
    #[must_use]
    pub fn downcast_custom<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Value::Custom(inner) => inner.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Char(v) => write!(f, "{v:?}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::BigInteger(v) => write!(f, "{v}"),
            Value::BigDecimal(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v:?}"),
            Value::Array(v) | Value::Sequence(v) => f.debug_list().entries(v).finish(),
            Value::BooleanArray(v) => f.debug_list().entries(v).finish(),
            Value::ByteArray(v) => f.debug_list().entries(v).finish(),
            Value::ShortArray(v) => f.debug_list().entries(v).finish(),
            Value::IntArray(v) => f.debug_list().entries(v).finish(),
            Value::LongArray(v) => f.debug_list().entries(v).finish(),
            Value::FloatArray(v) => f.debug_list().entries(v).finish(),
            Value::DoubleArray(v) => f.debug_list().entries(v).finish(),
            Value::CharArray(v) => f.debug_list().entries(v).finish(),
            Value::Map(v) => f
                .debug_map()
                .entries(v.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Custom(_) => f.write_str("<custom>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::BigDecimal(a), Value::BigDecimal(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Sequence(a), Value::Sequence(b)) => {
                a == b
            }
            (Value::BooleanArray(a), Value::BooleanArray(b)) => a == b,
            (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
            (Value::ShortArray(a), Value::ShortArray(b)) => a == b,
            (Value::IntArray(a), Value::IntArray(b)) => a == b,
            (Value::LongArray(a), Value::LongArray(b)) => a == b,
            (Value::FloatArray(a), Value::FloatArray(b)) => a == b,
            (Value::DoubleArray(a), Value::DoubleArray(b)) => a == b,
            (Value::CharArray(a), Value::CharArray(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => String,
    BigInteger => BigInteger,
    BigDecimal => BigDecimal,
    SystemTime => Date,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    /// Collects into a [`Value::Sequence`].
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Sequence(iter.into_iter().map(Into::into).collect())
    }
}
