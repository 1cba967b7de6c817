//! Runtime type descriptions used as registry keys

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Scalar kinds that are written as exactly one token.
#[allow(missing_docs)]
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    BigInteger,
    BigDecimal,
}

impl PrimitiveKind {
    /// Every primitive kind, in declaration order.
    pub const ALL: [PrimitiveKind; 11] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Char,
        PrimitiveKind::String,
        PrimitiveKind::BigInteger,
        PrimitiveKind::BigDecimal,
    ];

    /// Kinds that have a dedicated primitive-array codec.
    pub const ARRAY_ELEMENTS: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Char,
    ];
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let to_write = match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::String => "String",
            PrimitiveKind::BigInteger => "BigInteger",
            PrimitiveKind::BigDecimal => "BigDecimal",
        };
        f.write_str(to_write)
    }
}

/// Immutable description of a type, including its generic parameters.
///
/// Two signatures are equal when their kinds and all of their generics
/// match recursively.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeSignature {
    /// A scalar written as a single token
    Primitive(PrimitiveKind),
    /// A fixed array; the component type is part of the signature
    Array(Box<TypeSignature>),
    /// A named type with ordered generic parameters
    Named {
        /// Name the codec is registered under
        name: String,
        /// Resolved generic parameters, empty for raw usage
        generics: Vec<TypeSignature>,
    },
}

/// The kind of a signature with its generics ignored.
///
/// Used for the second resolution step of the
/// [`Registry`](crate::registry::Registry).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RawKind {
    /// See [`TypeSignature::Primitive`]
    Primitive(PrimitiveKind),
    /// Any array, regardless of component type
    Array,
    /// Any instantiation of a named type
    Named(String),
}

impl TypeSignature {
    /// Name of the ordered sequence type, `Sequence<T>`.
    pub const SEQUENCE: &'static str = "Sequence";
    /// Name of the string keyed map type, `Map<V>`.
    pub const MAP: &'static str = "Map";
    /// Name of the date type, encoded as epoch milliseconds.
    pub const DATE: &'static str = "Date";
    /// Name of the runtime typed value, dispatched per value.
    pub const ANY: &'static str = "Any";

    /// `Boolean`
    pub const BOOLEAN: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Boolean);
    /// `Byte`
    pub const BYTE: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Byte);
    /// `Short`
    pub const SHORT: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Short);
    /// `Int`
    pub const INT: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Int);
    /// `Long`
    pub const LONG: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Long);
    /// `Float`
    pub const FLOAT: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Float);
    /// `Double`
    pub const DOUBLE: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Double);
    /// `Char`
    pub const CHAR: TypeSignature = TypeSignature::Primitive(PrimitiveKind::Char);
    /// `String`
    pub const STRING: TypeSignature = TypeSignature::Primitive(PrimitiveKind::String);
    /// `BigInteger`
    pub const BIG_INTEGER: TypeSignature = TypeSignature::Primitive(PrimitiveKind::BigInteger);
    /// `BigDecimal`
    pub const BIG_DECIMAL: TypeSignature = TypeSignature::Primitive(PrimitiveKind::BigDecimal);

    /// A primitive signature.
    #[must_use]
    pub const fn primitive(kind: PrimitiveKind) -> Self {
        TypeSignature::Primitive(kind)
    }

    /// An array of `component`.
    #[must_use]
    pub fn array(component: TypeSignature) -> Self {
        TypeSignature::Array(Box::new(component))
    }

    /// A named signature without generic parameters.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        TypeSignature::Named {
            name: name.into(),
            generics: Vec::new(),
        }
    }

    /// A named signature with generic parameters.
    #[must_use]
    pub fn generic(name: impl Into<String>, generics: Vec<TypeSignature>) -> Self {
        TypeSignature::Named {
            name: name.into(),
            generics,
        }
    }

    /// `Sequence<element>`
    #[must_use]
    pub fn sequence(element: TypeSignature) -> Self {
        Self::generic(Self::SEQUENCE, vec![element])
    }

    /// `Map<value>`, keys are always strings.
    #[must_use]
    pub fn map(value: TypeSignature) -> Self {
        Self::generic(Self::MAP, vec![value])
    }

    /// `Date`
    #[must_use]
    pub fn date() -> Self {
        Self::named(Self::DATE)
    }

    /// `Any`
    #[must_use]
    pub fn any() -> Self {
        Self::named(Self::ANY)
    }

    /// Returns the kind of this signature, ignoring generics.
    #[must_use]
    pub fn raw_kind(&self) -> RawKind {
        match self {
            TypeSignature::Primitive(kind) => RawKind::Primitive(*kind),
            TypeSignature::Array(_) => RawKind::Array,
            TypeSignature::Named { name, .. } => RawKind::Named(name.clone()),
        }
    }

    /// Generic parameters of a named signature, empty otherwise.
    #[must_use]
    pub fn generics(&self) -> &[TypeSignature] {
        match self {
            TypeSignature::Named { generics, .. } => generics,
            _ => &[],
        }
    }

    /// Component type of an array signature.
    #[must_use]
    pub fn component(&self) -> Option<&TypeSignature> {
        match self {
            TypeSignature::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Returns `true` for a named signature used without generic parameters.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, TypeSignature::Named { generics, .. } if generics.is_empty())
    }

    /// Returns this signature with its generics dropped.
    #[must_use]
    pub fn erased(&self) -> TypeSignature {
        match self {
            TypeSignature::Named { name, .. } => TypeSignature::named(name.clone()),
            other => other.clone(),
        }
    }
}

impl Display for TypeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeSignature::Primitive(kind) => write!(f, "{kind}"),
            TypeSignature::Array(component) => write!(f, "{component}[]"),
            TypeSignature::Named { name, generics } => {
                f.write_str(name)?;
                if !generics.is_empty() {
                    f.write_str("<")?;
                    for (idx, generic) in generics.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{generic}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl From<PrimitiveKind> for TypeSignature {
    fn from(kind: PrimitiveKind) -> Self {
        TypeSignature::Primitive(kind)
    }
}
