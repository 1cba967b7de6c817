//! # Data model
//! - [`TypeSignature`]: the registry lookup key, including generics
//! - [`Value`]: the runtime value a codec converts
//! - [`Node`]: the in-memory tree form of an encoded value
//! - [`Number`], [`BigInteger`], [`BigDecimal`]: numeric scalars that
//!   round-trip exactly

pub mod node;
pub mod number;
pub mod signature;
pub mod value;

pub use node::Node;
pub use number::{BigDecimal, BigInteger, Number};
pub use signature::{PrimitiveKind, RawKind, TypeSignature};
pub use value::Value;
