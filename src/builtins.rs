//! # Built-in codecs
//! The closed set of codecs every [`Registry`](crate::registry::Registry)
//! built with `with_defaults` carries:
//!
//! - one scalar codec per [`PrimitiveKind`]
//! - one primitive array codec per element kind in
//!   [`PrimitiveKind::ARRAY_ELEMENTS`], writing elements directly without
//!   a registry lookup
//! - `T[]`, `Sequence<T>` and `Map<V>`, which resolve the element codec
//!   once per call and reuse it for every element
//! - `Date`, which delegates to the `Long` codec
//! - `Any`, which dispatches on the runtime value
//!
//! ## Element codec choice
//! Containers resolve their element codec from the signature once per
//! encode/decode call, not once per element. A container whose elements
//! have different runtime types should use `Any` as its element type.

use crate::{
    error::{Error, Result},
    protocol::{Decoder, Encoder},
    registry::{DecoderContext, Deserializer, EncoderContext, Pattern, Serializer},
    types::{PrimitiveKind, RawKind, TypeSignature, Value},
    utils::Entries,
};

/// Tagged variants for every built-in codec
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinCodec {
    /// A single scalar token
    Primitive(PrimitiveKind),
    /// An array of unboxed scalars
    PrimitiveArray(PrimitiveKind),
    /// `T[]`
    Array,
    /// `Sequence<T>`
    Sequence,
    /// `Map<V>`
    Map,
    /// `Date`, as epoch milliseconds
    Date,
    /// `Any`, dispatched per value
    Any,
}

impl BuiltinCodec {
    /// Every built-in codec with the pattern it is registered under.
    #[must_use]
    pub fn registrations() -> Vec<(Pattern, BuiltinCodec)> {
        let mut registrations = Vec::new();

        for kind in PrimitiveKind::ALL {
            registrations.push((Pattern::from(kind), BuiltinCodec::Primitive(kind)));
        }
        for kind in PrimitiveKind::ARRAY_ELEMENTS {
            registrations.push((
                Pattern::Exact(TypeSignature::array(kind.into())),
                BuiltinCodec::PrimitiveArray(kind),
            ));
        }

        registrations.extend([
            (Pattern::Raw(RawKind::Array), BuiltinCodec::Array),
            (
                Pattern::Raw(RawKind::Named(TypeSignature::SEQUENCE.to_string())),
                BuiltinCodec::Sequence,
            ),
            (
                Pattern::Raw(RawKind::Named(TypeSignature::MAP.to_string())),
                BuiltinCodec::Map,
            ),
            (Pattern::Exact(TypeSignature::date()), BuiltinCodec::Date),
            (Pattern::Exact(TypeSignature::any()), BuiltinCodec::Any),
        ]);

        registrations
    }
}

/// Element type of a generic container, refusing raw usage.
fn first_generic<'t>(
    ty: &'t TypeSignature,
    value: impl std::fmt::Debug,
) -> Result<&'t TypeSignature> {
    ty.generics()
        .first()
        .ok_or_else(|| Error::raw_generic(&ty.erased(), value))
}

fn component(ty: &TypeSignature) -> Result<&TypeSignature> {
    ty.component()
        .ok_or_else(|| Error::type_mismatch("an array signature", ty.to_string()))
}

/// Writes every element with one already resolved codec.
fn write_elements(
    encoder: &mut dyn Encoder,
    context: &EncoderContext<'_>,
    items: &[Value],
    element_ty: &TypeSignature,
) -> Result<()> {
    let element = context.find_serializer(element_ty)?;
    let mut array = encoder.encode_array()?;
    for item in items {
        if item.is_null() {
            array.encode_null()?;
        } else {
            element.serialize(array.as_mut(), context, item, element_ty)?;
        }
    }
    array.finish_structure()
}

/// Reads every element with one already resolved codec.
fn read_elements(
    decoder: &mut dyn Decoder,
    context: &DecoderContext<'_>,
    element_ty: &TypeSignature,
) -> Result<Vec<Value>> {
    let element = context.find_deserializer(element_ty)?;
    let mut array = decoder.decode_array()?;
    let mut items = Vec::new();
    while array.has_next_array_value()? {
        if array.decode_null()? {
            items.push(Value::Null);
        } else {
            items.push(element.deserialize(array.as_mut(), context, element_ty)?);
        }
    }
    array.finish_structure()?;
    Ok(items)
}

fn write_unboxed<T: Copy>(
    encoder: &mut dyn Encoder,
    items: &[T],
    mut write: impl FnMut(&mut dyn Encoder, T) -> Result<()>,
) -> Result<()> {
    let mut array = encoder.encode_array()?;
    for item in items {
        write(array.as_mut(), *item)?;
    }
    array.finish_structure()
}

fn read_unboxed<T>(
    decoder: &mut dyn Decoder,
    mut read: impl FnMut(&mut dyn Decoder) -> Result<T>,
) -> Result<Vec<T>> {
    let mut array = decoder.decode_array()?;
    let mut items = Vec::new();
    while array.has_next_array_value()? {
        items.push(read(array.as_mut())?);
    }
    array.finish_structure()?;
    Ok(items)
}

fn serialize_primitive_array(
    kind: PrimitiveKind,
    encoder: &mut dyn Encoder,
    value: &Value,
) -> Result<()> {
    match (kind, value) {
        (PrimitiveKind::Boolean, Value::BooleanArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_bool(x))
        }
        (PrimitiveKind::Byte, Value::ByteArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_byte(x))
        }
        (PrimitiveKind::Short, Value::ShortArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_short(x))
        }
        (PrimitiveKind::Int, Value::IntArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_int(x))
        }
        (PrimitiveKind::Long, Value::LongArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_long(x))
        }
        (PrimitiveKind::Float, Value::FloatArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_float(x))
        }
        (PrimitiveKind::Double, Value::DoubleArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_double(x))
        }
        (PrimitiveKind::Char, Value::CharArray(v)) => {
            write_unboxed(encoder, v, |e, x| e.encode_char(x))
        }
        // Boxed elements are still written without a registry lookup
        (kind, Value::Array(items)) => {
            let mut array = encoder.encode_array()?;
            for item in items {
                array.encode_primitive(kind, item)?;
            }
            array.finish_structure()
        }
        (kind, other) => Err(Error::type_mismatch(
            TypeSignature::array(kind.into()),
            other.kind_name(),
        )),
    }
}

fn deserialize_primitive_array(kind: PrimitiveKind, decoder: &mut dyn Decoder) -> Result<Value> {
    Ok(match kind {
        PrimitiveKind::Boolean => Value::BooleanArray(read_unboxed(decoder, |d| d.decode_bool())?),
        PrimitiveKind::Byte => Value::ByteArray(read_unboxed(decoder, |d| d.decode_byte())?),
        PrimitiveKind::Short => Value::ShortArray(read_unboxed(decoder, |d| d.decode_short())?),
        PrimitiveKind::Int => Value::IntArray(read_unboxed(decoder, |d| d.decode_int())?),
        PrimitiveKind::Long => Value::LongArray(read_unboxed(decoder, |d| d.decode_long())?),
        PrimitiveKind::Float => Value::FloatArray(read_unboxed(decoder, |d| d.decode_float())?),
        PrimitiveKind::Double => {
            Value::DoubleArray(read_unboxed(decoder, |d| d.decode_double())?)
        }
        PrimitiveKind::Char => Value::CharArray(read_unboxed(decoder, |d| d.decode_char())?),
        other => Value::Array(read_unboxed(decoder, |d| d.decode_primitive(other))?),
    })
}

/// Signature an `Any` value is dispatched with.
///
/// Containers found at runtime carry `Any` elements, so their contents are
/// dispatched per value as well.
fn runtime_signature(value: &Value) -> Result<TypeSignature> {
    match value {
        Value::Sequence(_) => Ok(TypeSignature::sequence(TypeSignature::any())),
        Value::Map(_) => Ok(TypeSignature::map(TypeSignature::any())),
        other => other.signature().ok_or_else(|| {
            Error::type_mismatch("a value with a runtime signature", other.kind_name())
        }),
    }
}

impl Serializer for BuiltinCodec {
    fn serialize(
        &self,
        encoder: &mut dyn Encoder,
        context: &EncoderContext<'_>,
        value: &Value,
        ty: &TypeSignature,
    ) -> Result<()> {
        if value.is_null() {
            return encoder.encode_null();
        }

        match self {
            BuiltinCodec::Primitive(kind) => encoder.encode_primitive(*kind, value),
            BuiltinCodec::PrimitiveArray(kind) => serialize_primitive_array(*kind, encoder, value),
            BuiltinCodec::Array => match value {
                Value::Array(items) => write_elements(encoder, context, items, component(ty)?),
                other => Err(Error::type_mismatch(ty, other.kind_name())),
            },
            BuiltinCodec::Sequence => match value {
                Value::Sequence(items) | Value::Array(items) => {
                    let element_ty = first_generic(ty, value)?;
                    write_elements(encoder, context, items, element_ty)
                }
                other => Err(Error::type_mismatch(ty, other.kind_name())),
            },
            BuiltinCodec::Map => match value {
                Value::Map(entries) => {
                    let value_ty = first_generic(ty, value)?;
                    let element = context.find_serializer(value_ty)?;
                    let mut object = encoder.encode_object()?;
                    for (key, entry) in entries {
                        object.encode_key(key)?;
                        if entry.is_null() {
                            object.encode_null()?;
                        } else {
                            element.serialize(object.as_mut(), context, entry, value_ty)?;
                        }
                    }
                    object.finish_structure()
                }
                other => Err(Error::type_mismatch(ty, other.kind_name())),
            },
            BuiltinCodec::Date => {
                let millis = value
                    .date_millis()
                    .ok_or_else(|| Error::type_mismatch(ty, value.kind_name()))?;
                context.find_serializer(&TypeSignature::LONG)?.serialize(
                    encoder,
                    context,
                    &Value::Long(millis),
                    &TypeSignature::LONG,
                )
            }
            BuiltinCodec::Any => {
                let runtime_ty = runtime_signature(value)?;
                context
                    .find_serializer(&runtime_ty)?
                    .serialize(encoder, context, value, &runtime_ty)
            }
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Array(v) | Value::Sequence(v) => v.is_empty(),
            Value::BooleanArray(v) => v.is_empty(),
            Value::ByteArray(v) => v.is_empty(),
            Value::ShortArray(v) => v.is_empty(),
            Value::IntArray(v) => v.is_empty(),
            Value::LongArray(v) => v.is_empty(),
            Value::FloatArray(v) => v.is_empty(),
            Value::DoubleArray(v) => v.is_empty(),
            Value::CharArray(v) => v.is_empty(),
            Value::Map(v) => v.is_empty(),
            _ => false,
        }
    }
}

impl Deserializer for BuiltinCodec {
    fn deserialize(
        &self,
        decoder: &mut dyn Decoder,
        context: &DecoderContext<'_>,
        ty: &TypeSignature,
    ) -> Result<Value> {
        if decoder.decode_null()? {
            return Ok(Value::Null);
        }

        match self {
            BuiltinCodec::Primitive(kind) => decoder.decode_primitive(*kind),
            BuiltinCodec::PrimitiveArray(kind) => deserialize_primitive_array(*kind, decoder),
            BuiltinCodec::Array => {
                Ok(Value::Array(read_elements(decoder, context, component(ty)?)?))
            }
            BuiltinCodec::Sequence => {
                let Some(element_ty) = ty.generics().first() else {
                    return Err(raw_input(ty, decoder));
                };
                Ok(Value::Sequence(read_elements(decoder, context, element_ty)?))
            }
            BuiltinCodec::Map => {
                let Some(value_ty) = ty.generics().first() else {
                    return Err(raw_input(ty, decoder));
                };
                let element = context.find_deserializer(value_ty)?;
                let mut object = decoder.decode_object()?;
                let mut entries = Entries::new();
                while let Some(key) = object.decode_key()? {
                    let entry = if object.decode_null()? {
                        Value::Null
                    } else {
                        element.deserialize(object.as_mut(), context, value_ty)?
                    };
                    entries.insert(key, entry);
                }
                object.finish_structure()?;
                Ok(Value::Map(entries.into_vec()))
            }
            BuiltinCodec::Date => {
                match context.find_deserializer(&TypeSignature::LONG)?.deserialize(
                    decoder,
                    context,
                    &TypeSignature::LONG,
                )? {
                    Value::Long(millis) => Ok(Value::date_from_millis(millis)),
                    other => Err(Error::type_mismatch(TypeSignature::LONG, other.kind_name())),
                }
            }
            BuiltinCodec::Any => Ok(Value::from_node(&decoder.decode_arbitrary()?)),
        }
    }
}

/// Builds the raw generic error for a decode, naming the offending input.
fn raw_input(ty: &TypeSignature, decoder: &mut dyn Decoder) -> Error {
    match decoder.decode_arbitrary() {
        Ok(node) => Error::raw_generic(&ty.erased(), Value::from_node(&node)),
        Err(err) => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        registry::Registry,
        tree::{NodeDecoder, NodeEncoder},
        types::{BigDecimal, Node, Number},
    };

    fn encode(registry: &Registry, value: &Value, ty: &TypeSignature) -> Result<Node> {
        let mut encoder = NodeEncoder::new();
        registry.find_serializer(ty)?.serialize(
            &mut encoder,
            &registry.new_encoder_context(None),
            value,
            ty,
        )?;
        encoder.into_node()
    }

    fn decode(registry: &Registry, node: &Node, ty: &TypeSignature) -> Result<Value> {
        let mut decoder = NodeDecoder::new(node);
        registry
            .find_deserializer(ty)?
            .deserialize(&mut decoder, &registry.new_decoder_context(None), ty)
    }

    fn int(v: i64) -> Node {
        Node::Number(Number::Int(v))
    }

    #[test]
    fn every_builtin_is_registered() {
        let registrations = BuiltinCodec::registrations();
        assert_eq!(
            registrations.len(),
            PrimitiveKind::ALL.len() + PrimitiveKind::ARRAY_ELEMENTS.len() + 5
        );
    }

    #[test]
    fn primitive_arrays_write_without_lookups() {
        let registry = Registry::with_defaults();
        let ty = TypeSignature::array(TypeSignature::INT);
        let codec = registry.find_serializer(&ty).unwrap();
        let before = registry.resolutions();

        let mut encoder = NodeEncoder::new();
        codec
            .serialize(
                &mut encoder,
                &registry.new_encoder_context(None),
                &Value::IntArray(vec![1, 2, 3]),
                &ty,
            )
            .unwrap();

        assert_eq!(registry.resolutions(), before);
        assert_eq!(
            encoder.into_node().unwrap(),
            Node::Array(vec![int(1), int(2), int(3)])
        );
    }

    #[test]
    fn element_codec_resolved_once_per_call() {
        let registry = Registry::with_defaults();
        let ty = TypeSignature::sequence(TypeSignature::LONG);
        let before = registry.resolutions();
        let value: Value = (0..100i64).collect();
        encode(&registry, &value, &ty).unwrap();
        // one lookup for the sequence itself, one for its elements
        assert_eq!(registry.resolutions() - before, 2);
    }

    #[test]
    fn primitive_array_round_trips() {
        let registry = Registry::with_defaults();
        let cases = [
            (PrimitiveKind::Boolean, Value::BooleanArray(vec![true, false])),
            (PrimitiveKind::Byte, Value::ByteArray(vec![i8::MIN, 0, i8::MAX])),
            (PrimitiveKind::Short, Value::ShortArray(vec![i16::MIN, i16::MAX])),
            (PrimitiveKind::Int, Value::IntArray(vec![i32::MIN, -1, i32::MAX])),
            (PrimitiveKind::Long, Value::LongArray(vec![i64::MIN, i64::MAX])),
            (PrimitiveKind::Float, Value::FloatArray(vec![0.1, -3.5])),
            (PrimitiveKind::Double, Value::DoubleArray(vec![0.1, 1e300])),
            (PrimitiveKind::Char, Value::CharArray(vec!['a', 'é', '🦀'])),
        ];

        for (kind, value) in cases {
            let ty = TypeSignature::array(kind.into());
            let node = encode(&registry, &value, &ty).unwrap();
            assert_eq!(decode(&registry, &node, &ty).unwrap(), value, "{kind}");
        }
    }

    #[test]
    fn boxed_array_of_any_dispatches_per_element() {
        let registry = Registry::with_defaults();
        let ty = TypeSignature::array(TypeSignature::any());
        let value = Value::Array(vec![
            Value::Int(1),
            Value::from("two"),
            Value::Null,
            Value::Sequence(vec![Value::Bool(true)]),
        ]);
        assert_eq!(
            encode(&registry, &value, &ty).unwrap(),
            Node::Array(vec![
                int(1),
                Node::String("two".into()),
                Node::Null,
                Node::Array(vec![Node::Bool(true)]),
            ])
        );
    }

    #[test]
    fn nested_generics_propagate() {
        let registry = Registry::with_defaults();
        let ty = TypeSignature::map(TypeSignature::sequence(TypeSignature::BIG_DECIMAL));
        let value = Value::Map(vec![
            (
                "prices".into(),
                Value::Sequence(vec![Value::BigDecimal("19.990".parse().unwrap())]),
            ),
            ("empty".into(), Value::Sequence(vec![])),
        ]);

        let node = encode(&registry, &value, &ty).unwrap();
        assert_eq!(
            node.get("prices"),
            Some(&Node::Array(vec![Node::Number(Number::BigDecimal(
                "19.990".parse::<BigDecimal>().unwrap()
            ))]))
        );
        assert_eq!(decode(&registry, &node, &ty).unwrap(), value);
    }

    #[test]
    fn raw_sequence_is_refused_both_ways() {
        let registry = Registry::with_defaults();
        let raw = TypeSignature::named(TypeSignature::SEQUENCE);
        let value = Value::Sequence(vec![Value::Int(7)]);

        let err = encode(&registry, &value, &raw).unwrap_err();
        assert!(
            matches!(&err, Error::UnsupportedRawGeneric { value, .. } if value == "[7]"),
            "{err}"
        );

        let node = Node::Array(vec![int(7)]);
        assert!(matches!(
            decode(&registry, &node, &raw),
            Err(Error::UnsupportedRawGeneric { .. })
        ));
    }

    #[test]
    fn raw_map_is_refused() {
        let registry = Registry::with_defaults();
        let raw = TypeSignature::named(TypeSignature::MAP);
        assert!(matches!(
            encode(&registry, &Value::Map(vec![]), &raw),
            Err(Error::UnsupportedRawGeneric { .. })
        ));
    }

    #[test]
    fn date_collapses_to_long() {
        let registry = Registry::with_defaults();
        let value = Value::date_from_millis(1_700_000_000_000);
        let node = encode(&registry, &value, &TypeSignature::date()).unwrap();
        assert_eq!(node, int(1_700_000_000_000));
        assert_eq!(
            decode(&registry, &node, &TypeSignature::date()).unwrap(),
            value
        );
    }

    #[test]
    fn emptiness_is_a_separate_predicate() {
        let registry = Registry::with_defaults();
        let cases = [
            (TypeSignature::array(TypeSignature::STRING), Value::Array(vec![])),
            (TypeSignature::array(TypeSignature::INT), Value::IntArray(vec![])),
            (
                TypeSignature::sequence(TypeSignature::INT),
                Value::Sequence(vec![]),
            ),
            (TypeSignature::map(TypeSignature::INT), Value::Map(vec![])),
        ];
        for (ty, value) in cases {
            let codec = registry.find_serializer(&ty).unwrap();
            assert!(codec.is_empty(&value), "{ty}");
            assert!(codec.is_empty(&Value::Null), "{ty}");
            let node = encode(&registry, &value, &ty).unwrap();
            let empty = match node {
                Node::Array(items) => items.is_empty(),
                Node::Object(entries) => entries.is_empty(),
                _ => false,
            };
            assert!(empty, "{ty}");
        }

        let codec = registry
            .find_serializer(&TypeSignature::sequence(TypeSignature::INT))
            .unwrap();
        assert!(!codec.is_empty(&Value::Sequence(vec![Value::Int(0)])));
        let codec = registry.find_serializer(&TypeSignature::STRING).unwrap();
        assert!(!codec.is_empty(&Value::from("")));
    }

    #[test]
    fn mismatched_value_is_reported() {
        let registry = Registry::with_defaults();
        assert!(matches!(
            encode(&registry, &Value::Long(1), &TypeSignature::INT),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            encode(&registry, &Value::Int(1), &TypeSignature::date()),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn null_elements_survive() {
        let registry = Registry::with_defaults();
        let ty = TypeSignature::sequence(TypeSignature::STRING);
        let value = Value::Sequence(vec![Value::from("a"), Value::Null]);
        let node = encode(&registry, &value, &ty).unwrap();
        assert_eq!(
            node,
            Node::Array(vec![Node::String("a".into()), Node::Null])
        );
        assert_eq!(decode(&registry, &node, &ty).unwrap(), value);
    }

    #[test]
    fn map_repeated_keys_keep_first_position() {
        let registry = Registry::with_defaults();
        let node = Node::Object(vec![
            ("a".into(), int(1)),
            ("b".into(), int(2)),
            ("a".into(), int(3)),
        ]);
        assert_eq!(
            decode(&registry, &node, &TypeSignature::map(TypeSignature::INT)).unwrap(),
            Value::Map(vec![("a".into(), Value::Int(3)), ("b".into(), Value::Int(2))])
        );
    }

    #[test]
    fn large_map_decodes() {
        let registry = Registry::with_defaults();
        let node = Node::Object((0..100_000).map(|i| (format!("k{i}"), int(i))).collect());
        let Value::Map(entries) =
            decode(&registry, &node, &TypeSignature::map(TypeSignature::LONG)).unwrap()
        else {
            panic!("expected a map");
        };
        assert_eq!(entries.len(), 100_000);
        assert_eq!(entries[99_999], ("k99999".to_string(), Value::Long(99_999)));
    }

    #[test]
    fn any_decodes_natural_values() {
        let registry = Registry::with_defaults();
        let node = Node::Object(vec![("k".into(), Node::Array(vec![int(1)]))]);
        assert_eq!(
            decode(&registry, &node, &TypeSignature::any()).unwrap(),
            Value::Map(vec![("k".into(), Value::Sequence(vec![Value::Long(1)]))])
        );
    }
}
