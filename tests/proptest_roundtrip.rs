//! Property-based round trips for every primitive kind and for nested
//! containers.

#![allow(clippy::float_cmp)]

use proptest::{
    collection::{btree_map, vec},
    prelude::*,
};
use typecodec::{
    ObjectMapper, TypeSignature, Value,
    types::{BigDecimal, BigInteger, PrimitiveKind},
};

/// Strategy for an integral or boolean kind together with a value of that kind.
fn arb_integral() -> impl Strategy<Value = (PrimitiveKind, Value)> {
    prop_oneof![
        any::<bool>().prop_map(|v| (PrimitiveKind::Boolean, Value::Bool(v))),
        any::<i8>().prop_map(|v| (PrimitiveKind::Byte, Value::Byte(v))),
        any::<i16>().prop_map(|v| (PrimitiveKind::Short, Value::Short(v))),
        any::<i32>().prop_map(|v| (PrimitiveKind::Int, Value::Int(v))),
        any::<i64>().prop_map(|v| (PrimitiveKind::Long, Value::Long(v))),
        any::<i128>().prop_map(|v| {
            (PrimitiveKind::BigInteger, Value::BigInteger(BigInteger::from(v)))
        }),
    ]
}

/// Strategy for the remaining kinds.
fn arb_other() -> impl Strategy<Value = (PrimitiveKind, Value)> {
    prop_oneof![
        // JSON has no NaN or infinities
        any::<f32>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|v| (PrimitiveKind::Float, Value::Float(v))),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|v| (PrimitiveKind::Double, Value::Double(v))),
        any::<char>().prop_map(|v| (PrimitiveKind::Char, Value::Char(v))),
        ".*".prop_map(|v| (PrimitiveKind::String, Value::String(v))),
        (any::<i64>(), 0u32..1_000_000).prop_map(|(int, frac)| {
            let decimal: BigDecimal = format!("{int}.{frac:06}").parse().unwrap();
            (PrimitiveKind::BigDecimal, Value::BigDecimal(decimal))
        }),
    ]
}

fn arb_primitive() -> impl Strategy<Value = (PrimitiveKind, Value)> {
    prop_oneof![arb_integral(), arb_other()]
}

fn finite_double() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |f| f.is_finite())
}

/// A container layout, from which both the signature and matching values
/// are generated.
#[derive(Clone, Debug)]
enum Shape {
    Long,
    Text,
    Flag,
    Double,
    Any,
    LongArray,
    BooleanArray,
    DoubleArray,
    Array(Box<Shape>),
    Sequence(Box<Shape>),
    Map(Box<Shape>),
}

impl Shape {
    /// Arrays of primitive components are unboxed.
    fn array_of(component: Shape) -> Shape {
        match component {
            Shape::Long => Shape::LongArray,
            Shape::Flag => Shape::BooleanArray,
            Shape::Double => Shape::DoubleArray,
            other => Shape::Array(Box::new(other)),
        }
    }

    fn signature(&self) -> TypeSignature {
        match self {
            Shape::Long => TypeSignature::LONG,
            Shape::Text => TypeSignature::STRING,
            Shape::Flag => TypeSignature::BOOLEAN,
            Shape::Double => TypeSignature::DOUBLE,
            Shape::Any => TypeSignature::any(),
            Shape::LongArray => TypeSignature::array(TypeSignature::LONG),
            Shape::BooleanArray => TypeSignature::array(TypeSignature::BOOLEAN),
            Shape::DoubleArray => TypeSignature::array(TypeSignature::DOUBLE),
            Shape::Array(component) => TypeSignature::array(component.signature()),
            Shape::Sequence(element) => TypeSignature::sequence(element.signature()),
            Shape::Map(value) => TypeSignature::map(value.signature()),
        }
    }

    fn values(&self) -> BoxedStrategy<Value> {
        match self {
            Shape::Long => any::<i64>().prop_map(Value::Long).boxed(),
            Shape::Text => ".{0,8}".prop_map(Value::String).boxed(),
            Shape::Flag => any::<bool>().prop_map(Value::Bool).boxed(),
            Shape::Double => finite_double().prop_map(Value::Double).boxed(),
            Shape::Any => prop_oneof![
                any::<i64>().prop_map(Value::Long),
                "[a-z]{0,4}".prop_map(Value::String),
                any::<bool>().prop_map(Value::Bool),
                finite_double().prop_map(Value::Double),
            ]
            .boxed(),
            Shape::LongArray => vec(any::<i64>(), 0..4).prop_map(Value::LongArray).boxed(),
            Shape::BooleanArray => vec(any::<bool>(), 0..4)
                .prop_map(Value::BooleanArray)
                .boxed(),
            Shape::DoubleArray => vec(finite_double(), 0..4)
                .prop_map(Value::DoubleArray)
                .boxed(),
            Shape::Array(component) => vec(component.nullable(), 0..4)
                .prop_map(Value::Array)
                .boxed(),
            Shape::Sequence(element) => vec(element.nullable(), 0..4)
                .prop_map(Value::Sequence)
                .boxed(),
            Shape::Map(value) => btree_map("[a-z]{1,3}", value.nullable(), 0..4)
                .prop_map(|entries| Value::Map(entries.into_iter().collect()))
                .boxed(),
        }
    }

    /// Container elements may be null.
    fn nullable(&self) -> BoxedStrategy<Value> {
        prop_oneof![1 => Just(Value::Null), 4 => self.values()].boxed()
    }
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::Long),
        Just(Shape::Text),
        Just(Shape::Flag),
        Just(Shape::Double),
        Just(Shape::Any),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Shape::array_of),
            inner.clone().prop_map(|s| Shape::Sequence(Box::new(s))),
            inner.prop_map(|s| Shape::Map(Box::new(s))),
        ]
    })
}

/// A nested signature together with a value of that signature.
fn arb_nested() -> impl Strategy<Value = (TypeSignature, Value)> {
    arb_shape().prop_flat_map(|shape| (Just(shape.signature()), shape.values()))
}

proptest! {
    #[test]
    fn json_round_trip((kind, value) in arb_primitive()) {
        let mapper = ObjectMapper::json();
        let ty = TypeSignature::primitive(kind);
        let bytes = mapper.write_value_as_bytes_typed(&ty, &value).unwrap();
        prop_assert_eq!(mapper.read_value(&bytes, &ty).unwrap(), value);
    }

    #[test]
    fn tree_round_trip((kind, value) in arb_primitive()) {
        let mapper = ObjectMapper::json();
        let ty = TypeSignature::primitive(kind);
        let tree = mapper.write_value_to_tree_typed(&ty, &value).unwrap();
        prop_assert_eq!(mapper.read_value_from_tree(&tree, &ty).unwrap(), value);
    }

    #[test]
    fn long_sequence_keeps_order(items in prop::collection::vec(any::<i64>(), 0..64)) {
        let mapper = ObjectMapper::json();
        let ty = TypeSignature::sequence(TypeSignature::LONG);
        let value: Value = items.into_iter().collect();
        let bytes = mapper.write_value_as_bytes_typed(&ty, &value).unwrap();
        prop_assert_eq!(mapper.read_value(&bytes, &ty).unwrap(), value);
    }

    #[test]
    fn string_array_keeps_order(items in prop::collection::vec(".*", 0..16)) {
        let mapper = ObjectMapper::json();
        let ty = TypeSignature::array(TypeSignature::STRING);
        let value = Value::Array(items.into_iter().map(Value::String).collect());
        let tree = mapper.write_value_to_tree_typed(&ty, &value).unwrap();
        prop_assert_eq!(mapper.read_value_from_tree(&tree, &ty).unwrap(), value);
    }

    #[test]
    fn nested_tree_round_trip((ty, value) in arb_nested()) {
        let mapper = ObjectMapper::json();
        let tree = mapper.write_value_to_tree_typed(&ty, &value).unwrap();
        prop_assert_eq!(mapper.read_value_from_tree(&tree, &ty).unwrap(), value);
    }

    #[test]
    fn nested_json_round_trip((ty, value) in arb_nested()) {
        let mapper = ObjectMapper::json();
        let bytes = mapper.write_value_as_bytes_typed(&ty, &value).unwrap();
        prop_assert_eq!(mapper.read_value(&bytes, &ty).unwrap(), value);
    }
}
