//! # Mapper
//! [`ObjectMapper`] runs one round trip: it resolves the root codec from
//! the [`Registry`], opens an encoder or decoder over the wire format or
//! the tree model, runs the codec and closes what it opened.
//!
//! A null root value never reaches the registry. Writing one emits a
//! single null token and reading a null token yields [`Value::Null`].

use std::{
    io::{Read, Write},
    sync::Arc,
};

#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use crate::{
    codecs::{Codec, NaiveCodec},
    config::MapperConfig,
    error::{Error, Result},
    protocol::{Decoder, Encoder},
    registry::{Deserializer, Registry, Serializer},
    streaming::StreamingProcessor,
    tree::{NodeDecoder, NodeEncoder},
    types::{Node, TypeSignature, Value},
};

/// Reads and writes [`Value`]s through a shared [`Registry`]
#[derive(Clone, Debug)]
pub struct ObjectMapper<C: Codec = NaiveCodec> {
    codec: C,
    registry: Arc<Registry>,
    config: MapperConfig,
}

impl ObjectMapper<NaiveCodec> {
    /// JSON mapper over the built-in codecs.
    #[must_use]
    pub fn json() -> Self {
        ObjectMapper::new(NaiveCodec {}, Arc::new(Registry::with_defaults()))
    }
}

impl<C: Codec> ObjectMapper<C> {
    #[allow(missing_docs)]
    pub fn new(codec: C, registry: Arc<Registry>) -> Self {
        Self::with_config(codec, registry, MapperConfig::default())
    }

    #[allow(missing_docs)]
    pub fn with_config(codec: C, registry: Arc<Registry>, config: MapperConfig) -> Self {
        ObjectMapper {
            codec,
            registry,
            config,
        }
    }

    /// Returns a mapper sharing this one's registry that hands `view` to
    /// every codec.
    #[must_use]
    pub fn clone_with_view(&self, view: impl Into<String>) -> Self {
        let mut config = self.config.clone();
        config.view = Some(view.into());
        Self::with_config(self.codec, Arc::clone(&self.registry), config)
    }

    #[allow(missing_docs)]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[allow(missing_docs)]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Decodes one complete value of type `ty` from `input`.
    ///
    /// The codec for `ty` reads straight off the wire format's decoder, so
    /// JSON input is never built into a tree first.
    ///
    /// # Errors
    /// [`Error::MalformedInput`] if `input` is not exactly one value in
    /// this mapper's format, otherwise whatever the codec for `ty` reports.
    pub fn read_value(&self, input: &[u8], ty: &TypeSignature) -> Result<Value> {
        debug!(%ty, len = input.len(), "Reading value");
        self.codec
            .decode_slice(input, self.config.max_depth, &mut |decoder| {
                self.decode_root(decoder, ty)
            })
    }

    /// Decodes one complete value of type `ty` from `input`.
    ///
    /// # Errors
    /// See [`ObjectMapper::read_value`]. Failures of `input` itself are
    /// reported as [`Error::Resource`].
    pub fn read_value_from_reader(
        &self,
        input: &mut dyn Read,
        ty: &TypeSignature,
    ) -> Result<Value> {
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;
        self.read_value(&buffer, ty)
    }

    /// Decodes a value of type `ty` from an already built tree.
    ///
    /// # Errors
    /// Whatever the codec for `ty` reports, or [`Error::CodecNotFound`].
    pub fn read_value_from_tree(&self, node: &Node, ty: &TypeSignature) -> Result<Value> {
        let mut decoder = NodeDecoder::with_max_depth(node, self.config.max_depth);
        self.decode_root(&mut decoder, ty)
    }

    /// Writes `value` to `out`, deriving its signature from the value.
    ///
    /// # Errors
    /// [`Error::TypeMismatch`] if the value carries no runtime signature,
    /// [`Error::UnsupportedRawGeneric`] for untyped sequences and maps.
    pub fn write_value(&self, out: &mut dyn Write, value: &Value) -> Result<()> {
        self.write_with(out, None, value)
    }

    /// Writes `value` to `out` as a `ty`.
    ///
    /// # Errors
    /// Whatever the codec for `ty` reports, or [`Error::Resource`] if
    /// `out` fails. `out` is flushed in every case.
    pub fn write_value_typed(
        &self,
        out: &mut dyn Write,
        ty: &TypeSignature,
        value: &Value,
    ) -> Result<()> {
        self.write_with(out, Some(ty), value)
    }

    /// [`ObjectMapper::write_value`] into a fresh buffer.
    ///
    /// # Errors
    /// See [`ObjectMapper::write_value`].
    pub fn write_value_as_bytes(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_with(&mut out, None, value)?;
        Ok(out)
    }

    /// [`ObjectMapper::write_value_typed`] into a fresh buffer.
    ///
    /// # Errors
    /// See [`ObjectMapper::write_value_typed`].
    pub fn write_value_as_bytes_typed(&self, ty: &TypeSignature, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_with(&mut out, Some(ty), value)?;
        Ok(out)
    }

    /// Encodes `value` into a tree, deriving its signature from the value.
    ///
    /// # Errors
    /// See [`ObjectMapper::write_value`].
    pub fn write_value_to_tree(&self, value: &Value) -> Result<Node> {
        self.tree_with(None, value)
    }

    /// Encodes `value` into a tree as a `ty`.
    ///
    /// # Errors
    /// See [`ObjectMapper::write_value_typed`].
    pub fn write_value_to_tree_typed(&self, ty: &TypeSignature, value: &Value) -> Result<Node> {
        self.tree_with(Some(ty), value)
    }

    /// Creates a processor turning byte chunks in this mapper's format into
    /// nodes, one per complete top-level value.
    ///
    /// With `stream_array` the elements of a top-level array are emitted
    /// individually.
    #[must_use]
    pub fn create_streaming_processor(&self, stream_array: bool) -> StreamingProcessor<C> {
        StreamingProcessor::new(self.codec, stream_array)
    }

    /// [`ObjectMapper::create_streaming_processor`] with the configured
    /// `stream_array` default.
    #[must_use]
    pub fn default_streaming_processor(&self) -> StreamingProcessor<C> {
        self.create_streaming_processor(self.config.stream_array)
    }

    fn write_with(
        &self,
        out: &mut dyn Write,
        ty: Option<&TypeSignature>,
        value: &Value,
    ) -> Result<()> {
        let mut generator = self.codec.generator(out, self.config.max_depth);
        let written = self.encode_root(generator.encoder(), ty, value);
        let closed = generator.close();
        written.and(closed)
    }

    fn tree_with(&self, ty: Option<&TypeSignature>, value: &Value) -> Result<Node> {
        let mut encoder = NodeEncoder::with_max_depth(self.config.max_depth);
        self.encode_root(&mut encoder, ty, value)?;
        encoder.into_node()
    }

    fn decode_root(&self, decoder: &mut dyn Decoder, ty: &TypeSignature) -> Result<Value> {
        if decoder.decode_null()? {
            trace!(%ty, "Null root");
            return Ok(Value::Null);
        }

        let codec = self.registry.find_deserializer(ty)?;
        let context = self
            .registry
            .new_decoder_context(self.config.view.as_deref());
        codec.deserialize(decoder, &context, ty)
    }

    fn encode_root(
        &self,
        encoder: &mut dyn Encoder,
        ty: Option<&TypeSignature>,
        value: &Value,
    ) -> Result<()> {
        if value.is_null() {
            trace!("Null root");
            return encoder.encode_null();
        }

        let derived;
        let ty = match ty {
            Some(ty) => ty,
            None => {
                derived = value.signature().ok_or_else(|| {
                    Error::type_mismatch("a value with a runtime signature", value.kind_name())
                })?;
                &derived
            }
        };

        debug!(%ty, "Writing value");
        let codec = self.registry.find_serializer(ty)?;
        let context = self
            .registry
            .new_encoder_context(self.config.view.as_deref());
        codec.serialize(encoder, &context, value, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codecs::BinaryCodec,
        registry::{DecoderContext, EncoderContext},
        types::{BigInteger, Number},
    };

    #[test]
    fn null_root_skips_resolution() {
        let mapper = ObjectMapper::json();
        assert_eq!(mapper.write_value_as_bytes(&Value::Null).unwrap(), b"null");
        assert_eq!(
            mapper
                .read_value(b" null ", &TypeSignature::sequence(TypeSignature::INT))
                .unwrap(),
            Value::Null
        );
        assert_eq!(mapper.write_value_to_tree(&Value::Null).unwrap(), Node::Null);
        assert_eq!(mapper.registry().resolutions(), 0);
    }

    #[test]
    fn derived_signatures() {
        let mapper = ObjectMapper::json();
        assert_eq!(
            mapper.write_value_as_bytes(&Value::Int(5)).unwrap(),
            b"5"
        );
        assert_eq!(
            mapper
                .write_value_as_bytes(&Value::Array(vec![Value::from("a"), Value::Long(1)]))
                .unwrap(),
            br#"["a",1]"#
        );
        assert!(matches!(
            mapper.write_value_as_bytes(&(1..3i32).collect()),
            Err(Error::UnsupportedRawGeneric { .. })
        ));
        assert!(matches!(
            mapper.write_value_as_bytes(&Value::Custom(Arc::new(1u8))),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn failed_write_still_closes_output() {
        let mapper = ObjectMapper::json();
        let mut out = Vec::new();
        let ty = TypeSignature::sequence(TypeSignature::INT);
        let value = Value::Sequence(vec![Value::Int(1), Value::from("two")]);
        assert!(mapper.write_value_typed(&mut out, &ty, &value).is_err());
        assert_eq!(out, b"[1");
    }

    #[test]
    fn read_rejects_trailing_values() {
        let mapper = ObjectMapper::json();
        assert!(matches!(
            mapper.read_value(b"1 2", &TypeSignature::INT),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            mapper.read_value(b"", &TypeSignature::INT),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn reader_input() {
        let mapper = ObjectMapper::json();
        let mut input: &[u8] = br#"{"a":1.25,"b":null}"#;
        let value = mapper
            .read_value_from_reader(&mut input, &TypeSignature::map(TypeSignature::DOUBLE))
            .unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                ("a".into(), Value::Double(1.25)),
                ("b".into(), Value::Null)
            ])
        );
    }

    #[test]
    fn large_json_map() {
        let mut input = String::from("{");
        for i in 0..100_000 {
            if i > 0 {
                input.push(',');
            }
            input.push_str(&format!("\"k{i}\":{i}"));
        }
        input.push_str(",\"k0\":-1}");

        let value = ObjectMapper::json()
            .read_value(input.as_bytes(), &TypeSignature::map(TypeSignature::LONG))
            .unwrap();
        let Value::Map(entries) = value else {
            panic!("expected a map, got {value:?}");
        };
        assert_eq!(entries.len(), 100_000);
        assert_eq!(entries[0], ("k0".to_string(), Value::Long(-1)));
        assert_eq!(entries[99_999], ("k99999".to_string(), Value::Long(99_999)));
    }

    #[test]
    fn nested_json_reads_without_a_tree() {
        let mapper = ObjectMapper::json();
        let ty = TypeSignature::map(TypeSignature::sequence(TypeSignature::STRING));
        let value = mapper
            .read_value(br#" {"a": ["x", null], "b": [], "c": null} "#, &ty)
            .unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (
                    "a".into(),
                    Value::Sequence(vec![Value::from("x"), Value::Null])
                ),
                ("b".into(), Value::Sequence(vec![])),
                ("c".into(), Value::Null),
            ])
        );
        assert!(matches!(
            mapper.read_value(br#"{"a": ["x", 1]}"#, &ty),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn json_doubles_stay_doubles() {
        let mapper = ObjectMapper::json();
        for v in [1e-5, 1e17, 0.1, -2.5e-300] {
            let value = Value::Sequence(vec![Value::Double(v)]);
            let ty = TypeSignature::sequence(TypeSignature::any());
            let bytes = mapper.write_value_as_bytes_typed(&ty, &value).unwrap();
            assert_eq!(mapper.read_value(&bytes, &ty).unwrap(), value, "{v}");
        }
    }

    #[test]
    fn big_integer_survives_both_formats() {
        let big: BigInteger = "-98765432109876543210987654321".parse().unwrap();
        let value = Value::BigInteger(big.clone());

        let json = ObjectMapper::json();
        let bytes = json.write_value_as_bytes(&value).unwrap();
        assert_eq!(bytes, big.as_str().as_bytes());
        assert_eq!(
            json.read_value(&bytes, &TypeSignature::BIG_INTEGER).unwrap(),
            value
        );

        let binary = ObjectMapper::new(BinaryCodec {}, Arc::new(Registry::with_defaults()));
        let bytes = binary.write_value_as_bytes(&value).unwrap();
        assert_eq!(
            binary.read_value(&bytes, &TypeSignature::BIG_INTEGER).unwrap(),
            value
        );
    }

    #[test]
    fn depth_limit_applies_to_trees() {
        let mapper = ObjectMapper::with_config(
            NaiveCodec {},
            Arc::new(Registry::with_defaults()),
            MapperConfig {
                max_depth: 2,
                ..MapperConfig::default()
            },
        );
        let ty = TypeSignature::sequence(TypeSignature::sequence(TypeSignature::sequence(
            TypeSignature::INT,
        )));
        let value = Value::Sequence(vec![Value::Sequence(vec![Value::Sequence(vec![])])]);
        assert!(matches!(
            mapper.write_value_to_tree_typed(&ty, &value),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            mapper.write_value_as_bytes_typed(&ty, &value),
            Err(Error::MalformedInput(_))
        ));

        let deep = Node::Array(vec![Node::Array(vec![Node::Array(vec![])])]);
        assert!(matches!(
            mapper.read_value_from_tree(&deep, &ty),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn configured_stream_array() {
        let config = MapperConfig::from_json(br#"{"streamArray":true}"#).unwrap();
        let mapper =
            ObjectMapper::with_config(NaiveCodec {}, Arc::new(Registry::with_defaults()), config);
        let mut processor = mapper.default_streaming_processor();
        assert_eq!(
            processor.on_next(b"[1,2] ").unwrap(),
            vec![Node::Number(Number::Int(1)), Node::Number(Number::Int(2))]
        );
    }

    struct ViewEcho;

    impl Serializer for ViewEcho {
        fn serialize(
            &self,
            encoder: &mut dyn Encoder,
            context: &EncoderContext<'_>,
            _value: &Value,
            _ty: &TypeSignature,
        ) -> Result<()> {
            encoder.encode_string(context.view().unwrap_or("none"))
        }
    }

    impl Deserializer for ViewEcho {
        fn deserialize(
            &self,
            decoder: &mut dyn Decoder,
            context: &DecoderContext<'_>,
            _ty: &TypeSignature,
        ) -> Result<Value> {
            decoder.skip_value()?;
            Ok(Value::from(context.view().unwrap_or("none")))
        }
    }

    #[test]
    fn skipping_codec_reads_json_directly() {
        let registry = Registry::builder()
            .with_defaults()
            .codec(TypeSignature::named("Echo"), ViewEcho)
            .build();
        let mapper = ObjectMapper::new(NaiveCodec {}, Arc::new(registry));
        let ty = TypeSignature::sequence(TypeSignature::named("Echo"));
        assert_eq!(
            mapper
                .read_value(br#"[{"deep": [1, {"x": "]"}]}, 2.5e3]"#, &ty)
                .unwrap(),
            Value::Sequence(vec![Value::from("none"), Value::from("none")])
        );
        assert!(matches!(
            mapper.read_value(br#"[{"deep": [1}], 2]"#, &ty),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn view_reaches_codecs() {
        let registry = Registry::builder()
            .with_defaults()
            .codec(TypeSignature::named("Echo"), ViewEcho)
            .build();
        let mapper = ObjectMapper::new(NaiveCodec {}, Arc::new(registry));
        let echo = TypeSignature::named("Echo");

        assert_eq!(
            mapper.write_value_to_tree_typed(&echo, &Value::Int(0)).unwrap(),
            Node::String("none".into())
        );

        let public = mapper.clone_with_view("public");
        assert_eq!(
            public.write_value_as_bytes_typed(&echo, &Value::Int(0)).unwrap(),
            br#""public""#
        );
        assert_eq!(
            public
                .read_value_from_tree(&Node::Number(Number::Int(3)), &echo)
                .unwrap(),
            Value::from("public")
        );
        assert!(mapper.config().view.is_none());
    }
}
