//! # Codec registry
//! Maps a [`TypeSignature`] to the [`Serializer`] or [`Deserializer`] able
//! to handle it.
//!
//! ## Resolution
//! 1. Exact match on the full signature. Primitive codecs, primitive array
//!    codecs and most user codecs live here.
//! 2. Match on the raw kind, ignoring generics. Generic containers such as
//!    `Sequence<T>` are registered once for every instantiation and read the
//!    element type from the signature they are invoked with.
//! 3. Otherwise [`Error::CodecNotFound`].
//!
//! Resolved codecs are cached per signature. The registry is built once
//! with [`RegistryBuilder`] and never changes afterwards, so it can be
//! shared between threads behind an [`Arc`].

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;
#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use crate::{
    builtins::BuiltinCodec,
    error::{Error, Result},
    protocol::{Decoder, Encoder},
    types::{PrimitiveKind, RawKind, TypeSignature, Value},
};

/// Writes a [`Value`] through an [`Encoder`].
///
/// This is the extension point for user codecs, register implementations
/// with [`RegistryBuilder::serializer`].
pub trait Serializer: Send + Sync {
    /// Writes `value`, described by `ty`.
    ///
    /// `ty` is the signature of the value being processed, including its
    /// resolved generics, not the pattern the codec was registered under.
    ///
    /// # Errors
    /// Any failure of the encoder, or a value that does not match `ty`.
    fn serialize(
        &self,
        encoder: &mut dyn Encoder,
        context: &EncoderContext<'_>,
        value: &Value,
        ty: &TypeSignature,
    ) -> Result<()>;

    /// Returns `true` if `value` counts as empty, so callers can omit it
    /// rather than write an empty structure.
    fn is_empty(&self, value: &Value) -> bool {
        value.is_null()
    }
}

/// Reads a [`Value`] through a [`Decoder`].
pub trait Deserializer: Send + Sync {
    /// Reads a value described by `ty`.
    ///
    /// # Errors
    /// Any failure of the decoder, or input that does not match `ty`.
    fn deserialize(
        &self,
        decoder: &mut dyn Decoder,
        context: &DecoderContext<'_>,
        ty: &TypeSignature,
    ) -> Result<Value>;
}

/// A resolved serializer
#[derive(Clone)]
pub enum SerializerRef {
    /// One of the built-in codecs
    Builtin(BuiltinCodec),
    /// A user-registered codec
    Custom(Arc<dyn Serializer>),
}

/// A resolved deserializer
#[derive(Clone)]
pub enum DeserializerRef {
    /// One of the built-in codecs
    Builtin(BuiltinCodec),
    /// A user-registered codec
    Custom(Arc<dyn Deserializer>),
}

impl Serializer for SerializerRef {
    fn serialize(
        &self,
        encoder: &mut dyn Encoder,
        context: &EncoderContext<'_>,
        value: &Value,
        ty: &TypeSignature,
    ) -> Result<()> {
        match self {
            SerializerRef::Builtin(codec) => codec.serialize(encoder, context, value, ty),
            SerializerRef::Custom(codec) => codec.serialize(encoder, context, value, ty),
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        match self {
            SerializerRef::Builtin(codec) => Serializer::is_empty(codec, value),
            SerializerRef::Custom(codec) => codec.is_empty(value),
        }
    }
}

impl Deserializer for DeserializerRef {
    fn deserialize(
        &self,
        decoder: &mut dyn Decoder,
        context: &DecoderContext<'_>,
        ty: &TypeSignature,
    ) -> Result<Value> {
        match self {
            DeserializerRef::Builtin(codec) => codec.deserialize(decoder, context, ty),
            DeserializerRef::Custom(codec) => codec.deserialize(decoder, context, ty),
        }
    }
}

impl std::fmt::Debug for SerializerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializerRef::Builtin(codec) => write!(f, "Builtin({codec:?})"),
            SerializerRef::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl std::fmt::Debug for DeserializerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeserializerRef::Builtin(codec) => write!(f, "Builtin({codec:?})"),
            DeserializerRef::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// What a codec is registered under
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Only this exact signature
    Exact(TypeSignature),
    /// Every signature with this raw kind
    Raw(RawKind),
}

impl From<TypeSignature> for Pattern {
    fn from(ty: TypeSignature) -> Self {
        Pattern::Exact(ty)
    }
}

impl From<RawKind> for Pattern {
    fn from(kind: RawKind) -> Self {
        Pattern::Raw(kind)
    }
}

impl From<PrimitiveKind> for Pattern {
    fn from(kind: PrimitiveKind) -> Self {
        Pattern::Exact(TypeSignature::Primitive(kind))
    }
}

struct Table<T> {
    exact: HashMap<TypeSignature, T>,
    raw: HashMap<RawKind, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            exact: HashMap::new(),
            raw: HashMap::new(),
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert(&mut self, pattern: Pattern, codec: T) {
        let replaced = match pattern {
            Pattern::Exact(ty) => self.exact.insert(ty, codec).is_some(),
            Pattern::Raw(kind) => self.raw.insert(kind, codec).is_some(),
        };
        if replaced {
            trace!("Replaced an earlier registration");
        }
    }

    fn lookup(&self, ty: &TypeSignature) -> Option<T> {
        self.exact
            .get(ty)
            .or_else(|| self.raw.get(&ty.raw_kind()))
            .cloned()
    }

    fn len(&self) -> usize {
        self.exact.len() + self.raw.len()
    }
}

/// Collects registrations and builds a [`Registry`].
///
/// Later registrations for the same pattern replace earlier ones, so user
/// codecs registered after [`RegistryBuilder::with_defaults`] override the
/// built-ins.
#[derive(Default)]
pub struct RegistryBuilder {
    serializers: Table<SerializerRef>,
    deserializers: Table<DeserializerRef>,
}

impl RegistryBuilder {
    /// Registers every built-in codec.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        for (pattern, codec) in BuiltinCodec::registrations() {
            self.serializers
                .insert(pattern.clone(), SerializerRef::Builtin(codec));
            self.deserializers
                .insert(pattern, DeserializerRef::Builtin(codec));
        }
        self
    }

    /// Registers a serializer.
    #[must_use]
    pub fn serializer(
        mut self,
        pattern: impl Into<Pattern>,
        serializer: impl Serializer + 'static,
    ) -> Self {
        self.serializers
            .insert(pattern.into(), SerializerRef::Custom(Arc::new(serializer)));
        self
    }

    /// Registers a deserializer.
    #[must_use]
    pub fn deserializer(
        mut self,
        pattern: impl Into<Pattern>,
        deserializer: impl Deserializer + 'static,
    ) -> Self {
        self.deserializers.insert(
            pattern.into(),
            DeserializerRef::Custom(Arc::new(deserializer)),
        );
        self
    }

    /// Registers a type implementing both directions.
    #[must_use]
    pub fn codec<C>(mut self, pattern: impl Into<Pattern>, codec: C) -> Self
    where
        C: Serializer + Deserializer + 'static,
    {
        let pattern = pattern.into();
        let codec = Arc::new(codec);
        self.serializers
            .insert(pattern.clone(), SerializerRef::Custom(codec.clone()));
        self.deserializers
            .insert(pattern, DeserializerRef::Custom(codec));
        self
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn build(self) -> Registry {
        debug!(
            serializers = self.serializers.len(),
            deserializers = self.deserializers.len(),
            "Built codec registry"
        );

        Registry {
            serializers: self.serializers,
            deserializers: self.deserializers,
            serializer_cache: RwLock::new(HashMap::new()),
            deserializer_cache: RwLock::new(HashMap::new()),
            resolutions: AtomicU64::new(0),
        }
    }
}

/// Immutable set of codec registrations, see the [module docs](self).
pub struct Registry {
    serializers: Table<SerializerRef>,
    deserializers: Table<DeserializerRef>,
    serializer_cache: RwLock<HashMap<TypeSignature, SerializerRef>>,
    deserializer_cache: RwLock<HashMap<TypeSignature, DeserializerRef>>,
    resolutions: AtomicU64,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("serializers", &self.serializers.len())
            .field("deserializers", &self.deserializers.len())
            .field("resolutions", &self.resolutions())
            .finish_non_exhaustive()
    }
}

fn resolve<T: Clone>(
    table: &Table<T>,
    cache: &RwLock<HashMap<TypeSignature, T>>,
    ty: &TypeSignature,
) -> Result<T> {
    if let Some(hit) = cache.read().get(ty) {
        trace!(%ty, "Codec cache hit");
        return Ok(hit.clone());
    }

    let Some(found) = table.lookup(ty) else {
        debug!(%ty, "No codec registered");
        return Err(Error::CodecNotFound(ty.clone()));
    };

    debug!(%ty, "Resolved codec");
    // A racing resolution of the same signature stores an identical entry
    Ok(cache.write().entry(ty.clone()).or_insert(found).clone())
}

impl Registry {
    /// Starts an empty [`RegistryBuilder`].
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// A registry holding only the built-in codecs.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::builder().with_defaults().build()
    }

    /// Finds the serializer for `ty`.
    ///
    /// # Errors
    /// [`Error::CodecNotFound`] if nothing matches.
    pub fn find_serializer(&self, ty: &TypeSignature) -> Result<SerializerRef> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        resolve(&self.serializers, &self.serializer_cache, ty)
    }

    /// Finds the deserializer for `ty`.
    ///
    /// # Errors
    /// [`Error::CodecNotFound`] if nothing matches.
    pub fn find_deserializer(&self, ty: &TypeSignature) -> Result<DeserializerRef> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        resolve(&self.deserializers, &self.deserializer_cache, ty)
    }

    /// Number of lookups made so far, cache hits included.
    #[must_use]
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Context for one encode call.
    #[must_use]
    pub fn new_encoder_context<'r>(&'r self, view: Option<&'r str>) -> EncoderContext<'r> {
        EncoderContext {
            registry: self,
            view,
        }
    }

    /// Context for one decode call.
    #[must_use]
    pub fn new_decoder_context<'r>(&'r self, view: Option<&'r str>) -> DecoderContext<'r> {
        DecoderContext {
            registry: self,
            view,
        }
    }
}

/// Per-call state handed to serializers.
#[derive(Clone, Copy)]
pub struct EncoderContext<'r> {
    registry: &'r Registry,
    view: Option<&'r str>,
}

impl EncoderContext<'_> {
    /// See [`Registry::find_serializer`].
    ///
    /// # Errors
    /// [`Error::CodecNotFound`] if nothing matches.
    pub fn find_serializer(&self, ty: &TypeSignature) -> Result<SerializerRef> {
        self.registry.find_serializer(ty)
    }

    /// The view token the call was made with, codecs may use it to select
    /// a subset of fields.
    #[must_use]
    pub fn view(&self) -> Option<&str> {
        self.view
    }
}

/// Per-call state handed to deserializers.
#[derive(Clone, Copy)]
pub struct DecoderContext<'r> {
    registry: &'r Registry,
    view: Option<&'r str>,
}

impl DecoderContext<'_> {
    /// See [`Registry::find_deserializer`].
    ///
    /// # Errors
    /// [`Error::CodecNotFound`] if nothing matches.
    pub fn find_deserializer(&self, ty: &TypeSignature) -> Result<DeserializerRef> {
        self.registry.find_deserializer(ty)
    }

    /// See [`EncoderContext::view`].
    #[must_use]
    pub fn view(&self) -> Option<&str> {
        self.view
    }
}
