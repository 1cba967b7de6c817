#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

//! ## ⚠️ Weird API Parts
//! #### Values are dynamic
//! Codecs receive a [`Value`] together with the [`TypeSignature`] it is
//! being processed as. The signature, not the value, decides which codec
//! runs, so a `Sequence` written as `Sequence<Any>` dispatches every element
//! on its runtime type while `Sequence<Int>` refuses anything but ints.
//!
//! #### Raw generics are errors
//! A container signature without generics (`Sequence` rather than
//! `Sequence<Int>`) fails with [`Error::UnsupportedRawGeneric`] instead of
//! guessing an element codec.

pub mod builtins;
pub mod codecs;
pub mod config;
pub mod error;
pub mod json;
pub mod mapper;
pub mod protocol;
pub mod registry;
pub mod splitter;
pub mod streaming;
pub mod tree;
pub mod types;
mod utils;

pub use error::{Error, Result};
pub use mapper::ObjectMapper;
pub use registry::Registry;
pub use types::{Node, TypeSignature, Value};
