//! # JSON pull decoder
//! [`JsonDecoder`] reads JSON tokens straight from a byte slice through the
//! [`Decoder`] contract, the reading counterpart of
//! [`JsonEncoder`](crate::codecs::JsonEncoder). No intermediate tree is
//! built unless a codec asks for one with [`Decoder::decode_arbitrary`].
//!
//! String escapes and number grammar are checked by [`serde_json`]; this
//! module only tracks where tokens start and end.

#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use crate::{
    error::{Error, Result},
    protocol::Decoder,
    types::{BigDecimal, BigInteger, Node, Number},
    utils::{Entries, enter_structure},
};

/// Byte cursor over a JSON document
pub(crate) struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a [u8]) -> Self {
        Lexer { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_required(&self) -> Result<u8> {
        self.peek().ok_or_else(end_of_input)
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        match self.peek() {
            Some(found) if found == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(Error::malformed(format!(
                "expected `{}` at byte {}, found `{}`",
                char::from(byte),
                self.pos,
                char::from(found)
            ))),
            None => Err(end_of_input()),
        }
    }

    /// Returns `true` once only whitespace remains.
    pub(crate) fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.input.len()
    }

    fn literal(&mut self, word: &'static [u8]) -> Result<()> {
        let rest = &self.input[self.pos..];
        if rest.starts_with(word) {
            self.pos += word.len();
            Ok(())
        } else if word.starts_with(rest) {
            Err(end_of_input())
        } else {
            Err(self.unexpected_byte())
        }
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        self.expect(b'"')?;
        let mut end = self.pos;
        loop {
            match self.input.get(end) {
                None => return Err(end_of_input()),
                Some(b'"') => break,
                Some(b'\\') => end += 2,
                Some(_) => end += 1,
            }
        }
        self.pos = end + 1;
        Ok(serde_json::from_slice(&self.input[start..self.pos])?)
    }

    fn number(&mut self) -> Result<Number> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|err| Error::malformed(err.to_string()))?;
        // Validates the JSON number grammar
        text.parse::<serde_json::Number>()?;
        Number::from_text(text)
    }

    /// Name of the value starting at the cursor, used in diagnostics.
    fn upcoming(&self) -> &'static str {
        match self.peek() {
            Some(b'{') => "object",
            Some(b'[') => "array",
            Some(b'"') => "string",
            Some(b't' | b'f') => "boolean",
            Some(b'n') => "null",
            Some(b'-' | b'0'..=b'9') => "number",
            Some(_) => "an unexpected character",
            None => "end of input",
        }
    }

    fn unexpected_byte(&self) -> Error {
        match self.peek() {
            Some(b) => Error::malformed(format!(
                "unexpected `{}` at byte {}",
                char::from(b),
                self.pos
            )),
            None => end_of_input(),
        }
    }

    /// Reads one scalar token.
    fn scalar(&mut self, expected: &str) -> Result<Node> {
        match self.peek_required()? {
            b'"' => self.string().map(Node::String),
            b't' => self.literal(b"true").map(|()| Node::Bool(true)),
            b'f' => self.literal(b"false").map(|()| Node::Bool(false)),
            b'n' => self.literal(b"null").map(|()| Node::Null),
            b'-' | b'0'..=b'9' => self.number().map(Node::Number),
            b'[' | b'{' => Err(Error::malformed(format!(
                "expected {expected}, found {}",
                self.upcoming()
            ))),
            _ => Err(self.unexpected_byte()),
        }
    }

    /// Reads a complete value into a tree.
    fn node(&mut self, depth: usize, max_depth: usize) -> Result<Node> {
        self.skip_whitespace();
        match self.peek_required()? {
            b'[' => {
                let depth = enter_structure(depth, max_depth)?;
                self.pos += 1;
                let mut items = Vec::new();
                self.skip_whitespace();
                if self.eat(b']') {
                    return Ok(Node::Array(items));
                }
                loop {
                    items.push(self.node(depth, max_depth)?);
                    self.skip_whitespace();
                    if !self.eat(b',') {
                        self.expect(b']')?;
                        return Ok(Node::Array(items));
                    }
                }
            }
            b'{' => {
                let depth = enter_structure(depth, max_depth)?;
                self.pos += 1;
                let mut entries = Entries::new();
                self.skip_whitespace();
                if self.eat(b'}') {
                    return Ok(Node::Object(entries.into_vec()));
                }
                loop {
                    self.skip_whitespace();
                    let key = self.string()?;
                    self.skip_whitespace();
                    self.expect(b':')?;
                    entries.insert(key, self.node(depth, max_depth)?);
                    self.skip_whitespace();
                    if !self.eat(b',') {
                        self.expect(b'}')?;
                        return Ok(Node::Object(entries.into_vec()));
                    }
                }
            }
            _ => self.scalar("a value"),
        }
    }

    /// Skips a complete value without building it.
    fn skip(&mut self) -> Result<()> {
        let mut closers = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek_required()? {
                b'[' => closers.push(b']'),
                b'{' => closers.push(b'}'),
                byte @ (b']' | b'}') if closers.last() == Some(&byte) => {
                    closers.pop();
                }
                b',' | b':' if !closers.is_empty() => {}
                _ => {
                    self.scalar("a value")?;
                    if closers.is_empty() {
                        return Ok(());
                    }
                    continue;
                }
            }
            self.pos += 1;
            if closers.is_empty() {
                return Ok(());
            }
        }
    }
}

fn end_of_input() -> Error {
    Error::malformed("unexpected end of input")
}

enum Source<'a, 'p> {
    Owned(Lexer<'a>),
    Borrowed(&'p mut Lexer<'a>),
}

impl<'a> Source<'a, '_> {
    fn lexer(&mut self) -> &mut Lexer<'a> {
        match self {
            Source::Owned(lexer) => lexer,
            Source::Borrowed(lexer) => &mut **lexer,
        }
    }
}

enum Scope {
    Root { read: bool, ready: bool },
    Array { first: bool, ready: bool },
    Object { first: bool, value_pending: bool },
}

/// Streaming JSON decoder over a byte slice.
///
/// Child decoders for arrays and objects read through their parent's
/// cursor. A parent refuses to read while a child is open, and a child
/// checks its closing bracket in [`Decoder::finish_structure`].
pub struct JsonDecoder<'a, 'p> {
    source: Source<'a, 'p>,
    scope: Scope,
    open_child: bool,
    parent_open: Option<&'p mut bool>,
    depth: usize,
    max_depth: usize,
}

impl<'a> JsonDecoder<'a, 'a> {
    /// Creates a decoder for the single value held by `input`.
    #[must_use]
    pub fn new(input: &'a [u8], max_depth: usize) -> Self {
        JsonDecoder {
            source: Source::Owned(Lexer::new(input)),
            scope: Scope::Root {
                read: false,
                ready: false,
            },
            open_child: false,
            parent_open: None,
            depth: 0,
            max_depth,
        }
    }

    /// Checks that the root value was read and only whitespace follows it.
    ///
    /// # Errors
    /// [`Error::MalformedInput`] otherwise.
    pub fn finish(mut self) -> Result<()> {
        if self.open_child {
            return Err(Error::malformed("a structure was left open"));
        }
        if let Scope::Root { read: false, .. } = self.scope {
            return Err(Error::malformed("no value was read"));
        }
        let lexer = self.source.lexer();
        if lexer.at_end() {
            Ok(())
        } else {
            Err(Error::malformed(format!(
                "trailing characters at byte {}",
                lexer.pos
            )))
        }
    }
}

impl<'a> JsonDecoder<'a, '_> {
    /// Moves the cursor onto the next value of the current scope.
    fn position(&mut self) -> Result<&mut Lexer<'a>> {
        if self.open_child {
            return Err(Error::malformed("a nested structure was left open"));
        }
        let lexer = self.source.lexer();
        match &mut self.scope {
            Scope::Root { read, ready } => {
                if *read {
                    return Err(Error::malformed("no more values to read"));
                }
                *ready = true;
            }
            Scope::Array { first, ready } => {
                if !*ready {
                    lexer.skip_whitespace();
                    if lexer.peek() == Some(b']') {
                        return Err(Error::malformed("read past the end of an array"));
                    }
                    if !*first {
                        lexer.expect(b',')?;
                    }
                    *first = false;
                    *ready = true;
                }
            }
            Scope::Object { value_pending, .. } => {
                if !*value_pending {
                    return Err(Error::malformed("object value read before its key"));
                }
            }
        }
        lexer.skip_whitespace();
        Ok(lexer)
    }

    /// Marks the positioned value as read.
    fn consumed(&mut self) {
        match &mut self.scope {
            Scope::Root { read, ready } => {
                *read = true;
                *ready = false;
            }
            Scope::Array { ready, .. } => *ready = false,
            Scope::Object { value_pending, .. } => *value_pending = false,
        }
    }

    fn scalar(&mut self, expected: &str) -> Result<Node> {
        let node = self.position()?.scalar(expected)?;
        self.consumed();
        Ok(node)
    }

    fn number(&mut self, expected: &str) -> Result<Number> {
        match self.scalar(expected)? {
            Node::Number(n) => Ok(n),
            other => Err(unexpected(expected, &other)),
        }
    }

    fn child(&mut self, open: u8, scope: Scope) -> Result<Box<dyn Decoder + '_>> {
        let depth = enter_structure(self.depth, self.max_depth)?;
        let lexer = self.position()?;
        if lexer.peek() != Some(open) {
            let expected = if open == b'[' { "array" } else { "object" };
            return Err(Error::malformed(format!(
                "expected {expected}, found {}",
                lexer.upcoming()
            )));
        }
        lexer.pos += 1;
        self.consumed();
        self.open_child = true;

        Ok(Box::new(JsonDecoder {
            source: Source::Borrowed(self.source.lexer()),
            scope,
            open_child: false,
            parent_open: Some(&mut self.open_child),
            depth,
            max_depth: self.max_depth,
        }))
    }
}

fn unexpected(expected: &str, found: &Node) -> Error {
    Error::malformed(format!("expected {expected}, found {}", found.kind_name()))
}

impl Decoder for JsonDecoder<'_, '_> {
    fn decode_null(&mut self) -> Result<bool> {
        let lexer = self.position()?;
        if lexer.peek_required()? == b'n' {
            lexer.literal(b"null")?;
            self.consumed();
            return Ok(true);
        }
        Ok(false)
    }

    fn decode_bool(&mut self) -> Result<bool> {
        match self.scalar("boolean")? {
            Node::Bool(v) => Ok(v),
            other => Err(unexpected("boolean", &other)),
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
        match self.scalar("string")? {
            Node::String(v) => Ok(v),
            other => Err(unexpected("string", &other)),
        }
    }

    fn decode_char(&mut self) -> Result<char> {
        match self.scalar("character")? {
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
            other => Err(unexpected("character", &other)),
        }
    }

    fn decode_big_integer(&mut self) -> Result<BigInteger> {
        match self.scalar("big integer")? {
            Node::Number(n) => n
                .to_big_integer()
                .ok_or_else(|| Error::malformed(format!("{n} is not an integer"))),
            Node::String(v) => v.parse(),
            other => Err(unexpected("big integer", &other)),
        }
    }

    fn decode_big_decimal(&mut self) -> Result<BigDecimal> {
        match self.scalar("big decimal")? {
            Node::Number(n) => n.to_big_decimal(),
            Node::String(v) => v.parse(),
            other => Err(unexpected("big decimal", &other)),
        }
    }

    fn decode_array(&mut self) -> Result<Box<dyn Decoder + '_>> {
        self.child(
            b'[',
            Scope::Array {
                first: true,
                ready: false,
            },
        )
    }

    fn has_next_array_value(&mut self) -> Result<bool> {
        let Scope::Array { first, ready } = self.scope else {
            return Err(Error::malformed("not positioned inside an array"));
        };
        if self.open_child {
            return Err(Error::malformed("a nested structure was left open"));
        }
        if ready {
            return Ok(true);
        }

        let lexer = self.source.lexer();
        lexer.skip_whitespace();
        match lexer.peek_required()? {
            b']' => Ok(false),
            b',' if !first => Ok(true),
            _ if first => Ok(true),
            _ => Err(lexer.unexpected_byte()),
        }
    }

    fn decode_object(&mut self) -> Result<Box<dyn Decoder + '_>> {
        self.child(
            b'{',
            Scope::Object {
                first: true,
                value_pending: false,
            },
        )
    }

    fn decode_key(&mut self) -> Result<Option<String>> {
        if self.open_child {
            return Err(Error::malformed("a nested structure was left open"));
        }
        let lexer = self.source.lexer();
        let Scope::Object {
            first,
            value_pending,
        } = &mut self.scope
        else {
            return Err(Error::malformed("not positioned inside an object"));
        };
        if *value_pending {
            return Err(Error::malformed("key read before the previous value"));
        }

        lexer.skip_whitespace();
        if lexer.peek_required()? == b'}' {
            return Ok(None);
        }
        if !*first {
            lexer.expect(b',')?;
            lexer.skip_whitespace();
        }
        let key = lexer.string()?;
        lexer.skip_whitespace();
        lexer.expect(b':')?;
        *first = false;
        *value_pending = true;
        Ok(Some(key))
    }

    fn skip_value(&mut self) -> Result<()> {
        self.position()?.skip()?;
        self.consumed();
        Ok(())
    }

    fn decode_arbitrary(&mut self) -> Result<Node> {
        let (depth, max_depth) = (self.depth, self.max_depth);
        let node = self.position()?.node(depth, max_depth)?;
        self.consumed();
        Ok(node)
    }

    fn finish_structure(mut self: Box<Self>) -> Result<()> {
        if self.open_child {
            return Err(Error::malformed("a nested structure was left open"));
        }
        let lexer = self.source.lexer();
        lexer.skip_whitespace();
        match self.scope {
            Scope::Root { .. } => return Err(Error::malformed("no open structure to finish")),
            Scope::Array { ready: true, .. } => {
                return Err(Error::malformed("array closed with unread elements"));
            }
            Scope::Array { .. } => {
                if !lexer.eat(b']') {
                    return Err(Error::malformed("array closed with unread elements"));
                }
            }
            Scope::Object {
                value_pending: true,
                ..
            } => return Err(Error::malformed("object closed while a key awaits its value")),
            Scope::Object { .. } => {
                if !lexer.eat(b'}') {
                    return Err(Error::malformed("object closed with unread entries"));
                }
            }
        }

        if let Some(parent_open) = self.parent_open.take() {
            *parent_open = false;
        }
        Ok(())
    }
}

/// Parses `input` as exactly one JSON value.
pub(crate) fn read_node(input: &[u8], max_depth: usize) -> Result<Node> {
    let mut lexer = Lexer::new(input);
    let node = lexer.node(0, max_depth)?;
    if !lexer.at_end() {
        return Err(Error::malformed(format!(
            "trailing characters at byte {}",
            lexer.pos
        )));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Node {
        Node::Number(Number::Int(v))
    }

    #[test]
    fn walks_tokens_in_order() {
        let input = br#" {"a": [1, null, 3], "b": "x\"y", "c": true} "#;
        let mut decoder = JsonDecoder::new(input, 8);
        {
            let mut object = decoder.decode_object().unwrap();
            assert_eq!(object.decode_key().unwrap().as_deref(), Some("a"));
            {
                let mut array = object.decode_array().unwrap();
                let mut seen = Vec::new();
                while array.has_next_array_value().unwrap() {
                    if array.decode_null().unwrap() {
                        seen.push(None);
                    } else {
                        seen.push(Some(array.decode_long().unwrap()));
                    }
                }
                assert_eq!(seen, [Some(1), None, Some(3)]);
                array.finish_structure().unwrap();
            }
            assert_eq!(object.decode_key().unwrap().as_deref(), Some("b"));
            assert_eq!(object.decode_string().unwrap(), "x\"y");
            assert_eq!(object.decode_key().unwrap().as_deref(), Some("c"));
            assert!(object.decode_bool().unwrap());
            assert_eq!(object.decode_key().unwrap(), None);
            object.finish_structure().unwrap();
        }
        decoder.finish().unwrap();
    }

    #[test]
    fn empty_structures() {
        let mut decoder = JsonDecoder::new(b"[ ]", 8);
        let mut array = decoder.decode_array().unwrap();
        assert!(!array.has_next_array_value().unwrap());
        array.finish_structure().unwrap();

        let mut decoder = JsonDecoder::new(b"{}", 8);
        let mut object = decoder.decode_object().unwrap();
        assert_eq!(object.decode_key().unwrap(), None);
        object.finish_structure().unwrap();
    }

    #[test]
    fn skip_and_arbitrary() {
        let input = br#"[{"x": [1, {"y": []}]}, "kept", {"a": 1, "a": 2}]"#;
        let mut decoder = JsonDecoder::new(input, 8);
        let mut array = decoder.decode_array().unwrap();
        array.skip_value().unwrap();
        assert_eq!(array.decode_string().unwrap(), "kept");
        assert_eq!(
            array.decode_arbitrary().unwrap(),
            Node::Object(vec![("a".into(), int(2))])
        );
        assert!(!array.has_next_array_value().unwrap());
        array.finish_structure().unwrap();

        let mut decoder = JsonDecoder::new(br#"{"x": [1}]"#, 8);
        assert!(matches!(
            decoder.skip_value(),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn wrong_token_is_malformed() {
        let mut decoder = JsonDecoder::new(b"[1]", 8);
        assert!(matches!(
            decoder.decode_long(),
            Err(Error::MalformedInput(_))
        ));
        let mut decoder = JsonDecoder::new(b"\"s\"", 8);
        assert!(decoder.decode_array().is_err());
    }

    #[test]
    fn unread_elements_fail_on_close() {
        let mut decoder = JsonDecoder::new(b"[1, 2]", 8);
        let mut array = decoder.decode_array().unwrap();
        array.decode_long().unwrap();
        assert!(array.finish_structure().is_err());
    }

    #[test]
    fn trailing_input_fails() {
        let mut decoder = JsonDecoder::new(b"1 2", 8);
        assert_eq!(decoder.decode_long().unwrap(), 1);
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn truncated_input_fails() {
        let inputs: [&[u8]; 5] = [b"[1,", b"{\"a\"", b"tru", b"\"open", b""];
        for input in inputs {
            let node = read_node(input, 8);
            assert!(matches!(node, Err(Error::MalformedInput(_))), "{input:?}");
        }
    }

    #[test]
    fn numbers_keep_precision() {
        assert_eq!(
            read_node(b"[12345678901234567890, 0.1, 2.50]", 8).unwrap(),
            Node::Array(vec![
                Node::Number(Number::BigInteger("12345678901234567890".parse().unwrap())),
                Node::Number(Number::Float(0.1)),
                Node::Number(Number::BigDecimal("2.50".parse().unwrap())),
            ])
        );
        assert!(read_node(b"01", 8).is_err());
        assert!(read_node(b"1.", 8).is_err());
    }

    #[test]
    fn depth_is_limited() {
        assert!(read_node(b"[[[]]]", 2).is_err());
        assert!(read_node(b"[[]]", 2).is_ok());

        let mut decoder = JsonDecoder::new(b"[[1]]", 1);
        let mut outer = decoder.decode_array().unwrap();
        assert!(outer.decode_array().is_err());
    }

    #[test]
    fn large_object_with_repeated_keys() {
        let mut input = String::from("{");
        for i in 0..50_000 {
            input.push_str(&format!("\"k{i}\":{i},"));
        }
        input.push_str("\"k0\":-1}");
        let Node::Object(entries) = read_node(input.as_bytes(), 8).unwrap() else {
            panic!("expected an object");
        };
        assert_eq!(entries.len(), 50_000);
        assert_eq!(entries[0], ("k0".to_string(), int(-1)));
    }
}
