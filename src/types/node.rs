//! In-memory tree model
//!
//! A [`Node`] is what [`NodeEncoder`](crate::tree::NodeEncoder) produces
//! and what [`NodeDecoder`](crate::tree::NodeDecoder) walks. It also
//! implements serde's traits so any serde format can carry it.

use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
};

use crate::{error::Error, types::Number, utils::Entries};

/// Tree representation of an encoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    #[allow(missing_docs)]
    Null,
    #[allow(missing_docs)]
    Bool(bool),
    #[allow(missing_docs)]
    Number(Number),
    #[allow(missing_docs)]
    String(String),
    /// Ordered elements
    Array(Vec<Node>),
    /// Entries in insertion order, keys are unique
    Object(Vec<(String, Node)>),
}

impl Node {
    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
        }
    }

    /// Looks up an object entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns the elements of an array node.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` for [`Node::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }
}

impl From<serde_json::Value> for Node {
    /// Number text is classified with [`Number::from_text`], so arbitrary
    /// precision values survive the conversion.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Node::Null,
            serde_json::Value::Bool(v) => Node::Bool(v),
            serde_json::Value::Number(n) => {
                let text = n.to_string();
                // serde_json only produces valid number text
                Number::from_text(&text).map_or(Node::String(text), Node::Number)
            }
            serde_json::Value::String(v) => Node::String(v),
            serde_json::Value::Array(items) => {
                Node::Array(items.into_iter().map(Node::from).collect())
            }
            serde_json::Value::Object(map) => {
                Node::Object(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(v) => serializer.serialize_bool(*v),
            Node::Number(Number::Int(v)) => serializer.serialize_i64(*v),
            Node::Number(Number::Float(v)) => serializer.serialize_f64(*v),
            // Formats without big numbers carry them as text
            Node::Number(Number::BigInteger(v)) => serializer.serialize_str(v.as_str()),
            Node::Number(Number::BigDecimal(v)) => serializer.serialize_str(v.as_str()),
            Node::String(v) => serializer.serialize_str(v),
            Node::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any tree value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Number(Number::Int(v)))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Number(
            i64::try_from(v).map_or_else(|_| Number::BigInteger(v.into()), Number::Int),
        ))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Number(Number::Float(v)))
    }

    fn visit_str<E>(self, v: &str) -> Result<Node, E> {
        Ok(Node::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Node, E> {
        Ok(Node::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Node, E> {
        Ok(Node::Array(
            v.iter()
                .map(|b| Node::Number(Number::Int(i64::from(*b))))
                .collect(),
        ))
    }

    fn visit_unit<E>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_none<E>(self) -> Result<Node, E> {
        Ok(Node::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Node, D::Error>
    where
        D: Deserializer<'de>,
    {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Node, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Node, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Entries::new();
        while let Some((key, value)) = map.next_entry::<String, Node>()? {
            entries.insert(key, value);
        }
        Ok(Node::Object(entries.into_vec()))
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NodeVisitor)
    }
}

impl TryFrom<&Node> for serde_json::Value {
    type Error = Error;

    /// Converts a tree into a `serde_json` value without losing number
    /// precision.
    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        Ok(match node {
            Node::Null => serde_json::Value::Null,
            Node::Bool(v) => serde_json::Value::Bool(*v),
            Node::Number(n) => {
                let number: serde_json::Number = n
                    .to_string()
                    .parse()
                    .map_err(|_| Error::malformed(format!("{n} is not a JSON number")))?;
                serde_json::Value::Number(number)
            }
            Node::String(v) => serde_json::Value::String(v.clone()),
            Node::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(serde_json::Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Node::Object(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), serde_json::Value::try_from(v)?)))
                    .collect::<Result<_, Error>>()?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_conversion_keeps_order_and_precision() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"z":1,"a":12345678901234567890123,"m":[0.1,2.50]}"#)
                .unwrap();
        let node = Node::from(json);
        let Node::Object(entries) = &node else {
            panic!("expected object");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert_eq!(
            node.get("a"),
            Some(&Node::Number(Number::BigInteger(
                "12345678901234567890123".parse().unwrap()
            )))
        );
        assert_eq!(
            node.get("m"),
            Some(&Node::Array(vec![
                Node::Number(Number::Float(0.1)),
                Node::Number(Number::BigDecimal("2.50".parse().unwrap())),
            ]))
        );
    }

    #[test]
    fn msgpack_duplicate_keys_replace_in_place() {
        // fixmap with three entries: a, b, a
        let bytes = [0x83, 0xa1, b'a', 0xc0, 0xa1, b'b', 0xc0, 0xa1, b'a', 0xc3];
        let node: Node = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(
            node,
            Node::Object(vec![("a".into(), Node::Bool(true)), ("b".into(), Node::Null)])
        );
    }

    #[test]
    fn large_msgpack_map() {
        let node = Node::Object(
            (0..100_000)
                .map(|i| (format!("key{i}"), Node::Number(Number::Int(i))))
                .collect(),
        );
        let bytes = rmp_serde::to_vec(&node).unwrap();
        let decoded: Node = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn msgpack_round_trip() {
        let node = Node::Object(vec![
            ("n".into(), Node::Number(Number::Int(-3))),
            ("f".into(), Node::Number(Number::Float(1.25))),
            (
                "l".into(),
                Node::Array(vec![Node::String("x".into()), Node::Null, Node::Bool(false)]),
            ),
        ]);
        let bytes = rmp_serde::to_vec(&node).unwrap();
        let decoded: Node = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, node);
    }
}
