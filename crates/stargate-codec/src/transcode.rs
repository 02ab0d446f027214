//! Recursive transcoding of JSON trees.
//!
//! The gateway carries row keys, column names and cell values as base64
//! text. [`Transcoder`] walks an arbitrary JSON tree and runs every string
//! leaf through a [`ByteTransform`], leaving the tree's shape intact.

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

use crate::error::CodecError;

/// Keys the decoder copies through untouched unless told otherwise.
pub const DEFAULT_DECODE_BYPASS: &[&str] = &["timestamp"];

// ── Transforms ──────────────────────────────────────────────

/// A byte-level transform applied to each string leaf.
pub trait ByteTransform {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Encode;

impl ByteTransform for Base64Encode {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, String> {
        Ok(STANDARD.encode(input).into_bytes())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Decode;

impl ByteTransform for Base64Decode {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, String> {
        STANDARD.decode(input).map_err(|e| e.to_string())
    }
}

impl<F> ByteTransform for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, String>,
{
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>, String> {
        self(input)
    }
}

// ── Transcoder ──────────────────────────────────────────────

/// Applies a [`ByteTransform`] to every string leaf of a JSON tree.
///
/// - Entries whose key is in `keys_to_skip` are dropped from the output.
/// - Strings whose key is in `keys_to_bypass` are copied through as-is.
/// - Numbers are stringified and their key is bypassed for the rest of the
///   call. That bookkeeping happens on a per-call copy of the bypass set.
/// - Items of a list are transcoded under the key holding the list.
/// - `null` and boolean leaves fail with [`CodecError::UnsupportedType`].
#[derive(Debug, Clone)]
pub struct Transcoder<T> {
    transform: T,
    keys_to_skip: BTreeSet<String>,
    keys_to_bypass: BTreeSet<String>,
}

impl Transcoder<Base64Decode> {
    /// Base64 decoder bypassing `timestamp`, the shape of gateway responses.
    pub fn decoder() -> Self {
        let mut transcoder = Self::new(Base64Decode);
        for key in DEFAULT_DECODE_BYPASS {
            transcoder = transcoder.bypass(*key);
        }
        transcoder
    }
}

impl Transcoder<Base64Encode> {
    pub fn encoder() -> Self {
        Self::new(Base64Encode)
    }
}

impl<T: ByteTransform> Transcoder<T> {
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            keys_to_skip: BTreeSet::new(),
            keys_to_bypass: BTreeSet::new(),
        }
    }

    pub fn skip(mut self, key: impl Into<String>) -> Self {
        self.keys_to_skip.insert(key.into());
        self
    }

    pub fn bypass(mut self, key: impl Into<String>) -> Self {
        self.keys_to_bypass.insert(key.into());
        self
    }

    pub fn keys_to_skip(&self) -> &BTreeSet<String> {
        &self.keys_to_skip
    }

    pub fn keys_to_bypass(&self) -> &BTreeSet<String> {
        &self.keys_to_bypass
    }

    /// Transcode `tree`, returning a new tree of the same shape.
    pub fn transcode(&self, tree: &Value) -> Result<Value, CodecError> {
        let mut bypass = self.keys_to_bypass.clone();
        self.walk("", tree, &mut bypass)
    }

    fn walk(
        &self,
        key: &str,
        value: &Value,
        bypass: &mut BTreeSet<String>,
    ) -> Result<Value, CodecError> {
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (child_key, child) in map {
                    if self.keys_to_skip.contains(child_key) {
                        continue;
                    }
                    let transcoded = self.walk(child_key, child, bypass)?;
                    out.insert(child_key.clone(), transcoded);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.walk(key, item, bypass)?);
                }
                Ok(Value::Array(out))
            }
            Value::Number(n) => {
                bypass.insert(key.to_string());
                Ok(Value::String(n.to_string()))
            }
            Value::String(s) if bypass.contains(key) => Ok(Value::String(s.clone())),
            Value::String(s) => self.apply(key, s).map(Value::String),
            Value::Null => Err(CodecError::UnsupportedType {
                key: key.to_string(),
                kind: "null",
            }),
            Value::Bool(_) => Err(CodecError::UnsupportedType {
                key: key.to_string(),
                kind: "bool",
            }),
        }
    }

    fn apply(&self, key: &str, input: &str) -> Result<String, CodecError> {
        let bytes = self
            .transform
            .apply(input.as_bytes())
            .map_err(|reason| CodecError::Transform {
                key: key.to_string(),
                reason,
            })?;
        String::from_utf8(bytes).map_err(|e| CodecError::Transform {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}
