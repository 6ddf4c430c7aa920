//! Structured payloads and their on-disk codec.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{Map, Value};

use crate::{MigrateError, Result};

/// Root-level field holding the schema version of a payload.
pub const DATA_VERSION_KEY: &str = "data_version";

/// Version assumed for payloads that carry no version field.
pub const LEGACY_DATA_VERSION: u32 = 500;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A decoded asset: a JSON object tree with a root version field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    root: Map<String, Value>,
}

impl Payload {
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Wrap a JSON value; only objects are payloads.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(MigrateError::Decode {
                reason: format!("expected a JSON object at the root, found {}", type_name(&other)),
            }),
        }
    }

    /// Decode gzip-compressed JSON, or plain JSON when the gzip magic is absent.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let parsed = if bytes.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut json)
                .map_err(|e| MigrateError::Decode {
                    reason: e.to_string(),
                })?;
            serde_json::from_slice::<Value>(&json)
        } else {
            serde_json::from_slice::<Value>(bytes)
        };

        let value = parsed.map_err(|e| MigrateError::Decode {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Encode as gzip-compressed JSON.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(&self.root).map_err(|e| MigrateError::Encode {
            reason: e.to_string(),
        })?;
        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
        encoder.write_all(&json)?;
        Ok(encoder.finish()?)
    }

    /// The embedded version tag, if present and numeric.
    pub fn version(&self) -> Option<u32> {
        self.root
            .get(DATA_VERSION_KEY)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Return the version, writing [`LEGACY_DATA_VERSION`] first if the
    /// payload has none.
    pub fn ensure_version(&mut self) -> u32 {
        match self.version() {
            Some(v) => v,
            None => {
                self.set_version(LEGACY_DATA_VERSION);
                LEGACY_DATA_VERSION
            }
        }
    }

    pub fn set_version(&mut self, version: u32) {
        self.root
            .insert(DATA_VERSION_KEY.to_string(), Value::from(version));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.root.insert(key.into(), value)
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_root(self) -> Map<String, Value> {
        self.root
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
