//! Feature values and the insertion-ordered record that flows through the pipeline.

use super::FeatureKey;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Per-feature outputs, e.g. model distances.
    Vector(Vec<f64>),
}

impl FeatureValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FeatureValue::Int(_) => "int",
            FeatureValue::Float(_) => "float",
            FeatureValue::Text(_) => "text",
            FeatureValue::Timestamp(_) => "timestamp",
            FeatureValue::Vector(_) => "vector",
        }
    }

    /// Scalar numeric view. Timestamps map to microseconds since the epoch.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            FeatureValue::Timestamp(ts) => Some(timestamp_micros(ts) as f64),
            FeatureValue::Text(_) | FeatureValue::Vector(_) => None,
        }
    }

    /// String form used for identity keys (addresses, ports, protocol).
    pub fn to_key_string(&self) -> String {
        match self {
            FeatureValue::Int(v) => v.to_string(),
            FeatureValue::Float(v) => v.to_string(),
            FeatureValue::Text(s) => s.clone(),
            FeatureValue::Timestamp(ts) => ts.to_rfc3339(),
            FeatureValue::Vector(v) => format!("{:?}", v),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Int(v)
    }
}

impl From<i32> for FeatureValue {
    fn from(v: i32) -> Self {
        FeatureValue::Int(i64::from(v))
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

impl From<DateTime<Utc>> for FeatureValue {
    fn from(v: DateTime<Utc>) -> Self {
        FeatureValue::Timestamp(v)
    }
}

impl From<Vec<f64>> for FeatureValue {
    fn from(v: Vec<f64>) -> Self {
        FeatureValue::Vector(v)
    }
}

pub fn timestamp_micros(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp() * 1_000_000 + i64::from(ts.timestamp_subsec_micros())
}

pub fn timestamp_from_micros(micros: i64) -> Option<DateTime<Utc>> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

/// One sample. Keys keep insertion order; replacing a value keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRecord {
    entries: Vec<(FeatureKey, FeatureValue)>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<FeatureKey>, value: impl Into<FeatureValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<FeatureKey>, value: impl Into<FeatureValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: impl Into<FeatureKey>) -> Option<FeatureValue> {
        let key = key.into();
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, key: impl Into<FeatureKey>) -> bool {
        let key = key.into();
        self.entries.iter().any(|(k, _)| *k == key)
    }

    pub fn try_get(&self, key: impl Into<FeatureKey>) -> Option<&FeatureValue> {
        let key = key.into();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Lookup that treats an absent key as a pipeline misconfiguration.
    pub fn get(&self, key: impl Into<FeatureKey>) -> Result<&FeatureValue> {
        let key = key.into();
        self.try_get(key).ok_or(PipelineError::MissingFeature(key))
    }

    pub fn get_i64(&self, key: impl Into<FeatureKey>) -> Result<i64> {
        let key = key.into();
        match self.get(key)? {
            FeatureValue::Int(v) => Ok(*v),
            FeatureValue::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            other => Err(mismatch(key, "int", other)),
        }
    }

    pub fn get_f64(&self, key: impl Into<FeatureKey>) -> Result<f64> {
        let key = key.into();
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, "number", value))
    }

    pub fn get_timestamp(&self, key: impl Into<FeatureKey>) -> Result<DateTime<Utc>> {
        let key = key.into();
        match self.get(key)? {
            FeatureValue::Timestamp(ts) => Ok(*ts),
            other => Err(mismatch(key, "timestamp", other)),
        }
    }

    pub fn get_text(&self, key: impl Into<FeatureKey>) -> Result<&str> {
        let key = key.into();
        match self.get(key)? {
            FeatureValue::Text(s) => Ok(s),
            other => Err(mismatch(key, "text", other)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = FeatureKey> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureKey, &FeatureValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn mismatch(key: FeatureKey, expected: &'static str, found: &FeatureValue) -> PipelineError {
    PipelineError::TypeMismatch {
        key,
        expected,
        found: found.kind(),
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k.as_str(), v)?;
        }
        map.end()
    }
}
