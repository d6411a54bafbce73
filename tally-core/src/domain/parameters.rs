//! Run parameters
//!
//! Parameters identify one logical run of a job. Two executions of the same
//! job with identical parameters belong to the same job instance.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicI64, Ordering};

/// Name of the timestamp parameter added to every triggered run
pub const TIME_PARAMETER: &str = "time";

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParameterValue {
    Long(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
}

impl ParameterValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Date(_) => "date",
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::Date(v) => f.write_str(&v.to_rfc3339()),
        }
    }
}

/// Ordered mapping of parameter name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunParameters(IndexMap<String, ParameterValue>);

impl RunParameters {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn builder() -> RunParametersBuilder {
        RunParametersBuilder::default()
    }

    /// Fresh parameters for a triggered run
    ///
    /// Carries a single `time` parameter holding the current epoch
    /// milliseconds. Values are strictly increasing within the process, so two
    /// triggers in the same millisecond still produce distinct runs.
    pub fn timestamped() -> Self {
        Self::builder()
            .add_long(TIME_PARAMETER, next_timestamp_millis())
            .build()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(ParameterValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ParameterValue::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable identity of these parameters
    ///
    /// SHA-256 over the entries sorted by name, hex encoded.
    ///
    /// Each entry is hashed as `len:name`, `type`, `len:value`, so no value can
    /// imitate an entry boundary. Insertion order does not change the key.
    pub fn identity_key(&self) -> String {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        for (name, value) in entries {
            let text = value.to_string();
            hasher.update(format!(
                "{}:{}|{}|{}:{};",
                name.len(),
                name,
                value.type_name(),
                text.len(),
                text
            ));
        }
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for RunParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str("}")
    }
}

/// Builder for [`RunParameters`]
#[derive(Debug, Default)]
pub struct RunParametersBuilder {
    values: IndexMap<String, ParameterValue>,
}

impl RunParametersBuilder {
    pub fn add_long(mut self, name: impl Into<String>, value: i64) -> Self {
        self.values.insert(name.into(), ParameterValue::Long(value));
        self
    }

    pub fn add_double(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), ParameterValue::Double(value));
        self
    }

    pub fn add_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(name.into(), ParameterValue::String(value.into()));
        self
    }

    pub fn add_date(mut self, name: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.values.insert(name.into(), ParameterValue::Date(value));
        self
    }

    pub fn build(self) -> RunParameters {
        RunParameters(self.values)
    }
}

fn next_timestamp_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_TIMESTAMP.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_parameters_share_identity() {
        let a = RunParameters::builder().add_long("time", 42).build();
        let b = RunParameters::builder().add_long("time", 42).build();
        assert_eq!(a, b);
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_identity_ignores_insertion_order() {
        let a = RunParameters::builder()
            .add_long("time", 1)
            .add_string("file", "report.csv")
            .build();
        let b = RunParameters::builder()
            .add_string("file", "report.csv")
            .add_long("time", 1)
            .build();
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_identity_is_not_fooled_by_separators_in_values() {
        let single = RunParameters::builder()
            .add_string("a", "1(long);b=2")
            .build();
        let pair = RunParameters::builder()
            .add_long("a", 1)
            .add_string("b", "2")
            .build();

        assert_ne!(single, pair);
        assert_ne!(single.identity_key(), pair.identity_key());
    }

    #[test]
    fn test_identity_depends_on_type() {
        let long = RunParameters::builder().add_long("id", 7).build();
        let string = RunParameters::builder().add_string("id", "7").build();
        assert_ne!(long.identity_key(), string.identity_key());
    }

    #[test]
    fn test_timestamped_parameters_are_distinct() {
        let first = RunParameters::timestamped();
        let second = RunParameters::timestamped();

        let t1 = first.get_long(TIME_PARAMETER).unwrap();
        let t2 = second.get_long(TIME_PARAMETER).unwrap();
        assert!(t2 > t1);
        assert_ne!(first.identity_key(), second.identity_key());
    }

    #[test]
    fn test_serde_keeps_order_and_types() {
        let params = RunParameters::builder()
            .add_long("time", 5)
            .add_string("source", "a.tsv")
            .build();

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(
            json,
            r#"{"time":{"type":"long","value":5},"source":{"type":"string","value":"a.tsv"}}"#
        );

        let back: RunParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_display() {
        let params = RunParameters::builder()
            .add_long("time", 5)
            .add_string("source", "a.tsv")
            .build();
        assert_eq!(params.to_string(), "{time=5, source=a.tsv}");
    }
}
