//! Cache fingerprint derivation.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Fingerprint length in bytes before hex encoding.
const FINGERPRINT_BYTES: usize = 16;

/// Identity of one memoized call: operation name plus its arguments.
///
/// Positional arguments keep their order; keyword arguments are sorted by
/// name, so insertion order never changes the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    op: String,
    args: Vec<String>,
    kwargs: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Append a positional argument by its display form.
    pub fn arg(mut self, value: impl Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Append a structured positional argument by its JSON form.
    pub fn json_arg<T: Serialize>(mut self, value: &T) -> Self {
        let encoded = serde_json::to_string(value)
            .unwrap_or_else(|e| format!("<unserializable: {e}>"));
        self.args.push(encoded);
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.kwargs.insert(name.into(), value.to_string());
        self
    }

    pub fn op(&self) -> &str {
        &self.op
    }

    pub fn fingerprint(&self) -> String {
        let kwargs: Vec<(&str, &str)> = self
            .kwargs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        generate_key(&self.op, &self.args, &kwargs)
    }
}

/// Hash an operation name and its arguments into a 32-char hex fingerprint.
///
/// Keyword arguments are sorted here as well, so callers that bypass
/// [`CacheKey`] get the same ordering guarantee.
pub fn generate_key<A: AsRef<str>>(op: &str, args: &[A], kwargs: &[(&str, &str)]) -> String {
    let mut sorted = kwargs.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));

    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    let content = format!("{:?}{:?}{:?}", op, args, sorted);

    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..FINGERPRINT_BYTES])
}
