//! Ordered `key=value` option bags passed to the external tool.
//!
//! vipsthumbnail reads load and save options from a bracketed suffix on the
//! file name, e.g. `out.png[strip=true,filter=VIPS_FOREIGN_PNG_FILTER_ALL]`.
//! Order matters for reproducible command lines, so [`OptionMap`] keeps
//! insertion order (and document order when read from TOML).
//!
//! ## Types
//!
//! - [`OptionMap`]: insertion-ordered string map with in-place overrides.
//! - [`Dimensions`]: a width × height pair used for `--size`.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Insertion-ordered map of tool options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap(IndexMap<String, String>);

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Layer `overlay` on top of `self`: overlay values win, new keys append.
    pub fn merged_with(mut self, overlay: &OptionMap) -> Self {
        for (key, value) in overlay.iter() {
            self.set(key, value);
        }
        self
    }

    /// Render as vipsthumbnail's save/load option suffix.
    ///
    /// Empty map → empty string (no brackets at all).
    ///
    /// ```
    /// # use thumbro::scaling::OptionMap;
    /// let mut opts = OptionMap::new();
    /// assert_eq!(opts.to_suffix(), "");
    /// opts.set("a", "1");
    /// opts.set("b", "2");
    /// assert_eq!(opts.to_suffix(), "[a=1,b=2]");
    /// ```
    pub fn to_suffix(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let joined: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("[{}]", joined.join(","))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OptionMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

impl Serialize for OptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Accepts strings, integers, floats and booleans as values so that
/// `{ Q = 80, strip = true }` reads naturally in TOML.
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Str(s) => f.write_str(s),
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Float(x) => write!(f, "{x}"),
        }
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = IndexMap::<String, OptionValue>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.to_string())).collect())
    }
}

/// Width × height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, widened so large sources cannot overflow.
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
