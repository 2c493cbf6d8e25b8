//! Scaler configuration.
//!
//! Handles loading, validating, and merging `thumbro.toml`. User values are
//! layered over the stock defaults, so a config file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! enabled = true              # Master switch; false hands every request back
//! exiv2_command = "exiv2"     # Used to embed comments when a rule asks for it
//!
//! [limits]
//! max_file_size_kib = 409600  # Output file size ceiling (ulimit -f units)
//!
//! [libraries.libvips]
//! command = "vipsthumbnail"   # Binary that produces thumbnails
//! version_command = "vips"    # Binary run with `-v` for diagnostics
//! url = "https://www.libvips.org"  # Homepage shown next to the version
//!
//! [[rules]]                   # Ordered: the first matching rule wins
//! mime_type = "image/avif"    # Output MIME type
//! enabled = true
//! library = "libvips"
//! min_area = 0                # Source pixel area, inclusive
//! max_area = 100000000        # Source pixel area, exclusive
//! min_shrink_factor = 1.0     # Source width / thumbnail width, inclusive
//! max_shrink_factor = 64.0    # exclusive
//! input_options = {}          # Load options for *sources* of this mime_type
//! output_options = { Q = 60 } # Save options, rendered as out.avif[Q=60]
//! set_comment = false         # Embed the request comment with exiv2
//!
//! [[thumb_types]]             # Output format per source type
//! source_mime = "image/jpeg"
//! extension = "avif"
//! mime_type = "image/avif"
//! ```
//!
//! Arrays (`rules`, `thumb_types`) replace the stock arrays entirely.
//! Unknown keys are rejected to catch typos early.

use crate::scaling::OptionMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level scaler configuration.
///
/// Constructed once and shared read-only by every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Master switch. When false the adapter never handles a request.
    pub enabled: bool,
    /// Path to the exiv2 binary used for comment embedding.
    pub exiv2_command: String,
    /// Resource limits for child processes.
    pub limits: LimitsConfig,
    /// Logical library name → external tool descriptor.
    pub libraries: BTreeMap<String, LibraryConfig>,
    /// Ordered rule table.
    pub rules: Vec<Rule>,
    /// Output format per source MIME type.
    pub thumb_types: Vec<ThumbType>,
}

impl Default for Config {
    fn default() -> Self {
        let mut libraries = BTreeMap::new();
        libraries.insert(
            "libvips".to_string(),
            LibraryConfig {
                command: "vipsthumbnail".to_string(),
                version_command: Some("vips".to_string()),
                url: Some("https://www.libvips.org".to_string()),
            },
        );
        Self {
            enabled: true,
            exiv2_command: "exiv2".to_string(),
            limits: LimitsConfig::default(),
            libraries,
            rules: ["image/avif", "image/webp", "image/png", "image/jpeg"]
                .into_iter()
                .map(|mime| Rule::enabled(mime, "libvips"))
                .collect(),
            thumb_types: default_thumb_types(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size_kib == 0 {
            return Err(ConfigError::Validation(
                "limits.max_file_size_kib must be non-zero".into(),
            ));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate()
                .map_err(|msg| ConfigError::Validation(format!("rules[{i}]: {msg}")))?;
        }
        for (i, tt) in self.thumb_types.iter().enumerate() {
            if !is_mime(&tt.source_mime) || !is_mime(&tt.mime_type) {
                return Err(ConfigError::Validation(format!(
                    "thumb_types[{i}]: MIME types must look like \"image/png\""
                )));
            }
            if tt.extension.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "thumb_types[{i}]: extension must not be empty"
                )));
            }
        }
        Ok(())
    }

    pub fn library(&self, name: &str) -> Option<&LibraryConfig> {
        self.libraries.get(name)
    }

    /// Output `(extension, mime)` for thumbnails of a source type.
    ///
    /// Falls back to the source type when no mapping exists.
    pub fn thumb_type(&self, source_mime: &str) -> (String, String) {
        self.thumb_types
            .iter()
            .find(|tt| tt.source_mime == source_mime)
            .map(|tt| (tt.extension.clone(), tt.mime_type.clone()))
            .unwrap_or_else(|| {
                let ext = extension_for_mime(source_mime).unwrap_or("img");
                (ext.to_string(), source_mime.to_string())
            })
    }
}

/// Child process limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum size of any file the tool writes, in KiB.
    pub max_file_size_kib: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_kib: 409_600,
        }
    }
}

/// An external tool the rules can name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Thumbnailing binary. Empty means the library is not usable.
    #[serde(default)]
    pub command: String,
    /// Binary run with `-v` for version reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_command: Option<String>,
    /// Project homepage reported alongside the detected version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Output MIME type the rule applies to.
    pub mime_type: String,
    #[serde(default)]
    pub enabled: bool,
    pub library: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_area: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_area: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_shrink_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_shrink_factor: Option<f64>,
    /// Loader options, applied when this rule's `mime_type` is the source's.
    #[serde(default)]
    pub input_options: OptionMap,
    #[serde(default)]
    pub output_options: OptionMap,
    #[serde(default)]
    pub set_comment: bool,
}

impl Rule {
    /// An enabled rule with no bounds and no options.
    pub fn enabled(mime_type: &str, library: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            enabled: true,
            library: library.to_string(),
            min_area: None,
            max_area: None,
            min_shrink_factor: None,
            max_shrink_factor: None,
            input_options: OptionMap::new(),
            output_options: OptionMap::new(),
            set_comment: false,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !is_mime(&self.mime_type) {
            return Err(format!(
                "mime_type \"{}\" must look like \"image/png\"",
                self.mime_type
            ));
        }
        if let (Some(min), Some(max)) = (self.min_area, self.max_area) {
            if min >= max {
                return Err("min_area must be less than max_area".into());
            }
        }
        for factor in [self.min_shrink_factor, self.max_shrink_factor]
            .into_iter()
            .flatten()
        {
            if !factor.is_finite() || factor <= 0.0 {
                return Err("shrink factors must be positive".into());
            }
        }
        if let (Some(min), Some(max)) = (self.min_shrink_factor, self.max_shrink_factor) {
            if min >= max {
                return Err("min_shrink_factor must be less than max_shrink_factor".into());
            }
        }
        Ok(())
    }
}

/// Output format override for one source type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThumbType {
    pub source_mime: String,
    pub extension: String,
    pub mime_type: String,
}

/// JPEG, PNG and WebP become AVIF; GIF becomes WebP because libvips cannot
/// write animated AVIF.
fn default_thumb_types() -> Vec<ThumbType> {
    [
        ("image/gif", "webp", "image/webp"),
        ("image/jpeg", "avif", "image/avif"),
        ("image/png", "avif", "image/avif"),
        ("image/webp", "avif", "image/avif"),
    ]
    .into_iter()
    .map(|(source, ext, mime)| ThumbType {
        source_mime: source.to_string(),
        extension: ext.to_string(),
        mime_type: mime.to_string(),
    })
    .collect()
}

fn is_mime(value: &str) -> bool {
    matches!(value.split_once('/'), Some((major, minor)) if !major.is_empty() && !minor.is_empty())
}

const EXTENSION_MIME: &[(&str, &str)] = &[
    ("avif", "image/avif"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
];

/// Guess a MIME type from a file extension (case-insensitive).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    EXTENSION_MIME
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

/// Canonical extension for a MIME type.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    EXTENSION_MIME
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(ext, _)| *ext)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, layered over the stock defaults.
///
/// `None` yields the validated stock configuration.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `thumbro.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Thumbro Configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Master switch. When false every request falls back to the host scaler.
enabled = true

# exiv2 binary, used when a rule sets `set_comment = true`.
exiv2_command = "exiv2"

# ---------------------------------------------------------------------------
# Child process limits
# ---------------------------------------------------------------------------
[limits]
# Largest file the scaler may write, in KiB (same unit as `ulimit -f`).
max_file_size_kib = 409600

# ---------------------------------------------------------------------------
# External libraries
# ---------------------------------------------------------------------------
[libraries.libvips]
command = "vipsthumbnail"
version_command = "vips"
url = "https://www.libvips.org"

# ---------------------------------------------------------------------------
# Rules
# ---------------------------------------------------------------------------
# Evaluated in order; the first rule whose conditions hold handles the
# thumbnail. `mime_type` is the thumbnail's MIME type, not the source's.
#
# Optional conditions:
#   min_area / max_area                  source width x height (min inclusive,
#                                        max exclusive)
#   min_shrink_factor / max_shrink_factor  source width / thumbnail width
#
# Options:
#   input_options  = { access = "sequential" }   -> in.jpg[access=sequential]
#                    (read from the first enabled rule whose mime_type is the
#                    SOURCE's type, whichever rule produces the thumbnail)
#   output_options = { Q = 60, strip = true }     -> out.avif[Q=60,strip=true]
#   set_comment    = true                         -> embed comment via exiv2
#
# PNG thumbnails always get strip=true and filter=VIPS_FOREIGN_PNG_FILTER_ALL
# unless output_options overrides them.
[[rules]]
mime_type = "image/avif"
enabled = true
library = "libvips"

[[rules]]
mime_type = "image/webp"
enabled = true
library = "libvips"

[[rules]]
mime_type = "image/png"
enabled = true
library = "libvips"

[[rules]]
mime_type = "image/jpeg"
enabled = true
library = "libvips"

# ---------------------------------------------------------------------------
# Thumbnail formats
# ---------------------------------------------------------------------------
# Output format per source type. Sources not listed keep their own format.
[[thumb_types]]
source_mime = "image/gif"
extension = "webp"
mime_type = "image/webp"

[[thumb_types]]
source_mime = "image/jpeg"
extension = "avif"
mime_type = "image/avif"

[[thumb_types]]
source_mime = "image/png"
extension = "avif"
mime_type = "image/avif"

[[thumb_types]]
source_mime = "image/webp"
extension = "avif"
mime_type = "image/avif"
"##
}
