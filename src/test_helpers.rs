//! Shared test utilities for the thumbro test suite.
//!
//! Provides canned rules, sources and requests so matcher, builder and
//! adapter tests start from the same baseline and only spell out what they
//! change.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut rule = png_rule();
//! rule.max_area = Some(1_000);
//! let config = single_rule_config(rule);
//!
//! let mut request = sample_request();
//! request.source.width = 4000;
//! ```

use crate::config::{Config, Rule};
use crate::scaling::Dimensions;
use crate::types::{SourceFile, TransformRequest};

// =========================================================================
// Rules and configs
// =========================================================================

/// Enabled `image/png` rule on `libvips` with no conditions.
pub fn png_rule() -> Rule {
    Rule::enabled("image/png", "libvips")
}

/// Stock config whose rule table is exactly `rule`.
pub fn single_rule_config(rule: Rule) -> Config {
    Config {
        rules: vec![rule],
        ..Config::default()
    }
}

// =========================================================================
// Sources and requests
// =========================================================================

/// A 100x50 single-page PNG at `/src/in.png`.
pub fn sample_source() -> SourceFile {
    SourceFile {
        path: "/src/in.png".into(),
        mime_type: "image/png".into(),
        width: 100,
        height: 50,
        multipage: false,
        rotation: 0,
    }
}

/// Full-size PNG thumbnail of [`sample_source`] written to `/thumb/out.png`.
pub fn sample_request() -> TransformRequest {
    TransformRequest {
        source: sample_source(),
        dest_mime_type: "image/png".into(),
        physical: Dimensions::new(100, 50),
        client: Dimensions::new(100, 50),
        dest_path: "/thumb/out.png".into(),
        dest_url: "/thumb/out.png".into(),
        comment: None,
    }
}
