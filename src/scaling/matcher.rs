//! Eligibility matching: which rule, if any, handles a thumbnail.
//!
//! Rules are evaluated in table order and the first one whose predicates all
//! hold wins. Predicates short-circuit in this order:
//!
//! 1. rule `mime_type` equals the thumbnail's MIME type
//! 2. rule is `enabled`
//! 3. `library` resolves to a configured tool with a non-empty command
//! 4. the source is not multi-page
//! 5. `min_area <= source area < max_area`
//! 6. `min_shrink_factor <= shrink factor < max_shrink_factor`, only when the
//!    physical thumbnail size is known
//!
//! Area is always the **source** pixel area (width × height of the original
//! file), which is what the host's own image-area limit measures.
//!
//! Decoder options belong to the source format, not the output format: they
//! come from the first enabled rule whose `mime_type` is the source's own
//! type (see [`input_options_for`]). A JPEG and a PNG source that both become
//! AVIF share the AVIF rule but not its loader options.
//!
//! Everything here is pure: callers supply dimensions, nothing touches disk.

use super::calculations::shrink_factor;
use super::options::{Dimensions, OptionMap};
use crate::config::{Config, Rule};
use crate::types::SourceFile;

/// A rule that passed every predicate, with its library resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRule<'a> {
    pub index: usize,
    pub rule: &'a Rule,
    /// Resolved thumbnailing binary.
    pub command: &'a str,
    /// Decoder options for the source type, if any rule declares them.
    pub input_options: Option<&'a OptionMap>,
}

/// Why a particular rule was passed over. Used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MimeType,
    Disabled,
    LibraryMissing,
    Multipage,
    BelowMinArea,
    AtOrAboveMaxArea,
    BelowMinShrinkFactor,
    AtOrAboveMaxShrinkFactor,
}

/// Find the first rule that handles `source` rendered as `dest_mime`.
///
/// `physical` is the target raster size; pass `None` when it is not known
/// yet, which leaves the shrink-factor bounds unchecked.
pub fn find_rule<'a>(
    config: &'a Config,
    source: &SourceFile,
    dest_mime: &str,
    physical: Option<Dimensions>,
) -> Option<MatchedRule<'a>> {
    config.rules.iter().enumerate().find_map(|(index, rule)| {
        match evaluate_rule(config, rule, source, dest_mime, physical) {
            Ok(command) => Some(MatchedRule {
                index,
                rule,
                command,
                input_options: input_options_for(config, &source.mime_type),
            }),
            Err(reason) => {
                tracing::trace!(index, ?reason, mime = %rule.mime_type, "rule skipped");
                None
            }
        }
    })
}

/// Loader options for `source_mime`, taken from the first enabled rule that
/// targets that type. Empty option maps count as absent.
pub fn input_options_for<'a>(config: &'a Config, source_mime: &str) -> Option<&'a OptionMap> {
    config
        .rules
        .iter()
        .find(|rule| rule.enabled && rule.mime_type == source_mime)
        .map(|rule| &rule.input_options)
        .filter(|options| !options.is_empty())
}

/// Evaluate one rule, returning the resolved command or the first failing
/// predicate.
pub fn evaluate_rule<'a>(
    config: &'a Config,
    rule: &Rule,
    source: &SourceFile,
    dest_mime: &str,
    physical: Option<Dimensions>,
) -> Result<&'a str, SkipReason> {
    if rule.mime_type != dest_mime {
        return Err(SkipReason::MimeType);
    }
    if !rule.enabled {
        return Err(SkipReason::Disabled);
    }
    let command = config
        .library(&rule.library)
        .map(|lib| lib.command.as_str())
        .filter(|cmd| !cmd.trim().is_empty())
        .ok_or(SkipReason::LibraryMissing)?;
    if source.multipage {
        return Err(SkipReason::Multipage);
    }

    let area = source.dimensions().area();
    if rule.min_area.is_some_and(|min| area < min) {
        return Err(SkipReason::BelowMinArea);
    }
    if rule.max_area.is_some_and(|max| area >= max) {
        return Err(SkipReason::AtOrAboveMaxArea);
    }

    if let Some(physical) = physical {
        if rule.min_shrink_factor.is_some() || rule.max_shrink_factor.is_some() {
            let factor = shrink_factor(source.width, physical, source.is_rotated_quarter());
            if let Some(min) = rule.min_shrink_factor {
                if factor.is_none_or(|f| f < min) {
                    return Err(SkipReason::BelowMinShrinkFactor);
                }
            }
            if let Some(max) = rule.max_shrink_factor {
                if factor.is_none_or(|f| f >= max) {
                    return Err(SkipReason::AtOrAboveMaxShrinkFactor);
                }
            }
        }
    }

    Ok(command)
}
