//! Request and result types shared by the matcher, builder, runner and the
//! host adapter.
//!
//! A [`TransformRequest`] is built fresh for every thumbnail and dropped once
//! the [`TransformOutcome`] has been handed back to the host.

use crate::scaling::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What the host knows about the source file before scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Multi-page containers (multi-page TIFF, PDF, ...) are never handled.
    #[serde(default)]
    pub multipage: bool,
    /// Clockwise rotation the host applies from EXIF orientation, in degrees.
    #[serde(default)]
    pub rotation: u32,
}

impl SourceFile {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// True when the host swaps the axes of the rendered thumbnail.
    pub fn is_rotated_quarter(&self) -> bool {
        self.rotation % 180 == 90
    }
}

/// One thumbnailing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub source: SourceFile,
    /// MIME type of the thumbnail to produce (may differ from the source).
    pub dest_mime_type: String,
    /// Raster size actually encoded into the file.
    pub physical: Dimensions,
    /// Size the thumbnail is displayed at.
    pub client: Dimensions,
    pub dest_path: PathBuf,
    pub dest_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A thumbnail that was written to `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailOutput {
    pub path: PathBuf,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// A failed external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformError {
    /// Combined stdout and stderr of the failing process.
    pub text: String,
    pub exit_code: i32,
    /// Position of the failing command within its chain.
    pub command_index: usize,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\nError code: {}", self.text, self.exit_code)
    }
}

impl std::error::Error for TransformError {}

/// Result of offering a request to the external scaler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransformOutcome {
    /// The host should fall back to its own scaler.
    NotHandled,
    Thumbnail(ThumbnailOutput),
    Failed(TransformError),
}

impl TransformOutcome {
    pub fn is_handled(&self) -> bool {
        !matches!(self, TransformOutcome::NotHandled)
    }
}
