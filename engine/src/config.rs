//! Transfer settings: selection mode, its parameters, categories and extensions.
//!
//! Numeric parameters are kept as text, the way a settings form holds them.
//! Invalid values are never an error: [`TransferSettings::resolve_policy`]
//! replaces them with the defaults and writes the replacement back so the
//! effective value is visible.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::classify::{ExtensionSet, MediaClassifier};
use crate::model::EnabledCategories;
use crate::selection::{SelectionPolicy, DEFAULT_MAX_FILES, DEFAULT_WINDOW_MINUTES};

pub const DEFAULT_VIDEO_EXTENSIONS: &str = "mp4,mov,avi,mkv,mts,m2ts,m4v,3gp,wmv";
pub const DEFAULT_PHOTO_EXTENSIONS: &str =
    "jpg,jpeg,png,heic,heif,dng,cr2,cr3,nef,arw,orf,rw2,raf,tif,tiff";

/// Which selection policy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    #[default]
    TimeWindow,
    FixedCount,
}

/// User-facing transfer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSettings {
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default = "default_window_minutes")]
    pub time_window_minutes: String,
    #[serde(default = "default_max_files")]
    pub max_files: String,
    #[serde(default = "default_true")]
    pub copy_videos: bool,
    #[serde(default = "default_true")]
    pub copy_photos: bool,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: String,
    #[serde(default = "default_photo_extensions")]
    pub photo_extensions: String,
}

fn default_window_minutes() -> String {
    DEFAULT_WINDOW_MINUTES.to_string()
}

fn default_max_files() -> String {
    DEFAULT_MAX_FILES.to_string()
}

fn default_true() -> bool {
    true
}

fn default_video_extensions() -> String {
    DEFAULT_VIDEO_EXTENSIONS.to_string()
}

fn default_photo_extensions() -> String {
    DEFAULT_PHOTO_EXTENSIONS.to_string()
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::default(),
            time_window_minutes: default_window_minutes(),
            max_files: default_max_files(),
            copy_videos: true,
            copy_photos: true,
            video_extensions: default_video_extensions(),
            photo_extensions: default_photo_extensions(),
        }
    }
}

/// A policy together with whether any parameter had to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub policy: SelectionPolicy,
    pub coerced: bool,
}

impl TransferSettings {
    /// Load settings from a JSON file. A missing or malformed file gives defaults.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Could not read settings {}: {}", path.display(), e);
                }
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring malformed settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// Build the selection policy, replacing an invalid parameter with its default.
    ///
    /// Only the parameter of the active mode is checked and rewritten.
    pub fn resolve_policy(&mut self) -> ResolvedPolicy {
        match self.selection_mode {
            SelectionMode::TimeWindow => {
                let (minutes, coerced) = match self.time_window_minutes.trim().parse::<i64>() {
                    Ok(m) if m > 0 => (m, false),
                    _ => (DEFAULT_WINDOW_MINUTES, true),
                };
                if coerced {
                    tracing::debug!(
                        "Time window {:?} is invalid; using {}",
                        self.time_window_minutes,
                        minutes
                    );
                    self.time_window_minutes = minutes.to_string();
                }
                ResolvedPolicy {
                    policy: SelectionPolicy::TimeWindow { minutes },
                    coerced,
                }
            }
            SelectionMode::FixedCount => {
                let (max_files, coerced) = match self.max_files.trim().parse::<usize>() {
                    Ok(n) if n > 0 => (n, false),
                    _ => (DEFAULT_MAX_FILES, true),
                };
                if coerced {
                    tracing::debug!("File count {:?} is invalid; using {}", self.max_files, max_files);
                    self.max_files = max_files.to_string();
                }
                ResolvedPolicy {
                    policy: SelectionPolicy::FixedCount { max_files },
                    coerced,
                }
            }
        }
    }

    pub fn enabled_categories(&self) -> EnabledCategories {
        EnabledCategories {
            videos: self.copy_videos,
            photos: self.copy_photos,
        }
    }

    /// Extension sets and enabled categories for one scan pass.
    pub fn classifier(&self) -> MediaClassifier {
        MediaClassifier::new(
            ExtensionSet::parse(&self.video_extensions),
            ExtensionSet::parse(&self.photo_extensions),
            self.enabled_categories(),
        )
    }
}
