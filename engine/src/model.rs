//! Core data model for media offload runs.
//!
//! This module defines the main data structures:
//! - MediaFile: an immutable snapshot of one scanned file
//! - MediaCategory, EnabledCategories: what kind of media a file is and which kinds are wanted
//! - IdentityKey: the (name, length) fingerprint used for deduplication
//! - SelectionResult, TransferPlan: intermediate results of a run
//! - TransferJob, RunState: the run itself and its lifecycle
//! - Volume, VolumePair: the storage volumes handed in by discovery
//! - TransferOutcome, TransferSummary: how a run ended

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::classify::MediaClassifier;
use crate::progress::{format_bytes, format_duration, TransferProgress};
use crate::selection::SelectionPolicy;

/// Folder under the destination root that holds every prior transfer.
pub const ARCHIVE_FOLDER: &str = "TransferredMedia";

/// Format of the per-session folder name.
pub const SESSION_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// A file found on a volume. Captured once at scan time and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Full path on the scanned volume
    pub path: PathBuf,
    /// File name including extension
    pub name: String,
    /// Extension without the leading dot, as found on disk
    pub extension: String,
    /// Length in bytes
    pub len: u64,
    /// Last modification time
    pub modified: DateTime<Local>,
}

impl MediaFile {
    /// Build a snapshot from a path and the metadata read for it.
    pub fn new(path: PathBuf, len: u64, modified: DateTime<Local>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        MediaFile {
            path,
            name,
            extension,
            len,
            modified,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.name, self.len)
    }
}

/// The kind of media a file holds, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Video,
    Photo,
    /// Not media, or media of a category that is switched off
    None,
}

impl MediaCategory {
    /// Name of the per-category folder inside a session folder.
    pub fn folder_name(&self) -> Option<&'static str> {
        match self {
            MediaCategory::Video => Some("Videos"),
            MediaCategory::Photo => Some("Photos"),
            MediaCategory::None => None,
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaCategory::Video => write!(f, "video"),
            MediaCategory::Photo => write!(f, "photo"),
            MediaCategory::None => write!(f, "other"),
        }
    }
}

/// Which media categories the user wants transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledCategories {
    pub videos: bool,
    pub photos: bool,
}

impl EnabledCategories {
    pub fn all() -> Self {
        EnabledCategories {
            videos: true,
            photos: true,
        }
    }

    pub fn contains(&self, category: MediaCategory) -> bool {
        match category {
            MediaCategory::Video => self.videos,
            MediaCategory::Photo => self.photos,
            MediaCategory::None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.videos && !self.photos
    }
}

impl Default for EnabledCategories {
    fn default() -> Self {
        Self::all()
    }
}

/// Deduplication fingerprint: a file with the same name and length is taken
/// to be the same file, wherever it lives and whatever its timestamp.
///
/// Names compare case-insensitively since removable media is usually FAT or exFAT.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    name: String,
    len: u64,
}

impl IdentityKey {
    pub fn new(name: &str, len: u64) -> Self {
        IdentityKey {
            name: name.to_lowercase(),
            len,
        }
    }
}

/// Per-category file counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub videos: usize,
    pub photos: usize,
}

impl CategoryCounts {
    pub fn record(&mut self, category: MediaCategory) {
        match category {
            MediaCategory::Video => self.videos += 1,
            MediaCategory::Photo => self.photos += 1,
            MediaCategory::None => {}
        }
    }

    pub fn total(&self) -> usize {
        self.videos + self.photos
    }
}

/// The files a selection policy picked for the current session.
#[derive(Debug, Clone, Default)]
pub struct SelectionResult {
    /// Selected files, newest first
    pub files: Vec<MediaFile>,
    pub counts: CategoryCounts,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A file scheduled for copying, with its category resolved.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub file: MediaFile,
    pub category: MediaCategory,
    /// Path relative to the category folder. Always ends in the source file
    /// name; a colliding file is placed in a subfolder named after its source
    /// folder so later runs still recognise it by name.
    pub target: PathBuf,
}

/// Final work list for a run.
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    /// Files to copy, oldest first
    pub to_copy: Vec<PlannedFile>,
    /// Names of selected files that were already transferred
    pub skipped: Vec<String>,
    pub copy_counts: CategoryCounts,
    pub skip_counts: CategoryCounts,
    /// Sum of the lengths of `to_copy`
    pub total_bytes: u64,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.to_copy.is_empty()
    }
}

/// Lifecycle of a transfer job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Selecting,
    Indexing,
    Planning,
    /// Terminal: nothing to transfer
    NoWork,
    Copying,
    Summarizing,
    /// Terminal: a copy fault ended the run
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Scanning => "scanning",
            RunState::Selecting => "selecting",
            RunState::Indexing => "indexing",
            RunState::Planning => "planning",
            RunState::NoWork => "nothing to do",
            RunState::Copying => "copying",
            RunState::Summarizing => "summarizing",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A storage volume offered by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub root: PathBuf,
    pub label: String,
}

impl Volume {
    pub fn new(root: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Volume {
            root: root.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.root.display())
    }
}

/// Source and destination for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePair {
    pub source: Volume,
    pub destination: Volume,
}

impl VolumePair {
    /// Pick the source and destination from the discovered volumes.
    ///
    /// The first candidate is the source, the second the destination.
    pub fn from_candidates(candidates: &[Volume]) -> Result<Self, NoWorkReason> {
        match candidates {
            [] => Err(NoWorkReason::NoVolumes),
            [_] => Err(NoWorkReason::SingleVolume),
            [source, destination, ..] => Ok(VolumePair {
                source: source.clone(),
                destination: destination.clone(),
            }),
        }
    }
}

/// Why a run ended without copying anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoWorkReason {
    NoVolumes,
    SingleVolume,
    /// Every category is switched off
    NothingEnabled,
    NoMediaFound,
    AllAlreadyTransferred,
}

impl fmt::Display for NoWorkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NoWorkReason::NoVolumes => "No removable volumes found",
            NoWorkReason::SingleVolume => "Only one volume found; a source and a destination are needed",
            NoWorkReason::NothingEnabled => "Both videos and photos are disabled",
            NoWorkReason::NoMediaFound => "No new media found on the source",
            NoWorkReason::AllAlreadyTransferred => "All selected media is already on the destination",
        };
        f.write_str(msg)
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    NoWork(NoWorkReason),
    Completed(TransferSummary),
    Failed(String),
}

impl TransferOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TransferOutcome::Failed(_))
    }
}

/// Final report of a completed run.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub copied: CategoryCounts,
    pub skipped: CategoryCounts,
    /// Oldest modification time among copied files
    pub oldest: Option<DateTime<Local>>,
    /// Newest modification time among copied files
    pub newest: Option<DateTime<Local>>,
    pub total_bytes: u64,
    pub elapsed: Duration,
    /// Session folder the files were written to
    pub destination_folder: PathBuf,
}

impl TransferSummary {
    /// Average throughput in bytes per second over the whole run.
    pub fn average_throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Copied {} files ({} videos, {} photos)",
            self.copied.total(),
            self.copied.videos,
            self.copied.photos
        )?;
        writeln!(
            f,
            "Skipped {} already transferred ({} videos, {} photos)",
            self.skipped.total(),
            self.skipped.videos,
            self.skipped.photos
        )?;
        if let (Some(oldest), Some(newest)) = (self.oldest, self.newest) {
            writeln!(
                f,
                "Time range: {} -> {}",
                oldest.format("%Y-%m-%d %H:%M:%S"),
                newest.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        writeln!(f, "Total size: {}", format_bytes(self.total_bytes))?;
        writeln!(f, "Elapsed: {}", format_duration(self.elapsed))?;
        writeln!(
            f,
            "Average speed: {}/s",
            format_bytes(self.average_throughput() as u64)
        )?;
        write!(f, "Destination: {}", self.destination_folder.display())
    }
}

/// One offload run from a source volume to a destination volume.
#[derive(Debug)]
pub struct TransferJob {
    /// Unique identifier for this run
    pub id: Uuid,

    pub source: Volume,
    pub destination: Volume,

    /// Rule deciding which scanned files belong to this session
    pub policy: SelectionPolicy,

    /// Extension sets and enabled categories
    pub classifier: MediaClassifier,

    pub state: RunState,

    /// Work list, available once planning succeeded
    pub plan: Option<TransferPlan>,

    /// Counters shared with the progress reporter
    pub progress: Arc<TransferProgress>,

    /// Session folder, set when copying begins
    pub session_folder: Option<PathBuf>,

    /// Set when the run completed
    pub summary: Option<TransferSummary>,

    pub created_at: DateTime<Local>,
}

impl TransferJob {
    /// Root of the archive on the destination volume.
    pub fn archive_root(&self) -> PathBuf {
        archive_root(&self.destination.root)
    }
}

/// `<destination>/TransferredMedia`
pub fn archive_root(destination_root: &Path) -> PathBuf {
    destination_root.join(ARCHIVE_FOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_media_file_splits_name_and_extension() {
        let modified = Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let file = MediaFile::new(PathBuf::from("/card/DCIM/100/CLIP0001.MP4"), 42, modified);
        assert_eq!(file.name, "CLIP0001.MP4");
        assert_eq!(file.extension, "MP4");
        assert_eq!(file.len, 42);
    }

    #[test]
    fn test_identity_key_ignores_name_case_but_not_length() {
        assert_eq!(IdentityKey::new("VID1.mp4", 10), IdentityKey::new("vid1.MP4", 10));
        assert_ne!(IdentityKey::new("vid1.mp4", 10), IdentityKey::new("vid1.mp4", 11));
    }

    #[test]
    fn test_volume_pair_needs_two_volumes() {
        assert_eq!(VolumePair::from_candidates(&[]), Err(NoWorkReason::NoVolumes));

        let card = Volume::new("/media/card", "CARD");
        assert_eq!(
            VolumePair::from_candidates(&[card.clone()]),
            Err(NoWorkReason::SingleVolume)
        );

        let stick = Volume::new("/media/stick", "STICK");
        let extra = Volume::new("/media/other", "OTHER");
        let pair = VolumePair::from_candidates(&[card.clone(), stick.clone(), extra])
            .expect("two volumes should pair");
        assert_eq!(pair.source, card);
        assert_eq!(pair.destination, stick);
    }

    #[test]
    fn test_category_counts() {
        let mut counts = CategoryCounts::default();
        counts.record(MediaCategory::Video);
        counts.record(MediaCategory::Video);
        counts.record(MediaCategory::Photo);
        counts.record(MediaCategory::None);
        assert_eq!(counts, CategoryCounts { videos: 2, photos: 1 });
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_summary_display() {
        let summary = TransferSummary {
            copied: CategoryCounts { videos: 2, photos: 0 },
            skipped: CategoryCounts::default(),
            oldest: Some(Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            newest: Some(Local.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap()),
            total_bytes: 110 * 1024 * 1024,
            elapsed: Duration::from_secs(11),
            destination_folder: PathBuf::from("/stick/TransferredMedia/2024-01-01_11-00-00"),
        };
        let text = summary.to_string();
        assert!(text.contains("Copied 2 files (2 videos, 0 photos)"));
        assert!(text.contains("Skipped 0"));
        assert!(text.contains("2024-01-01 10:00:00 -> 2024-01-01 10:30:00"));
        assert!(text.contains("Total size: 110.00 MB"));
        assert!(text.contains("Elapsed: 11s"));
        assert!(text.contains("Average speed: 10.00 MB/s"));
    }
}
