//! Selection policies: which scanned files make up the current session.
//!
//! Both policies are pure functions of the candidate set and their parameter.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use std::cmp::Reverse;

use crate::classify::MediaClassifier;
use crate::model::{CategoryCounts, MediaCategory, MediaFile, SelectionResult};

/// Time window used when the configured one is missing or invalid.
pub const DEFAULT_WINDOW_MINUTES: i64 = 40;

/// File count used when the configured one is missing or invalid.
pub const DEFAULT_MAX_FILES: usize = 10;

/// Rule deciding which candidates belong to the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Per category, every file modified within `minutes` of that category's
    /// newest file. A category only takes part if its newest file is itself
    /// within `minutes` of the newest file overall.
    ///
    /// That second rule means a category shot only in an earlier session is
    /// dropped as a whole, even though each category is otherwise windowed on
    /// its own. Example: a photo taken an hour before two videos is left out,
    /// but photos interleaved with the videos are kept with their own cutoff.
    TimeWindow { minutes: i64 },
    /// The `max_files` newest files across all enabled categories.
    FixedCount { max_files: usize },
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::TimeWindow {
            minutes: DEFAULT_WINDOW_MINUTES,
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::TimeWindow { minutes } => write!(f, "time window of {} minutes", minutes),
            SelectionPolicy::FixedCount { max_files } => write!(f, "newest {} files", max_files),
        }
    }
}

impl SelectionPolicy {
    /// Pick this session's files from `candidates`.
    ///
    /// Candidates whose category is disabled or unknown are ignored. The result
    /// is ordered newest first.
    pub fn select(&self, candidates: &[MediaFile], classifier: &MediaClassifier) -> SelectionResult {
        let mut files: Vec<(MediaCategory, &MediaFile)> = candidates
            .iter()
            .map(|f| (classifier.category_of(f), f))
            .filter(|(category, _)| *category != MediaCategory::None)
            .collect();

        match *self {
            SelectionPolicy::TimeWindow { minutes } => {
                let window = ChronoDuration::try_minutes(minutes).unwrap_or(ChronoDuration::MAX);
                let newest = |wanted: Option<MediaCategory>| {
                    files
                        .iter()
                        .filter(|(category, _)| wanted.map_or(true, |w| *category == w))
                        .map(|(_, f)| f.modified)
                        .max()
                };
                // A category whose newest file is outside the window of the
                // newest file overall belongs to an earlier session.
                let session_floor = newest(None).and_then(|t| t.checked_sub_signed(window));
                let cutoff = |category: MediaCategory| -> Cutoff {
                    match newest(Some(category)) {
                        None => Cutoff::Excluded,
                        Some(t) if session_floor.map_or(false, |floor| t < floor) => Cutoff::Excluded,
                        Some(t) => match t.checked_sub_signed(window) {
                            Some(at) => Cutoff::From(at),
                            None => Cutoff::Everything,
                        },
                    }
                };
                let video_cutoff = cutoff(MediaCategory::Video);
                let photo_cutoff = cutoff(MediaCategory::Photo);

                files.retain(|(category, f)| {
                    let cutoff = match category {
                        MediaCategory::Video => video_cutoff,
                        MediaCategory::Photo => photo_cutoff,
                        MediaCategory::None => Cutoff::Excluded,
                    };
                    match cutoff {
                        Cutoff::Excluded => false,
                        Cutoff::Everything => true,
                        Cutoff::From(at) => f.modified >= at,
                    }
                });
                sort_newest_first(&mut files);
            }
            SelectionPolicy::FixedCount { max_files } => {
                sort_newest_first(&mut files);
                files.truncate(max_files);
            }
        }

        let mut counts = CategoryCounts::default();
        for (category, _) in &files {
            counts.record(*category);
        }

        SelectionResult {
            files: files.into_iter().map(|(_, f)| f.clone()).collect(),
            counts,
        }
    }
}

#[derive(Clone, Copy)]
enum Cutoff {
    Excluded,
    /// The window reaches past the representable range
    Everything,
    From(DateTime<Local>),
}

// Ties on timestamp fall back to path so the order is deterministic.
fn sort_newest_first(files: &mut [(MediaCategory, &MediaFile)]) {
    files.sort_by_key(|(_, f)| (Reverse(f.modified), f.path.clone()));
}
