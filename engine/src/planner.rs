//! Turns a selection into the final work list.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::classify::MediaClassifier;
use crate::index::DestinationIndex;
use crate::model::{MediaCategory, MediaFile, PlannedFile, SelectionResult, TransferPlan};

/// Split `selection` into files to copy and files already transferred.
///
/// A file is skipped when its identity key is in `index` or when an earlier
/// file of the same selection has the same key. Files to copy are ordered
/// oldest first; that order drives both the copy sequence and naming.
pub fn plan(
    selection: &SelectionResult,
    index: &DestinationIndex,
    classifier: &MediaClassifier,
) -> TransferPlan {
    let mut ordered: Vec<_> = selection.files.iter().collect();
    ordered.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

    let mut plan = TransferPlan::default();
    let mut seen = HashSet::new();
    // Lowercased target paths already used, per category folder.
    let mut taken: HashMap<MediaCategory, HashSet<String>> = HashMap::new();

    for file in ordered {
        let category = classifier.category_of(file);
        if category == MediaCategory::None {
            continue;
        }

        let key = file.identity_key();
        if index.contains(&key) || !seen.insert(key) {
            plan.skipped.push(file.name.clone());
            plan.skip_counts.record(category);
            continue;
        }

        let target = unique_target(file, taken.entry(category).or_default());
        plan.total_bytes += file.len;
        plan.copy_counts.record(category);
        plan.to_copy.push(PlannedFile {
            file: file.clone(),
            category,
            target,
        });
    }

    plan
}

/// `name`, or `<source folder>/name` if `name` is already taken.
///
/// The file name itself is never changed: the destination index matches by
/// name, and a renamed copy would be transferred again on every run.
fn unique_target(file: &MediaFile, taken: &mut HashSet<String>) -> PathBuf {
    let name = PathBuf::from(&file.name);
    if taken.insert(file.name.to_lowercase()) {
        return name;
    }

    let parent = file
        .path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "duplicates".to_string());

    let mut folder = parent.clone();
    let mut n = 1;
    loop {
        let candidate = PathBuf::from(&folder).join(&name);
        if taken.insert(candidate.to_string_lossy().to_lowercase()) {
            return candidate;
        }
        folder = format!("{}_{}", parent, n);
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ExtensionSet;
    use crate::model::{CategoryCounts, EnabledCategories, MediaFile};
    use crate::selection::SelectionPolicy;
    use chrono::{DateTime, Local, TimeZone};
    use std::path::PathBuf;

    const MB: u64 = 1024 * 1024;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
    }

    fn media(path: &str, len: u64, modified: DateTime<Local>) -> MediaFile {
        MediaFile::new(PathBuf::from(path), len, modified)
    }

    fn classifier() -> MediaClassifier {
        MediaClassifier::new(
            ExtensionSet::parse("mp4"),
            ExtensionSet::parse("jpg"),
            EnabledCategories::all(),
        )
    }

    fn selection(files: Vec<MediaFile>) -> SelectionResult {
        SelectionPolicy::FixedCount { max_files: 100 }.select(&files, &classifier())
    }

    fn scenario() -> Vec<MediaFile> {
        vec![
            media("/card/vid1.mp4", 50 * MB, at(10, 0)),
            media("/card/vid2.mp4", 60 * MB, at(10, 30)),
            media("/card/img1.jpg", 5 * MB, at(9, 0)),
        ]
    }

    #[test]
    fn test_plan_orders_oldest_first() {
        let plan = plan(&selection(scenario()), &DestinationIndex::default(), &classifier());

        let names: Vec<_> = plan.to_copy.iter().map(|p| p.file.name.as_str()).collect();
        assert_eq!(names, vec!["img1.jpg", "vid1.mp4", "vid2.mp4"]);
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.copy_counts, CategoryCounts { videos: 2, photos: 1 });
        assert_eq!(plan.total_bytes, 115 * MB);
        assert_eq!(plan.to_copy[0].category, MediaCategory::Photo);
    }

    #[test]
    fn test_plan_skips_files_in_index_regardless_of_path_and_time() {
        let archived = media(
            "/stick/TransferredMedia/2023-12-31_08-00-00/Videos/vid1.mp4",
            50 * MB,
            at(23, 59),
        );
        let index = DestinationIndex::from_files(&[archived]);

        let plan = plan(&selection(scenario()), &index, &classifier());

        assert_eq!(plan.skipped, vec!["vid1.mp4".to_string()]);
        assert_eq!(plan.skip_counts, CategoryCounts { videos: 1, photos: 0 });
        assert_eq!(plan.copy_counts, CategoryCounts { videos: 1, photos: 1 });
        assert_eq!(plan.total_bytes, 65 * MB);
    }

    #[test]
    fn test_same_name_different_size_is_not_a_duplicate() {
        let index = DestinationIndex::from_files(&[media("/x/vid1.mp4", 49 * MB, at(1, 0))]);
        let plan = plan(&selection(scenario()), &index, &classifier());
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.to_copy.len(), 3);
    }

    #[test]
    fn test_everything_already_transferred_leaves_empty_plan() {
        let index = DestinationIndex::from_files(&scenario());
        let plan = plan(&selection(scenario()), &index, &classifier());
        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 3);
        assert_eq!(plan.total_bytes, 0);
    }

    #[test]
    fn test_duplicates_within_selection_copied_once() {
        let files = vec![
            media("/card/DCIM/100/clip.mp4", 10, at(10, 0)),
            media("/card/DCIM/101/clip.mp4", 10, at(10, 5)),
        ];
        let plan = plan(&selection(files), &DestinationIndex::default(), &classifier());
        assert_eq!(plan.to_copy.len(), 1);
        assert_eq!(plan.to_copy[0].file.path, PathBuf::from("/card/DCIM/100/clip.mp4"));
        assert_eq!(plan.skipped, vec!["clip.mp4".to_string()]);
    }

    #[test]
    fn test_name_collisions_get_distinct_targets() {
        let files = vec![
            media("/card/DCIM/100/clip.mp4", 10, at(10, 0)),
            media("/card/DCIM/101/clip.mp4", 20, at(10, 5)),
            media("/card/DCIM/102/CLIP.mp4", 30, at(10, 10)),
            media("/card/DCIM/100/clip.jpg", 40, at(10, 15)),
        ];
        let plan = plan(&selection(files), &DestinationIndex::default(), &classifier());
        let targets: Vec<_> = plan.to_copy.iter().map(|p| p.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("clip.mp4"),
                PathBuf::from("101/clip.mp4"),
                PathBuf::from("102/CLIP.mp4"),
                PathBuf::from("clip.jpg"),
            ]
        );
        // Names are kept, so every copy can be matched on a later run.
        assert!(plan
            .to_copy
            .iter()
            .all(|p| p.target.file_name() == p.file.path.file_name()));
    }

    #[test]
    fn test_collision_with_same_source_folder_name_is_numbered() {
        let files = vec![
            media("/card/A/100/clip.mp4", 10, at(10, 0)),
            media("/card/B/100/clip.mp4", 20, at(10, 5)),
            media("/card/C/100/clip.mp4", 30, at(10, 10)),
        ];
        let plan = plan(&selection(files), &DestinationIndex::default(), &classifier());
        let targets: Vec<_> = plan.to_copy.iter().map(|p| p.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("clip.mp4"),
                PathBuf::from("100/clip.mp4"),
                PathBuf::from("100_1/clip.mp4"),
            ]
        );
    }
}
