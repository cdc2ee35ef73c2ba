//! Extension-based media classification.

use std::collections::HashSet;

use crate::model::{EnabledCategories, MediaCategory, MediaFile};

/// A case-insensitive set of file extensions, stored without leading dots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: HashSet<String>,
}

impl ExtensionSet {
    /// Parse a comma-separated list such as `"mp4, .MOV,avi"`.
    ///
    /// Entries are trimmed, lowercased and stripped of a leading dot; empty
    /// entries are dropped.
    pub fn parse(list: &str) -> Self {
        let extensions = list
            .split(',')
            .map(normalize)
            .filter(|ext| !ext.is_empty())
            .collect();
        ExtensionSet { extensions }
    }

    pub fn contains(&self, extension: &str) -> bool {
        let ext = normalize(extension);
        !ext.is_empty() && self.extensions.contains(&ext)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

fn normalize(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Map an extension to its media category. Video wins if both sets list it.
pub fn classify(extension: &str, videos: &ExtensionSet, photos: &ExtensionSet) -> MediaCategory {
    if videos.contains(extension) {
        MediaCategory::Video
    } else if photos.contains(extension) {
        MediaCategory::Photo
    } else {
        MediaCategory::None
    }
}

/// Extension sets plus the categories switched on for this run.
#[derive(Debug, Clone)]
pub struct MediaClassifier {
    pub videos: ExtensionSet,
    pub photos: ExtensionSet,
    pub enabled: EnabledCategories,
}

impl MediaClassifier {
    pub fn new(videos: ExtensionSet, photos: ExtensionSet, enabled: EnabledCategories) -> Self {
        MediaClassifier {
            videos,
            photos,
            enabled,
        }
    }

    /// Category of an extension, or `None` when that category is disabled.
    pub fn category_of_extension(&self, extension: &str) -> MediaCategory {
        let category = classify(extension, &self.videos, &self.photos);
        if self.enabled.contains(category) {
            category
        } else {
            MediaCategory::None
        }
    }

    pub fn category_of(&self, file: &MediaFile) -> MediaCategory {
        self.category_of_extension(&file.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> (ExtensionSet, ExtensionSet) {
        (
            ExtensionSet::parse("mp4, .MOV ,avi"),
            ExtensionSet::parse("jpg,JPEG, .heic,,"),
        )
    }

    #[test]
    fn test_parse_normalizes_entries() {
        let (videos, photos) = sets();
        assert_eq!(videos.len(), 3);
        assert_eq!(photos.len(), 3);
        assert!(videos.contains("mov"));
        assert!(photos.contains(".HEIC"));
        assert!(ExtensionSet::parse(" , ,").is_empty());
    }

    #[test]
    fn test_classify_is_case_and_dot_insensitive() {
        let (videos, photos) = sets();
        for ext in ["mp4", "MP4", ".mp4", " .Mp4 "] {
            assert_eq!(classify(ext, &videos, &photos), MediaCategory::Video, "{ext}");
        }
        for ext in ["jpg", "JPG", ".jpeg", "heic "] {
            assert_eq!(classify(ext, &videos, &photos), MediaCategory::Photo, "{ext}");
        }
    }

    #[test]
    fn test_classify_unknown_is_none() {
        let (videos, photos) = sets();
        assert_eq!(classify("txt", &videos, &photos), MediaCategory::None);
        assert_eq!(classify("", &videos, &photos), MediaCategory::None);
        assert_eq!(classify(".", &videos, &photos), MediaCategory::None);
    }

    #[test]
    fn test_classify_does_not_depend_on_list_order() {
        let a = ExtensionSet::parse("mp4,mov,avi");
        let b = ExtensionSet::parse(" avi , MOV,.mp4");
        assert_eq!(a, b);
        let photos = ExtensionSet::default();
        for ext in ["mp4", "mov", "avi", "mkv"] {
            assert_eq!(classify(ext, &a, &photos), classify(ext, &b, &photos));
        }
    }

    #[test]
    fn test_classifier_respects_enabled_categories() {
        let (videos, photos) = sets();
        let classifier = MediaClassifier::new(
            videos,
            photos,
            EnabledCategories {
                videos: false,
                photos: true,
            },
        );
        assert_eq!(classifier.category_of_extension("mp4"), MediaCategory::None);
        assert_eq!(classifier.category_of_extension("jpg"), MediaCategory::Photo);
    }
}
