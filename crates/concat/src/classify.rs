//! Classifier module for categorizing input clips by file name.
//!
//! Classification is a pure function of the file name: a category derived
//! from two case-insensitive marker substrings, and a numeric sequence key
//! taken from an `S.<digits>` group.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Category of a clip derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// File name contains the first marker (e.g. "pic").
    CategoryA,
    /// File name contains the second marker (e.g. "uni").
    CategoryB,
    /// Neither marker present.
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::CategoryA => write!(f, "category_a"),
            Category::CategoryB => write!(f, "category_b"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// The two filename markers that split clips into categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMarkers {
    category_a: String,
    category_b: String,
}

impl CategoryMarkers {
    /// Markers are stored lowercased; matching is case-insensitive.
    pub fn new(category_a: &str, category_b: &str) -> Self {
        Self {
            category_a: category_a.to_lowercase(),
            category_b: category_b.to_lowercase(),
        }
    }
}

impl Default for CategoryMarkers {
    fn default() -> Self {
        Self::new("pic", "uni")
    }
}

/// A discovered source clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputClip {
    /// Absolute path to the clip.
    pub path: PathBuf,
    /// Number from the `S.<digits>` group of the file name, 0 when absent.
    pub sequence_key: u64,
    pub category: Category,
}

impl InputClip {
    pub fn new(path: PathBuf, markers: &CategoryMarkers) -> Self {
        let (category, sequence_key) = classify_clip(&path, markers);
        Self {
            path,
            sequence_key,
            category,
        }
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sequence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"S\.0*(\d+)").expect("sequence pattern is valid"))
}

/// Extracts the sequence key from a file name.
///
/// Matches the first `S.` followed by digits (leading zeros ignored).
/// Names without the group, or with a number that does not fit, key as 0
/// and therefore sort first within their class.
pub fn sequence_key(file_name: &str) -> u64 {
    sequence_pattern()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .unwrap_or(0)
}

/// Categorizes a file name. A name carrying both markers is CategoryA.
pub fn category_of(file_name: &str, markers: &CategoryMarkers) -> Category {
    let lower = file_name.to_lowercase();
    if lower.contains(&markers.category_a) {
        Category::CategoryA
    } else if lower.contains(&markers.category_b) {
        Category::CategoryB
    } else {
        Category::Other
    }
}

/// Classifies a clip path into its category and sequence key.
///
/// Only the file name is inspected, never the directories above it.
pub fn classify_clip(path: &Path, markers: &CategoryMarkers) -> (Category, u64) {
    let name = file_name_of(path);
    (category_of(&name, markers), sequence_key(&name))
}
