//! Dataset categories
//!
//! Every remote key and every local cache path is rooted in exactly one
//! category. The set is closed: adding one is a code change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sync::SyncError;

/// Logical dataset grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Drone imagery
    Drone,
    /// Meteorological grids
    Meteor,
    /// Tree-detection model artifacts
    Model,
    /// Planted parcel boundaries
    Parcel,
    /// Satellite composites
    Planet,
}

impl Category {
    /// All categories, in listing order
    pub const ALL: [Category; 5] = [
        Category::Drone,
        Category::Meteor,
        Category::Model,
        Category::Parcel,
        Category::Planet,
    ];

    /// Directory name and remote key prefix for this category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Drone => "drone",
            Category::Meteor => "meteor",
            Category::Model => "model",
            Category::Parcel => "parcel",
            Category::Planet => "planet",
        }
    }

    /// Remote listing prefix, including the trailing slash
    pub fn prefix(&self) -> String {
        format!("{}/", self.as_str())
    }

    /// File extensions accepted by the upload intake, or `None` for any
    pub fn accepted_extensions(&self) -> Option<&'static [&'static str]> {
        match self {
            Category::Drone => Some(&["png", "jpg", "jpeg"][..]),
            Category::Meteor | Category::Model | Category::Parcel | Category::Planet => None,
        }
    }

    /// Whether the intake accepts a file with this name
    pub fn accepts(&self, file_name: &str) -> bool {
        let Some(accepted) = self.accepted_extensions() else {
            return true;
        };
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => accepted
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SyncError::UnsupportedCategory(s.to_string()))
    }
}
