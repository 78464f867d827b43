use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Library section a file is uploaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Videos,
    Images,
    Articles,
    Sounds,
}

impl Category {
    /// All categories accepted by the backend.
    pub const ALL: [Category; 4] = [
        Category::Videos,
        Category::Images,
        Category::Articles,
        Category::Sounds,
    ];

    /// Wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Videos => "videos",
            Category::Images => "images",
            Category::Articles => "articles",
            Category::Sounds => "sounds",
        }
    }

    /// Whether resources in this category record an author.
    pub fn has_author(&self) -> bool {
        matches!(self, Category::Articles)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid category {0:?}, must be one of: videos, images, articles, sounds")]
pub struct InvalidCategory(pub String);

impl FromStr for Category {
    type Err = InvalidCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| InvalidCategory(s.to_string()))
    }
}

/// Transfer strategy chosen by the backend at initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    /// One PUT of the whole file to a single presigned URL.
    Single,
    /// The file is split into parts uploaded independently.
    Multipart,
}
