//! Collection tree nodes
//!
//! SYSTEM collections are built from taxonomy labels (roots have no parent,
//! branches belong to exactly one root). USER collections are curated guides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CollectionOrigin {
    /// Maintained by the taxonomy librarian
    System,
    /// Created by a person
    User,
}

impl CollectionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionOrigin::System => "SYSTEM",
            CollectionOrigin::User => "USER",
        }
    }
}

impl fmt::Display for CollectionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(CollectionOrigin::System),
            "USER" => Ok(CollectionOrigin::User),
            other => Err(format!("unknown collection origin '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub origin: CollectionOrigin,
    pub parent_id: Option<Uuid>,
    /// Mean of member video vectors; absent until a member has one
    #[serde(skip_serializing)]
    pub centroid: Option<Vec<f32>>,
}

/// Best-matching collection for a video
#[derive(Debug, Clone, Serialize)]
pub struct CollectionMatch {
    pub collection: Collection,
    /// 1 − cosine distance
    pub similarity: f32,
}

/// Result of filing one video under a taxonomy label
#[derive(Debug, Clone, Serialize)]
pub struct FilingResult {
    pub root_id: Uuid,
    pub branch_id: Uuid,
    /// False when the video was already a member
    pub newly_linked: bool,
    /// Branch members that contributed to the new centroid
    pub centroid_members: usize,
    /// Earlier branches the video left after a taxonomy change
    pub unlinked_from: Vec<Uuid>,
}
