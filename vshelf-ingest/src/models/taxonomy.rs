//! Three-level topic label

use serde::{Deserialize, Serialize};

/// Taxonomy label of increasing specificity: root → branch → leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(alias = "rootTopic", alias = "root_topic")]
    pub root: String,
    #[serde(alias = "branchTopic", alias = "branch_topic")]
    pub branch: String,
    #[serde(alias = "leafTopic", alias = "leaf_topic")]
    pub leaf: String,
}

impl Taxonomy {
    pub fn new(root: impl Into<String>, branch: impl Into<String>, leaf: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            branch: branch.into(),
            leaf: leaf.into(),
        }
    }

    /// Trim every label; `None` when any label ends up empty
    pub fn normalized(&self) -> Option<Self> {
        let root = self.root.trim();
        let branch = self.branch.trim();
        let leaf = self.leaf.trim();

        if root.is_empty() || branch.is_empty() || leaf.is_empty() {
            return None;
        }

        Some(Self::new(root, branch, leaf))
    }
}
