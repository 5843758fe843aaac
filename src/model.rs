use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

pub const SCHEMA_VERSION: u32 = 1;

/// A single commit in a project's history.
///
/// `ordinal` is the commit's position in the project-wide chronological
/// commit-log order; it is assigned when the log is collected and is not
/// meaningful on commits fetched ad hoc from the repository. `branch` and
/// `branch_ordinal` are filled in during branch reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub ordinal: i64,
    pub branch: Option<i64>,
    pub branch_ordinal: Option<i64>,
    /// Parent shas, first parent is the mainline.
    pub parents: Vec<String>,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }
}

/// A maximal linear run of commits between a fork point and either HEAD or
/// a merge back into the mother branch.
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    /// Unique per project, in discovery order; 0 is the branch holding HEAD.
    pub ordinal: i64,
    /// Commit in the mother branch this branch forked from; None for a
    /// branch whose history reaches the project root.
    pub parent_commit: Option<String>,
    /// Merge commit in the mother branch where this branch rejoins.
    pub merged_into: Option<String>,
    /// Chronologically ascending; each commit carries its intra-branch ordinal.
    pub commits: Vec<Commit>,
    /// Shas of the merge commits encountered while walking this branch.
    pub merges: Vec<String>,
}

/// One occurrence of a detected code smell.
///
/// `instance` is an opaque identifier of the shape
/// `[method#]qualified.Name[$Inner$Inner2]`. `parent` points at the persisted
/// smell row this instance evolved from and is part of the smell's identity:
/// two smells that agree on type/instance/file but differ in `parent` are
/// distinct instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Smell {
    pub smell_type: String,
    pub instance: String,
    pub file: String,
    pub parent: Option<i64>,
}

impl Smell {
    pub fn new(
        smell_type: impl Into<String>,
        instance: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            smell_type: smell_type.into(),
            instance: instance.into(),
            file: file.into(),
            parent: None,
        }
    }
}

/// A recorded file rename. Identity is `(sha, new_file)`; `old_file` is
/// payload, so two entries with the same key describe the same rename event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRenameEntry {
    pub sha: String,
    pub old_file: String,
    pub new_file: String,
}

impl PartialEq for FileRenameEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha && self.new_file == other.new_file
    }
}

impl Eq for FileRenameEntry {}

impl Hash for FileRenameEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sha.hash(state);
        self.new_file.hash(state);
    }
}

/// One line of detector output: a smell snapshot observed at a commit.
#[derive(Debug, Clone, Deserialize)]
pub struct SmellRecord {
    pub sha: String,
    pub smell_type: String,
    pub instance: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchesOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository_path: String,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenamesOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository_path: String,
    pub renames: Vec<FileRenameEntry>,
}
