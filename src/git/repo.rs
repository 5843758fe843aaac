use crate::error::{Result, SmeltError};
use crate::model::{Commit, FileRenameEntry};
use chrono::DateTime;
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// The single doorway to the version-control system: commit and parent
/// resolution, the full commit-log walk, and rename harvesting.
pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open a repository at `path`, or current dir if `None`
    pub fn open<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let repo_path = path
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or(std::env::current_dir()?);

        let repo = discover(&repo_path)?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The commit HEAD points at. Failure here is fatal for the caller.
    pub fn head_commit(&self) -> Result<Commit> {
        let mut head = self.repo.head()?;
        let head_commit = head.peel_to_commit_in_place()?;
        self.commit_from_id(head_commit.id)
    }

    /// One commit with its parent shas. Callers treat failure as "history
    /// ends here", not as a fatal condition.
    pub fn commit_with_parents(&self, sha: &str) -> Result<Commit> {
        let oid = ObjectId::from_hex(sha.as_bytes())
            .map_err(|e| SmeltError::Parse(format!("Invalid commit ID: {e}")))?;
        self.commit_from_id(oid)
    }

    fn commit_from_id(&self, commit_id: ObjectId) -> Result<Commit> {
        let commit = self.repo.find_commit(commit_id)?;
        let secs = commit.time()?.seconds;
        let timestamp = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| SmeltError::Parse(format!("Invalid timestamp: {secs}")))?;
        let author = commit.author()?;
        let message = commit.message()?;

        Ok(Commit {
            sha: commit_id.to_string(),
            ordinal: 0,
            branch: None,
            branch_ordinal: None,
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            author_email: author.email.to_string(),
            timestamp,
            message: message.title.to_string(),
        })
    }

    /// Walk every commit reachable from HEAD and assign project-wide
    /// ordinals in chronological commit-log order (oldest first).
    pub fn collect_commits(&self) -> Result<Vec<Commit>> {
        let mut head = self.repo.head()?;
        let head_commit = head.peel_to_commit_in_place()?;

        let mut commits = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Collecting commits...");

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.commit_from_id(commit_id)?;
            for pid in &commit.parents {
                if let Ok(oid) = ObjectId::from_hex(pid.as_bytes()) {
                    stack.push_back(oid);
                }
            }
            commits.push(commit);
            pb.inc(1);
        }

        pb.finish_with_message("Commits collected");

        commits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.sha.cmp(&b.sha)));
        for (ordinal, commit) in commits.iter_mut().enumerate() {
            commit.ordinal = ordinal as i64;
        }

        Ok(commits)
    }

    /// Harvest the rename index: for every commit, diff against its first
    /// parent and keep the rewrites that are true renames, not copies.
    pub fn collect_renames(&self, commits: &[Commit]) -> Result<Vec<FileRenameEntry>> {
        let pb = ProgressBar::new(commits.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message("Harvesting renames...");

        let mut renames = Vec::new();
        for commit in commits {
            pb.inc(1);
            let Some(parent_sha) = commit.first_parent() else {
                continue;
            };
            let commit_id = ObjectId::from_hex(commit.sha.as_bytes())
                .map_err(|e| SmeltError::Parse(format!("Invalid commit ID: {e}")))?;
            let parent_id = ObjectId::from_hex(parent_sha.as_bytes())
                .map_err(|e| SmeltError::Parse(format!("Invalid commit ID: {e}")))?;

            let commit_tree = self.repo.find_commit(commit_id)?.tree()?;
            let parent_tree = self.repo.find_commit(parent_id)?.tree()?;

            let changes: Vec<ChangeDetached> =
                self.repo.diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), None)?;

            for change in changes {
                if let ChangeDetached::Rewrite {
                    source_location,
                    location,
                    copy,
                    ..
                } = change
                {
                    if !copy {
                        renames.push(FileRenameEntry {
                            sha: commit.sha.clone(),
                            old_file: source_location.to_string(),
                            new_file: location.to_string(),
                        });
                    }
                }
            }
        }

        pb.finish_with_message("Renames harvested");
        Ok(renames)
    }

    /// Raw blob content of `path` as it existed at `sha`, if readable.
    pub fn blob_at(&self, sha: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let oid = ObjectId::from_hex(sha.as_bytes())
            .map_err(|e| SmeltError::Parse(format!("Invalid commit ID: {e}")))?;
        let tree = self.repo.find_commit(oid)?.tree()?;
        let entry = tree
            .lookup_entry_by_path(path)
            .map_err(|e| SmeltError::GitRepo(format!("Tree lookup failed for {path}: {e}")))?;
        let Some(entry) = entry else {
            return Ok(None);
        };
        let object = self.repo.find_object(entry.id().detach())?;
        Ok(Some(object.data.clone()))
    }
}
