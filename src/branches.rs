use crate::cli::CommonArgs;
use crate::error::Result;
use crate::git::GitRepo;
use crate::model::{Branch, BranchesOutput, Commit};
use crate::store::Store;
use anyhow::Context;
use chrono::Utc;
use console::style;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Decomposes the commit DAG into an ordered forest of linear branches.
///
/// The traversal starts at HEAD and walks backward along first parents.
/// Every merge commit met on the way spawns one tributary walk per non-first
/// parent, with the merge recorded as the tributary's rejoining point. A
/// commit belongs to exactly one branch: a tributary whose start was already
/// claimed by an earlier walk is skipped entirely, which is what keeps
/// diamonds and repeated merges from duplicating history or looping.
pub struct BranchReconstructor<'a> {
    repo: &'a GitRepo,
    visited: HashSet<String>,
    branches: Vec<Branch>,
}

struct WorkItem {
    start_sha: String,
    merged_into: Option<String>,
}

impl<'a> BranchReconstructor<'a> {
    pub fn new(repo: &'a GitRepo) -> Self {
        Self {
            repo,
            visited: HashSet::new(),
            branches: Vec::new(),
        }
    }

    /// Build the branch forest from HEAD. An unresolvable HEAD is fatal;
    /// any other unresolvable commit only truncates the branch it ends.
    pub fn build_branches(mut self) -> Result<Vec<Branch>> {
        let head = self.repo.head_commit()?;

        // Explicit LIFO work stack instead of call-stack recursion: pop order
        // is depth-first, so a tributary is fully explored (its own
        // tributaries included) before an older merge of the same walk.
        let mut work = vec![WorkItem {
            start_sha: head.sha,
            merged_into: None,
        }];

        while let Some(item) = work.pop() {
            if self.visited.contains(&item.start_sha) {
                debug!(sha = %item.start_sha, "tributary already claimed, skipping");
                continue;
            }
            let start = match self.repo.commit_with_parents(&item.start_sha) {
                Ok(commit) => commit,
                Err(e) => {
                    warn!(sha = %item.start_sha, error = %e, "cannot resolve branch start, skipping");
                    continue;
                }
            };
            self.walk_branch(start, item.merged_into, &mut work);
        }

        Ok(self.branches)
    }

    fn walk_branch(&mut self, start: Commit, merged_into: Option<String>, work: &mut Vec<WorkItem>) {
        let branch_ordinal = self.branches.len() as i64;
        let mut commits: Vec<Commit> = Vec::new();
        let mut merges: Vec<Commit> = Vec::new();
        let mut intra: i64 = 0;
        let mut current = start;

        loop {
            self.visited.insert(current.sha.clone());
            if current.is_merge() {
                merges.push(current.clone());
            }
            let next_sha = match current.first_parent() {
                None => None,
                Some(parent) if self.visited.contains(parent) => None,
                Some(parent) => Some(parent.to_string()),
            };

            current.branch = Some(branch_ordinal);
            current.branch_ordinal = Some(intra);
            intra += 1;
            commits.push(current);

            let Some(next_sha) = next_sha else { break };
            current = match self.repo.commit_with_parents(&next_sha) {
                Ok(commit) => commit,
                Err(e) => {
                    warn!(sha = %next_sha, error = %e, "parent unresolvable, branch truncated");
                    break;
                }
            };
        }

        // Ordinals were assigned newest-to-oldest; reflect them against the
        // highest observed value so the oldest commit carries 0, and keep any
        // holes exactly where they were observed.
        let max = commits
            .last()
            .and_then(|c| c.branch_ordinal)
            .unwrap_or_default();
        for commit in &mut commits {
            if let Some(ordinal) = commit.branch_ordinal {
                commit.branch_ordinal = Some(max - ordinal);
            }
        }
        commits.reverse();

        // The oldest commit's first parent is the fork point in the mother
        // branch; recorded even when the parent itself could not be read.
        let parent_commit = commits
            .first()
            .and_then(|c| c.first_parent().map(str::to_string));

        // Newest merge first, matching discovery order; within an octopus
        // merge, tributaries go in parent order.
        for merge in merges.iter().rev() {
            for parent in merge.parents.iter().skip(1).rev() {
                work.push(WorkItem {
                    start_sha: parent.clone(),
                    merged_into: Some(merge.sha.clone()),
                });
            }
        }

        self.branches.push(Branch {
            ordinal: branch_ordinal,
            parent_commit,
            merged_into,
            merges: merges.iter().map(|m| m.sha.clone()).collect(),
            commits,
        });
    }
}

pub fn exec(common: CommonArgs, json: bool, ndjson: bool) -> anyhow::Result<()> {
    let repo = GitRepo::open(common.repo.as_ref()).context("Failed to open git repository")?;
    let mut store = Store::open(common.db.as_deref(), repo.path()).context("Failed to open store")?;

    let project = store
        .ensure_project(&repo.path().to_string_lossy())
        .context("Failed to register project")?;

    let commits = repo
        .collect_commits()
        .context("Failed to collect commits from repository")?;
    store
        .store_commits(project, &commits)
        .context("Failed to store commits")?;

    let branches = BranchReconstructor::new(&repo)
        .build_branches()
        .context("Failed to reconstruct branches")?;
    store
        .store_branches(project, &branches)
        .context("Failed to store branches")?;

    if json {
        output_json(&branches, &repo)?;
    } else if ndjson {
        output_ndjson(&branches)?;
    } else {
        output_table(&branches)?;
    }

    Ok(())
}

fn output_json(branches: &[Branch], repo: &GitRepo) -> anyhow::Result<()> {
    let output = BranchesOutput {
        version: crate::model::SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository_path: repo.path().to_string_lossy().to_string(),
        branches: branches.to_vec(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_ndjson(branches: &[Branch]) -> anyhow::Result<()> {
    for branch in branches {
        println!("{}", serde_json::to_string(branch)?);
    }
    Ok(())
}

fn output_table(branches: &[Branch]) -> Result<()> {
    println!(
        "{:<8} {:>8} {:>8} {:<12} {:<12}",
        style("Branch").bold(),
        style("Commits").bold(),
        style("Merges").bold(),
        style("Forked at").bold(),
        style("Merged into").bold()
    );
    println!("{}", "─".repeat(56));
    for branch in branches {
        println!(
            "{:<8} {:>8} {:>8} {:<12} {:<12}",
            branch.ordinal,
            branch.commits.len(),
            branch.merges.len(),
            branch
                .parent_commit
                .as_deref()
                .map(short_sha)
                .unwrap_or_else(|| "-".to_string()),
            branch
                .merged_into
                .as_deref()
                .map(short_sha)
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(8).collect()
}
