use crate::branches::BranchReconstructor;
use crate::cli::CommonArgs;
use crate::error::Result;
use crate::gaps::{GapError, GapHandler};
use crate::git::GitRepo;
use crate::lineage::SmellLineageTracker;
use crate::model::{Commit, Smell, SmellRecord};
use crate::store::Store;
use anyhow::Context;
use console::style;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Run the full analysis pipeline: collect commits and renames, reconstruct
/// the branch forest, then walk the detector's smell snapshots in ordinal
/// order, filling detector gaps and linking lineage across renames.
///
/// With several repositories, projects fan out over a bounded worker pool;
/// each project owns its repository handle and store connection, and one
/// failing project never disturbs the others.
pub fn exec(
    common: CommonArgs,
    smells: PathBuf,
    jobs: Option<usize>,
    no_gap_fill: bool,
    repos: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let records = load_smell_records(&smells)?;

    let targets: Vec<Option<PathBuf>> = if repos.is_empty() {
        vec![common.repo.clone()]
    } else {
        repos.into_iter().map(Some).collect()
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()
        .context("Failed to build worker pool")?;

    pool.install(|| {
        targets.par_iter().for_each(|target| {
            if let Err(e) = analyze_project(target.as_deref(), &common, &records, no_gap_fill) {
                error!(error = %e, "project analysis failed");
            }
        });
    });

    Ok(())
}

fn analyze_project(
    path: Option<&Path>,
    common: &CommonArgs,
    records: &[SmellRecord],
    no_gap_fill: bool,
) -> anyhow::Result<()> {
    let repo = GitRepo::open(path).context("Failed to open git repository")?;
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

    let renames = repo
        .collect_renames(&commits)
        .context("Failed to harvest renames")?;
    store
        .store_renames(project, &renames)
        .context("Failed to store renames")?;

    let branches = BranchReconstructor::new(&repo)
        .build_branches()
        .context("Failed to reconstruct branches")?;
    store
        .store_branches(project, &branches)
        .context("Failed to store branches")?;

    let tracker = SmellLineageTracker::new(&store, project, &repo)
        .context("Failed to load rename index")?;

    let mut by_sha: HashMap<&str, Vec<&SmellRecord>> = HashMap::new();
    for record in records {
        by_sha.entry(record.sha.as_str()).or_default().push(record);
    }

    let mut analyzed: Vec<Commit> = Vec::new();
    for &sha in by_sha.keys() {
        match store.commit_by_sha(project, sha)? {
            Some(commit) => analyzed.push(commit),
            None => warn!(sha, "detector snapshot references a commit this project does not have"),
        }
    }

    let mut inserted = 0usize;
    let mut filled = 0usize;
    if store.branch_count(project)? > 1 {
        let mut by_branch: HashMap<i64, Vec<Commit>> = HashMap::new();
        for commit in analyzed {
            match commit.branch {
                Some(branch) => by_branch.entry(branch).or_default().push(commit),
                None => warn!(sha = %commit.sha, "analyzed commit not attributed to any branch"),
            }
        }
        let mut branch_ids: Vec<i64> = by_branch.keys().copied().collect();
        branch_ids.sort_unstable();
        for branch in branch_ids {
            let mut group = by_branch.remove(&branch).unwrap_or_default();
            group.sort_by_key(|c| c.branch_ordinal);
            let handler = if no_gap_fill {
                GapHandler::Dummy
            } else {
                GapHandler::MultiBranch { store: &store, project, branch }
            };
            let (i, f) = walk_snapshots(&store, project, &handler, &tracker, &group, &by_sha)?;
            inserted += i;
            filled += f;
        }
    } else {
        analyzed.sort_by_key(|c| c.ordinal);
        let handler = if no_gap_fill {
            GapHandler::Dummy
        } else {
            GapHandler::SingleBranch { store: &store, project }
        };
        let (i, f) = walk_snapshots(&store, project, &handler, &tracker, &analyzed, &by_sha)?;
        inserted += i;
        filled += f;
    }

    println!(
        "{} {} — {} commits, {} renames, {} branches, {} smells, {} gaps filled",
        style("analyzed").green().bold(),
        repo.path().display(),
        commits.len(),
        renames.len(),
        branches.len(),
        inserted,
        filled,
    );

    Ok(())
}

/// Walk one ordered stream of analyzed commits, filling detector gaps and
/// persisting each snapshot's smells with their lineage links.
fn walk_snapshots(
    store: &Store,
    project: i64,
    handler: &GapHandler<'_>,
    tracker: &SmellLineageTracker<'_>,
    commits: &[Commit],
    by_sha: &HashMap<&str, Vec<&SmellRecord>>,
) -> Result<(usize, usize)> {
    let mut inserted = 0usize;
    let mut filled = 0usize;
    let mut previous: Option<Commit> = None;

    for commit in commits {
        // Fill the hole between the previous analyzed commit and this one;
        // every recovered commit simply carried no detector data.
        if let Some(prev) = previous.take() {
            let mut cursor = prev;
            while handler.has_gap(&cursor, commit) {
                match handler.fetch_no_smell_commit(&cursor) {
                    Ok(recovered) => {
                        debug!(sha = %recovered.sha, "detector skipped commit, recovered from ordinals");
                        filled += 1;
                        cursor = recovered;
                    }
                    Err(GapError::CommitNotFound(ordinal)) => {
                        warn!(
                            ordinal,
                            "persisted history has no commit at the extrapolated ordinal, stopping"
                        );
                        break;
                    }
                    Err(GapError::Store(e)) => return Err(e),
                }
            }
            previous = Some(cursor);
        }

        for record in by_sha.get(commit.sha.as_str()).into_iter().flatten() {
            let mut smell = Smell::new(
                record.smell_type.clone(),
                record.instance.clone(),
                record.file.clone(),
            );
            if let Some(prev) = &previous {
                if let Some(guess) = tracker.original(&smell, commit, prev) {
                    if let Some(parent_id) = store.find_smell(project, &prev.sha, &guess)? {
                        smell.parent = Some(parent_id);
                    }
                }
            }
            store.insert_smell(project, &commit.sha, &smell)?;
            inserted += 1;
        }

        previous = Some(commit.clone());
    }

    Ok((inserted, filled))
}

fn load_smell_records(path: &Path) -> anyhow::Result<Vec<SmellRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open smells file {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: SmellRecord = serde_json::from_str(line)
            .with_context(|| format!("Malformed smell record on line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}
