use crate::cli::CommonArgs;
use crate::error::Result;
use crate::git::GitRepo;
use crate::model::{FileRenameEntry, RenamesOutput};
use crate::store::Store;
use anyhow::Context;
use chrono::Utc;
use console::style;

/// Harvest the rename index for a repository and persist it.
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

    let renames = repo
        .collect_renames(&commits)
        .context("Failed to harvest renames")?;
    store
        .store_renames(project, &renames)
        .context("Failed to store renames")?;

    if json {
        output_json(&renames, &repo)?;
    } else if ndjson {
        output_ndjson(&renames)?;
    } else {
        output_table(&renames)?;
    }

    Ok(())
}

fn output_json(renames: &[FileRenameEntry], repo: &GitRepo) -> anyhow::Result<()> {
    let output = RenamesOutput {
        version: crate::model::SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository_path: repo.path().to_string_lossy().to_string(),
        renames: renames.to_vec(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_ndjson(renames: &[FileRenameEntry]) -> anyhow::Result<()> {
    for rename in renames {
        println!("{}", serde_json::to_string(rename)?);
    }
    Ok(())
}

fn output_table(renames: &[FileRenameEntry]) -> Result<()> {
    println!(
        "{:<10} {:<40} {:<40}",
        style("Commit").bold(),
        style("Old path").bold(),
        style("New path").bold()
    );
    println!("{}", "─".repeat(92));
    for rename in renames.iter().take(50) {
        println!(
            "{:<10} {:<40} {:<40}",
            rename.sha.chars().take(8).collect::<String>(),
            rename.old_file,
            rename.new_file
        );
    }
    if renames.len() > 50 {
        println!("\n... and {} more entries", renames.len() - 50);
    }
    Ok(())
}
