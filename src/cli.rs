use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smelt")]
#[command(about = "Git history mining tool for branch topology and code-smell lineage")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Path to git repository")]
    pub repo: Option<PathBuf>,

    #[arg(long, help = "Path to the analysis database directory")]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconstruct the branch/merge topology of the commit graph
    Branches {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
    /// Harvest the file rename index
    Renames {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
    /// Run the full smell-lineage analysis over detector snapshots
    Analyze {
        #[arg(long, help = "Detector snapshot file (NDJSON: sha, smell_type, instance, file)")]
        smells: PathBuf,

        #[arg(long, help = "Worker threads for multi-project analysis")]
        jobs: Option<usize>,

        #[arg(long, help = "Disable commit gap filling; a detector skip then fails loudly")]
        no_gap_fill: bool,

        #[arg(help = "Repositories to analyze (defaults to --repo or the current directory)")]
        repos: Vec<PathBuf>,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Branches { json, ndjson } => crate::branches::exec(self.common, json, ndjson),
            Commands::Renames { json, ndjson } => crate::renames::exec(self.common, json, ndjson),
            Commands::Analyze { smells, jobs, no_gap_fill, repos } => {
                crate::analyze::exec(self.common, smells, jobs, no_gap_fill, repos)
            }
        }
    }
}
