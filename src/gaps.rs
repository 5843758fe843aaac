use crate::error::SmeltError;
use crate::model::Commit;
use crate::store::Store;
use thiserror::Error;

/// Failure modes of gap resolution. `CommitNotFound` is an expected signal,
/// not a defect: the persisted history has no record at the extrapolated
/// ordinal, so the caller must stop extrapolating and decide whether that is
/// end-of-history or a detector desynchronization worth surfacing.
#[derive(Error, Debug)]
pub enum GapError {
    #[error("no recorded commit at ordinal {0}")]
    CommitNotFound(i64),
    #[error(transparent)]
    Store(#[from] SmeltError),
}

impl GapError {
    /// The ordinal the handler failed to resolve, when that is the failure.
    pub fn missing_ordinal(&self) -> Option<i64> {
        match self {
            GapError::CommitNotFound(ordinal) => Some(*ordinal),
            GapError::Store(_) => None,
        }
    }
}

/// Strategy for detecting and filling holes in the stream of analyzed
/// commits. The detector may produce no data for some commits; a handler
/// notices the ordinal discontinuity and recovers the skipped commit's
/// identity from the persisted ordinal sequence.
///
/// The variant set is closed: gap filling is either disabled (`Dummy`),
/// keyed on the project-wide ordinal (`SingleBranch`), or keyed on the
/// branch-local ordinal of one reconstructed branch (`MultiBranch`).
pub enum GapHandler<'a> {
    /// Never reports a gap and refuses every extrapolation, for single-pass
    /// linear analyses where a skipped commit should fail loudly.
    Dummy,
    SingleBranch { store: &'a Store, project: i64 },
    MultiBranch { store: &'a Store, project: i64, branch: i64 },
}

impl GapHandler<'_> {
    /// True when the relevant ordinal distance between two supposedly
    /// consecutive analyzed commits exceeds 1, in either direction.
    pub fn has_gap(&self, first: &Commit, second: &Commit) -> bool {
        match self {
            GapHandler::Dummy => false,
            GapHandler::SingleBranch { .. } => (second.ordinal - first.ordinal).abs() > 1,
            GapHandler::MultiBranch { .. } => match (first.branch_ordinal, second.branch_ordinal) {
                (Some(first), Some(second)) => (second - first).abs() > 1,
                _ => false,
            },
        }
    }

    /// The commit the detector silently skipped right after `previous`,
    /// recovered from the persisted ordinal sequence.
    pub fn fetch_no_smell_commit(&self, previous: &Commit) -> Result<Commit, GapError> {
        match self {
            GapHandler::Dummy => Err(GapError::CommitNotFound(previous.ordinal + 1)),
            GapHandler::SingleBranch { store, project } => {
                let wanted = previous.ordinal + 1;
                store
                    .commit_by_ordinal(*project, wanted)?
                    .ok_or(GapError::CommitNotFound(wanted))
            }
            GapHandler::MultiBranch { store, project, branch } => {
                let Some(previous_local) = previous.branch_ordinal else {
                    return Err(GapError::CommitNotFound(previous.ordinal + 1));
                };
                let wanted = previous_local + 1;
                let mut commit = store
                    .commit_by_branch_ordinal(*project, *branch, wanted)?
                    .ok_or(GapError::CommitNotFound(wanted))?;
                // The global ordinal of a gap-filled commit is not
                // independently known; it keeps the previous commit's.
                commit.ordinal = previous.ordinal;
                Ok(commit)
            }
        }
    }
}
