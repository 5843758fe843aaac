use thiserror::Error;

pub type Result<T> = std::result::Result<T, SmeltError>;

#[derive(Error, Debug)]
pub enum SmeltError {
    #[error("Git repository error: {0}")]
    GitRepo(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Other: {0}")]
    Other(String),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] gix::objs::decode::Error),
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::object::find::existing::Error> for SmeltError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        SmeltError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for SmeltError {
    fn from(err: gix::object::commit::Error) -> Self {
        SmeltError::Commit(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for SmeltError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        SmeltError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for SmeltError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        SmeltError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for SmeltError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        SmeltError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for SmeltError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        SmeltError::DiffTreeToTree(Box::new(err))
    }
}

impl From<gix::discover::Error> for SmeltError {
    fn from(err: gix::discover::Error) -> Self {
        SmeltError::GitDiscover(Box::new(err))
    }
}
