use crate::error::Result;
use crate::git::QualifiedNameOracle;
use crate::model::{Commit, FileRenameEntry, Smell};
use crate::store::Store;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::warn;

/// Reconstructs the identity a smell instance had before its file was
/// renamed, so the caller can link it to the instance it evolved from.
///
/// Constructed once per project: the full rename index is loaded up front
/// and kept in memory, keyed on `(sha, new_file)`. Qualified-name lookups
/// are memoized per `(sha, file)` pair for the lifetime of this instance
/// and never shared across projects.
pub struct SmellLineageTracker<'a> {
    renames: HashMap<(String, String), FileRenameEntry>,
    oracle: &'a dyn QualifiedNameOracle,
    qualified_names: RefCell<HashMap<(String, String), Option<String>>>,
}

impl<'a> SmellLineageTracker<'a> {
    pub fn new(store: &Store, project: i64, oracle: &'a dyn QualifiedNameOracle) -> Result<Self> {
        let mut renames = HashMap::new();
        for entry in store.load_renames(project)? {
            renames.insert((entry.sha.clone(), entry.new_file.clone()), entry);
        }
        Ok(Self {
            renames,
            oracle,
            qualified_names: RefCell::new(HashMap::new()),
        })
    }

    /// The smell instance `instance` evolved from, if its file was renamed
    /// in `commit`. Returns `None` when no rename touched the file there.
    ///
    /// The result carries no `parent` link; the caller decides whether to
    /// treat it as an ancestor. Each smell instance resolves independently:
    /// nothing about a resolution for one smell type is reused for another.
    pub fn original(&self, instance: &Smell, commit: &Commit, previous: &Commit) -> Option<Smell> {
        let key = (commit.sha.clone(), instance.file.clone());
        let renaming = self.renames.get(&key)?;

        let (start, ending) = split_instance(&instance.instance);
        let old_name = match self.qualified_name(&previous.sha, &renaming.old_file) {
            Some(name) => name,
            None => {
                warn!(
                    sha = %previous.sha,
                    file = %renaming.old_file,
                    "qualified name unresolved, reconstructed identifier is degenerate"
                );
                String::new()
            }
        };

        let guessed = format!("{start}{old_name}{ending}");
        Some(Smell::new(
            instance.smell_type.clone(),
            guessed,
            renaming.old_file.clone(),
        ))
    }

    fn qualified_name(&self, sha: &str, file: &str) -> Option<String> {
        let key = (sha.to_string(), file.to_string());
        if let Some(hit) = self.qualified_names.borrow().get(&key) {
            return hit.clone();
        }
        let resolved = match self.oracle.qualified_name(sha, file) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(sha, file, error = %e, "qualified name lookup failed");
                None
            }
        };
        self.qualified_names.borrow_mut().insert(key, resolved.clone());
        resolved
    }
}

/// Split a smell identifier `[method#]qualified.Name[$Inner$Inner2]` into
/// the affixes around the qualified name. An identifier that does not match
/// the grammar degrades to empty affixes; splicing never fails.
pub fn split_instance(instance: &str) -> (&str, &str) {
    let start_end = instance.find('#').map(|i| i + 1).unwrap_or(0);
    let start = &instance[..start_end];
    let rest = &instance[start_end..];
    let ending = rest.find('$').map(|i| &rest[i..]).unwrap_or("");
    (start, ending)
}
