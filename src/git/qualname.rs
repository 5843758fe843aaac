use crate::error::Result;
use crate::git::GitRepo;
use std::path::Path;
use tracing::debug;

/// Resolves the fully-qualified type name a source file declared at a given
/// commit. Every failure mode degrades to `Ok(None)`; the caller decides how
/// to fall back.
pub trait QualifiedNameOracle {
    fn qualified_name(&self, sha: &str, path: &str) -> Result<Option<String>>;
}

impl QualifiedNameOracle for GitRepo {
    fn qualified_name(&self, sha: &str, path: &str) -> Result<Option<String>> {
        let data = match self.blob_at(sha, path) {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!(sha, path, error = %e, "blob unreadable, qualified name unresolved");
                return Ok(None);
            }
        };
        let Ok(source) = std::str::from_utf8(&data) else {
            return Ok(None);
        };
        Ok(declared_qualified_name(source, path))
    }
}

/// Derive `package.TypeName` from the package declaration plus the file
/// stem; a file without a package declaration lives in the default package.
pub fn declared_qualified_name(source: &str, path: &str) -> Option<String> {
    let stem = Path::new(path).file_stem()?.to_str()?;
    for line in source.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("package ") {
            let package = rest.trim_end().trim_end_matches(';').trim();
            if !package.is_empty() {
                return Some(format!("{package}.{stem}"));
            }
        }
        // declarations only appear before the first type keyword
        if line.starts_with("public ") || line.starts_with("class ") || line.starts_with("interface ") {
            break;
        }
    }
    Some(stem.to_string())
}
