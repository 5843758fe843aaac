use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use smelt::error::Result;
use smelt::git::qualname::declared_qualified_name;
use smelt::git::QualifiedNameOracle;
use smelt::lineage::{split_instance, SmellLineageTracker};
use smelt::model::{Commit, FileRenameEntry, Smell};
use smelt::store::Store;
use std::cell::RefCell;
use std::collections::HashMap;

struct StubOracle {
    names: HashMap<(String, String), String>,
    calls: RefCell<usize>,
}

impl StubOracle {
    fn new(entries: &[(&str, &str, &str)]) -> Self {
        let names = entries
            .iter()
            .map(|(sha, path, name)| ((sha.to_string(), path.to_string()), name.to_string()))
            .collect();
        Self { names, calls: RefCell::new(0) }
    }

    fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl QualifiedNameOracle for StubOracle {
    fn qualified_name(&self, sha: &str, path: &str) -> Result<Option<String>> {
        *self.calls.borrow_mut() += 1;
        Ok(self.names.get(&(sha.to_string(), path.to_string())).cloned())
    }
}

fn commit(sha: &str, ordinal: i64) -> Commit {
    Commit {
        sha: sha.to_string(),
        ordinal,
        branch: None,
        branch_ordinal: None,
        parents: Vec::new(),
        author_email: "dev@example.com".to_string(),
        timestamp: Utc.timestamp_opt(1_700_000_000 + ordinal, 0).unwrap(),
        message: format!("commit {ordinal}"),
    }
}

fn rename(sha: &str, old_file: &str, new_file: &str) -> FileRenameEntry {
    FileRenameEntry {
        sha: sha.to_string(),
        old_file: old_file.to_string(),
        new_file: new_file.to_string(),
    }
}

fn seeded_store(renames: &[FileRenameEntry]) -> (Store, i64) {
    let mut store = Store::in_memory().unwrap();
    let project = store.ensure_project("fixture").unwrap();
    store.store_renames(project, renames).unwrap();
    (store, project)
}

#[test]
fn method_and_inner_affixes_survive_splicing() {
    let (store, project) = seeded_store(&[rename("c1", "a/b/c.java", "a/b/d.java")]);
    let oracle = StubOracle::new(&[("c0", "a/b/c.java", "a.b.c")]);
    let tracker = SmellLineageTracker::new(&store, project, &oracle).unwrap();

    let smell = Smell::new("MIM", "method#a.b.d$Inner$Inner2", "a/b/d.java");
    let original = tracker
        .original(&smell, &commit("c1", 1), &commit("c0", 0))
        .unwrap();

    assert_eq!(original.smell_type, "MIM");
    assert_eq!(original.instance, "method#a.b.c$Inner$Inner2");
    assert_eq!(original.file, "a/b/c.java");
    assert_eq!(original.parent, None);
}

#[test]
fn bare_qualified_name_takes_the_oracle_result_verbatim() {
    let (store, project) = seeded_store(&[rename("c1", "d/e/c.java", "d/e/f.java")]);
    let oracle = StubOracle::new(&[("c0", "d/e/c.java", "d.e.c")]);
    let tracker = SmellLineageTracker::new(&store, project, &oracle).unwrap();

    let smell = Smell::new("GC", "d.e.f", "d/e/f.java");
    let original = tracker
        .original(&smell, &commit("c1", 1), &commit("c0", 0))
        .unwrap();

    assert_eq!(original.instance, "d.e.c");
}

#[test]
fn no_rename_means_no_lineage_candidate() {
    let (store, project) = seeded_store(&[rename("c1", "a/b/c.java", "a/b/d.java")]);
    let oracle = StubOracle::new(&[]);
    let tracker = SmellLineageTracker::new(&store, project, &oracle).unwrap();

    // file untouched by the rename at c1
    let smell = Smell::new("MIM", "a.b.z", "a/b/z.java");
    assert!(tracker.original(&smell, &commit("c1", 1), &commit("c0", 0)).is_none());

    // same file, different commit
    let smell = Smell::new("MIM", "a.b.d", "a/b/d.java");
    assert!(tracker.original(&smell, &commit("c2", 2), &commit("c1", 1)).is_none());
}

#[test]
fn unresolved_oracle_degrades_to_affixes_around_nothing() {
    let (store, project) = seeded_store(&[rename("c1", "a/b/c.java", "a/b/d.java")]);
    let oracle = StubOracle::new(&[]);
    let tracker = SmellLineageTracker::new(&store, project, &oracle).unwrap();

    let smell = Smell::new("MIM", "m#a.b.d$In", "a/b/d.java");
    let original = tracker
        .original(&smell, &commit("c1", 1), &commit("c0", 0))
        .unwrap();

    assert_eq!(original.instance, "m#$In");
    assert_eq!(original.file, "a/b/c.java");
}

#[test]
fn oracle_lookups_are_memoized_per_sha_and_file() {
    let (store, project) = seeded_store(&[
        rename("c1", "a/b/c.java", "a/b/d.java"),
        rename("c1", "x/y/old.java", "x/y/new.java"),
    ]);
    let oracle = StubOracle::new(&[
        ("c0", "a/b/c.java", "a.b.c"),
        ("c0", "x/y/old.java", "x.y.old"),
    ]);
    let tracker = SmellLineageTracker::new(&store, project, &oracle).unwrap();

    let first = Smell::new("MIM", "m#a.b.d", "a/b/d.java");
    let second = Smell::new("HMU", "a.b.d$State", "a/b/d.java");
    let r1 = tracker.original(&first, &commit("c1", 1), &commit("c0", 0)).unwrap();
    let r2 = tracker.original(&second, &commit("c1", 1), &commit("c0", 0)).unwrap();

    // one oracle query served both smell types, but each resolution spliced
    // its own identifier independently
    assert_eq!(oracle.calls(), 1);
    assert_eq!(r1.instance, "m#a.b.c");
    assert_eq!(r1.smell_type, "MIM");
    assert_eq!(r2.instance, "a.b.c$State");
    assert_eq!(r2.smell_type, "HMU");

    // a different file is a different memo key
    let third = Smell::new("MIM", "x.y.new", "x/y/new.java");
    let r3 = tracker.original(&third, &commit("c1", 1), &commit("c0", 0)).unwrap();
    assert_eq!(oracle.calls(), 2);
    assert_eq!(r3.instance, "x.y.old");
}

#[test]
fn round_trip_renames_resolve_consistently_at_each_step() {
    // c1 renames X -> Y, c2 renames Y -> X
    let (store, project) = seeded_store(&[
        rename("c1", "src/X.java", "src/Y.java"),
        rename("c2", "src/Y.java", "src/X.java"),
    ]);
    let oracle = StubOracle::new(&[
        ("c0", "src/X.java", "pkg.X"),
        ("c1", "src/Y.java", "pkg.Y"),
    ]);
    let tracker = SmellLineageTracker::new(&store, project, &oracle).unwrap();

    // at c1 the instance lives at Y; its original lived at X
    let at_c1 = Smell::new("GC", "pkg.Y", "src/Y.java");
    let original = tracker
        .original(&at_c1, &commit("c1", 1), &commit("c0", 0))
        .unwrap();
    assert_eq!(original.instance, "pkg.X");
    assert_eq!(original.file, "src/X.java");

    // at c2 the file went back; an instance equal to the pre-rename original
    // resolves to the identifier it carried at c1
    let at_c2 = Smell::new("GC", original.instance.clone(), original.file.clone());
    let back = tracker
        .original(&at_c2, &commit("c2", 2), &commit("c1", 1))
        .unwrap();
    assert_eq!(back.instance, at_c1.instance);
    assert_eq!(back.file, at_c1.file);
}

#[test]
fn identifier_splitting_tolerates_malformed_shapes() {
    assert_eq!(split_instance("method#a.b.c$In"), ("method#", "$In"));
    assert_eq!(split_instance("a.b.c"), ("", ""));
    assert_eq!(split_instance("$OnlyInner"), ("", "$OnlyInner"));
    assert_eq!(split_instance("dangling#"), ("dangling#", ""));
    assert_eq!(split_instance(""), ("", ""));
}

#[test]
fn qualified_names_come_from_the_package_declaration() {
    let source = "package com.example.app;\n\npublic class Widget {}\n";
    assert_eq!(
        declared_qualified_name(source, "src/main/java/com/example/app/Widget.java"),
        Some("com.example.app.Widget".to_string())
    );

    // default package falls back to the bare stem
    assert_eq!(
        declared_qualified_name("public class Widget {}\n", "Widget.java"),
        Some("Widget".to_string())
    );
}
