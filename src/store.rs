use crate::error::{Result, SmeltError};
use crate::model::{Branch, Commit, FileRenameEntry, Smell, SCHEMA_VERSION};
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;

/// Persistent analysis state: commits with their ordinals, the reconstructed
/// branch forest, the rename index, and the smell instances themselves.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open<DP: AsRef<Path>, RP: AsRef<Path>>(db_path: Option<DP>, repo_path: RP) -> Result<Self> {
        let db_dir = match db_path {
            Some(path) => path.as_ref().to_path_buf(),
            None => repo_path.as_ref().join(".smelt"),
        };
        std::fs::create_dir_all(&db_dir)?;
        let conn = Connection::open(db_dir.join("smelt.db"))?;
        let mut store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS commits (
                project_id INTEGER NOT NULL,
                sha TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                branch INTEGER,
                branch_ordinal INTEGER,
                author_email TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                message TEXT NOT NULL,
                parents TEXT NOT NULL,
                PRIMARY KEY (project_id, sha),
                FOREIGN KEY (project_id) REFERENCES projects(id)
            );
            CREATE TABLE IF NOT EXISTS branches (
                project_id INTEGER NOT NULL,
                ordinal INTEGER NOT NULL,
                parent_sha TEXT,
                merged_into_sha TEXT,
                PRIMARY KEY (project_id, ordinal),
                FOREIGN KEY (project_id) REFERENCES projects(id)
            );
            CREATE TABLE IF NOT EXISTS file_renames (
                project_id INTEGER NOT NULL,
                sha TEXT NOT NULL,
                old_file TEXT NOT NULL,
                new_file TEXT NOT NULL,
                PRIMARY KEY (project_id, sha, new_file),
                FOREIGN KEY (project_id) REFERENCES projects(id)
            );
            CREATE TABLE IF NOT EXISTS smells (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                sha TEXT NOT NULL,
                smell_type TEXT NOT NULL,
                instance TEXT NOT NULL,
                file TEXT NOT NULL,
                parent_id INTEGER,
                FOREIGN KEY (project_id) REFERENCES projects(id),
                FOREIGN KEY (parent_id) REFERENCES smells(id)
            );
            CREATE INDEX IF NOT EXISTS idx_commits_ordinal ON commits(project_id, ordinal);
            CREATE INDEX IF NOT EXISTS idx_commits_branch ON commits(project_id, branch, branch_ordinal);
            CREATE INDEX IF NOT EXISTS idx_smells_sha ON smells(project_id, sha);
            ",
        )?;
        self.check_schema_version()?;
        Ok(())
    }

    fn check_schema_version(&mut self) -> Result<()> {
        let user_version: i64 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;

        if user_version == 0 {
            let set_stmt = format!("PRAGMA user_version = {SCHEMA_VERSION};");
            self.conn.execute_batch(&set_stmt)?;
        } else if user_version != SCHEMA_VERSION as i64 {
            return Err(SmeltError::Store(format!(
                "Schema version mismatch: expected {}, found {}",
                SCHEMA_VERSION, user_version
            )));
        }

        Ok(())
    }

    pub fn ensure_project(&self, path: &str) -> Result<i64> {
        self.conn
            .execute("INSERT OR IGNORE INTO projects (path) VALUES (?)", params![path])?;
        let id = self.conn.query_row(
            "SELECT id FROM projects WHERE path = ?",
            params![path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn store_commits(&mut self, project: i64, commits: &[Commit]) -> Result<()> {
        let tx = self.conn.transaction()?;

        let mut insert_stmt = tx.prepare(
            "INSERT OR REPLACE INTO commits
             (project_id, sha, ordinal, branch, branch_ordinal, author_email, timestamp, message, parents)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;

        for commit in commits {
            insert_stmt.execute(params![
                project,
                commit.sha,
                commit.ordinal,
                commit.branch,
                commit.branch_ordinal,
                commit.author_email,
                commit.timestamp.timestamp(),
                commit.message,
                serde_json::to_string(&commit.parents)?
            ])?;
        }

        drop(insert_stmt);
        tx.commit()?;
        Ok(())
    }

    /// Persist the reconstructed forest: all branch rows first, then the
    /// per-commit branch assignments, as one transaction.
    pub fn store_branches(&mut self, project: i64, branches: &[Branch]) -> Result<()> {
        let tx = self.conn.transaction()?;

        let mut insert_branch_stmt = tx.prepare(
            "INSERT OR REPLACE INTO branches (project_id, ordinal, parent_sha, merged_into_sha)
             VALUES (?, ?, ?, ?)",
        )?;
        let mut update_commit_stmt = tx.prepare(
            "UPDATE commits SET branch = ?, branch_ordinal = ?
             WHERE project_id = ? AND sha = ?",
        )?;

        for branch in branches {
            insert_branch_stmt.execute(params![
                project,
                branch.ordinal,
                branch.parent_commit,
                branch.merged_into
            ])?;
        }
        for branch in branches {
            for commit in &branch.commits {
                update_commit_stmt.execute(params![
                    commit.branch,
                    commit.branch_ordinal,
                    project,
                    commit.sha
                ])?;
            }
        }

        drop(insert_branch_stmt);
        drop(update_commit_stmt);
        tx.commit()?;
        Ok(())
    }

    pub fn store_renames(&mut self, project: i64, renames: &[FileRenameEntry]) -> Result<()> {
        let tx = self.conn.transaction()?;

        // (sha, new_file) is the identity of a rename event; a duplicate key
        // is the same event regardless of old_file, so keep the first.
        let mut insert_stmt = tx.prepare(
            "INSERT OR IGNORE INTO file_renames (project_id, sha, old_file, new_file)
             VALUES (?, ?, ?, ?)",
        )?;

        for rename in renames {
            insert_stmt.execute(params![project, rename.sha, rename.old_file, rename.new_file])?;
        }

        drop(insert_stmt);
        tx.commit()?;
        Ok(())
    }

    pub fn load_renames(&self, project: i64) -> Result<Vec<FileRenameEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT sha, old_file, new_file FROM file_renames WHERE project_id = ?",
        )?;
        let rows = stmt.query_map(params![project], |row| {
            Ok(FileRenameEntry {
                sha: row.get(0)?,
                old_file: row.get(1)?,
                new_file: row.get(2)?,
            })
        })?;
        let mut renames = Vec::new();
        for row in rows {
            renames.push(row?);
        }
        Ok(renames)
    }

    pub fn branch_count(&self, project: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM branches WHERE project_id = ?",
            params![project],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn commit_by_sha(&self, project: i64, sha: &str) -> Result<Option<Commit>> {
        self.commit_row(
            "SELECT sha, ordinal, branch, branch_ordinal, author_email, timestamp, message, parents
             FROM commits WHERE project_id = ? AND sha = ?",
            params![project, sha],
        )
    }

    pub fn commit_by_ordinal(&self, project: i64, ordinal: i64) -> Result<Option<Commit>> {
        self.commit_row(
            "SELECT sha, ordinal, branch, branch_ordinal, author_email, timestamp, message, parents
             FROM commits WHERE project_id = ? AND ordinal = ?",
            params![project, ordinal],
        )
    }

    pub fn commit_by_branch_ordinal(
        &self,
        project: i64,
        branch: i64,
        branch_ordinal: i64,
    ) -> Result<Option<Commit>> {
        self.commit_row(
            "SELECT sha, ordinal, branch, branch_ordinal, author_email, timestamp, message, parents
             FROM commits WHERE project_id = ? AND branch = ? AND branch_ordinal = ?",
            params![project, branch, branch_ordinal],
        )
    }

    fn commit_row(&self, query: &str, bind: &[&dyn rusqlite::ToSql]) -> Result<Option<Commit>> {
        let result = self.conn.query_row(query, bind, row_to_commit);
        match result {
            Ok(commit) => Ok(Some(commit)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert_smell(&self, project: i64, sha: &str, smell: &Smell) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO smells (project_id, sha, smell_type, instance, file, parent_id)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![project, sha, smell.smell_type, smell.instance, smell.file, smell.parent],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Row id of a smell persisted for `sha` matching type, instance and file.
    pub fn find_smell(&self, project: i64, sha: &str, smell: &Smell) -> Result<Option<i64>> {
        let result = self.conn.query_row(
            "SELECT id FROM smells
             WHERE project_id = ? AND sha = ? AND smell_type = ? AND instance = ? AND file = ?
             ORDER BY id LIMIT 1",
            params![project, sha, smell.smell_type, smell.instance, smell.file],
            |row| row.get(0),
        );
        match result {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn smell_count(&self, project: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM smells WHERE project_id = ?",
            params![project],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_commit(row: &Row<'_>) -> rusqlite::Result<Commit> {
    let ts: i64 = row.get(5)?;
    let timestamp = Utc.timestamp_opt(ts, 0).single().ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(5, "timestamp".to_string(), rusqlite::types::Type::Integer)
    })?;

    let parent_json: String = row.get(7)?;
    let parents: Vec<String> = serde_json::from_str(&parent_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            parent_json.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;

    Ok(Commit {
        sha: row.get(0)?,
        ordinal: row.get(1)?,
        branch: row.get(2)?,
        branch_ordinal: row.get(3)?,
        parents,
        author_email: row.get(4)?,
        timestamp,
        message: row.get(6)?,
    })
}
