use std::fmt;

use rusqlite::{params, Connection, OpenFlags};

use crate::{
    errors::ShardError,
    shards::{
        acquire::AcquisitionState,
        registry::{ExpectedTable, ShardDescriptor},
    },
};

/// One row of the fixed three-column shape shared by every shard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub phone: String,
    pub email: String,
    pub name: String,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.phone, self.email, self.name)
    }
}

/// Read-only query access to local shard files.
///
/// The store only checks that a file is present; it never downloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShardStore;

impl ShardStore {
    /// Rows whose phone, email or name starts with `query` (case-sensitive), in
    /// storage order.
    pub fn prefix_search(
        &self,
        shard: &ShardDescriptor,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Record>, ShardError> {
        let table = surface(shard, ExpectedTable::Users)?;
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let conn = open(shard)?;
        conn.execute_batch("PRAGMA case_sensitive_like = ON;")
            .map_err(|e| ShardError::query(shard.id, e))?;

        let sql = format!(
            "SELECT phone, email, name FROM {table}
             WHERE phone LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\' OR name LIKE ?1 ESCAPE '\\'
             LIMIT ?2"
        );
        let pattern = format!("{}%", escape_like(query));
        select_records(shard, &conn, &sql, &pattern, limit)
    }

    /// Rows matching `query` as a single literal phrase in the FTS5 table.
    pub fn fulltext_search(
        &self,
        shard: &ShardDescriptor,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Record>, ShardError> {
        let table = surface(shard, ExpectedTable::UsersFts)?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = open(shard)?;

        let sql = format!("SELECT phone, email, name FROM {table} WHERE {table} MATCH ?1 LIMIT ?2");
        select_records(shard, &conn, &sql, &fts_phrase(query), limit)
    }
}

/// The shard's table name, if it carries the surface this search needs.
fn surface(shard: &ShardDescriptor, wanted: ExpectedTable) -> Result<&'static str, ShardError> {
    if shard.expected_table != wanted {
        return Err(ShardError::Query {
            shard: shard.id,
            detail: format!(
                "shard carries `{}`, search needs `{}`",
                shard.expected_table.table_name(),
                wanted.table_name()
            ),
        });
    }
    Ok(shard.expected_table.table_name())
}

fn open(shard: &ShardDescriptor) -> Result<Connection, ShardError> {
    if !AcquisitionState::probe(&shard.local_path).present {
        return Err(ShardError::Unavailable {
            shard: shard.id,
            path: shard.local_path.clone(),
        });
    }

    Connection::open_with_flags(
        &shard.local_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| ShardError::query(shard.id, e))
}

fn select_records(
    shard: &ShardDescriptor,
    conn: &Connection,
    sql: &str,
    arg: &str,
    limit: usize,
) -> Result<Vec<Record>, ShardError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(sql).map_err(|e| ShardError::query(shard.id, e))?;
    let rows = stmt
        .query_map(params![arg, limit], |row| {
            Ok(Record {
                phone: column_text(row, 0)?,
                email: column_text(row, 1)?,
                name: column_text(row, 2)?,
            })
        })
        .map_err(|e| ShardError::query(shard.id, e))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| ShardError::query(shard.id, e))?);
    }
    Ok(out)
}

/// Columns are declared text but older dumps carry NULLs and bare integers.
fn column_text(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<String> {
    use rusqlite::types::ValueRef;
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    })
}

/// Escape LIKE wildcards so user input matches literally (`\` is the escape).
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Quote the whole input as one FTS5 phrase so spaces and punctuation never
/// turn into boolean operators.
fn fts_phrase(s: &str) -> String {
    format!("\"{}\"", s.trim().replace('"', "\"\""))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use rusqlite::{params, Connection};

    /// Write a primary-style shard with an indexed `users` table.
    pub fn write_users(path: &Path, rows: &[(&str, &str, &str)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (phone TEXT, email TEXT, name TEXT);
             CREATE INDEX idx_users_phone ON users(phone);
             CREATE INDEX idx_users_email ON users(email);
             CREATE INDEX idx_users_name ON users(name);",
        )
        .unwrap();
        for (p, e, n) in rows {
            conn.execute(
                "INSERT INTO users (phone, email, name) VALUES (?1, ?2, ?3)",
                params![p, e, n],
            )
            .unwrap();
        }
    }

    /// Write a full-text shard with an FTS5 `users_fts` table.
    pub fn write_users_fts(path: &Path, rows: &[(&str, &str, &str)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("CREATE VIRTUAL TABLE users_fts USING fts5(phone, email, name);")
            .unwrap();
        for (p, e, n) in rows {
            conn.execute(
                "INSERT INTO users_fts (phone, email, name) VALUES (?1, ?2, ?3)",
                params![p, e, n],
            )
            .unwrap();
        }
    }
}
