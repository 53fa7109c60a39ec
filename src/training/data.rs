//! Disaster message records and the SQLite loader.

use crate::error::{Result, TriageError};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns that describe the message itself; every other column is a category.
pub const NON_CATEGORY_COLUMNS: &[&str] = &["id", "message", "original", "genre"];

/// A single message from the cleaned dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    /// English message text (the classifier input)
    pub message: String,
    /// Source channel, e.g. "direct", "news", "social"
    pub genre: String,
    /// Untranslated text, when the message was not written in English
    pub original: Option<String>,
}

/// Messages plus their category label matrix.
///
/// `labels` has one row per message and one column per entry of
/// `category_names`, in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub messages: Vec<Message>,
    pub labels: Array2<u8>,
    pub category_names: Vec<String>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The feature column: message text in row order.
    pub fn texts(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.message.clone()).collect()
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            messages: indices.iter().map(|&i| self.messages[i].clone()).collect(),
            labels: self.labels.select(Axis(0), indices),
            category_names: self.category_names.clone(),
        }
    }

    /// Shuffle with a seeded RNG and hold out `ceil(len * test_size)` rows.
    ///
    /// Returns `(train, test)`. The same seed over the same data always gives
    /// the same split.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(TriageError::Config(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        let n = self.len();
        let n_test = (n as f64 * test_size).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(TriageError::fit(format!(
                "cannot split {} rows with test_size {}: both splits need at least one row",
                n, test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok((self.select(train_idx), self.select(test_idx)))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Load messages and category labels from `table` in a SQLite database.
///
/// Category columns are every column except [`NON_CATEGORY_COLUMNS`], in the
/// table's column order. A label of 0 is negative and any positive integer is
/// folded to 1. All of [`NON_CATEGORY_COLUMNS`] must be present. The database
/// is opened read-only and must already exist.
pub fn load_data(database_path: &Path, table: &str) -> Result<Dataset> {
    let data_err = |reason: String| TriageError::data_access(database_path, reason);

    let conn = Connection::open_with_flags(
        database_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| data_err(e.to_string()))?;

    let columns = table_columns(&conn, table).map_err(|e| data_err(e.to_string()))?;
    if columns.is_empty() {
        return Err(data_err(format!("table '{}' does not exist", table)));
    }
    debug!(table, columns = columns.len(), "read table schema");

    let required = |name: &str| {
        columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| data_err(format!("table '{}' has no '{}' column", table, name)))
    };
    let id_col = required("id")?;
    let message_col = required("message")?;
    let original_col = required("original")?;
    let genre_col = required("genre")?;

    let category_cols: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !NON_CATEGORY_COLUMNS.contains(&name.as_str()))
        .map(|(idx, _)| idx)
        .collect();
    if category_cols.is_empty() {
        return Err(data_err(format!("table '{}' has no category columns", table)));
    }
    let category_names: Vec<String> = category_cols.iter().map(|&i| columns[i].clone()).collect();

    let sql = format!("SELECT * FROM {}", quote_ident(table));
    let mut stmt = conn.prepare(&sql).map_err(|e| data_err(e.to_string()))?;
    let mut rows = stmt.query([]).map_err(|e| data_err(e.to_string()))?;

    let mut messages = Vec::new();
    let mut flat_labels: Vec<u8> = Vec::new();
    let mut folded = 0usize;

    while let Some(row) = rows.next().map_err(|e| data_err(e.to_string()))? {
        let id: i64 = row
            .get(id_col)
            .map_err(|e| data_err(format!("row {}: bad id: {}", messages.len(), e)))?;
        let message = optional_text(row.get_ref(message_col))
            .map_err(|e| data_err(format!("row id {}: bad message: {}", id, e)))?
            .unwrap_or_default();
        let genre = optional_text(row.get_ref(genre_col))
            .map_err(|e| data_err(format!("row id {}: bad genre: {}", id, e)))?
            .unwrap_or_default();
        let original = optional_text(row.get_ref(original_col))
            .map_err(|e| data_err(format!("row id {}: bad original: {}", id, e)))?;

        for (&col, name) in category_cols.iter().zip(&category_names) {
            let raw = row.get_ref(col).map_err(|e| data_err(e.to_string()))?;
            let value = label_value(raw).ok_or_else(|| {
                data_err(format!(
                    "row id {}: category '{}' is not a non-negative integer",
                    id, name
                ))
            })?;
            if value > 1 {
                folded += 1;
            }
            flat_labels.push(u8::from(value > 0));
        }

        messages.push(Message {
            id,
            message,
            genre,
            original,
        });
    }

    if folded > 0 {
        warn!(cells = folded, "label values above 1 were folded to 1");
    }

    let labels = Array2::from_shape_vec((messages.len(), category_names.len()), flat_labels)
        .map_err(|e| data_err(e.to_string()))?;
    info!(
        rows = messages.len(),
        categories = category_names.len(),
        table,
        "loaded training data"
    );

    Ok(Dataset {
        messages,
        labels,
        category_names,
    })
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn optional_text(value: rusqlite::Result<ValueRef<'_>>) -> rusqlite::Result<Option<String>> {
    Ok(match value? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    })
}

fn label_value(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Integer(i) if i >= 0 => Some(i),
        ValueRef::Real(f) if f >= 0.0 && f.fract() == 0.0 => Some(f as i64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|&v| v >= 0),
        _ => None,
    }
}
