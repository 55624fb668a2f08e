//! Append-only JSONL persistence for the record store
//!
//! One file per table, one JSON object per line. Corrupt lines are
//! skipped with a warning rather than failing startup; the log is
//! best-effort telemetry, not a ledger.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{StoreConfig, StoreInner, StoreResult};
use crate::types::{ActivityEvent, ApiUsageEvent, PageViewEvent, User};

/// Append one record as a JSONL line
pub(crate) fn append<T: Serialize>(path: &Path, record: &T) -> StoreResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Append a batch of records with a single file handle
pub(crate) fn append_all<T: Serialize>(path: &Path, records: &[T]) -> StoreResult<()> {
    if records.is_empty() {
        return Ok(());
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// Replay all logs into `inner` and advance the id sequence past the
/// highest id seen
pub(crate) fn load(config: &StoreConfig, inner: &mut StoreInner) -> StoreResult<()> {
    let users: Vec<User> = read_lines(&config.users_path())?;
    for user in users {
        bump_next_id(inner, parse_user_seq(&user.id));
        inner.users.insert(user.id.clone(), user);
    }

    let activities: Vec<ActivityEvent> = read_lines(&config.activities_path())?;
    for event in activities {
        bump_next_id(inner, Some(event.id));
        inner.activities.push(event);
    }

    let page_views: Vec<PageViewEvent> = read_lines(&config.page_views_path())?;
    for event in page_views {
        bump_next_id(inner, Some(event.id));
        inner.page_views.push(event);
    }

    let api_usage: Vec<ApiUsageEvent> = read_lines(&config.api_usage_path())?;
    for event in api_usage {
        bump_next_id(inner, Some(event.id));
        inner.api_usage.push(event);
    }

    Ok(())
}

fn bump_next_id(inner: &mut StoreInner, id: Option<u64>) {
    if let Some(id) = id {
        if id >= inner.next_id {
            inner.next_id = id + 1;
        }
    }
}

/// User ids carry their sequence number: `usr_000007` -> 7
fn parse_user_seq(id: &str) -> Option<u64> {
    id.strip_prefix("usr_")?.parse().ok()
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                eprintln!(
                    "[Store] Skipping corrupt line {} in {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                );
            }
        }
    }
    Ok(records)
}
