//! Persistent daily quota counter.
//!
//! The record is a single text line, `ISO-date count` (space separated),
//! overwritten atomically on each update. An absent file means "0, not yet
//! initialized"; a torn or malformed record is logged and reset to 0 instead
//! of crashing the orchestrator.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use tokio::sync::Mutex;

use crate::{errors::Error, Result};

pub struct QuotaStore {
    path: PathBuf,
    // Serializes read-modify-persist so concurrent migration jobs cannot
    // lose updates across a suspension point.
    lock: Mutex<()>,
}

impl QuotaStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Returns today's count. Rolls the counter over to 0 the first time it
    /// is read on a new calendar date.
    pub async fn read(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        self.read_locked(today())
    }

    /// Overwrites the stored count for today. Last successful write wins.
    pub async fn increment_and_persist(&self, new_count: u64) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_locked(today(), new_count)
    }

    /// Read-modify-persist in one lock acquisition, with no suspension
    /// between the read and the write. Returns the new count.
    pub async fn increment(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let date = today();
        let count = self.read_locked(date)? + 1;
        self.write_locked(date, count)?;
        Ok(count)
    }

    fn read_locked(&self, date: NaiveDate) -> Result<u64> {
        if !self.path.exists() {
            return Ok(0);
        }

        let txt = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Persistence(format!("{}: {e}", self.path.display())))?;

        match parse_record(&txt) {
            Some((stored_date, count)) if stored_date == date => Ok(count),
            Some(_) => {
                // Date rollover: reset before anyone sees the stale count.
                self.write_locked(date, 0)?;
                Ok(0)
            }
            None => {
                eprintln!(
                    "[QUOTA] malformed record in {}, resetting to 0",
                    self.path.display()
                );
                self.write_locked(date, 0)?;
                Ok(0)
            }
        }
    }

    fn write_locked(&self, date: NaiveDate, count: u64) -> Result<()> {
        std::fs::write(&self.path, format!("{} {count}", date.format("%Y-%m-%d")))
            .map_err(|e| Error::Persistence(format!("{}: {e}", self.path.display())))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_record(txt: &str) -> Option<(NaiveDate, u64)> {
    let mut parts = txt.trim().split_whitespace();
    let date = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
    let count = parts.next()?.parse::<u64>().ok()?;
    Some((date, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> QuotaStore {
        let path = std::env::temp_dir().join(format!("gramcast-quota-{name}-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        QuotaStore::new(path)
    }

    #[tokio::test]
    async fn absent_file_reads_as_zero() {
        let store = temp_store("absent");
        assert_eq!(store.read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn increment_persists_across_instances() {
        let store = temp_store("persist");
        assert_eq!(store.increment().await.unwrap(), 1);
        assert_eq!(store.increment().await.unwrap(), 2);

        let reopened = QuotaStore::new(store.path.clone());
        assert_eq!(reopened.read().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stale_date_resets_to_zero() {
        let store = temp_store("rollover");
        std::fs::write(&store.path, "2001-01-01 42").unwrap();
        assert_eq!(store.read().await.unwrap(), 0);

        // The reset is durable, not just the returned value.
        let txt = std::fs::read_to_string(&store.path).unwrap();
        assert!(txt.ends_with(" 0"), "expected reset record, got: {txt}");
    }

    #[tokio::test]
    async fn torn_record_resets_to_zero() {
        let store = temp_store("torn");
        std::fs::write(&store.path, "2026-08").unwrap();
        assert_eq!(store.read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn overwrite_takes_latest_value() {
        let store = temp_store("overwrite");
        store.increment_and_persist(7).await.unwrap();
        store.increment_and_persist(9).await.unwrap();
        assert_eq!(store.read().await.unwrap(), 9);
    }
}
