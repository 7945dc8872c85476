use log::{error, info};
use std::collections::HashSet;

use crate::domain::application::dedup_key;
use crate::store::repo::{ApplicationStore, DEDUP_RANGE};

/// Run-scoped set of position_company keys already present in the sheet.
/// Built once at run start and mutated in memory as rows are accepted; it is
/// never re-read mid-run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    /// Load existing entries from the store. A failed read logs and yields
    /// an empty index: the run proceeds without dedup rather than blocking
    /// ingestion.
    pub fn from_store(store: &dyn ApplicationStore) -> Self {
        let seen = match store.read_rows(DEDUP_RANGE) {
            Ok(rows) => {
                let keys: HashSet<String> = rows
                    .iter()
                    .filter(|row| row.len() >= 2)
                    .map(|row| dedup_key(&row[0], &row[1]))
                    .collect();
                info!("loaded {} existing entries for dedup", keys.len());
                keys
            }
            Err(e) => {
                error!("Error getting existing entries: {e}");
                HashSet::new()
            }
        };
        Self { seen }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn insert(&mut self, key: String) {
        self.seen.insert(key);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
