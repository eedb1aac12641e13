//! Persistent per-user point balances.
//!
//! The file form is a flat JSON object of user id to points. Key order in the
//! file is the order users were first credited, which is also the tie order
//! for the leaderboard.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write ledger file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Store for accumulated points.
pub trait PointStore: Send + Sync {
    /// Current points for a user, 0 if they have never been credited.
    fn get(&self, id: &str) -> u64;

    /// Adds points and persists. A zero amount changes nothing and writes
    /// nothing. The in-memory balance is updated even when persisting fails.
    fn credit(&self, id: &str, amount: u64) -> Result<u64, LedgerError>;

    /// All balances, highest first, ties in first-credited order.
    fn rank(&self) -> Vec<(String, u64)>;
}

/// Insertion-ordered balances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    entries: Vec<(String, u64)>,
}

impl Balances {
    pub fn get(&self, id: &str) -> u64 {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, points)| *points)
            .unwrap_or(0)
    }

    pub fn add(&mut self, id: &str, amount: u64) -> u64 {
        match self.entries.iter_mut().find(|(entry_id, _)| entry_id == id) {
            Some((_, points)) => {
                *points = points.saturating_add(amount);
                *points
            }
            None => {
                self.entries.push((id.to_string(), amount));
                amount
            }
        }
    }

    pub fn ranked(&self) -> Vec<(String, u64)> {
        let mut ranked = self.entries.clone();
        // sort_by is stable, so equal scores keep insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

impl Serialize for Balances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, points) in &self.entries {
            map.serialize_entry(id, points)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Balances {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BalancesVisitor;

        impl<'de> Visitor<'de> for BalancesVisitor {
            type Value = Balances;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of user ids to non-negative points")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Balances, A::Error> {
                let mut balances = Balances::default();
                while let Some((id, points)) = map.next_entry::<String, u64>()? {
                    balances.add(&id, points);
                }
                Ok(balances)
            }
        }

        deserializer.deserialize_map(BalancesVisitor)
    }
}

/// Ledger mirrored to a JSON file, rewritten in full on every credit.
pub struct FileLedger {
    path: PathBuf,
    balances: Mutex<Balances>,
}

impl FileLedger {
    /// Loads the ledger at `path`. A missing file is an empty ledger.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let balances = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse ledger file: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[Ledger] No ledger at {}, starting empty", path.display());
                Balances::default()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read ledger file: {}", path.display()))
            }
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger dir: {}", parent.display()))?;
        }
        Ok(Self {
            path,
            balances: Mutex::new(balances),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, balances: &Balances) -> Result<(), LedgerError> {
        let data = serde_json::to_vec_pretty(balances)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data).map_err(|source| LedgerError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| LedgerError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl PointStore for FileLedger {
    fn get(&self, id: &str) -> u64 {
        self.balances.lock().unwrap_or_else(|e| e.into_inner()).get(id)
    }

    fn credit(&self, id: &str, amount: u64) -> Result<u64, LedgerError> {
        // Held across the write so concurrent credits land one at a time.
        let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        if amount == 0 {
            return Ok(balances.get(id));
        }
        let total = balances.add(id, amount);
        self.persist(&balances)?;
        tracing::debug!("[Ledger] Credited {amount} to {id}, now {total}");
        Ok(total)
    }

    fn rank(&self) -> Vec<(String, u64)> {
        self.balances.lock().unwrap_or_else(|e| e.into_inner()).ranked()
    }
}

/// Ledger that lives only in memory.
#[derive(Default)]
pub struct MemoryLedger {
    balances: Mutex<Balances>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PointStore for MemoryLedger {
    fn get(&self, id: &str) -> u64 {
        self.balances.lock().unwrap_or_else(|e| e.into_inner()).get(id)
    }

    fn credit(&self, id: &str, amount: u64) -> Result<u64, LedgerError> {
        let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        if amount == 0 {
            return Ok(balances.get(id));
        }
        Ok(balances.add(id, amount))
    }

    fn rank(&self) -> Vec<(String, u64)> {
        self.balances.lock().unwrap_or_else(|e| e.into_inner()).ranked()
    }
}
