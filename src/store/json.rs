use crate::store::{NewServer, Query, RecordStore, ServerEntry};
use crate::utils::error::{Result, RiptError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    servers: Vec<ServerEntry>,
}

/// Server entries kept in one pretty-printed JSON file. Every mutation is
/// written out before it returns.
pub struct JsonStore {
    path: PathBuf,
    data: StoreFile,
}

impl JsonStore {
    pub fn open(path: &Path) -> Result<JsonStore> {
        let data = if path.exists() {
            let file = File::open(path)?;
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                RiptError::Store(format!("{} is not a server store: {}", path.display(), e))
            })?
        } else {
            debug!("{} does not exist, starting empty", path.display());
            StoreFile::default()
        };
        Ok(JsonStore {
            path: path.to_path_buf(),
            data,
        })
    }

    fn commit(&mut self, next: StoreFile) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&next)?)?;
        fs::rename(&tmp, &self.path)?;
        self.data = next;
        Ok(())
    }
}

impl RecordStore for JsonStore {
    fn find(&self, query: &Query) -> Result<Vec<ServerEntry>> {
        Ok(self
            .data
            .servers
            .iter()
            .filter(|s| query.matches(s))
            .cloned()
            .collect())
    }

    fn insert(&mut self, entry: NewServer) -> Result<ServerEntry> {
        let mut next = self.data.clone();
        next.next_id += 1;
        let inserted = ServerEntry {
            id: next.next_id,
            hostname: entry.hostname,
            ip: entry.ip,
            groups: entry.groups,
        };
        next.servers.push(inserted.clone());
        self.commit(next)?;
        Ok(inserted)
    }

    fn update(&mut self, entry: &ServerEntry) -> Result<()> {
        let mut next = self.data.clone();
        let slot = next
            .servers
            .iter_mut()
            .find(|s| s.id == entry.id)
            .ok_or_else(|| RiptError::NotFound(format!("server entry {}", entry.id)))?;
        *slot = entry.clone();
        self.commit(next)
    }

    fn remove(&mut self, id: u64) -> Result<usize> {
        let mut next = self.data.clone();
        let before = next.servers.len();
        next.servers.retain(|s| s.id != id);
        let removed = before - next.servers.len();
        if removed > 0 {
            self.commit(next)?;
        }
        Ok(removed)
    }

    fn remove_matching(&mut self, query: &Query) -> Result<usize> {
        let mut next = self.data.clone();
        let before = next.servers.len();
        next.servers.retain(|s| !query.matches(s));
        let removed = before - next.servers.len();
        if removed > 0 {
            self.commit(next)?;
        }
        Ok(removed)
    }
}
