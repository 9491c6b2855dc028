use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::engine::{Engine, EngineError, RoomFilter};
use crate::limits::*;
use crate::model::Room;
use crate::notify::NotifyHub;
use crate::reaper;

/// Manages per-location engines. Each location gets its own Engine + WAL +
/// reaper + compactor; bookings never cross locations.
pub struct LocationManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl LocationManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily create an engine for the given location.
    pub fn get_or_create(&self, location: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(location) {
            return Ok(engine.value().clone());
        }
        if location.len() > MAX_LOCATION_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "location name too long",
            ));
        }
        if self.engines.len() >= MAX_LOCATIONS {
            return Err(std::io::Error::other("too many locations"));
        }

        // Sanitize location name to prevent path traversal
        let safe_name: String = location
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty location name",
            ));
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(wal_path, notify)?);

        // Spawn reaper + compactor for this location
        let reaper_engine = engine.clone();
        tokio::spawn(async move {
            reaper::run_reaper(reaper_engine).await;
        });
        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            reaper::run_compactor(compactor_engine, threshold).await;
        });

        self.engines.insert(location.to_string(), engine.clone());
        metrics::gauge!(crate::observability::LOCATIONS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    /// Already-loaded engine for a location, if any.
    pub fn get(&self, location: &str) -> Option<Arc<Engine>> {
        self.engines.get(location).map(|e| e.value().clone())
    }

    pub fn location_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Query-by-example room search across every loaded location.
    /// Returns `(location, room)` pairs.
    pub async fn search_all_locations(
        &self,
        filter: &RoomFilter,
    ) -> Result<Vec<(String, Room)>, EngineError> {
        let engines: Vec<(String, Arc<Engine>)> = self
            .engines
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let mut found = Vec::new();
        for (name, engine) in engines {
            for room in engine.search_rooms(filter).await? {
                found.push((name.clone(), room));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        Ok(found)
    }
}
