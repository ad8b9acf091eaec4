use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::core::models::usage::UsageSnapshot;
use crate::core::orchestrator::HistorySink;

/// Number of points kept on disk.
pub const MAX_HISTORY_POINTS: usize = 50;
/// Number of points handed to the detail panel.
pub const PANEL_HISTORY_POINTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub epoch_ms: i64,
    pub five_hour_percent: f64,
    pub weekly_percent: f64,
}

impl From<&UsageSnapshot> for HistoryPoint {
    fn from(snapshot: &UsageSnapshot) -> Self {
        Self {
            epoch_ms: snapshot.updated_at_epoch_ms,
            five_hour_percent: snapshot.five_hour.percent,
            weekly_percent: snapshot.weekly.percent,
        }
    }
}

/// Bounded, oldest-first usage history backed by a JSON file.
///
/// Disk failures never surface to callers; the in-memory copy stays usable.
#[derive(Debug)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    points: VecDeque<HistoryPoint>,
}

impl HistoryStore {
    /// `$XDG_CACHE_HOME/claudewatch/history.json`, falling back to `~/.cache`.
    pub fn default_path() -> PathBuf {
        let base = std::env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".cache")
            });
        base.join("claudewatch").join("history.json")
    }

    /// Load history from `path`. Missing or corrupt files start empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut points: VecDeque<HistoryPoint> = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable history");
                VecDeque::new()
            }),
            Err(_) => VecDeque::new(),
        };
        while points.len() > MAX_HISTORY_POINTS {
            points.pop_front();
        }
        Self {
            path: Some(path),
            points,
        }
    }

    /// History that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            points: VecDeque::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn add(&mut self, snapshot: &UsageSnapshot) {
        self.points.push_back(HistoryPoint::from(snapshot));
        while self.points.len() > MAX_HISTORY_POINTS {
            self.points.pop_front();
        }
        self.persist();
    }

    /// Up to `n` most recent points, oldest first.
    pub fn get_last(&self, n: usize) -> Vec<HistoryPoint> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_points(path, &self.points) {
            tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "Failed to save history");
        }
    }
}

impl HistorySink for HistoryStore {
    fn add(&mut self, snapshot: &UsageSnapshot) {
        HistoryStore::add(self, snapshot);
    }

    fn get_last(&self, n: usize) -> Vec<HistoryPoint> {
        HistoryStore::get_last(self, n)
    }
}

fn write_points(path: &Path, points: &VecDeque<HistoryPoint>) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create history directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string(points).context("Failed to serialize history")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write history to {}", path.display()))?;
    Ok(())
}
