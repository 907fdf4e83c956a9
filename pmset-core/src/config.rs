//! Configuration for a persistent list instance.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ListError, Result};

/// Default location of the backing file (a DAX-mounted file system).
pub const DEFAULT_PMEM_PATH: &str = "/mnt/pmem1/pmset";

/// Default arena size in slots. Two of them are taken by the sentinels.
pub const DEFAULT_CAPACITY: usize = 512 * 1024;

pub const DEFAULT_MAX_THREADS: usize = 64;

/// Retirements between two increments of the global epoch.
pub const DEFAULT_EPOCH_FREQUENCY: u64 = 64;

/// Retirements between two reclamation sweeps.
pub const DEFAULT_RECLAIM_FREQUENCY: u64 = 128;

const SYSFS_ND_DEVICES: &str = "/sys/bus/nd/devices";

/// How mutations reach the persistence domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Only the memory controller is durable: every structural mutation is
    /// flushed and drained, multi-step operations are covered by intent logs.
    #[default]
    Adr,
    /// CPU caches are durable too: flushes are elided (a store fence remains)
    /// and intent logging is skipped.
    Eadr,
}

impl PersistMode {
    /// Whether operations must record intent logs in this mode.
    pub fn logs_intents(self) -> bool {
        matches!(self, PersistMode::Adr)
    }

    /// Probe the platform: `Eadr` when every NVDIMM region reports the CPU
    /// cache as its persistence domain, `Adr` otherwise (including when no
    /// NVDIMM region is visible at all).
    pub fn detect() -> Self {
        Self::detect_in(Path::new(SYSFS_ND_DEVICES))
    }

    fn detect_in(devices: &Path) -> Self {
        let Ok(entries) = fs::read_dir(devices) else {
            return PersistMode::Adr;
        };

        let mut regions = 0;
        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().starts_with("region") {
                continue;
            }
            regions += 1;

            let domain = fs::read_to_string(entry.path().join("persistence_domain"))
                .unwrap_or_default();
            if domain.trim() != "cpu_cache" {
                return PersistMode::Adr;
            }
        }

        if regions > 0 {
            PersistMode::Eadr
        } else {
            PersistMode::Adr
        }
    }
}

/// The two epoch-based reclamation tunables.
///
/// Larger values bound the bookkeeping overhead, smaller values bound how long
/// a removed node keeps its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimPolicy {
    /// Retirements between increments of the global epoch.
    pub epoch_frequency: u64,
    /// Retirements between reclamation sweeps.
    pub reclaim_frequency: u64,
}

impl Default for ReclaimPolicy {
    fn default() -> Self {
        Self {
            epoch_frequency: DEFAULT_EPOCH_FREQUENCY,
            reclaim_frequency: DEFAULT_RECLAIM_FREQUENCY,
        }
    }
}

/// Configuration of a persistent list instance.
///
/// `capacity` and `max_threads` determine the size of the durable region, so
/// a file created with one configuration cannot be reopened with another.
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Backing file of the durable region.
    pub path: PathBuf,
    /// Number of node slots, sentinels included. Multiple of 64.
    pub capacity: usize,
    /// Number of thread identities (`0..max_threads`).
    pub max_threads: usize,
    /// Platform persistence mode.
    pub persist_mode: PersistMode,
    /// Epoch-based reclamation tunables.
    pub reclaim_policy: ReclaimPolicy,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PMEM_PATH),
            capacity: DEFAULT_CAPACITY,
            max_threads: DEFAULT_MAX_THREADS,
            persist_mode: PersistMode::default(),
            reclaim_policy: ReclaimPolicy::default(),
        }
    }
}

impl ListConfig {
    /// Defaults, backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Use the persistence mode reported by the platform.
    pub fn with_detected_persist_mode(mut self) -> Self {
        self.persist_mode = PersistMode::detect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity < 64 || self.capacity % 64 != 0 {
            return Err(ListError::InvalidConfig(format!(
                "capacity must be a positive multiple of 64, got {}",
                self.capacity
            )));
        }
        if self.capacity as u64 >= 1 << 63 {
            return Err(ListError::InvalidConfig(format!(
                "capacity {} collides with the mark bit",
                self.capacity
            )));
        }
        if self.max_threads == 0 {
            return Err(ListError::InvalidConfig(
                "max_threads must be at least 1".to_string(),
            ));
        }
        if self.reclaim_policy.epoch_frequency == 0 || self.reclaim_policy.reclaim_frequency == 0 {
            return Err(ListError::InvalidConfig(
                "reclaim frequencies must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
