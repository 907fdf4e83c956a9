//! Durability layer: persistence-mode aware flushing and per-thread intent logs.
//!
//! ```text
//!                      ADR                     eADR
//! persist_if_adr(x)    flush + drain           -
//! persist(x)           flush + drain           store fence
//! persist_region_...   -                       flush + drain whole region
//! intent logs          written and cleared     skipped
//! ```

pub(crate) mod crash_point;
mod intent_log;

use std::sync::atomic::{Ordering, fence};

use pmset_region::DurableRegion;

pub use intent_log::{IntentKind, IntentLog, IntentLogEntry, PendingIntent};

use crate::config::PersistMode;

/// Owns the durable region and routes every persistence request through the
/// configured [`PersistMode`].
pub struct Durability {
    region: DurableRegion,
    mode: PersistMode,
}

impl Durability {
    pub fn new(region: DurableRegion, mode: PersistMode) -> Self {
        Durability { region, mode }
    }

    pub fn region(&self) -> &DurableRegion {
        &self.region
    }

    pub fn mode(&self) -> PersistMode {
        self.mode
    }

    /// Persist the result of a structural CAS. Elided under eADR, where the
    /// cache already is in the persistence domain.
    #[inline]
    pub fn persist_if_adr<T>(&self, value: &T) {
        if self.mode == PersistMode::Adr {
            self.region.persist_value(value);
        }
    }

    /// Persist freshly written data: flush + drain under ADR, a store fence
    /// under eADR.
    #[inline]
    pub fn persist<T>(&self, value: &T) {
        match self.mode {
            PersistMode::Adr => self.region.persist_value(value),
            PersistMode::Eadr => self.region.drain(),
        }
    }

    /// Write back the whole region on orderly shutdown under eADR.
    pub fn persist_region_if_eadr(&self) {
        if self.mode == PersistMode::Eadr {
            fence(Ordering::SeqCst);
            self.region.persist_all();
        }
    }
}
