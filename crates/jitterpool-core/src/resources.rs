//! Claimable transfer channels and pacing timers.
//!
//! The harvesting pipeline needs dedicated engines: one pacing timer, one
//! sampling channel and (when pooling) one store channel. A registry hands
//! out unused ones and takes them back when the claim is dropped.

use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{Error, Result};

/// Transfer channels on the reference platform.
pub const DEFAULT_CHANNELS: u8 = 12;
/// Pacing timers on the reference platform.
pub const DEFAULT_TIMERS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Channel,
    Timer,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Self::Channel => "transfer channel",
            Self::Timer => "pacing timer",
        }
    }
}

#[derive(Debug)]
struct InUse {
    channels: u32,
    timers: u32,
}

/// Bitmap allocator for the platform's finite engines.
#[derive(Debug)]
pub struct ResourceRegistry {
    channel_count: u8,
    timer_count: u8,
    in_use: Mutex<InUse>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNELS, DEFAULT_TIMERS)
    }
}

impl ResourceRegistry {
    /// Registry with `channels` transfer channels and `timers` pacing timers
    /// (each capped at 32).
    pub fn new(channels: u8, timers: u8) -> Self {
        Self {
            channel_count: channels.min(32),
            timer_count: timers.min(32),
            in_use: Mutex::new(InUse {
                channels: 0,
                timers: 0,
            }),
        }
    }

    /// The process-wide registry shared by harvesters that are not given one.
    pub fn global() -> Arc<ResourceRegistry> {
        static GLOBAL: OnceLock<Arc<ResourceRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ResourceRegistry::default())))
    }

    /// Claim the lowest-numbered unused transfer channel.
    pub fn claim_channel(self: &Arc<Self>) -> Result<Claim> {
        self.claim(Kind::Channel)
    }

    /// Claim the lowest-numbered unused pacing timer.
    pub fn claim_timer(self: &Arc<Self>) -> Result<Claim> {
        self.claim(Kind::Timer)
    }

    /// Number of free transfer channels.
    pub fn free_channels(&self) -> u32 {
        let used = self.lock().channels.count_ones();
        u32::from(self.channel_count) - used
    }

    /// Number of free pacing timers.
    pub fn free_timers(&self) -> u32 {
        let used = self.lock().timers.count_ones();
        u32::from(self.timer_count) - used
    }

    fn claim(self: &Arc<Self>, kind: Kind) -> Result<Claim> {
        let mut in_use = self.lock();
        let (bits, count) = match kind {
            Kind::Channel => (&mut in_use.channels, self.channel_count),
            Kind::Timer => (&mut in_use.timers, self.timer_count),
        };
        let id = (0..count)
            .find(|&i| *bits & (1 << i) == 0)
            .ok_or(Error::ResourcesExhausted(kind.label()))?;
        *bits |= 1 << id;
        log::debug!("claimed {} {id}", kind.label());
        Ok(Claim {
            registry: Arc::clone(self),
            kind,
            id,
        })
    }

    fn release(&self, kind: Kind, id: u8) {
        let mut in_use = self.lock();
        match kind {
            Kind::Channel => in_use.channels &= !(1 << id),
            Kind::Timer => in_use.timers &= !(1 << id),
        }
        log::debug!("released {} {id}", kind.label());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InUse> {
        self.in_use.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An exclusively held channel or timer; released on drop.
#[derive(Debug)]
pub struct Claim {
    registry: Arc<ResourceRegistry>,
    kind: Kind,
    id: u8,
}

impl Claim {
    /// Hardware index of the claimed engine.
    pub fn id(&self) -> u8 {
        self.id
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.registry.release(self.kind, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_lowest_free_index() {
        let reg = Arc::new(ResourceRegistry::new(3, 1));
        let a = reg.claim_channel().unwrap();
        let b = reg.claim_channel().unwrap();
        assert_eq!((a.id(), b.id()), (0, 1));
        drop(a);
        let c = reg.claim_channel().unwrap();
        assert_eq!(c.id(), 0);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let reg = Arc::new(ResourceRegistry::new(1, 1));
        let _ch = reg.claim_channel().unwrap();
        let _t = reg.claim_timer().unwrap();
        assert!(matches!(
            reg.claim_channel(),
            Err(Error::ResourcesExhausted("transfer channel"))
        ));
        assert!(matches!(
            reg.claim_timer(),
            Err(Error::ResourcesExhausted("pacing timer"))
        ));
    }

    #[test]
    fn drop_releases() {
        let reg = Arc::new(ResourceRegistry::new(2, 2));
        {
            let _a = reg.claim_channel().unwrap();
            let _t = reg.claim_timer().unwrap();
            assert_eq!(reg.free_channels(), 1);
            assert_eq!(reg.free_timers(), 1);
        }
        assert_eq!(reg.free_channels(), 2);
        assert_eq!(reg.free_timers(), 2);
    }

    #[test]
    fn empty_registry() {
        let reg = Arc::new(ResourceRegistry::new(0, 0));
        assert!(reg.claim_channel().is_err());
        assert_eq!(reg.free_channels(), 0);
    }

    #[test]
    fn counts_capped_at_32() {
        let reg = ResourceRegistry::new(200, 40);
        assert_eq!(reg.free_channels(), 32);
        assert_eq!(reg.free_timers(), 32);
    }

    #[test]
    fn global_is_shared() {
        let a = ResourceRegistry::global();
        let b = ResourceRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
