//! Per-provider availability tracking with capped exponential cooldowns.
//!
//! Each registered provider owns one [`ProviderState`] behind its own lock,
//! so marking one provider never contends with requests probing another.
//! The provider set is fixed at construction; the map itself is never
//! mutated afterwards.
//!
//! # State machine
//!
//! ```text
//!              failure                      cooldown lapses (lazy)
//!  AVAILABLE ───────────► COOLING_DOWN ────────────────────────► AVAILABLE
//!      ▲                    │   ▲                                  │
//!      │     success        │   │ failure: backoff doubles,        │ failure before
//!      └────────────────────┘   │ capped at ceiling                │ any success:
//!                               └──────────────────────────────────┘ backoff doubles
//! ```
//!
//! A lapsed cooldown makes the provider available again without resetting
//! its failure streak; only a success (or a [`reset_stale`] sweep long
//! after the cooldown lapsed) does that. A provider that keeps failing on
//! every probe therefore backs off further each time.
//!
//! [`reset_stale`]: AvailabilityTracker::reset_stale

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;

/// Default base cooldown after a first failure.
pub const DEFAULT_BASE_COOLDOWN: Duration = Duration::from_secs(30);

/// Default upper bound on a single cooldown.
pub const DEFAULT_COOLDOWN_CEILING: Duration = Duration::from_secs(600);

/// Cooldown schedule shared by all providers.
///
/// Individual providers may override the base via their descriptor; the
/// ceiling applies to all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Cooldown after the first failure. Default: 30s.
    pub base: Duration,
    /// Maximum cooldown. Default: 10 minutes.
    pub ceiling: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_COOLDOWN,
            ceiling: DEFAULT_COOLDOWN_CEILING,
        }
    }
}

impl CooldownPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Cooldown for the n-th consecutive failure (1-indexed).
    ///
    /// `base * 2^(n-1)`, capped at the ceiling.
    pub fn backoff(&self, base: Duration, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1);
        base.saturating_mul(2u32.saturating_pow(exponent))
            .min(self.ceiling)
    }
}

/// Whether a provider may currently be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    CoolingDown,
}

/// Mutable availability record for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderState {
    pub status: ProviderStatus,
    /// Expiry of the current (or most recent) cooldown.
    pub cooldown_until: Option<Instant>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

impl ProviderState {
    fn new() -> Self {
        Self {
            status: ProviderStatus::Available,
            cooldown_until: None,
            consecutive_failures: 0,
        }
    }

    /// Lazily leave the cooldown once it has lapsed.
    fn refresh(&mut self, now: Instant) {
        if self.status == ProviderStatus::CoolingDown
            && self.cooldown_until.is_none_or(|until| until <= now)
        {
            self.status = ProviderStatus::Available;
        }
    }
}

struct ProviderSlot {
    base: Duration,
    state: Mutex<ProviderState>,
}

impl ProviderSlot {
    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        // State stays consistent even if a holder panicked mid-update
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared availability state for all providers.
///
/// Unknown provider names are always reported available and marking them
/// is a no-op.
pub struct AvailabilityTracker {
    policy: CooldownPolicy,
    slots: HashMap<String, ProviderSlot>,
}

impl AvailabilityTracker {
    /// Create a tracker with no providers.
    pub fn new(policy: CooldownPolicy) -> Self {
        Self {
            policy,
            slots: HashMap::new(),
        }
    }

    /// Register a provider using the policy's base cooldown.
    pub fn register(&mut self, name: impl Into<String>) {
        let base = self.policy.base;
        self.register_with_base(name, base);
    }

    /// Register a provider with its own base cooldown.
    pub fn register_with_base(&mut self, name: impl Into<String>, base: Duration) {
        self.slots.insert(
            name.into(),
            ProviderSlot {
                base,
                state: Mutex::new(ProviderState::new()),
            },
        );
    }

    pub fn policy(&self) -> CooldownPolicy {
        self.policy
    }

    /// Record a failed call and start (or extend) the provider's cooldown.
    ///
    /// Returns the cooldown applied, or `None` for unknown providers.
    pub fn mark_failure(&self, name: &str) -> Option<Duration> {
        let slot = self.slots.get(name)?;
        let now = Instant::now();
        let mut state = slot.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let cooldown = self.policy.backoff(slot.base, state.consecutive_failures);
        state.status = ProviderStatus::CoolingDown;
        state.cooldown_until = Some(now + cooldown);
        metrics::counter!(telemetry::COOLDOWNS_TOTAL, "provider" => name.to_owned()).increment(1);
        debug!(
            provider = name,
            failures = state.consecutive_failures,
            cooldown_ms = cooldown.as_millis() as u64,
            "provider cooling down"
        );
        Some(cooldown)
    }

    /// Record a successful call; the provider is immediately available and
    /// its backoff returns to base.
    pub fn mark_success(&self, name: &str) {
        if let Some(slot) = self.slots.get(name) {
            let mut state = slot.lock();
            *state = ProviderState::new();
        }
    }

    /// Whether the provider may be called now.
    pub fn is_available(&self, name: &str) -> bool {
        let Some(slot) = self.slots.get(name) else {
            return true;
        };
        let mut state = slot.lock();
        state.refresh(Instant::now());
        state.status == ProviderStatus::Available
    }

    /// Sweep all providers as of `now`.
    ///
    /// Lapsed cooldowns become available. Failure streaks whose cooldown
    /// lapsed more than one ceiling ago are forgotten, so a provider that
    /// recovered silently starts again from the base cooldown.
    ///
    /// Returns the number of providers whose state changed.
    pub fn reset_stale(&self, now: Instant) -> usize {
        let mut changed = 0;
        for slot in self.slots.values() {
            let mut state = slot.lock();
            let before = state.clone();
            state.refresh(now);
            if state.status == ProviderStatus::Available
                && state.consecutive_failures > 0
                && let Some(until) = state.cooldown_until
                && until + self.policy.ceiling <= now
            {
                *state = ProviderState::new();
            }
            if *state != before {
                changed += 1;
            }
        }
        changed
    }

    /// Point-in-time view of every provider, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, ProviderState)> {
        let now = Instant::now();
        let mut out: Vec<_> = self
            .slots
            .iter()
            .map(|(name, slot)| {
                let mut state = slot.lock();
                state.refresh(now);
                (name.clone(), state.clone())
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl std::fmt::Debug for AvailabilityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityTracker")
            .field("policy", &self.policy)
            .field("providers", &self.slots.len())
            .finish()
    }
}
