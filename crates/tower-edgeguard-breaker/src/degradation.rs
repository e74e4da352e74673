//! Multi-level degradation policy reacting to health signals.
//!
//! The manager turns two health flags (circuit open, memory pressure)
//! into an effective rate-limit multiplier. Memory pressure threatens
//! the limiter itself more directly than a failing backend, so it ranks
//! higher; only when both degrade simultaneously is rate limiting
//! abandoned entirely.
//!
//! | circuit open | memory pressure | level              |
//! |--------------|-----------------|--------------------|
//! | no           | no              | Normal (x1)        |
//! | yes          | no              | Relaxed (x2)       |
//! | no           | yes             | Minimal (x10)      |
//! | yes          | yes             | Disabled (no limit)|

use crate::events::DegradationEvent;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tower_edgeguard_core::{Clock, EventSink, SystemClock};

/// How strictly rate limiting is currently enforced, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DegradationLevel {
    /// Full enforcement.
    Normal,
    /// Limits doubled.
    Relaxed,
    /// Limits multiplied by ten.
    Minimal,
    /// No limits are enforced at all.
    Disabled,
}

impl DegradationLevel {
    /// The factor applied to base limits; zero means "skip the check".
    pub fn multiplier(&self) -> usize {
        match self {
            DegradationLevel::Normal => 1,
            DegradationLevel::Relaxed => 2,
            DegradationLevel::Minimal => 10,
            DegradationLevel::Disabled => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationLevel::Normal => "normal",
            DegradationLevel::Relaxed => "relaxed",
            DegradationLevel::Minimal => "minimal",
            DegradationLevel::Disabled => "disabled",
        }
    }
}

/// Introspection view over the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradationStats {
    /// The level callers act on (manual override wins).
    pub effective_level: DegradationLevel,
    /// The auto-computed level underneath any override.
    pub internal_level: DegradationLevel,
    pub circuit_open: bool,
    pub memory_pressure: bool,
    pub manual_override: Option<DegradationLevel>,
    pub auto_adjust: bool,
    pub last_level_change: SystemTime,
}

/// Configuration for a [`DegradationManager`].
pub struct DegradationConfig {
    pub(crate) auto_adjust: bool,
    pub(crate) cooldown: Duration,
    pub(crate) name: String,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: EventSink<DegradationEvent>,
}

/// Builder for [`DegradationConfig`].
pub struct DegradationConfigBuilder {
    auto_adjust: bool,
    cooldown: Duration,
    name: String,
    clock: Arc<dyn Clock>,
    events: EventSink<DegradationEvent>,
}

impl Default for DegradationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DegradationConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - auto_adjust: enabled
    /// - cooldown: 30 seconds between level changes
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            auto_adjust: true,
            cooldown: Duration::from_secs(30),
            name: "<unnamed>".to_string(),
            clock: Arc::new(SystemClock),
            events: EventSink::new(),
        }
    }

    /// Enables or disables automatic level adjustment. When disabled,
    /// health callbacks still track flags for observability but the
    /// level only moves via manual override.
    pub fn auto_adjust(mut self, enabled: bool) -> Self {
        self.auto_adjust = enabled;
        self
    }

    /// Minimum time between automatic level changes, to prevent
    /// flapping when health signals oscillate.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the name for this manager instance (used in events and logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the clock. Tests use this to step past the cooldown.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a callback for every level change.
    pub fn on_level_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(DegradationLevel, DegradationLevel) + Send + Sync + 'static,
    {
        self.events.subscribe(move |event| {
            let DegradationEvent::LevelChanged { from, to, .. } = event;
            f(*from, *to);
        });
        self
    }

    /// Builds the manager.
    pub fn build(self) -> DegradationManager {
        DegradationManager::new(DegradationConfig {
            auto_adjust: self.auto_adjust,
            cooldown: self.cooldown,
            name: self.name,
            clock: self.clock,
            events: self.events,
        })
    }
}

struct DegradationInner {
    level: DegradationLevel,
    circuit_open: bool,
    memory_pressure: bool,
    manual_override: Option<DegradationLevel>,
    last_level_change: SystemTime,
}

/// Maps health signals to effective rate limits.
///
/// One instance exists per limiter type; the circuit breaker's
/// `on_open`/`on_close` callbacks and the store's memory-pressure
/// watcher feed it. All state sits behind one mutex; subscribers run
/// after the lock is released.
pub struct DegradationManager {
    config: Arc<DegradationConfig>,
    inner: Mutex<DegradationInner>,
}

impl DegradationManager {
    /// Creates a manager from a finished config.
    pub fn new(config: DegradationConfig) -> Self {
        // Backdated so the first health signal can act immediately; the
        // cooldown only spaces out subsequent changes.
        let start = config
            .clock
            .now()
            .checked_sub(config.cooldown)
            .unwrap_or(std::time::UNIX_EPOCH);
        Self {
            config: Arc::new(config),
            inner: Mutex::new(DegradationInner {
                level: DegradationLevel::Normal,
                circuit_open: false,
                memory_pressure: false,
                manual_override: None,
                last_level_change: start,
            }),
        }
    }

    /// Starts building a manager configuration.
    pub fn builder() -> DegradationConfigBuilder {
        DegradationConfigBuilder::new()
    }

    /// Health signal: the circuit breaker opened.
    pub fn on_circuit_open(&self) {
        self.apply(|inner| inner.circuit_open = true);
    }

    /// Health signal: the circuit breaker closed.
    pub fn on_circuit_close(&self) {
        self.apply(|inner| inner.circuit_open = false);
    }

    /// Health signal: the store is under memory pressure.
    pub fn on_memory_pressure_high(&self) {
        self.apply(|inner| inner.memory_pressure = true);
    }

    /// Health signal: store memory usage is back to normal.
    pub fn on_memory_pressure_normal(&self) {
        self.apply(|inner| inner.memory_pressure = false);
    }

    /// Returns `base` scaled by the current multiplier; zero means the
    /// caller should skip the check entirely.
    pub fn adjust_limits(&self, base: usize) -> usize {
        base.saturating_mul(self.level().multiplier())
    }

    /// The effective level: the manual override when set, otherwise the
    /// auto-computed level.
    pub fn level(&self) -> DegradationLevel {
        let inner = self.inner.lock().unwrap();
        inner.manual_override.unwrap_or(inner.level)
    }

    /// Pins the level manually, or clears the pin with `None`.
    /// While pinned, health callbacks keep updating flags but never move
    /// the level.
    pub fn set_override(&self, level: Option<DegradationLevel>) {
        let (from, to) = {
            let mut inner = self.inner.lock().unwrap();
            let from = inner.manual_override.unwrap_or(inner.level);
            inner.manual_override = level;
            (from, inner.manual_override.unwrap_or(inner.level))
        };
        match level {
            Some(level) => {
                tracing::warn!(
                    manager = %self.config.name,
                    level = level.as_str(),
                    "degradation level manually pinned"
                );
            }
            None => {
                tracing::info!(manager = %self.config.name, "degradation override cleared");
            }
        }
        if from != to {
            self.emit_change(from, to);
        }
    }

    /// Returns a consistent snapshot for introspection.
    pub fn stats(&self) -> DegradationStats {
        let inner = self.inner.lock().unwrap();
        DegradationStats {
            effective_level: inner.manual_override.unwrap_or(inner.level),
            internal_level: inner.level,
            circuit_open: inner.circuit_open,
            memory_pressure: inner.memory_pressure,
            manual_override: inner.manual_override,
            auto_adjust: self.config.auto_adjust,
            last_level_change: inner.last_level_change,
        }
    }

    /// Updates flags and, when permitted, re-evaluates the level.
    /// Flags are always recorded, even when auto-adjust is off, an
    /// override is pinned, or the cooldown blocks the move.
    fn apply<F>(&self, update: F)
    where
        F: FnOnce(&mut DegradationInner),
    {
        let transition = {
            let mut inner = self.inner.lock().unwrap();
            update(&mut inner);

            if !self.config.auto_adjust || inner.manual_override.is_some() {
                None
            } else {
                let target = Self::target_level(inner.circuit_open, inner.memory_pressure);
                if target == inner.level {
                    None
                } else {
                    let now = self.config.clock.now();
                    let since_change = now
                        .duration_since(inner.last_level_change)
                        .unwrap_or_default();
                    if since_change < self.config.cooldown {
                        tracing::debug!(
                            manager = %self.config.name,
                            target = target.as_str(),
                            "level change blocked by cooldown"
                        );
                        None
                    } else {
                        let from = inner.level;
                        inner.level = target;
                        inner.last_level_change = now;
                        Some((from, target))
                    }
                }
            }
        };

        if let Some((from, to)) = transition {
            self.emit_change(from, to);
        }
    }

    fn target_level(circuit_open: bool, memory_pressure: bool) -> DegradationLevel {
        match (circuit_open, memory_pressure) {
            (false, false) => DegradationLevel::Normal,
            (true, false) => DegradationLevel::Relaxed,
            (false, true) => DegradationLevel::Minimal,
            (true, true) => DegradationLevel::Disabled,
        }
    }

    fn emit_change(&self, from: DegradationLevel, to: DegradationLevel) {
        tracing::warn!(
            manager = %self.config.name,
            from = from.as_str(),
            to = to.as_str(),
            "degradation level changed"
        );

        #[cfg(feature = "metrics")]
        metrics::gauge!(
            "edgeguard_degradation_level",
            "manager" => self.config.name.clone()
        )
        .set(match to {
            DegradationLevel::Normal => 0.0,
            DegradationLevel::Relaxed => 1.0,
            DegradationLevel::Minimal => 2.0,
            DegradationLevel::Disabled => 3.0,
        });

        self.config.events.publish(&DegradationEvent::LevelChanged {
            name: self.config.name.clone(),
            from,
            to,
        });
    }
}
