//! Session throttling and identity rotation.
//!
//! Naver's index endpoints throttle and eventually block clients that fire
//! requests at fixed intervals from one long-lived identity. [`SessionPolicy`]
//! owns that concern for a single worker: it counts every externally visible
//! network action (a navigation, a load-more click), applies a small random
//! jitter between any two of them, and when the per-session request budget is
//! exhausted it sleeps a cooldown, resets the counter, and draws a fresh
//! user-agent identity.
//!
//! # Cooldown policy
//!
//! Most rotations sleep the short cooldown (60s). Every Nth rotation (5th by
//! default) sleeps the long cooldown (180s) instead, simulating a human break.
//! The jitter applies before every request; the cooldown applies at the
//! moment the counter reaches the budget, before the next request proceeds.
//!
//! # Ownership
//!
//! One `SessionPolicy` per worker, never shared. The request budget is
//! therefore per worker rather than global; with bounded pool sizes that
//! keeps the aggregate rate low while avoiding any cross-worker locking.
//!
//! Sleeping goes through the [`Sleeper`] trait and identity draws through
//! [`IdentitySource`], so tests can inject fakes instead of waiting out real
//! cooldowns or sampling the random pool.

use rand::{Rng, rng};
use std::time::Duration;
use tracing::{debug, info};

/// Real browser user agents drawn on each rotation.
///
/// Chrome, Firefox, Safari and Edge on the desktop platforms Naver actually
/// sees; an obviously synthetic agent string defeats the point of rotating.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

/// Pick a random identity string from the pool.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS[rng().random_range(0..USER_AGENTS.len())]
}

/// Where rotations draw their fresh identity from. Injectable so tests can
/// observe that a rotation actually regenerates the identity.
pub trait IdentitySource {
    fn next_identity(&mut self) -> &'static str;
}

/// Default source: a random draw from the real user-agent pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAgentPool;

impl IdentitySource for UserAgentPool {
    fn next_identity(&mut self) -> &'static str {
        random_user_agent()
    }
}

/// Async sleep abstraction so rotation timing is testable without a clock.
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Tunables for [`SessionPolicy`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Requests allowed before a rotation is forced.
    pub max_requests_per_session: u32,
    /// Cooldown slept on an ordinary rotation.
    pub short_cooldown: Duration,
    /// Cooldown slept on every `long_delay_interval`-th rotation.
    pub long_cooldown: Duration,
    /// Which rotations get the long cooldown (every Nth).
    pub long_delay_interval: u32,
    /// Jitter range applied before every request, half-open in millis.
    pub jitter_ms: (u64, u64),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_requests_per_session: 30,
            short_cooldown: Duration::from_secs(60),
            long_cooldown: Duration::from_secs(180),
            long_delay_interval: 5,
            jitter_ms: (1_000, 3_000),
        }
    }
}

/// Per-worker request counter and rotating client identity.
#[derive(Debug)]
pub struct SessionPolicy<S = TokioSleeper, I = UserAgentPool> {
    config: SessionConfig,
    sleeper: S,
    identities: I,
    request_count: u32,
    rotation_count: u32,
    identity: &'static str,
}

impl SessionPolicy {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_sleeper(config, TokioSleeper)
    }
}

impl<S: Sleeper> SessionPolicy<S> {
    pub fn with_sleeper(config: SessionConfig, sleeper: S) -> Self {
        Self::with_parts(config, sleeper, UserAgentPool)
    }
}

impl<S: Sleeper, I: IdentitySource> SessionPolicy<S, I> {
    pub fn with_parts(config: SessionConfig, sleeper: S, mut identities: I) -> Self {
        let identity = identities.next_identity();
        Self {
            config,
            sleeper,
            identities,
            request_count: 0,
            rotation_count: 0,
            identity,
        }
    }

    /// Current client identity (user-agent string).
    pub fn identity(&self) -> &'static str {
        self.identity
    }

    /// Requests made since the last rotation.
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Rotations performed so far.
    pub fn rotation_count(&self) -> u32 {
        self.rotation_count
    }

    /// Sleep a uniform random delay so actions never fire at fixed
    /// intervals. Scroll steps use this without consuming request budget.
    pub async fn jitter(&self) {
        let (lo, hi) = self.config.jitter_ms;
        let jitter = Duration::from_millis(rng().random_range(lo..hi));
        debug!(?jitter, "jitter");
        self.sleeper.sleep(jitter).await;
    }

    /// Report one externally observable network action.
    ///
    /// Sleeps the jitter, increments the counter, and rotates (cooldown,
    /// counter reset, fresh identity) once the budget is reached. Callers
    /// invoke this once per navigation and once per successful load-more
    /// click.
    pub async fn on_request(&mut self) {
        self.jitter().await;

        self.request_count += 1;
        if self.request_count >= self.config.max_requests_per_session {
            self.rotate().await;
        }
    }

    async fn rotate(&mut self) {
        self.rotation_count += 1;
        let cooldown = if self.rotation_count % self.config.long_delay_interval == 0 {
            self.config.long_cooldown
        } else {
            self.config.short_cooldown
        };
        info!(
            rotation = self.rotation_count,
            ?cooldown,
            "session budget exhausted; cooling down and rotating identity"
        );
        self.sleeper.sleep(cooldown).await;
        self.request_count = 0;
        self.identity = self.identities.next_identity();
    }
}
