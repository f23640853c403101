//! Challenge checker facade
//!
//! A single asynchronous predicate over the attestation challenge bytes,
//! with composable implementations:
//! - [`ChallengeMatcher`]: constant-time comparison against a fixed value
//! - [`UnusedChallengeCache`]: bounded LRU set accepting each challenge at
//!   most once across concurrent callers
//! - [`ChainedChallengeChecker`]: sequential composition with
//!   short-circuiting
//!
//! The verifier awaits the checker at exactly one point; a cancelled
//! future propagates, and timeouts are the caller's concern.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

/// Decides whether an attestation challenge is acceptable.
#[async_trait]
pub trait ChallengeChecker: Send + Sync {
    async fn check_challenge(&self, challenge: &[u8]) -> bool;
}

/// Accepts exactly one expected challenge value.
pub struct ChallengeMatcher {
    expected: Vec<u8>,
}

impl ChallengeMatcher {
    pub fn new(expected: impl Into<Vec<u8>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

#[async_trait]
impl ChallengeChecker for ChallengeMatcher {
    async fn check_challenge(&self, challenge: &[u8]) -> bool {
        self.expected.as_slice().ct_eq(challenge).into()
    }
}

/// Accepts each challenge at most once, remembering the most recently used
/// `max_size` challenges.
///
/// A repeat lookup refreshes the entry's position, so the entry evicted on
/// overflow is always the least recently accessed one. The lock makes the
/// check-and-insert atomic across concurrent callers.
pub struct UnusedChallengeCache {
    seen: Mutex<LruCache<Vec<u8>, ()>>,
}

impl UnusedChallengeCache {
    pub fn new(max_size: NonZeroUsize) -> Self {
        Self {
            seen: Mutex::new(LruCache::new(max_size)),
        }
    }
}

#[async_trait]
impl ChallengeChecker for UnusedChallengeCache {
    async fn check_challenge(&self, challenge: &[u8]) -> bool {
        let mut seen = self.seen.lock().await;
        if seen.get(challenge).is_some() {
            return false;
        }
        seen.push(challenge.to_vec(), ());
        true
    }
}

/// Runs checkers in order; the first rejection wins and later checkers are
/// not invoked. An empty chain accepts.
pub struct ChainedChallengeChecker {
    checkers: Vec<Box<dyn ChallengeChecker>>,
}

impl ChainedChallengeChecker {
    pub fn new(checkers: Vec<Box<dyn ChallengeChecker>>) -> Self {
        Self { checkers }
    }
}

#[async_trait]
impl ChallengeChecker for ChainedChallengeChecker {
    async fn check_challenge(&self, challenge: &[u8]) -> bool {
        for checker in &self.checkers {
            if !checker.check_challenge(challenge).await {
                return false;
            }
        }
        true
    }
}
