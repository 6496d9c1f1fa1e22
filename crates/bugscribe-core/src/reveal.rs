//! Typewriter-style disclosure of a complete response
//!
//! [`RevealSession`] is the clock-free state machine: each call to
//! [`RevealSession::advance`] discloses one more character and reports how long to
//! wait before the next one. [`animate`] drives a session with real timers.

use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::Rng;

/// Per-character pacing. Each delay is a floor plus a uniform jitter in
/// `0..=jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPacing {
    pub base: Duration,
    pub space: Duration,
    pub punctuation: Duration,
    pub jitter: Duration,
}

impl Default for RevealPacing {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            space: Duration::from_millis(10),
            punctuation: Duration::from_millis(120),
            jitter: Duration::from_millis(30),
        }
    }
}

impl RevealPacing {
    /// Floors must be ordered punctuation > space > base
    pub fn validate(&self) -> Result<()> {
        if self.space <= self.base {
            return Err(anyhow!(
                "space delay ({:?}) must be longer than base delay ({:?})",
                self.space,
                self.base
            ));
        }
        if self.punctuation <= self.space {
            return Err(anyhow!(
                "punctuation delay ({:?}) must be longer than space delay ({:?})",
                self.punctuation,
                self.space
            ));
        }
        Ok(())
    }

    /// Delay floor for a character, before jitter
    pub fn floor_for(&self, c: char) -> Duration {
        match c {
            ' ' => self.space,
            '.' | ',' | '!' | '?' => self.punctuation,
            _ => self.base,
        }
    }

    pub fn delay_for<R: Rng>(&self, c: char, rng: &mut R) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        self.floor_for(c) + Duration::from_millis(rng.gen_range(0..=jitter_ms))
    }
}

/// One step of a reveal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep<'a> {
    /// One more character is visible; wait `delay` before advancing again
    Tick { partial: &'a str, delay: Duration },
    /// Everything is visible
    Done(&'a str),
}

#[derive(Debug, Clone)]
pub struct RevealSession {
    target: String,
    // Byte offset, always on a char boundary
    cursor: usize,
}

impl RevealSession {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cursor: 0,
        }
    }

    /// The text disclosed so far
    pub fn revealed(&self) -> &str {
        &self.target[..self.cursor]
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.target.len()
    }

    pub fn advance<R: Rng>(&mut self, pacing: &RevealPacing, rng: &mut R) -> RevealStep<'_> {
        match self.target[self.cursor..].chars().next() {
            None => RevealStep::Done(&self.target),
            Some(c) => {
                self.cursor += c.len_utf8();
                RevealStep::Tick {
                    partial: &self.target[..self.cursor],
                    delay: pacing.delay_for(c, rng),
                }
            }
        }
    }
}

/// Run a session to completion, sleeping between characters.
///
/// `on_tick` sees every growing prefix in order; `on_done` receives the full text
/// exactly once. Tick N+1 is only scheduled after tick N's callback returns.
pub async fn animate<R, T, D>(
    mut session: RevealSession,
    pacing: RevealPacing,
    mut rng: R,
    mut on_tick: T,
    on_done: D,
) where
    R: Rng,
    T: FnMut(&str),
    D: FnOnce(&str),
{
    loop {
        match session.advance(&pacing, &mut rng) {
            RevealStep::Tick { partial, delay } => {
                on_tick(partial);
                tokio::time::sleep(delay).await;
            }
            RevealStep::Done(full) => {
                on_done(full);
                return;
            }
        }
    }
}
