//! Filler captions shown while a response is pending

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const DEFAULT_CAPTIONS: &[&str] = &[
    "Squashing bugs...",
    "Untangling spaghetti code...",
    "Consulting the rubber duck...",
    "Chasing rogue semicolons...",
    "Checking for syntax ghosts...",
    "Searching for missing brackets...",
];

/// Uniform random choice over a fixed list of phrases
#[derive(Debug, Clone)]
pub struct CaptionPicker {
    phrases: Vec<String>,
    rng: StdRng,
}

impl CaptionPicker {
    /// An empty list falls back to [`DEFAULT_CAPTIONS`]
    pub fn new(phrases: Vec<String>, rng: StdRng) -> Self {
        let phrases = if phrases.is_empty() {
            DEFAULT_CAPTIONS.iter().map(|p| p.to_string()).collect()
        } else {
            phrases
        };
        Self { phrases, rng }
    }

    pub fn seeded(phrases: Vec<String>, seed: u64) -> Self {
        Self::new(phrases, StdRng::seed_from_u64(seed))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn pick(&mut self) -> String {
        self.phrases
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default()
    }
}
