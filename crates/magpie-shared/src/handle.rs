//! Candidate handle generation.
//!
//! Handles follow the `adjective + noun + number` shape, lower-cased. The
//! generator only produces candidates; uniqueness is the caller's business
//! (checked against the profile directory during bootstrap).

use rand::rngs::ThreadRng;
use rand::Rng;

use crate::constants::{
    HANDLE_ADJECTIVES, HANDLE_NOUNS, HANDLE_NUMBER_SPAN, HANDLE_SUFFIX_BYTES,
};
use crate::types::Handle;

/// Handle candidate generator over a pluggable RNG.
pub struct HandleGenerator<R = ThreadRng> {
    rng: R,
}

impl HandleGenerator<ThreadRng> {
    /// Generator backed by the thread-local RNG.
    pub fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }
}

impl Default for HandleGenerator<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> HandleGenerator<R> {
    /// Generator over an explicit RNG. Tests pass a seeded `StdRng` to make
    /// the candidate sequence reproducible.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Next candidate: adjective + noun + number, lower-cased.
    pub fn candidate(&mut self) -> Handle {
        let adjective = HANDLE_ADJECTIVES[self.rng.gen_range(0..HANDLE_ADJECTIVES.len())];
        let noun = HANDLE_NOUNS[self.rng.gen_range(0..HANDLE_NOUNS.len())];
        let number = self.rng.gen_range(0..HANDLE_NUMBER_SPAN);
        Handle::new(format!("{}{}{}", adjective, noun, number).to_lowercase())
    }

    /// Candidate extended with a random hex suffix. Used once the regular
    /// pool has been exhausted by collisions; the extra entropy makes a
    /// further collision practically impossible.
    pub fn suffixed_candidate(&mut self) -> Handle {
        let base = self.candidate();
        let mut suffix = [0u8; HANDLE_SUFFIX_BYTES];
        self.rng.fill(&mut suffix[..]);
        Handle::new(format!("{}{}", base, hex::encode(suffix)))
    }
}
