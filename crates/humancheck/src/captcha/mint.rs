//! Minting of collision-free challenges.

use humancheck_common::HumanCheckError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};

use super::codec::SolutionCodec;
use super::generator::{CaptchaGenerator, sample_solution};
use crate::store::ChallengeStore;

/// Draws solutions, encodes them, renders images, and persists the result
pub struct ChallengeMinter {
    codec: SolutionCodec,
    generator: Arc<CaptchaGenerator>,
    store: ChallengeStore,
    max_attempts: u32,
    /// Solution source; image noise uses the thread RNG
    solutions: Mutex<StdRng>,
}

impl ChallengeMinter {
    pub fn new(
        codec: SolutionCodec,
        generator: Arc<CaptchaGenerator>,
        store: ChallengeStore,
        max_attempts: u32,
    ) -> Self {
        Self::with_rng(codec, generator, store, max_attempts, StdRng::from_os_rng())
    }

    /// Minter whose solutions come from `rng`
    pub fn with_rng(
        codec: SolutionCodec,
        generator: Arc<CaptchaGenerator>,
        store: ChallengeStore,
        max_attempts: u32,
        rng: StdRng,
    ) -> Self {
        Self {
            codec,
            generator,
            store,
            max_attempts: max_attempts.max(1),
            solutions: Mutex::new(rng),
        }
    }

    pub fn codec(&self) -> &SolutionCodec {
        &self.codec
    }

    pub fn store(&self) -> &ChallengeStore {
        &self.store
    }

    /// Mint a new challenge in the key space of `salt`, returning its key
    pub async fn mint(&self, salt: &str) -> Result<String, HumanCheckError> {
        let solutions = std::iter::repeat_with(|| self.next_solution());
        self.mint_from(salt, solutions).await
    }

    /// Mint using solutions drawn from `solutions`, skipping any whose key is taken.
    ///
    /// Gives up after `max_attempts` draws. A conflict on insert (another mint
    /// took the key between probe and insert) is returned as is.
    pub async fn mint_from<I>(&self, salt: &str, solutions: I) -> Result<String, HumanCheckError>
    where
        I: IntoIterator<Item = String>,
    {
        for (attempt, solution) in solutions
            .into_iter()
            .take(self.max_attempts as usize)
            .enumerate()
        {
            let key = self.codec.encode(salt, &solution);

            if self.store.exists(&key).await? {
                tracing::debug!(attempt = attempt + 1, "Challenge key in use, drawing again");
                continue;
            }

            let generator = self.generator.clone();
            let png = tokio::task::spawn_blocking(move || generator.render(&solution))
                .await
                .map_err(|e| HumanCheckError::Internal(format!("render task failed: {e}")))??;

            self.store.create(&key, png).await?;

            tracing::debug!(key = %key, attempt = attempt + 1, "Minted challenge");
            return Ok(key);
        }

        tracing::error!(
            max_attempts = self.max_attempts,
            "Exhausted solution draws without a free key"
        );
        Err(HumanCheckError::MintExhausted(self.max_attempts))
    }

    fn next_solution(&self) -> String {
        // Poisoning leaves the RNG state intact
        let mut rng = self
            .solutions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sample_solution(&mut *rng)
    }
}
