//! Deterministic sub-sampling of list payloads.

use async_trait::async_trait;
use qexp_shared::{Item, Result, Stage, StageKind};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tracing::{debug, instrument};

/// Seed applied before sampling every item.
pub const SAMPLE_SEED: u64 = 1234;

/// Keeps at most `size` values of each `(key, [value])` item.
///
/// The generator is reseeded for every item, so which positions are kept
/// depends only on the list length.
pub struct Sampler {
    size: usize,
}

impl Sampler {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    fn sample(&self, values: &[String]) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
        values
            .choose_multiple(&mut rng, self.size.min(values.len()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Stage for Sampler {
    fn kind(&self) -> StageKind {
        StageKind::Sampler
    }

    #[instrument(skip_all, fields(items = items.len(), size = self.size))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        Ok(items
            .into_iter()
            .map(|item| {
                let sample = self.sample(item.payload.as_list());
                debug!(key = %item.key, kept = sample.len(), "sampled");
                Item::list(item.key, sample)
            })
            .collect())
    }
}
