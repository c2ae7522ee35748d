//! Per-seed profiles sampled by random walks over the knowledge graph.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use qexp_extractors::{Flattener, PageIdResolver, Politeness, RevisionFetcher, SparqlClient};
use qexp_shared::{AppConfig, CATEGORY_PREFIX, Item, ProfilesConfig, QexpError, Result};
use qexp_storage::IdStore;
use qexp_wikitext::WikitextCleaner;

use crate::graph::KnowledgeGraph;
use crate::pipeline::Pipeline;

/// Samples one random walk per seed on a fixed-size worker pool.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    steps: usize,
    workers: usize,
    seed: Option<u64>,
}

impl Default for ProfileBuilder {
    fn default() -> Self {
        Self::from_config(&ProfilesConfig::default())
    }
}

impl ProfileBuilder {
    pub fn new(steps: usize, workers: usize) -> Self {
        Self {
            steps,
            workers,
            seed: None,
        }
    }

    pub fn from_config(config: &ProfilesConfig) -> Self {
        Self::new(config.steps, config.workers).with_seed(config.seed)
    }

    /// Seed every walk's generator for reproducible profiles.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// One profile per seed, in seed order. Seeds that are absent from the
    /// graph or whose walk gets stuck receive an empty profile.
    #[instrument(skip_all, fields(seeds = seeds.len(), steps = self.steps, workers = self.workers))]
    pub fn build(
        &self,
        graph: &KnowledgeGraph,
        seeds: &[String],
    ) -> Result<Vec<(String, Vec<String>)>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("qexp-walk-{i}"))
            .build()
            .map_err(|e| QexpError::Graph(format!("failed to build walk pool: {e}")))?;

        let profiles: Vec<(String, Vec<String>)> = pool.install(|| {
            seeds
                .par_iter()
                .map(|seed| (seed.clone(), self.profile(graph, seed)))
                .collect()
        });

        let empty = profiles.iter().filter(|(_, p)| p.is_empty()).count();
        info!(profiles = profiles.len(), empty, "profiles built");
        Ok(profiles)
    }

    fn profile(&self, graph: &KnowledgeGraph, seed: &str) -> Vec<String> {
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        match graph.random_walk(seed, self.steps, &mut rng) {
            Ok(walk) => filter_walk(seed, walk),
            Err(e) => {
                warn!(%seed, error = %e, "walk abandoned");
                Vec::new()
            }
        }
    }
}

/// Drop the start vertex and category vertices; deduplicate (sorted).
pub fn filter_walk(start: &str, walk: Vec<String>) -> Vec<String> {
    walk.into_iter()
        .filter(|v| v != start && !v.starts_with(CATEGORY_PREFIX))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolves profile members to page ids and caches their article bodies.
pub struct ProfileMaterializer {
    resolve: Pipeline,
    bodies: Pipeline,
}

impl ProfileMaterializer {
    pub fn new(
        resolver: PageIdResolver,
        revisions: RevisionFetcher,
        cleaner: WikitextCleaner,
    ) -> Self {
        Self {
            resolve: Pipeline::new(vec![Box::new(resolver)]),
            bodies: Pipeline::new(vec![
                Box::new(Flattener),
                Box::new(revisions),
                Box::new(cleaner),
            ]),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let data = &config.data;
        let dbpedia = &config.dbpedia;
        let wiki = &config.wikipedia;

        let store = Arc::new(IdStore::open(&data.id_store_path).await?);
        debug!(resolutions = store.count().await?, "id store opened");
        let sparql = SparqlClient::new(&dbpedia.sparql_url)?.with_politeness(Politeness::between(
            dbpedia.id_delay_min_ms,
            dbpedia.id_delay_max_ms,
        ));
        let extracts = crate::open_cache(&data.extracts_path)?;
        let revisions = RevisionFetcher::new(&wiki.endpoint, extracts)?
            .with_politeness(Politeness::between(wiki.delay_min_ms, wiki.delay_max_ms));
        let cleaner = WikitextCleaner::new(crate::open_cache(&data.clean_path)?);

        Ok(Self::new(PageIdResolver::new(sparql, store), revisions, cleaner))
    }

    /// Rewrite every profile to page ids, then fetch and clean each member's
    /// article so its plain text is cached. Returns seed → page ids.
    #[instrument(skip_all, fields(profiles = profiles.len()))]
    pub async fn materialize(
        &self,
        profiles: Vec<(String, Vec<String>)>,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let items = profiles
            .into_iter()
            .map(|(seed, members)| Item::list(seed, members))
            .collect();
        let resolved = self.resolve.run(items).await?;
        let resolved = resolved.output().to_vec();

        let bodies = self.bodies.run(resolved.clone()).await?;
        info!(articles = bodies.output().len(), "profile articles cached");

        Ok(resolved
            .into_iter()
            .map(|item| {
                let ids = item.payload.as_list().to_vec();
                (item.key, ids)
            })
            .collect())
    }
}
