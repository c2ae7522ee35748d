//! Priming: a small sample of pages linked from each parent article.
//!
//! Linked pages are sampled per parent title and their articles are fetched
//! and cleaned, so the plain-text cache holds a priming corpus next to the
//! seed articles.

use std::collections::BTreeMap;

use tracing::{info, instrument};

use qexp_extractors::{Flattener, PageLinkFetcher, Politeness, RevisionFetcher, Sampler};
use qexp_shared::{AppConfig, Result, keys_to_items};
use qexp_wikitext::WikitextCleaner;

use crate::pipeline::Pipeline;

/// Position of the sampler in the priming pipeline.
const SAMPLE_STEP: usize = 1;

/// Links → sample → flatten → revisions → clean text.
pub struct Primer {
    pipeline: Pipeline,
}

impl Primer {
    pub fn new(
        links: PageLinkFetcher,
        sample_size: usize,
        revisions: RevisionFetcher,
        cleaner: WikitextCleaner,
    ) -> Self {
        Self {
            pipeline: Pipeline::new(vec![
                Box::new(links),
                Box::new(Sampler::new(sample_size)),
                Box::new(Flattener),
                Box::new(revisions),
                Box::new(cleaner),
            ]),
        }
    }

    /// Compose from configuration. Seed articles are never sampled as links.
    pub fn from_config(config: &AppConfig, article_ids: &[String]) -> Result<Self> {
        let data = &config.data;
        let wiki = &config.wikipedia;
        let pause = Politeness::between(wiki.delay_min_ms, wiki.delay_max_ms);

        let link_cache = crate::open_cache(&data.links_path)?;
        let links = PageLinkFetcher::new(&wiki.endpoint, link_cache)?
            .with_exclude(article_ids.iter().cloned())
            .with_no_continue(config.priming.no_continue)
            .with_politeness(pause);
        let extracts = crate::open_cache(&data.extracts_path)?;
        let revisions = RevisionFetcher::new(&wiki.endpoint, extracts)?
            .with_politeness(pause);
        let cleaner = WikitextCleaner::new(crate::open_cache(&data.clean_path)?);

        Ok(Self::new(links, config.priming.sample_size, revisions, cleaner))
    }

    /// Sample links for every parent title; returns title → sampled page ids.
    #[instrument(skip_all, fields(titles = parent_titles.len()))]
    pub async fn run(&self, parent_titles: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
        let run = self
            .pipeline
            .run(keys_to_items(parent_titles.iter().cloned()))
            .await?;

        let sampled: BTreeMap<String, Vec<String>> = run
            .step(SAMPLE_STEP)
            .map(|step| {
                step.items
                    .iter()
                    .map(|item| (item.key.clone(), item.payload.as_list().to_vec()))
                    .collect()
            })
            .unwrap_or_default();
        info!(
            titles = sampled.len(),
            articles = run.output().len(),
            "priming links sampled"
        );
        Ok(sampled)
    }
}
