//! Knowledge-graph assembly from the extraction pipeline.
//!
//! Stage order is fixed: revisions, wikitext, spotlight, subjects,
//! categories. After the run, the subject output (step 3) is joined with the
//! category samples (step 4) so every linked resource connects to the pages
//! sampled from its categories.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, instrument};

use qexp_extractors::mediawiki::categories::decode_title;
use qexp_extractors::{
    CategorySampler, EntityLinker, Politeness, RevisionFetcher, SparqlClient, SubjectLookup,
};
use qexp_shared::{AppConfig, Item, QexpError, Result, keys_to_items, to_resource_uri};
use qexp_wikitext::WikitextCleaner;

use crate::graph::{KnowledgeGraph, to_edgelist};
use crate::pipeline::{Pipeline, PipelineRun};

/// Position of each stage in the builder pipeline.
const LINKS_STEP: usize = 2;
const SUBJECTS_STEP: usize = 3;
const SAMPLES_STEP: usize = 4;

/// Runs the five-stage extraction pipeline and assembles the graph.
pub struct KnowledgeGraphBuilder {
    pipeline: Pipeline,
}

impl KnowledgeGraphBuilder {
    /// Use an already composed pipeline; it must follow the builder's stage order.
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Compose the pipeline from configuration, one cache directory per stage.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let data = &config.data;
        let wiki = &config.wikipedia;
        let dbpedia = &config.dbpedia;
        let wiki_pause = Politeness::between(wiki.delay_min_ms, wiki.delay_max_ms);

        let extracts = crate::open_cache(&data.extracts_path)?;
        let revisions = RevisionFetcher::new(&wiki.endpoint, extracts)?
            .with_politeness(wiki_pause);
        let cleaner = WikitextCleaner::new(crate::open_cache(&data.clean_path)?);
        let linker = EntityLinker::new(
            &dbpedia.url,
            dbpedia.confidence,
            crate::open_cache(&data.surface_term_path)?,
        )?;
        let sparql = SparqlClient::new(&dbpedia.sparql_url)?.with_politeness(Politeness::between(
            dbpedia.subject_delay_min_ms,
            dbpedia.subject_delay_max_ms,
        ));
        let subjects = SubjectLookup::new(sparql, crate::open_cache(&data.subject_path)?)
            .with_blocklist(dbpedia.subject_blocklist.iter().cloned());
        let sampler = CategorySampler::new(
            &wiki.endpoint,
            wiki.category_sample_limit,
            crate::open_cache(&data.category_path)?,
        )?
        .with_politeness(wiki_pause);

        Ok(Self::new(Pipeline::new(vec![
            Box::new(revisions),
            Box::new(cleaner),
            Box::new(linker),
            Box::new(subjects),
            Box::new(sampler),
        ])))
    }

    /// Run the pipeline over `article_ids` and build the simplified graph.
    #[instrument(skip_all, fields(articles = article_ids.len()))]
    pub async fn build(&self, article_ids: &[String]) -> Result<KnowledgeGraph> {
        let run = self
            .pipeline
            .run(keys_to_items(article_ids.iter().cloned()))
            .await?;
        Self::build_from_run(&run)
    }

    /// Assemble the graph from a finished run.
    pub fn build_from_run(run: &PipelineRun) -> Result<KnowledgeGraph> {
        let step = move |index: usize| {
            run.step(index).map(|s| s.items.as_slice()).ok_or_else(|| {
                QexpError::Graph(format!(
                    "pipeline run has {} steps, step {index} is required",
                    run.steps().len()
                ))
            })
        };
        let links = step(LINKS_STEP)?;
        let subjects = step(SUBJECTS_STEP)?;
        let samples = step(SAMPLES_STEP)?;

        let joined = rekey(reconnect(subjects, samples));
        let subjects = rekey(subjects.to_vec());

        let mut edges = to_edgelist(links);
        edges.extend(to_edgelist(&subjects));
        edges.extend(to_edgelist(&joined));

        let mut graph = KnowledgeGraph::from_edges(edges);
        graph.simplify();
        info!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "knowledge graph built"
        );
        Ok(graph)
    }
}

/// Join `(term, [category])` with `(category, [page])` on category identity.
///
/// Each term receives the union of the pages of all its matching categories.
/// Terms with no matching category are kept with no pages.
pub fn reconnect(subjects: &[Item], samples: &[Item]) -> Vec<Item> {
    let mut joined: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for subject in subjects {
        let pages = joined.entry(subject.key.as_str()).or_default();
        for category in subject.payload.as_list() {
            let category = decode_title(category);
            for sample in samples {
                if sample.key == category {
                    pages.extend(sample.payload.as_list().iter().map(String::as_str));
                }
            }
        }
    }

    joined
        .into_iter()
        .map(|(term, pages)| Item::list(term, pages.into_iter().map(str::to_string).collect()))
        .collect()
}

/// Move item keys into the resource namespace.
fn rekey(items: Vec<Item>) -> Vec<Item> {
    items
        .into_iter()
        .map(|item| Item {
            key: to_resource_uri(&item.key),
            payload: item.payload,
        })
        .collect()
}
