//! Pipeline orchestration and graph logic for qexp.
//!
//! Ties the extraction stages together into the workflows the CLI runs:
//! building the knowledge graph, sampling and materializing profiles,
//! priming, and collecting article categories.

pub mod builder;
pub mod categories;
pub mod graph;
pub mod pipeline;
pub mod priming;
pub mod profiles;

use std::path::Path;
use std::sync::Arc;

use qexp_shared::{QexpError, Result};
use qexp_storage::{Cache, DataCache};
use serde::Serialize;

pub use builder::{KnowledgeGraphBuilder, reconnect};
pub use graph::{KnowledgeGraph, WalkError, to_edgelist};
pub use pipeline::{Pipeline, PipelineRun, PipelineStep};
pub use priming::Primer;
pub use profiles::{ProfileBuilder, ProfileMaterializer, filter_walk};

/// Open the file cache rooted at `dir` as a shareable stage cache.
pub(crate) fn open_cache(dir: &Path) -> Result<Arc<dyn Cache>> {
    Ok(Arc::new(DataCache::open(dir)?))
}

/// Write `value` to `path` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| QexpError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| QexpError::parse(format!("{}: {e}", path.display())))?;
    std::fs::write(path, json).map_err(|e| QexpError::io(path, e))?;
    tracing::info!(path = %path.display(), "wrote json");
    Ok(())
}
