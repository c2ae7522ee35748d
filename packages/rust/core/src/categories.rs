//! Category titles declared in cached article revisions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use qexp_shared::{CATEGORY_PREFIX, Result};
use qexp_storage::{Cache, DataCache};

/// Categories named by `[[Category:...]]` links in `wikitext`, prefix removed.
pub fn extract_categories(wikitext: &str) -> BTreeSet<String> {
    static CATEGORY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\[(Category:.*?)[\]|]").expect("valid regex"));

    CATEGORY_RE
        .captures_iter(wikitext)
        .map(|caps| caps[1].trim_start_matches(CATEGORY_PREFIX).trim().to_string())
        .filter(|category| !category.is_empty())
        .collect()
}

/// Article id → categories for every revision in `revisions`.
/// Articles declaring no category are left out.
pub fn article_categories(revisions: &DataCache) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut categories = BTreeMap::new();
    for article in revisions.keys()? {
        let Some(text) = revisions.get(&article)? else {
            continue;
        };
        let found = extract_categories(&text);
        if !found.is_empty() {
            categories.insert(article, found);
        }
    }
    info!(articles = categories.len(), "article categories extracted");
    Ok(categories)
}
