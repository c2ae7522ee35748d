//! Turns list values into identity items.

use async_trait::async_trait;
use qexp_shared::{Item, Payload, Result, Stage, StageKind};
use tracing::instrument;

/// `(key, [v1, v2])` becomes `(v1, -)`, `(v2, -)`, in order.
#[derive(Debug, Default)]
pub struct Flattener;

#[async_trait]
impl Stage for Flattener {
    fn kind(&self) -> StageKind {
        StageKind::Flatten
    }

    #[instrument(skip_all, fields(items = items.len()))]
    async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        Ok(items
            .into_iter()
            .flat_map(|item| match item.payload {
                Payload::List(values) => values,
                _ => Vec::new(),
            })
            .map(Item::key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_become_keys() {
        let out = Flattener
            .run(vec![
                Item::list("a", vec!["1".into(), "2".into()]),
                Item::text("b", "ignored"),
                Item::list("c", vec!["3".into()]),
            ])
            .await
            .unwrap();
        assert_eq!(out, qexp_shared::keys_to_items(["1", "2", "3"]));
    }
}
