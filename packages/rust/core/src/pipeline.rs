//! Ordered stage composition with retained step history.

use std::time::Instant;

use tracing::{info, instrument};

use qexp_shared::{Item, Result, Stage, StageKind};

/// Output of one stage after a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub kind: StageKind,
    pub items: Vec<Item>,
}

/// Everything one [`Pipeline::run`] produced, stage by stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    input: Vec<Item>,
    steps: Vec<PipelineStep>,
}

impl PipelineRun {
    /// Assemble a run from already computed steps.
    pub fn from_steps(input: Vec<Item>, steps: Vec<PipelineStep>) -> Self {
        Self { input, steps }
    }

    /// Final output: the last stage's items, or the input for an empty pipeline.
    pub fn output(&self) -> &[Item] {
        self.steps
            .last()
            .map(|step| step.items.as_slice())
            .unwrap_or(&self.input)
    }

    /// Output of the stage at `index`.
    pub fn step(&self, index: usize) -> Option<&PipelineStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }
}

/// A fixed sequence of stages. Running it never mutates the pipeline.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage tags in execution order.
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Feed `items` through every stage, keeping each stage's output.
    #[instrument(skip_all, fields(stages = self.stages.len(), items = items.len()))]
    pub async fn run(&self, items: Vec<Item>) -> Result<PipelineRun> {
        let mut steps: Vec<PipelineStep> = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let input = steps
                .last()
                .map(|step| step.items.clone())
                .unwrap_or_else(|| items.clone());
            let in_count = input.len();
            let start = Instant::now();

            let output = stage.run(input).await?;

            info!(
                stage = %stage.kind(),
                items_in = in_count,
                items_out = output.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "stage complete"
            );
            steps.push(PipelineStep {
                kind: stage.kind(),
                items: output,
            });
        }

        Ok(PipelineRun {
            input: items,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qexp_shared::{QexpError, keys_to_items};

    /// Appends a suffix to every key.
    struct Suffix(&'static str);

    #[async_trait]
    impl Stage for Suffix {
        fn kind(&self) -> StageKind {
            StageKind::Flatten
        }

        async fn run(&self, items: Vec<Item>) -> Result<Vec<Item>> {
            Ok(items
                .into_iter()
                .map(|i| Item::key(format!("{}{}", i.key, self.0)))
                .collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl Stage for Broken {
        fn kind(&self) -> StageKind {
            StageKind::Revisions
        }

        async fn run(&self, _items: Vec<Item>) -> Result<Vec<Item>> {
            Err(QexpError::Storage("disk full".into()))
        }
    }

    #[tokio::test]
    async fn every_step_is_retained() {
        let pipeline = Pipeline::new(vec![Box::new(Suffix("-a")), Box::new(Suffix("-b"))]);
        let run = pipeline.run(keys_to_items(["x", "y"])).await.unwrap();

        assert_eq!(run.steps().len(), 2);
        assert_eq!(run.step(0).unwrap().items, keys_to_items(["x-a", "y-a"]));
        assert_eq!(run.output(), keys_to_items(["x-a-b", "y-a-b"]).as_slice());
        assert_eq!(run.step(1).unwrap().kind, StageKind::Flatten);
        assert!(run.step(2).is_none());
    }

    #[tokio::test]
    async fn empty_pipeline_returns_input() {
        let pipeline = Pipeline::new(vec![]);
        assert!(pipeline.is_empty());
        let run = pipeline.run(keys_to_items(["x"])).await.unwrap();
        assert_eq!(run.output(), keys_to_items(["x"]).as_slice());
        assert!(run.steps().is_empty());
    }

    #[tokio::test]
    async fn runs_are_independent() {
        let pipeline = Pipeline::new(vec![Box::new(Suffix("!"))]);
        let first = pipeline.run(keys_to_items(["a"])).await.unwrap();
        let second = pipeline.run(keys_to_items(["b"])).await.unwrap();
        assert_eq!(first.output()[0].key, "a!");
        assert_eq!(second.output()[0].key, "b!");
    }

    #[tokio::test]
    async fn stage_error_aborts_the_run() {
        let pipeline = Pipeline::new(vec![Box::new(Suffix("-a")), Box::new(Broken)]);
        let err = pipeline.run(keys_to_items(["x"])).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
