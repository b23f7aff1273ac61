//! Random selection of reference examples and a writing tip.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::store::{KnowledgeTip, ReferenceExample};

/// What the sampler picked for one prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledMaterial {
    pub examples: Vec<ReferenceExample>,
    pub tip: Option<String>,
}

impl SampledMaterial {
    /// Numbered example blocks in selection order; empty when nothing was
    /// picked.
    pub fn examples_text(&self) -> String {
        let mut out = String::new();
        for (i, example) in self.examples.iter().enumerate() {
            out.push_str(&format!("\n=== 参考例{} ===\nタイトル: {}\n{}\n", i + 1, example.title, example.body));
        }
        out
    }
}

/// Keep examples whose title contains any of `templates`.
pub fn filter_by_templates(examples: Vec<ReferenceExample>, templates: &[String]) -> Vec<ReferenceExample> {
    examples
        .into_iter()
        .filter(|e| templates.iter().any(|t| !t.is_empty() && e.title.contains(t.as_str())))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct ExampleSampler {
    per_request: usize,
}

impl ExampleSampler {
    pub fn new(per_request: usize) -> Self {
        Self { per_request }
    }

    /// Up to `per_request` distinct examples, each pool entry equally likely,
    /// and at most one tip.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        mut examples: Vec<ReferenceExample>,
        tips: &[KnowledgeTip],
        rng: &mut R,
    ) -> SampledMaterial {
        let take = self.per_request.min(examples.len());
        let (picked, _) = examples.partial_shuffle(rng, take);
        let picked = picked.to_vec();
        let tip = tips.choose(rng).map(|t| t.content.clone());
        SampledMaterial { examples: picked, tip }
    }
}
