// src/matching/cascade.rs - Per-pair evaluation: lexical → edit distance → arbiter
use log::{debug, warn};

use crate::matching::arbiter::{SemanticArbiter, Verdict};
use crate::matching::similarity::{jaccard_similarity, levenshtein_similarity, truncate_chars};
use crate::models::matching::PairOutcome;
use crate::models::record::Record;
use crate::utils::pipeline_config::SweepConfig;

/// One configured instance of the similarity cascade.
pub struct PairCascade<'a> {
    config: &'a SweepConfig,
    arbiter: &'a dyn SemanticArbiter,
}

impl<'a> PairCascade<'a> {
    pub fn new(config: &'a SweepConfig, arbiter: &'a dyn SemanticArbiter) -> Self {
        Self { config, arbiter }
    }

    /// Run the stages in order, stopping at the first rejection.
    pub async fn evaluate(&self, a: &Record, b: &Record) -> PairOutcome {
        let text_a = truncate_chars(&a.body, self.config.text_window);
        let text_b = truncate_chars(&b.body, self.config.text_window);

        let jaccard = jaccard_similarity(text_a, text_b);
        if jaccard < self.config.lexical_threshold {
            return PairOutcome::RejectedLexical;
        }

        let edit = levenshtein_similarity(text_a, text_b);
        if edit < self.config.edit_threshold {
            debug!(
                "Pair {}/{} passed lexical ({:.3}) but failed edit distance ({:.3})",
                a.id, b.id, jaccard, edit
            );
            return PairOutcome::RejectedEditDistance;
        }

        match self.arbiter.classify(text_a, text_b).await {
            Ok(Verdict::Duplicate) => PairOutcome::ConfirmedDuplicate,
            Ok(Verdict::Distinct) => PairOutcome::ConfirmedDistinct,
            Err(e) => {
                warn!("Arbiter failed for pair {}/{}, treating as distinct: {}", a.id, b.id, e);
                PairOutcome::ArbiterFailed
            }
        }
    }
}
