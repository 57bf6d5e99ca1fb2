//! LLM-judge evaluation of synthesized insights.
//!
//! Three metrics (faithfulness, context precision, context recall) run
//! concurrently; each is one judge call. An individual metric failure falls
//! back to a fixed neutral score rather than aborting the evaluation, and
//! empty input short-circuits to a zero score with an explanatory field.

use crate::prompt;
use coachloop_config::EvaluationConfig;
use coachloop_core::digest::{Insight, QualityScore, RetrievedChunk};
use coachloop_core::error::EvaluationError;
use coachloop_core::json::{extract_json, reply_preview};
use coachloop_core::llm::{CompletionClient, CompletionOptions};
use std::sync::Arc;
use tracing::{debug, warn};

/// Stateless evaluation service, shared across sessions.
pub struct Evaluator {
    client: Arc<dyn CompletionClient>,
    config: EvaluationConfig,
}

impl Evaluator {
    pub fn new(client: Arc<dyn CompletionClient>, config: EvaluationConfig) -> Self {
        Self { client, config }
    }

    /// Score a set of insights against their source chunks.
    ///
    /// Judging empty input is undefined, so either list being empty
    /// short-circuits to a zero score without invoking the judge.
    pub async fn evaluate(
        &self,
        query: &str,
        insights: &[Insight],
        chunks: &[RetrievedChunk],
    ) -> QualityScore {
        if insights.is_empty() {
            return QualityScore::zero("no insights to evaluate");
        }
        if chunks.is_empty() {
            return QualityScore::zero("no source chunks to evaluate against");
        }

        let system = prompt::judge_system();
        let (faithfulness, precision, recall) = tokio::join!(
            self.score_metric("faithfulness", &system, prompt::faithfulness_user(insights, chunks)),
            self.score_metric(
                "context_precision",
                &system,
                prompt::context_precision_user(query, chunks)
            ),
            self.score_metric(
                "context_recall",
                &system,
                prompt::context_recall_user(query, insights, chunks)
            ),
        );

        let faithfulness = self.unwrap_or_fallback("faithfulness", faithfulness);
        let precision = self.unwrap_or_fallback("context_precision", precision);
        let recall = self.unwrap_or_fallback("context_recall", recall);

        let score = QualityScore::new(
            faithfulness,
            precision,
            recall,
            self.config.quality_gate_minimum,
        );
        debug!(
            faithfulness,
            context_precision = precision,
            context_recall = recall,
            average = score.average,
            passed = score.quality_gate_passed,
            "Evaluation complete"
        );
        score
    }

    /// Badge for a score under the configured gate minimum.
    pub fn badge(&self, score: &QualityScore) -> String {
        score.badge(self.config.quality_gate_minimum).to_string()
    }

    async fn score_metric(
        &self,
        metric: &str,
        system: &str,
        user: String,
    ) -> Result<f64, EvaluationError> {
        let options =
            CompletionOptions::default().with_temperature(self.config.judge_temperature);
        let completion = self
            .client
            .complete(system, &user, options)
            .await
            .map_err(|e| EvaluationError::MetricFailed {
                metric: metric.to_string(),
                reason: e.to_string(),
            })?;

        let value = extract_json(&completion.text).ok_or_else(|| {
            EvaluationError::MetricFailed {
                metric: metric.to_string(),
                reason: format!("unparsable judge reply: {}", reply_preview(&completion.text)),
            }
        })?;

        let score = value
            .get("score")
            .and_then(|s| s.as_f64())
            .ok_or_else(|| EvaluationError::MetricFailed {
                metric: metric.to_string(),
                reason: "judge reply missing numeric 'score'".into(),
            })?;

        Ok(score.clamp(0.0, 1.0))
    }

    fn unwrap_or_fallback(&self, metric: &str, result: Result<f64, EvaluationError>) -> f64 {
        match result {
            Ok(score) => score,
            Err(e) => {
                warn!(
                    metric,
                    fallback = self.config.metric_fallback_score,
                    error = %e,
                    "Metric failed, using neutral fallback score"
                );
                self.config.metric_fallback_score
            }
        }
    }
}
