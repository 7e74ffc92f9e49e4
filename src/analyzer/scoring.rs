//! 総合スコアと重大度の算出

use super::config::{DimensionWeights, SeverityThresholds};
use super::metrics::{Dimensions, Severity};

#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator {
    weights: DimensionWeights,
    thresholds: SeverityThresholds,
}

impl ScoreAggregator {
    /// しきい値は検証済み（`AnalyzerConfig::validate`）であることを前提とします
    pub fn new(weights: DimensionWeights, thresholds: SeverityThresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    /// 重み付き和を[0, 100]に丸めたスコア
    pub fn score(&self, dimensions: &Dimensions) -> f64 {
        let score: f64 = dimensions
            .iter()
            .map(|(dimension, value)| value * self.weights.get(dimension))
            .sum();
        if score.is_nan() {
            return 0.0;
        }
        score.clamp(0.0, 100.0)
    }

    /// しきい値を降順に比較し、最初に`score >= しきい値`となった重大度を返します
    pub fn severity(&self, score: f64) -> Severity {
        let t = &self.thresholds;
        [
            (t.critical, Severity::Critical),
            (t.severe, Severity::Severe),
            (t.moderate, Severity::Moderate),
            (t.minor, Severity::Minor),
        ]
        .into_iter()
        .find(|(threshold, _)| score >= *threshold)
        .map(|(_, severity)| severity)
        .unwrap_or(Severity::Normal)
    }

    /// `analyze_project`の結果に含めるかどうか
    pub fn is_reportable(&self, score: f64) -> bool {
        score >= self.thresholds.minor
    }
}
