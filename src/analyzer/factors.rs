//! 要因の抽出と根本原因の推定

use super::config::{DetectionThresholds, DimensionWeights};
use super::metrics::{Dimension, Dimensions, HotspotFactor};

pub const CAUSE_UNSTABLE_COMPLEXITY: &str =
    "Unstable complex code: high complexity combined with frequent changes";
pub const CAUSE_INSUFFICIENT_TESTS: &str =
    "Insufficient test coverage leading to defects";
pub const CAUSE_KNOWLEDGE_CONCENTRATION: &str =
    "Knowledge concentration: a single developer owns most changes (bus factor risk)";
pub const CAUSE_MULTIPLE_FACTORS: &str = "Multiple contributing factors";

/// しきい値を超えたディメンションを要因として抽出する
#[derive(Debug, Clone, Copy)]
pub struct FactorIdentifier {
    weights: DimensionWeights,
    thresholds: DetectionThresholds,
}

impl FactorIdentifier {
    pub fn new(weights: DimensionWeights, thresholds: DetectionThresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    /// 各ディメンションについて、値がしきい値を超えていれば要因を1つ返します
    pub fn identify(&self, dimensions: &Dimensions) -> Vec<HotspotFactor> {
        dimensions
            .iter()
            .filter_map(|(dimension, value)| {
                let threshold = self.thresholds.get(dimension);
                (value > threshold).then(|| HotspotFactor {
                    dimension,
                    weight: self.weights.get(dimension),
                    value,
                    threshold,
                    description: description(dimension).to_string(),
                    recommendation: recommendation(dimension).to_string(),
                })
            })
            .collect()
    }
}

fn description(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Defects => "File has a history of frequent defects",
        Dimension::Complexity => "File contains many decision points and is hard to reason about",
        Dimension::Churn => "File changes frequently",
        Dimension::Coupling => "File depends on many other modules",
        Dimension::Coverage => "Large parts of the file are not covered by tests",
        Dimension::Ownership => "Most changes come from a single developer",
    }
}

fn recommendation(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Defects => "Review recent defect fixes and add regression tests",
        Dimension::Complexity => "Refactor into smaller functions and reduce branching",
        Dimension::Churn => "Stabilize the interface and isolate volatile logic",
        Dimension::Coupling => "Reduce dependencies by introducing clear module boundaries",
        Dimension::Coverage => "Add unit tests for uncovered paths",
        Dimension::Ownership => "Spread knowledge through pairing and code review",
    }
}

/// ディメンション間の相関ルールから根本原因を推定する
///
/// ルールは排他的ではなく、該当するものを全て順番に返します。
#[derive(Debug, Clone, Copy, Default)]
pub struct RootCauseAnalyzer;

impl RootCauseAnalyzer {
    pub fn analyze(&self, dimensions: &Dimensions) -> Vec<String> {
        let mut causes = Vec::new();

        if dimensions.complexity > 50.0 && dimensions.churn > 40.0 {
            causes.push(CAUSE_UNSTABLE_COMPLEXITY.to_string());
        }
        if dimensions.coverage > 50.0 && dimensions.defects > 30.0 {
            causes.push(CAUSE_INSUFFICIENT_TESTS.to_string());
        }
        if dimensions.ownership > 80.0 {
            causes.push(CAUSE_KNOWLEDGE_CONCENTRATION.to_string());
        }

        if causes.is_empty() {
            causes.push(CAUSE_MULTIPLE_FACTORS.to_string());
        }
        causes
    }
}
