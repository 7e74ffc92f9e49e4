//! 影響範囲の見積もり
//!
//! 修正時間は修正計画の工数の合計を使うため、計画の作成後に評価します。

use super::dimensions::FileSignals;
use super::metrics::{Dimensions, HotspotImpact, ProductionRisk, RemediationPlan};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactAssessor;

impl ImpactAssessor {
    pub fn assess(
        &self,
        dimensions: &Dimensions,
        signals: &FileSignals,
        plan: &RemediationPlan,
    ) -> HotspotImpact {
        let production_risk = if dimensions.defects > 50.0 {
            ProductionRisk::High
        } else {
            ProductionRisk::Medium
        };

        HotspotImpact {
            affected_files: signals.import_count as usize,
            affected_developers: signals
                .authors
                .iter()
                .map(|(author, _)| author.clone())
                .collect(),
            potential_defects: (dimensions.defects / 10.0).floor() as u32,
            estimated_fix_time: plan.estimated_effort,
            production_risk,
            business_impact: business_impact(production_risk).to_string(),
        }
    }
}

fn business_impact(risk: ProductionRisk) -> &'static str {
    match risk {
        ProductionRisk::Critical => {
            "Failures here are likely to cause outages; fix before the next release"
        }
        ProductionRisk::High => {
            "Defects in this file are likely to reach production and affect users"
        }
        ProductionRisk::Medium => {
            "Changes to this file slow down development and may introduce regressions"
        }
        ProductionRisk::Low => "Limited impact on users; address during regular maintenance",
    }
}
