//! 要因を優先度付きの修正計画に変換する

use super::metrics::{
    ActionImpact, ActionType, CodeHotspot, Dimension, HotspotFactor, RemediationAction,
    RemediationPlan, Severity,
};

const FILE_IMPROVEMENT: f64 = 50.0;
const CLUSTER_IMPROVEMENT: f64 = 60.0;

const SUCCESS_CRITERIA: &[&str] = &[
    "Hotspot score drops below the minor threshold",
    "No new defects reported for the file in the next release cycle",
    "All new and changed code is covered by tests",
    "Changes reviewed by at least one developer other than the main contributor",
];

const CLUSTER_SUCCESS_CRITERIA: &[&str] = &[
    "Every file in the cluster drops below the minor threshold",
    "Shared root cause addressed once instead of per file",
    "Cluster no longer forms on the next analysis run",
];

/// ディメンションごとのアクション（種別、工数、効果、説明）
fn action_template(dimension: Dimension) -> (ActionType, f64, ActionImpact, &'static str) {
    match dimension {
        Dimension::Complexity => (
            ActionType::Refactor,
            8.0,
            ActionImpact::High,
            "Refactor complex logic into smaller, focused units",
        ),
        Dimension::Coverage => (
            ActionType::Test,
            6.0,
            ActionImpact::High,
            "Write tests for uncovered code paths",
        ),
        Dimension::Churn => (
            ActionType::Review,
            4.0,
            ActionImpact::Medium,
            "Review recent changes and stabilize the public API",
        ),
        _ => (
            ActionType::Review,
            2.0,
            ActionImpact::Medium,
            "Review the file with the team",
        ),
    }
}

fn impact_rank(impact: ActionImpact) -> u8 {
    match impact {
        ActionImpact::High => 0,
        ActionImpact::Medium => 1,
        ActionImpact::Low => 2,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemediationPlanner;

impl RemediationPlanner {
    /// 1ファイル分の修正計画を作成します
    ///
    /// 要因1つにつきアクションを1つ作り、効果の高い順に並べます。
    /// テストとリファクタリングの両方がある場合、リファクタリングはテストに依存します。
    pub fn plan(
        &self,
        path: &str,
        severity: Severity,
        factors: &[HotspotFactor],
    ) -> RemediationPlan {
        let mut actions: Vec<RemediationAction> = factors
            .iter()
            .map(|factor| {
                let (action_type, effort, impact, description) = action_template(factor.dimension);
                RemediationAction {
                    id: format!("{}#{}", path, factor.dimension),
                    action_type,
                    description: description.to_string(),
                    effort,
                    impact,
                    dependencies: Vec::new(),
                }
            })
            .collect();

        let test_id = actions
            .iter()
            .find(|a| a.action_type == ActionType::Test)
            .map(|a| a.id.clone());
        if let Some(test_id) = test_id {
            for action in actions
                .iter_mut()
                .filter(|a| a.action_type == ActionType::Refactor)
            {
                action.dependencies.push(test_id.clone());
            }
        }

        actions.sort_by_key(|a| impact_rank(a.impact));

        build_plan(
            severity.priority(),
            actions,
            FILE_IMPROVEMENT,
            SUCCESS_CRITERIA,
        )
    }

    /// クラスタ全体の修正計画（メンバーのアクションを集約）
    pub fn plan_cluster(&self, members: &[CodeHotspot]) -> Option<RemediationPlan> {
        let priority = members.iter().map(|h| h.remediation.priority).min()?;
        let actions = members
            .iter()
            .flat_map(|h| h.remediation.actions.iter().cloned())
            .collect();

        Some(build_plan(
            priority,
            actions,
            CLUSTER_IMPROVEMENT,
            CLUSTER_SUCCESS_CRITERIA,
        ))
    }
}

fn build_plan(
    priority: u8,
    actions: Vec<RemediationAction>,
    expected_improvement: f64,
    criteria: &[&str],
) -> RemediationPlan {
    let estimated_effort = actions.iter().map(|a| a.effort).sum();
    RemediationPlan {
        priority,
        actions,
        estimated_effort,
        expected_improvement,
        success_criteria: criteria.iter().map(|c| c.to_string()).collect(),
    }
}
