//! 分析結果の表現を担当するモジュール
//!
//! このモジュールは、ホットスポット分析の結果を表現するためのデータ構造と、
//! 分析結果のシリアライズに関する機能を提供します。
//! スコアと重大度は常にディメンション値と設定から導出され、個別に設定されることはありません。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// リスクの評価軸（ディメンション）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dimension {
    Defects,
    Complexity,
    Churn,
    Coupling,
    Coverage,
    Ownership,
}

impl Dimension {
    /// 全ディメンション（特徴ベクトルの並び順と同じ）
    pub const ALL: [Dimension; 6] = [
        Dimension::Defects,
        Dimension::Complexity,
        Dimension::Churn,
        Dimension::Coupling,
        Dimension::Coverage,
        Dimension::Ownership,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Defects => "defects",
            Dimension::Complexity => "complexity",
            Dimension::Churn => "churn",
            Dimension::Coupling => "coupling",
            Dimension::Coverage => "coverage",
            Dimension::Ownership => "ownership",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 6つのディメンションの値（それぞれ0-100）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(serialize_with = "round_to_3")]
    pub defects: f64,
    #[serde(serialize_with = "round_to_3")]
    pub complexity: f64,
    #[serde(serialize_with = "round_to_3")]
    pub churn: f64,
    #[serde(serialize_with = "round_to_3")]
    pub coupling: f64,
    #[serde(serialize_with = "round_to_3")]
    pub coverage: f64,
    #[serde(serialize_with = "round_to_3")]
    pub ownership: f64,
}

impl Dimensions {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Defects => self.defects,
            Dimension::Complexity => self.complexity,
            Dimension::Churn => self.churn,
            Dimension::Coupling => self.coupling,
            Dimension::Coverage => self.coverage,
            Dimension::Ownership => self.ownership,
        }
    }

    /// ディメンションと値の組を`Dimension::ALL`の順に返します
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    /// 生の値（重み付け前）が最も高いディメンションを返します
    ///
    /// 同値の場合は`Dimension::ALL`で先に現れるものが優先されます。
    pub fn primary(&self) -> Dimension {
        let mut best = (Dimension::Defects, self.defects);
        for (dimension, value) in self.iter().skip(1) {
            if value > best.1 {
                best = (dimension, value);
            }
        }
        best.0
    }

    /// クラスタリング用の6次元特徴ベクトル
    pub fn to_vector(&self) -> [f64; 6] {
        [
            self.defects,
            self.complexity,
            self.churn,
            self.coupling,
            self.coverage,
            self.ownership,
        ]
    }
}

/// スコアから導出される重大度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Severe,
    Moderate,
    Minor,
    Normal,
}

impl Severity {
    /// 修正の優先度（1が最優先）
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Critical => 1,
            Severity::Severe => 2,
            Severity::Moderate => 3,
            Severity::Minor => 4,
            Severity::Normal => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Severe => "SEVERE",
            Severity::Moderate => "MODERATE",
            Severity::Minor => "MINOR",
            Severity::Normal => "NORMAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 過去のスコアと比較した傾向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    New,
    Stable,
    Worsening,
    Improving,
}

/// ある時点でのスコアの記録
///
/// # フィールド
///
/// - `timestamp`: 記録時刻
/// - `score`: その時点の総合スコア
/// - `primary_dimension`: 生の値が最も高かったディメンション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalScore {
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "round_to_3")]
    pub score: f64,
    pub primary_dimension: Dimension,
}

/// 検出しきい値を超えたディメンション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotFactor {
    pub dimension: Dimension,
    pub weight: f64,
    #[serde(serialize_with = "round_to_3")]
    pub value: f64,
    pub threshold: f64,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductionRisk {
    Low,
    Medium,
    High,
    Critical,
}

/// ホットスポットの影響範囲の見積もり
///
/// # フィールド
///
/// - `affected_files`: ファイルが直接依存しているモジュールの数
/// - `affected_developers`: ファイルに関与した開発者（コミット数の多い順）
/// - `potential_defects`: 潜在的な欠陥数
/// - `estimated_fix_time`: 修正に必要な時間（修正計画の工数の合計）
/// - `production_risk`: 本番環境へのリスク
/// - `business_impact`: ビジネスへの影響の説明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotImpact {
    pub affected_files: usize,
    pub affected_developers: Vec<String>,
    pub potential_defects: u32,
    pub estimated_fix_time: f64,
    pub production_risk: ProductionRisk,
    pub business_impact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Refactor,
    Test,
    Document,
    Simplify,
    Split,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionImpact {
    High,
    Medium,
    Low,
}

/// 修正計画の個々のアクション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub description: String,
    /// 工数（時間）
    pub effort: f64,
    pub impact: ActionImpact,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// 優先度付きの修正計画
///
/// `estimated_effort`は常に`actions`の工数の合計と一致します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub priority: u8,
    pub actions: Vec<RemediationAction>,
    pub estimated_effort: f64,
    pub expected_improvement: f64,
    pub success_criteria: Vec<String>,
}

/// 1ファイル分の分析結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeHotspot {
    pub path: String,
    pub severity: Severity,
    #[serde(serialize_with = "round_to_3")]
    pub score: f64,
    pub dimensions: Dimensions,
    pub trend: Trend,
    pub history: Vec<HistoricalScore>,
    pub factors: Vec<HotspotFactor>,
    pub root_causes: Vec<String>,
    pub impact: HotspotImpact,
    pub remediation: RemediationPlan,
}

/// 類似したディメンション特性を持つホットスポットの集まり
///
/// # フィールド
///
/// - `centroid`: 座標平均に最も近いメンバー
/// - `density`: メンバー間の平均類似度（0-1）
/// - `common_root_cause`: メンバーの半数以上が共有する根本原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotCluster {
    pub id: String,
    pub hotspots: Vec<CodeHotspot>,
    pub centroid: CodeHotspot,
    #[serde(serialize_with = "round_to_3")]
    pub density: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_root_cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_remediation: Option<RemediationPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ProviderUnavailable,
    FileUnreadable,
    SourceUnavailable,
}

/// 分析中に吸収された障害の記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

/// プロジェクト全体の分析結果
///
/// `hotspots`はスコアの降順で、`minor`しきい値未満のファイルは含みません。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectReport {
    pub hotspots: Vec<CodeHotspot>,
    pub warnings: Vec<AnalysisWarning>,
}

/// 浮動小数点数を3桁に丸める補助関数
pub(crate) fn round_to_3<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64((*value * 1000.0).round() / 1000.0)
}
