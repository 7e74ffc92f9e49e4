//! 分析の設定
//!
//! 設定はTOMLから読み込むことができ、`HotspotAnalyzer::new`の時点で検証されます。
//! 不正な設定は分析を始める前にエラーとなります。

use super::error::AnalyzerError;
use super::metrics::Dimension;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 重大度のしきい値（critical > severe > moderate > minor）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub severe: f64,
    pub moderate: f64,
    pub minor: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 80.0,
            severe: 60.0,
            moderate: 40.0,
            minor: 20.0,
        }
    }
}

/// ディメンションごとの重み
///
/// テーブルを指定する場合は全てのキーが必須です。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionWeights {
    pub defects: f64,
    pub complexity: f64,
    pub churn: f64,
    pub coupling: f64,
    pub coverage: f64,
    pub ownership: f64,
}

impl DimensionWeights {
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

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.get(*d)).sum()
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            defects: 0.30,
            complexity: 0.25,
            churn: 0.20,
            coupling: 0.10,
            coverage: 0.10,
            ownership: 0.05,
        }
    }
}

/// 要因として検出するしきい値（この値を超えると要因になる）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionThresholds {
    pub defects: f64,
    pub complexity: f64,
    pub churn: f64,
    pub coupling: f64,
    pub coverage: f64,
    pub ownership: f64,
}

impl DetectionThresholds {
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
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            defects: 30.0,
            complexity: 50.0,
            churn: 40.0,
            coupling: 50.0,
            coverage: 50.0,
            ownership: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringAlgorithm {
    #[default]
    Kmeans,
    Dbscan,
}

/// アナライザー全体の設定
///
/// # フィールド
///
/// - `project_root`: ソースファイルを読み込む基準ディレクトリ
/// - `historical_window_days`: チャーンを数える期間（日数）
/// - `trend_delta`: 傾向を悪化/改善と判定するスコア差
/// - `min_cluster_size`: クラスタとして残す最小メンバー数
/// - `dbscan_epsilon`: DBSCANの近傍半径（0-100の特徴空間での距離）
/// - `max_concurrency`: 同時に分析するファイル数
/// - `module_depth` / `package_depth`: ヒートマップ集約時のディレクトリ深さ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub project_root: PathBuf,
    pub historical_window_days: u32,
    pub severity_thresholds: SeverityThresholds,
    pub dimension_weights: DimensionWeights,
    pub detection_thresholds: DetectionThresholds,
    pub trend_delta: f64,
    pub clustering_algorithm: ClusteringAlgorithm,
    pub min_cluster_size: usize,
    pub dbscan_epsilon: f64,
    pub max_concurrency: usize,
    pub module_depth: usize,
    pub package_depth: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            historical_window_days: 30,
            severity_thresholds: SeverityThresholds::default(),
            dimension_weights: DimensionWeights::default(),
            detection_thresholds: DetectionThresholds::default(),
            trend_delta: 10.0,
            clustering_algorithm: ClusteringAlgorithm::default(),
            min_cluster_size: 3,
            dbscan_epsilon: 25.0,
            max_concurrency: 8,
            module_depth: 2,
            package_depth: 1,
        }
    }
}

impl AnalyzerConfig {
    /// TOML文字列から設定を読み込み、検証します
    pub fn from_toml_str(content: &str) -> Result<Self, AnalyzerError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AnalyzerError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// TOMLファイルから設定を読み込みます
    ///
    /// # エラー
    ///
    /// 以下の場合にエラーを返します：
    /// - ファイルの読み込みに失敗
    /// - TOMLの解析に失敗、または未知のキーや欠けた重みがある
    /// - 設定値が検証に通らない
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| AnalyzerError::FileUnreadable {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    /// 設定値を検証します
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        let t = &self.severity_thresholds;
        let ordered = [t.critical, t.severe, t.moderate, t.minor];
        if ordered.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 100.0) {
            return Err(invalid(format!(
                "severity thresholds must lie within [0, 100], got {:?}",
                ordered
            )));
        }
        if !ordered.windows(2).all(|w| w[0] > w[1]) {
            return Err(invalid(format!(
                "severity thresholds must be strictly decreasing (critical > severe > moderate > minor), got {:?}",
                ordered
            )));
        }

        for dimension in Dimension::ALL {
            let weight = self.dimension_weights.get(dimension);
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!(
                    "weight for {} must be a non-negative number, got {}",
                    dimension, weight
                )));
            }
            let threshold = self.detection_thresholds.get(dimension);
            if !threshold.is_finite() {
                return Err(invalid(format!(
                    "detection threshold for {} must be finite",
                    dimension
                )));
            }
        }
        let sum = self.dimension_weights.sum();
        if sum <= 0.0 {
            return Err(invalid("dimension weights must not all be zero".to_string()));
        }
        if (sum - 1.0).abs() > 0.01 {
            warn!(
                "dimension weights sum to {:.3}; scores will be clamped to [0, 100]",
                sum
            );
        }

        if self.min_cluster_size == 0 {
            return Err(invalid("min_cluster_size must be positive".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency must be positive".to_string()));
        }
        if !self.trend_delta.is_finite() || self.trend_delta < 0.0 {
            return Err(invalid("trend_delta must be a non-negative number".to_string()));
        }
        if !self.dbscan_epsilon.is_finite() || self.dbscan_epsilon <= 0.0 {
            return Err(invalid("dbscan_epsilon must be positive".to_string()));
        }
        if self.module_depth == 0 || self.package_depth == 0 {
            return Err(invalid(
                "module_depth and package_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid(message: String) -> AnalyzerError {
    AnalyzerError::InvalidConfiguration(message)
}
