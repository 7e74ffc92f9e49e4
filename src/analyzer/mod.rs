//! ホットスポット分析の中核となるモジュール
//!
//! このモジュールは、ファイルごとのシグナルからリスクスコアを算出し、
//! 傾向・クラスタ・修正計画を導くための主要なコンポーネントを提供します。
//! 1ファイルの分析は以下の流れで行われます：
//!
//! 1. ディメンションの計算（欠陥、複雑度、チャーン、結合度、カバレッジ、所有権）
//! 2. 総合スコアと重大度の算出
//! 3. 要因と根本原因の抽出
//! 4. 修正計画の作成と影響範囲の見積もり
//! 5. 傾向の判定と履歴への追加
//!
//! 履歴への追加は最後に同期的に行われるため、途中でキャンセルされた分析が
//! 履歴を部分的に書き換えることはありません。
//!
//! # 主要なコンポーネント
//!
//! - `HotspotAnalyzer`: 分析プロセス全体を制御する主要なクラス
//! - `CodeHotspot`: 個々のファイルの分析結果を保持する構造体
//! - `HotspotHistoryStore`: パスごとのスコア履歴

mod cluster;
mod config;
mod coverage;
mod defects;
mod dimensions;
mod error;
mod factors;
mod git;
mod heatmap;
mod history;
mod impact;
mod metrics;
mod provider;
mod remediation;
mod scoring;

pub use cluster::ClusterEngine;
pub use config::{
    AnalyzerConfig, ClusteringAlgorithm, DetectionThresholds, DimensionWeights,
    SeverityThresholds,
};
pub use coverage::LcovCoverageProvider;
pub use defects::CsvDefectProvider;
pub use dimensions::{DimensionCalculator, FileSignals};
pub use error::AnalyzerError;
pub use factors::{FactorIdentifier, RootCauseAnalyzer};
pub use git::{GitRepository, PathFilter, DEFECT_WINDOW_DAYS};
pub use heatmap::{Granularity, HeatMap, HeatMapGenerator, HeatMapPoint};
pub use history::{HotspotHistoryStore, TrendTracker, HISTORY_LIMIT};
pub use impact::ImpactAssessor;
pub use metrics::{
    ActionImpact, ActionType, AnalysisWarning, CodeHotspot, Dimension, Dimensions,
    HistoricalScore, HotspotCluster, HotspotFactor, HotspotImpact, ProductionRisk,
    ProjectReport, RemediationAction, RemediationPlan, Severity, Trend, WarningKind,
};
pub use provider::{
    CoverageProvider, DefectProvider, Providers, SourceProvider, StaticSourceProvider,
    Unavailable, VcsMetrics, VcsMetricsProvider,
};
pub use remediation::RemediationPlanner;
pub use scoring::ScoreAggregator;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;

/// ホットスポット分析を実行するメインの構造体
///
/// # フィールド
///
/// - `config`: 検証済みの設定
/// - `providers`: 外部シグナルの提供者
/// - `history`: パスごとのスコア履歴（インスタンスが所有）
pub struct HotspotAnalyzer {
    config: AnalyzerConfig,
    providers: Providers,
    history: Arc<HotspotHistoryStore>,
    calculator: DimensionCalculator,
    aggregator: ScoreAggregator,
    trends: TrendTracker,
    factors: FactorIdentifier,
    clusters: ClusterEngine,
    heat_maps: HeatMapGenerator,
}

impl HotspotAnalyzer {
    /// 空の履歴で新しいHotspotAnalyzerインスタンスを作成します
    ///
    /// # エラー
    ///
    /// 設定が不正な場合に`AnalyzerError::InvalidConfiguration`を返します
    pub fn new(config: AnalyzerConfig, providers: Providers) -> Result<Self, AnalyzerError> {
        Self::with_history(config, providers, Arc::new(HotspotHistoryStore::new()))
    }

    /// 既存の履歴を使ってインスタンスを作成します
    ///
    /// # 引数
    ///
    /// - `config`: 分析の設定
    /// - `providers`: 外部シグナルの提供者
    /// - `history`: 傾向の判定に使う履歴
    ///
    /// # エラー
    ///
    /// 以下の場合にエラーを返します：
    /// - 設定が検証に通らない
    /// - トークン検出用の正規表現のコンパイルに失敗
    pub fn with_history(
        config: AnalyzerConfig,
        providers: Providers,
        history: Arc<HotspotHistoryStore>,
    ) -> Result<Self, AnalyzerError> {
        config.validate()?;

        let aggregator = ScoreAggregator::new(config.dimension_weights, config.severity_thresholds);
        Ok(Self {
            calculator: DimensionCalculator::new()?,
            aggregator,
            trends: TrendTracker::new(config.trend_delta),
            factors: FactorIdentifier::new(config.dimension_weights, config.detection_thresholds),
            clusters: ClusterEngine::new(
                config.clustering_algorithm,
                config.min_cluster_size,
                config.dbscan_epsilon,
            ),
            heat_maps: HeatMapGenerator::new(aggregator, config.module_depth, config.package_depth),
            config,
            providers,
            history,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn history(&self) -> &HotspotHistoryStore {
        &self.history
    }

    /// プロジェクト全体を分析します
    ///
    /// # 戻り値
    ///
    /// `minor`しきい値以上のホットスポットをスコアの降順で返します。
    /// 読み込めないファイルや提供者の障害は警告として記録され、分析は中断しません。
    pub async fn analyze_project(&self) -> ProjectReport {
        let files = match self.providers.source.source_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Source provider failed: {:#}", e);
                return ProjectReport {
                    hotspots: Vec::new(),
                    warnings: vec![AnalysisWarning {
                        path: None,
                        kind: WarningKind::SourceUnavailable,
                        message: format!("{:#}", e),
                    }],
                };
            }
        };
        info!("Analyzing {} files", files.len());

        let results: Vec<_> = stream::iter(files)
            .map(|path| async move {
                let (result, warnings) = self.analyze(&path).await;
                (path, result, warnings)
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let mut report = ProjectReport::default();
        for (path, result, warnings) in results {
            report.warnings.extend(warnings);
            match result {
                Ok(hotspot) if self.aggregator.is_reportable(hotspot.score) => {
                    report.hotspots.push(hotspot)
                }
                Ok(hotspot) => debug!(
                    "{} scored {:.1}, below reporting threshold",
                    path, hotspot.score
                ),
                Err(e) => {
                    warn!("Skipping {}: {}", path, e);
                    report.warnings.push(AnalysisWarning {
                        path: Some(path),
                        kind: WarningKind::FileUnreadable,
                        message: e.to_string(),
                    });
                }
            }
        }

        report.hotspots.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.path.cmp(&b.path))
        });
        info!(
            "Found {} hotspots ({} warnings)",
            report.hotspots.len(),
            report.warnings.len()
        );
        report
    }

    /// 1ファイルを分析します
    ///
    /// 提供者の障害は中立値で補われます。
    ///
    /// # エラー
    ///
    /// ファイルを読み込めない場合に`AnalyzerError::FileUnreadable`を返します
    pub async fn analyze_file(&self, path: &str) -> Result<CodeHotspot, AnalyzerError> {
        self.analyze(path).await.0
    }

    async fn analyze(
        &self,
        path: &str,
    ) -> (Result<CodeHotspot, AnalyzerError>, Vec<AnalysisWarning>) {
        let full_path = self.config.project_root.join(path);
        let source = match tokio::fs::read_to_string(&full_path).await {
            Ok(source) => source,
            Err(source) => {
                let error = AnalyzerError::FileUnreadable {
                    path: path.to_string(),
                    source,
                };
                return (Err(error), Vec::new());
            }
        };

        let report = self
            .calculator
            .calculate(
                path,
                &source,
                &self.providers,
                self.config.historical_window_days,
            )
            .await;
        let dimensions = report.dimensions;

        let score = self.aggregator.score(&dimensions);
        let severity = self.aggregator.severity(score);
        let factors = self.factors.identify(&dimensions);
        let root_causes = RootCauseAnalyzer.analyze(&dimensions);
        let remediation = RemediationPlanner.plan(path, severity, &factors);
        let impact = ImpactAssessor.assess(&dimensions, &report.signals, &remediation);

        // ここから先は中断点がない
        let (trend, history) = self.history.record(
            path,
            &self.trends,
            HistoricalScore {
                timestamp: Utc::now(),
                score,
                primary_dimension: dimensions.primary(),
            },
        );
        debug!("{}: score {:.1} ({}, {:?})", path, score, severity, trend);

        let hotspot = CodeHotspot {
            path: path.to_string(),
            severity,
            score,
            dimensions,
            trend,
            history,
            factors,
            root_causes,
            impact,
            remediation,
        };
        (Ok(hotspot), report.warnings)
    }

    /// 類似したディメンション特性を持つホットスポットをまとめます
    pub fn cluster_hotspots(&self, hotspots: &[CodeHotspot]) -> Vec<HotspotCluster> {
        self.clusters.cluster(hotspots)
    }

    pub fn generate_heat_map(&self, hotspots: &[CodeHotspot], granularity: Granularity) -> HeatMap {
        self.heat_maps.generate(hotspots, granularity)
    }
}
