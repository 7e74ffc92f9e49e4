//! コードのホットスポット分析ツール
//!
//! このクレートは、ファイルごとの欠陥数・複雑度・チャーン・結合度・カバレッジ・所有権を
//! 組み合わせてリスクスコアを算出し、不具合を引き起こしやすいファイル（ホットスポット）を
//! 特定するための機能を提供します。
//!
//! # 主な機能
//!
//! - 6つのディメンションによる重み付きスコアと重大度の算出
//! - 実行をまたいだスコアの傾向の追跡
//! - 要因・根本原因・影響範囲の抽出と修正計画の作成
//! - 類似したホットスポットのクラスタリング
//! - ヒートマップの生成
//!
//! # 使用例
//!
//! ```no_run
//! use hotspot_analyzer::analyzer::{AnalyzerConfig, GitRepository, Providers};
//! use hotspot_analyzer::HotspotAnalyzer;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), hotspot_analyzer::analyzer::AnalyzerError> {
//! let repo = Arc::new(GitRepository::open(
//!     "path/to/repo",
//!     vec!["**/*.rs".to_string()],
//!     vec!["**/target/**".to_string()],
//!     false,
//! )?);
//! let providers = Providers {
//!     source: repo.clone(),
//!     defects: repo.clone(),
//!     coverage: None,
//!     vcs: repo,
//! };
//! let config = AnalyzerConfig {
//!     project_root: "path/to/repo".into(),
//!     ..Default::default()
//! };
//!
//! let analyzer = HotspotAnalyzer::new(config, providers)?;
//! let report = analyzer.analyze_project().await;
//! let clusters = analyzer.cluster_hotspots(&report.hotspots);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub use analyzer::HotspotAnalyzer;
