//! 外部シグナルの提供者インターフェース
//!
//! ソースファイルの列挙、欠陥数、カバレッジ、バージョン管理のメトリクスは
//! このモジュールのトレイトを通してのみ取得します。
//! 実装はこのクレートの`git`、`coverage`、`defects`モジュールにあるほか、
//! テストではモックに差し替えることができます。

use async_trait::async_trait;
use std::sync::Arc;

/// 分析対象のソースファイルを列挙する
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// プロジェクトルートからの相対パスを順序付きで返します
    async fn source_files(&self) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
pub trait DefectProvider: Send + Sync {
    async fn defect_count(&self, path: &str) -> anyhow::Result<u32>;
}

#[async_trait]
pub trait CoverageProvider: Send + Sync {
    /// 行カバレッジ（0-100）
    async fn coverage_percent(&self, path: &str) -> anyhow::Result<f64>;
}

/// バージョン管理から得られるファイルごとのメトリクス
///
/// # フィールド
///
/// - `commit_count`: 期間内のコミット数
/// - `author_distribution`: 開発者ごとのコミット数（多い順）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcsMetrics {
    pub commit_count: u32,
    pub author_distribution: Vec<(String, u32)>,
}

#[async_trait]
pub trait VcsMetricsProvider: Send + Sync {
    async fn metrics(&self, path: &str, window_days: u32) -> anyhow::Result<VcsMetrics>;
}

/// アナライザーが利用する提供者の組
///
/// カバレッジレポートが設定されていない場合は`coverage`を`None`にします。
/// その場合カバレッジのディメンションは警告なしで中立値になります。
#[derive(Clone)]
pub struct Providers {
    pub source: Arc<dyn SourceProvider>,
    pub defects: Arc<dyn DefectProvider>,
    pub coverage: Option<Arc<dyn CoverageProvider>>,
    pub vcs: Arc<dyn VcsMetricsProvider>,
}

/// 固定のファイル一覧を返す提供者
#[derive(Debug, Clone, Default)]
pub struct StaticSourceProvider {
    files: Vec<String>,
}

impl StaticSourceProvider {
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl SourceProvider for StaticSourceProvider {
    async fn source_files(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.files.clone())
    }
}

/// シグナルが存在しないことを表す提供者
///
/// 全ての問い合わせに失敗するため、該当ディメンションは中立値になります。
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl DefectProvider for Unavailable {
    async fn defect_count(&self, _path: &str) -> anyhow::Result<u32> {
        anyhow::bail!("no defect data configured")
    }
}

#[async_trait]
impl CoverageProvider for Unavailable {
    async fn coverage_percent(&self, _path: &str) -> anyhow::Result<f64> {
        anyhow::bail!("no coverage report configured")
    }
}

#[async_trait]
impl VcsMetricsProvider for Unavailable {
    async fn metrics(&self, _path: &str, _window_days: u32) -> anyhow::Result<VcsMetrics> {
        anyhow::bail!("no version control data configured")
    }
}
