//! ディメンションスコアの計算
//!
//! ファイルの内容と外部の提供者から得たシグナルを、6つの0-100のスコアに変換します。
//! 提供者が失敗した場合はそのディメンションを中立値（0）とし、分析は継続します。
//! カバレッジの中立値0は「完全にカバーされている」とみなすことを意味します。

use super::error::AnalyzerError;
use super::metrics::{AnalysisWarning, Dimensions, WarningKind};
use super::provider::Providers;
use log::warn;
use regex::Regex;

/// 計算に使用した生のシグナル
///
/// 提供者が失敗したシグナルは`None`になります。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSignals {
    pub branch_count: u32,
    pub import_count: u32,
    pub defect_count: Option<u32>,
    pub coverage_percent: Option<f64>,
    pub commit_count: Option<u32>,
    pub authors: Vec<(String, u32)>,
}

#[derive(Debug, Clone)]
pub struct DimensionReport {
    pub dimensions: Dimensions,
    pub signals: FileSignals,
    pub warnings: Vec<AnalysisWarning>,
}

pub struct DimensionCalculator {
    decision_points: Regex,
    imports: Regex,
}

impl DimensionCalculator {
    /// # エラー
    ///
    /// トークン検出用の正規表現のコンパイルに失敗した場合にエラーを返します
    pub fn new() -> Result<Self, AnalyzerError> {
        let decision_points = Regex::new(r"\b(?:if|else|for|while|case|catch)\b|&&|\|\|")
            .map_err(|e| AnalyzerError::InvalidPattern(e.to_string()))?;
        let imports = Regex::new(
            r#"(?m)^[ \t]*(?:import\b|from\s+\S+\s+import\b|use\s+\w|#\s*include\b|export\s.*\bfrom\s+['"]|.*\brequire\s*\()"#,
        )
        .map_err(|e| AnalyzerError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            decision_points,
            imports,
        })
    }

    /// 分岐点のトークン数（基数1を含む）
    pub fn count_branches(&self, source: &str) -> u32 {
        1 + self.decision_points.find_iter(source).count() as u32
    }

    /// import/use/include文の数
    pub fn count_imports(&self, source: &str) -> u32 {
        self.imports.find_iter(source).count() as u32
    }

    /// 1ファイル分のディメンションを計算します
    ///
    /// # 引数
    ///
    /// - `path`: プロジェクトルートからの相対パス
    /// - `source`: ファイルの内容
    /// - `providers`: 外部シグナルの提供者
    /// - `window_days`: チャーンを数える期間
    ///
    /// # 戻り値
    ///
    /// ディメンション、生のシグナル、吸収した障害の警告を返します。
    /// この関数は失敗しません。
    pub async fn calculate(
        &self,
        path: &str,
        source: &str,
        providers: &Providers,
        window_days: u32,
    ) -> DimensionReport {
        let coverage = async {
            match &providers.coverage {
                Some(provider) => Some(provider.coverage_percent(path).await),
                None => None,
            }
        };
        let (defects, coverage, vcs) = tokio::join!(
            providers.defects.defect_count(path),
            coverage,
            providers.vcs.metrics(path, window_days),
        );

        let mut warnings = Vec::new();
        let mut signals = FileSignals {
            branch_count: self.count_branches(source),
            import_count: self.count_imports(source),
            ..Default::default()
        };

        match defects {
            Ok(count) => signals.defect_count = Some(count),
            Err(e) => warnings.push(unavailable("defect", path, e)),
        }
        match coverage {
            Some(Ok(percent)) => signals.coverage_percent = Some(percent),
            Some(Err(e)) => warnings.push(unavailable("coverage", path, e)),
            None => {}
        }
        match vcs {
            Ok(metrics) => {
                signals.commit_count = Some(metrics.commit_count);
                signals.authors = metrics.author_distribution;
            }
            Err(e) => warnings.push(unavailable("vcs", path, e)),
        }

        DimensionReport {
            dimensions: dimensions_from(&signals),
            signals,
            warnings,
        }
    }
}

/// シグナルからディメンションを算出します
pub fn dimensions_from(signals: &FileSignals) -> Dimensions {
    Dimensions {
        defects: signals.defect_count.map(defects_score).unwrap_or(0.0),
        complexity: complexity_score(signals.branch_count),
        churn: signals.commit_count.map(churn_score).unwrap_or(0.0),
        coupling: coupling_score(signals.import_count),
        coverage: signals.coverage_percent.map(coverage_score).unwrap_or(0.0),
        ownership: if signals.commit_count.is_some() {
            ownership_score(&signals.authors)
        } else {
            0.0
        },
    }
}

pub fn defects_score(defect_count: u32) -> f64 {
    (defect_count as f64 * 10.0).min(100.0)
}

pub fn complexity_score(branch_count: u32) -> f64 {
    (branch_count as f64 / 50.0 * 100.0).min(100.0)
}

pub fn churn_score(commit_count: u32) -> f64 {
    (commit_count as f64 / 10.0 * 100.0).min(100.0)
}

pub fn coupling_score(import_count: u32) -> f64 {
    (import_count as f64 / 20.0 * 100.0).min(100.0)
}

/// カバーされていない割合がそのままスコアになります
pub fn coverage_score(coverage_percent: f64) -> f64 {
    if !coverage_percent.is_finite() {
        return 0.0;
    }
    100.0 - coverage_percent.clamp(0.0, 100.0)
}

/// 最も多くコミットした開発者の割合（%）
pub fn ownership_score(authors: &[(String, u32)]) -> f64 {
    let total: u32 = authors.iter().map(|(_, commits)| commits).sum();
    if total == 0 {
        return 0.0;
    }
    let top = authors.iter().map(|(_, commits)| *commits).max().unwrap_or(0);
    top as f64 / total as f64 * 100.0
}

fn unavailable(provider: &'static str, path: &str, error: anyhow::Error) -> AnalysisWarning {
    let error = AnalyzerError::ProviderUnavailable {
        provider,
        path: path.to_string(),
        message: format!("{:#}", error),
    };
    warn!("{}", error);
    AnalysisWarning {
        path: Some(path.to_string()),
        kind: WarningKind::ProviderUnavailable,
        message: error.to_string(),
    }
}
