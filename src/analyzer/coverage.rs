//! LCOVレポートからのカバレッジ取得

use super::provider::CoverageProvider;
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
struct LineCounts {
    found: u32,
    hit: u32,
}

/// 1レコード分の集計
///
/// LF/LHが無いレポートではDA行から数えた値を使います。
#[derive(Debug, Default)]
struct RecordCounts {
    summary: LineCounts,
    lines: LineCounts,
}

impl RecordCounts {
    fn finish(&self) -> LineCounts {
        if self.summary.found == 0 && self.lines.found > 0 {
            self.lines
        } else {
            self.summary
        }
    }
}

/// LCOVレポートを読み込んだカバレッジ提供者
///
/// レポートに含まれないファイルは提供者の失敗として扱われます。
#[derive(Debug, Default)]
pub struct LcovCoverageProvider {
    files: HashMap<String, LineCounts>,
}

impl LcovCoverageProvider {
    /// # 引数
    ///
    /// - `report`: LCOVファイルのパス
    /// - `project_root`: SFレコードの絶対パスから取り除く接頭辞
    pub fn open(report: impl AsRef<Path>, project_root: impl AsRef<Path>) -> anyhow::Result<Self> {
        use lcov::{Reader, Record};

        let report = report.as_ref();
        let root = resolve(project_root.as_ref());
        let reader = Reader::open_file(report)
            .with_context(|| format!("Failed to open LCOV file: {}", report.display()))?;

        let mut files = HashMap::new();
        let mut current: Option<String> = None;
        let mut counts = RecordCounts::default();

        for record in reader {
            let record = record.with_context(|| "Failed to parse LCOV record")?;
            match record {
                Record::SourceFile { path } => {
                    current = Some(normalize(&path, &root));
                    counts = RecordCounts::default();
                }
                Record::LineData { count, .. } => {
                    counts.lines.found += 1;
                    if count > 0 {
                        counts.lines.hit += 1;
                    }
                }
                Record::LinesFound { found } => counts.summary.found = found,
                Record::LinesHit { hit } => counts.summary.hit = hit,
                Record::EndOfRecord => {
                    if let Some(file) = current.take() {
                        files.insert(file, counts.finish());
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Loaded coverage for {} files from {}",
            files.len(),
            report.display()
        );
        Ok(Self { files })
    }
}

/// 存在するパスはシンボリックリンクと相対指定を解決した絶対パスにします
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// プロジェクトルートからの相対パス（区切り文字は'/'）
///
/// `./`や先頭の`/`は取り除かれます。
fn normalize(path: &Path, root: &Path) -> String {
    let resolved = if path.is_absolute() {
        resolve(path)
    } else {
        path.to_path_buf()
    };
    let relative = resolved
        .strip_prefix(root)
        .or_else(|_| path.strip_prefix(root))
        .unwrap_or(resolved.as_path());

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl CoverageProvider for LcovCoverageProvider {
    async fn coverage_percent(&self, path: &str) -> anyhow::Result<f64> {
        let counts = self
            .files
            .get(path)
            .with_context(|| format!("no coverage data for {}", path))?;
        if counts.found == 0 {
            return Ok(100.0);
        }
        Ok(counts.hit as f64 / counts.found as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const REPORT: &str = "TN:
SF:/work/project/src/lib.rs
DA:1,1
DA:2,0
LF:4
LH:3
end_of_record
SF:src/empty.rs
LF:0
LH:0
end_of_record
";

    #[tokio::test]
    async fn test_coverage_from_lcov() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("lcov.info");
        fs::write(&report, REPORT).unwrap();

        let provider = LcovCoverageProvider::open(&report, "/work/project").unwrap();

        assert_eq!(provider.coverage_percent("src/lib.rs").await.unwrap(), 75.0);
        assert_eq!(provider.coverage_percent("src/empty.rs").await.unwrap(), 100.0);
        assert!(provider.coverage_percent("src/missing.rs").await.is_err());
    }

    #[tokio::test]
    async fn test_relative_root_matches_absolute_and_dotted_paths() {
        let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("lcov.info");
        fs::write(
            &report,
            format!(
                "SF:{}\nLF:4\nLH:1\nend_of_record\nSF:./src/b.rs\nLF:2\nLH:2\nend_of_record\n",
                cwd.join("generated/a.rs").display()
            ),
        )
        .unwrap();

        let provider = LcovCoverageProvider::open(&report, ".").unwrap();

        assert_eq!(provider.coverage_percent("generated/a.rs").await.unwrap(), 25.0);
        assert_eq!(provider.coverage_percent("src/b.rs").await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_line_data_without_summary() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("lcov.info");
        fs::write(
            &report,
            "SF:src/a.rs\nDA:1,0\nDA:2,1\nend_of_record\nSF:src/b.rs\nDA:1,0\nDA:2,0\nend_of_record\n",
        )
        .unwrap();

        let provider = LcovCoverageProvider::open(&report, dir.path()).unwrap();

        assert_eq!(provider.coverage_percent("src/a.rs").await.unwrap(), 50.0);
        assert_eq!(provider.coverage_percent("src/b.rs").await.unwrap(), 0.0);
    }

    #[test]
    fn test_normalize() {
        let root = Path::new("/work/project");
        assert_eq!(normalize(Path::new("/work/project/src/a.rs"), root), "src/a.rs");
        assert_eq!(normalize(Path::new("./src/a.rs"), root), "src/a.rs");
        assert_eq!(normalize(Path::new("/elsewhere/a.rs"), root), "elsewhere/a.rs");
    }

    #[test]
    fn test_open_missing_report() {
        assert!(LcovCoverageProvider::open("/nonexistent/lcov.info", "/").is_err());
    }
}
