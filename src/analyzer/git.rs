//! Gitリポジトリとの対話を担当するモジュール
//!
//! このモジュールは、libgit2を使用してGitリポジトリから分析対象のファイルと
//! コミット履歴を取得し、ソース・バージョン管理・欠陥の各提供者として振る舞います。
//! コミット履歴の走査はブロッキング処理のため`spawn_blocking`上で実行し、
//! 結果は期間ごとに一度だけ索引化してキャッシュします。

use super::error::AnalyzerError;
use super::provider::{DefectProvider, SourceProvider, VcsMetrics, VcsMetricsProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use git2::{Commit, ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use log::{debug, info};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// 修正コミットとみなすメッセージのパターン
const FIX_PATTERN: &str = r"(?i)\b(?:fix(?:e[sd])?|bug|defect|hotfix)\b";

/// 欠陥数を数える期間（日数）
pub const DEFECT_WINDOW_DAYS: u32 = 365;

/// 分析対象のファイルパターン
///
/// # フィールド
///
/// - `include_patterns`: 分析対象とするファイルパターン（空なら全て対象）
/// - `exclude_patterns`: 分析から除外するファイルパターン
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include_patterns: Vec<Regex>,
    exclude_patterns: Vec<Regex>,
}

impl PathFilter {
    /// globパターンから作成します
    ///
    /// # エラー
    ///
    /// パターンの正規表現への変換に失敗した場合にエラーを返します
    pub fn new(
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
    ) -> Result<Self, AnalyzerError> {
        Ok(Self {
            include_patterns: compile(include_patterns)?,
            exclude_patterns: compile(exclude_patterns)?,
        })
    }

    /// 指定されたファイルパスが分析対象に含まれるかどうかを判定します
    pub fn should_include_file(&self, file_path: &str) -> bool {
        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(file_path))
        {
            return false;
        }

        if self.include_patterns.is_empty() {
            return true;
        }

        self.include_patterns
            .iter()
            .any(|pattern| pattern.is_match(file_path))
    }
}

fn compile(patterns: Vec<String>) -> Result<Vec<Regex>, AnalyzerError> {
    patterns
        .into_iter()
        .map(|p| Regex::new(&glob_to_regex(&p)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AnalyzerError::InvalidPattern(e.to_string()))
}

/// コミット情報を保持する構造体
///
/// # フィールド
///
/// - `author`: コミット作成者の名前
/// - `files`: コミットで変更されたファイルのリスト
/// - `is_fix`: メッセージが修正コミットのパターンに一致するか
#[derive(Debug)]
struct CommitInfo {
    author: String,
    files: Vec<String>,
    is_fix: bool,
}

/// ファイルごとの変更統計
///
/// # フィールド
///
/// - `revisions`: 期間内の変更回数
/// - `fix_revisions`: そのうち修正コミットの回数
/// - `author_commits`: 開発者ごとのコミット回数
#[derive(Debug, Default, Clone)]
struct FileStats {
    revisions: u32,
    fix_revisions: u32,
    author_commits: HashMap<String, u32>,
}

impl FileStats {
    /// 開発者の分布はコミット数の多い順（同数なら名前順）
    fn to_metrics(&self) -> VcsMetrics {
        let mut author_distribution: Vec<(String, u32)> = self
            .author_commits
            .iter()
            .map(|(author, commits)| (author.clone(), *commits))
            .collect();
        author_distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        VcsMetrics {
            commit_count: self.revisions,
            author_distribution,
        }
    }
}

type HistoryIndex = HashMap<String, FileStats>;

/// Gitリポジトリへのアクセスを管理する構造体
///
/// # フィールド
///
/// - `repo`: libgit2のリポジトリハンドル
/// - `filter`: 分析対象のファイルパターン
/// - `include_merge_commits`: マージコミットを含めるかどうかのフラグ
/// - `indexes`: 期間（日数）ごとのファイル統計のキャッシュ
pub struct GitRepository {
    repo: Arc<Mutex<Repository>>,
    filter: Arc<PathFilter>,
    include_merge_commits: bool,
    fix_pattern: Regex,
    indexes: tokio::sync::Mutex<HashMap<u32, Arc<HistoryIndex>>>,
}

impl GitRepository {
    /// 指定されたパスのGitリポジトリをオープンします
    ///
    /// # 引数
    ///
    /// - `path`: Gitリポジトリのパス
    /// - `include_patterns`: 分析対象とするファイルパターン
    /// - `exclude_patterns`: 分析から除外するファイルパターン
    /// - `include_merge_commits`: マージコミットを含めるかどうか
    ///
    /// # エラー
    ///
    /// 以下の場合にエラーを返します：
    /// - リポジトリのオープンに失敗
    /// - パターンの正規表現への変換に失敗
    pub fn open(
        path: impl AsRef<Path>,
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
        include_merge_commits: bool,
    ) -> Result<Self, AnalyzerError> {
        let repo = Repository::open(path)?;
        let filter = PathFilter::new(include_patterns, exclude_patterns)?;
        let fix_pattern =
            Regex::new(FIX_PATTERN).map_err(|e| AnalyzerError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            repo: Arc::new(Mutex::new(repo)),
            filter: Arc::new(filter),
            include_merge_commits,
            fix_pattern,
            indexes: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    /// 指定された期間のファイル統計を返します（初回のみ履歴を走査）
    async fn index(&self, window_days: u32) -> Result<Arc<HistoryIndex>, AnalyzerError> {
        let mut indexes = self.indexes.lock().await;
        if let Some(index) = indexes.get(&window_days) {
            return Ok(Arc::clone(index));
        }

        let repo = Arc::clone(&self.repo);
        let filter = Arc::clone(&self.filter);
        let fix_pattern = self.fix_pattern.clone();
        let include_merges = self.include_merge_commits;
        let since = Utc::now() - chrono::Duration::days(window_days as i64);

        let index = tokio::task::spawn_blocking(move || {
            let repo = repo.lock();
            let commits = get_commits_since(&repo, &filter, &fix_pattern, include_merges, since)?;
            Ok::<_, AnalyzerError>(build_index(commits))
        })
        .await
        .map_err(|e| AnalyzerError::AnalysisError(format!("History scan failed: {}", e)))??;

        info!(
            "Indexed {} files changed in the last {} days",
            index.len(),
            window_days
        );
        let index = Arc::new(index);
        indexes.insert(window_days, Arc::clone(&index));
        Ok(index)
    }
}

#[async_trait]
impl SourceProvider for GitRepository {
    async fn source_files(&self) -> anyhow::Result<Vec<String>> {
        let repo = Arc::clone(&self.repo);
        let filter = Arc::clone(&self.filter);
        let files = tokio::task::spawn_blocking(move || tracked_files(&repo.lock(), &filter))
            .await??;
        debug!("{} tracked files match the source patterns", files.len());
        Ok(files)
    }
}

#[async_trait]
impl VcsMetricsProvider for GitRepository {
    async fn metrics(&self, path: &str, window_days: u32) -> anyhow::Result<VcsMetrics> {
        let index = self.index(window_days).await?;
        Ok(index
            .get(path)
            .map(FileStats::to_metrics)
            .unwrap_or_default())
    }
}

/// 直近`DEFECT_WINDOW_DAYS`日間の修正コミットの数を欠陥数とみなします
#[async_trait]
impl DefectProvider for GitRepository {
    async fn defect_count(&self, path: &str) -> anyhow::Result<u32> {
        let index = self.index(DEFECT_WINDOW_DAYS).await?;
        Ok(index.get(path).map_or(0, |stats| stats.fix_revisions))
    }
}

/// HEADのツリーから対象ファイルを列挙します
fn tracked_files(repo: &Repository, filter: &PathFilter) -> Result<Vec<String>, AnalyzerError> {
    let tree = repo.head()?.peel_to_tree()?;

    let mut files = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            if let Some(name) = entry.name() {
                let path = format!("{}{}", root, name);
                if filter.should_include_file(&path) {
                    files.push(path);
                }
            }
        }
        TreeWalkResult::Ok
    })?;

    Ok(files)
}

/// 指定された日時以降のコミット情報を取得します
fn get_commits_since(
    repo: &Repository,
    filter: &PathFilter,
    fix_pattern: &Regex,
    include_merge_commits: bool,
    since: DateTime<Utc>,
) -> Result<Vec<CommitInfo>, AnalyzerError> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;
    revwalk.set_sorting(git2::Sort::TIME)?;

    let mut commits = Vec::new();
    for oid in revwalk {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;

        let commit_time = DateTime::from_timestamp(commit.time().seconds(), 0).ok_or_else(|| {
            AnalyzerError::AnalysisError("Invalid commit timestamp".to_string())
        })?;

        // 指定された日時より前のコミットはスキップ
        if commit_time < since {
            continue;
        }

        if !include_merge_commits && commit.parent_count() > 1 {
            continue;
        }

        let author = commit.author().name().unwrap_or("unknown").to_string();
        let is_fix = commit
            .message()
            .map_or(false, |message| fix_pattern.is_match(message));

        let files: Vec<String> = get_changed_files(repo, &commit)?
            .into_iter()
            .filter(|file_path| filter.should_include_file(file_path))
            .collect();

        if !files.is_empty() {
            commits.push(CommitInfo {
                author,
                files,
                is_fix,
            });
        }
    }

    Ok(commits)
}

fn get_changed_files(repo: &Repository, commit: &Commit) -> Result<Vec<String>, AnalyzerError> {
    let tree = commit.tree()?;
    let parent_tree = commit.parent(0).ok().and_then(|parent| parent.tree().ok());

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

    let mut files = Vec::new();
    for delta in diff.deltas() {
        if let Some(path) = delta.new_file().path() {
            if let Some(path_str) = path.to_str() {
                files.push(path_str.to_string());
            }
        }
    }

    Ok(files)
}

fn build_index(commits: Vec<CommitInfo>) -> HistoryIndex {
    let mut index = HistoryIndex::new();
    for commit in commits {
        for file_path in commit.files {
            let stats = index.entry(file_path).or_default();
            stats.revisions += 1;
            if commit.is_fix {
                stats.fix_revisions += 1;
            }
            *stats
                .author_commits
                .entry(commit.author.clone())
                .or_insert(0) += 1;
        }
    }
    index
}

fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::new();
    regex.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        // ルート直下も含めてディレクトリをまたぐ
                        regex.push_str("(?:.*/)?");
                    } else {
                        regex.push_str(".*");
                    }
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            '.' => regex.push_str("\\."),
            '/' => regex.push('/'),
            c if c.is_alphanumeric() => regex.push(c),
            _ => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Signature, Time};
    use std::fs;

    const DAY: i64 = 24 * 60 * 60;

    /// テスト用のリポジトリにコミットを作成します
    fn commit(
        repo: &Repository,
        files: &[(&str, &str)],
        author: &str,
        message: &str,
        days_ago: i64,
    ) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = workdir.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let time = Time::new(Utc::now().timestamp() - days_ago * DAY, 0);
        let sig = Signature::new(author, &format!("{}@example.com", author), &time).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit(&repo, &[("src/old.rs", "fn old() {}")], "carol", "initial import", 400);
        commit(
            &repo,
            &[("src/lib.rs", "pub mod a;"), ("README.md", "# x")],
            "alice",
            "add lib",
            20,
        );
        commit(&repo, &[("src/lib.rs", "pub mod a;\n")], "alice", "Fix crash on empty input", 10);
        commit(&repo, &[("src/lib.rs", "pub mod b;\n")], "bob", "refactor", 5);
        commit(&repo, &[("build.rs", "fn main() {}")], "bob", "bug: build script", 2);
        dir
    }

    #[test]
    fn test_glob_to_regex() {
        let test_cases = [
            ("*.py", "^[^/]*\\.py$"),
            ("src/*.rs", "^src/[^/]*\\.rs$"),
            ("**/*.js", "^(?:.*/)?[^/]*\\.js$"),
            ("src/**/*.ts", "^src/(?:.*/)?[^/]*\\.ts$"),
            ("doc/?.md", "^doc/[^/]\\.md$"),
            ("test/**", "^test/.*$"),
            ("**.txt", "^.*\\.txt$"),
        ];

        for (input, expected) in test_cases {
            let result = glob_to_regex(input);
            assert_eq!(
                result, expected,
                "Pattern '{}' should convert to '{}', but got '{}'",
                input, expected, result
            );
        }
    }

    #[test]
    fn test_should_include_file() {
        let filter = PathFilter::new(
            vec!["**/*.rs".to_string(), "src/*.toml".to_string()],
            vec!["target/**".to_string()],
        )
        .unwrap();

        assert!(filter.should_include_file("main.rs"));
        assert!(filter.should_include_file("src/main.rs"));
        assert!(filter.should_include_file("src/config.toml"));
        assert!(!filter.should_include_file("src/main.py"));
        assert!(!filter.should_include_file("target/debug/main.rs"));
        assert!(PathFilter::default().should_include_file("anything"));
    }

    #[tokio::test]
    async fn test_source_files_lists_head_tree() {
        let dir = fixture();
        let repo =
            GitRepository::open(dir.path(), vec!["**/*.rs".to_string()], vec![], false).unwrap();

        let mut files = repo.source_files().await.unwrap();
        files.sort();
        assert_eq!(files, vec!["build.rs", "src/lib.rs", "src/old.rs"]);
    }

    #[tokio::test]
    async fn test_metrics_within_window() {
        let dir = fixture();
        let repo = GitRepository::open(dir.path(), vec![], vec![], false).unwrap();

        let metrics = repo.metrics("src/lib.rs", 30).await.unwrap();
        assert_eq!(metrics.commit_count, 3);
        assert_eq!(
            metrics.author_distribution,
            vec![("alice".to_string(), 2), ("bob".to_string(), 1)]
        );

        let narrow = repo.metrics("src/lib.rs", 7).await.unwrap();
        assert_eq!(narrow.commit_count, 1);

        let old = repo.metrics("src/old.rs", 30).await.unwrap();
        assert_eq!(old, VcsMetrics::default());
    }

    #[tokio::test]
    async fn test_defect_count_uses_fix_commits() {
        let dir = fixture();
        let repo = GitRepository::open(dir.path(), vec![], vec![], false).unwrap();

        assert_eq!(repo.defect_count("src/lib.rs").await.unwrap(), 1);
        assert_eq!(repo.defect_count("build.rs").await.unwrap(), 1);
        assert_eq!(repo.defect_count("src/old.rs").await.unwrap(), 0);
    }

    #[test]
    fn test_open_rejects_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GitRepository::open(dir.path(), vec![], vec![], false),
            Err(AnalyzerError::GitError(_))
        ));
    }
}
