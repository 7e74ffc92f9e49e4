use anyhow::Context;
use clap::{ArgAction, Parser};
use hotspot_analyzer::analyzer::{
    AnalysisWarning, AnalyzerConfig, CodeHotspot, CoverageProvider, CsvDefectProvider,
    DefectProvider, GitRepository, Granularity, HeatMap, HotspotCluster, HotspotHistoryStore,
    LcovCoverageProvider, Providers, Severity, Trend,
};
use hotspot_analyzer::HotspotAnalyzer;
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// デフォルトのインクルードパターン
const DEFAULT_INCLUDE_PATTERNS: &[&str] = &[
    "**/*.rs",    // Rustファイル
    "**/*.go",    // Goファイル
    "**/*.js",    // JavaScriptファイル
    "**/*.ts",    // TypeScriptファイル
    "**/*.py",    // Pythonファイル
    "**/*.java",  // Javaファイル
    "**/*.cpp",   // C++ファイル
    "**/*.hpp",   // C++ヘッダー
    "**/*.c",     // Cファイル
    "**/*.h",     // Cヘッダー
];

/// デフォルトの除外パターン
const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/target/**",       // Rustのビルドディレクトリ
    "**/node_modules/**", // Node.jsの依存関係
    "**/dist/**",         // ビルド成果物
    "**/build/**",        // ビルドディレクトリ
    "**/.git/**",         // Gitディレクトリ
    "**/vendor/**",       // 依存関係
    "**/*.min.*",         // minifyされたファイル
    "**/test/**",         // テストディレクトリ
    "**/tests/**",        // テストディレクトリ
];

#[derive(Parser)]
#[command(
    version,
    about = "Scores, trends and clusters risky source files (hotspots) in a Git repository",
    long_about = None
)]
struct Cli {
    /// Path to Git repository
    #[arg(short, long)]
    repo: PathBuf,

    /// Analyzer configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Churn time window in days (overrides the configuration)
    #[arg(short = 'w', long = "time-window")]
    time_window: Option<u32>,

    /// Output format (json or csv)
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Number of top hotspots to show
    #[arg(short = 'n', long, default_value_t = 10)]
    top: usize,

    /// Include only files matching these patterns (glob format, e.g., "*.rs", "src/**/*.py")
    /// If not specified, default includes common source code files
    #[arg(short = 'i', long = "include")]
    include_patterns: Option<Vec<String>>,

    /// Exclude files matching these patterns
    /// If not specified, excludes common build and dependency directories
    #[arg(short = 'e', long = "exclude")]
    exclude_patterns: Option<Vec<String>>,

    /// Use no default include patterns
    #[arg(long)]
    no_default_includes: bool,

    /// Use no default exclude patterns
    #[arg(long)]
    no_default_excludes: bool,

    /// Include merge commits in the analysis
    #[arg(long, default_value_t = false)]
    include_merges: bool,

    /// LCOV coverage report
    #[arg(long)]
    coverage: Option<PathBuf>,

    /// Defect counts as CSV (path,defects); defaults to counting fix commits
    #[arg(long)]
    defects: Option<PathBuf>,

    /// History file used to detect trends across runs
    #[arg(long)]
    history: Option<PathBuf>,

    /// Group hotspots with similar risk profiles (JSON output only)
    #[arg(long)]
    clusters: bool,

    /// Add a heat map at the given granularity: file, module or package (JSON output only)
    #[arg(long = "heat-map")]
    heat_map: Option<Granularity>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn get_include_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();

        if !self.no_default_includes {
            patterns.extend(DEFAULT_INCLUDE_PATTERNS.iter().map(|s| s.to_string()));
        }

        if let Some(ref user_patterns) = self.include_patterns {
            patterns.extend(user_patterns.clone());
        }

        patterns
    }

    fn get_exclude_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();

        if !self.no_default_excludes {
            patterns.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()));
        }

        if let Some(ref user_patterns) = self.exclude_patterns {
            patterns.extend(user_patterns.clone());
        }

        patterns
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    hotspots: &'a [CodeHotspot],
    #[serde(skip_serializing_if = "Option::is_none")]
    clusters: Option<Vec<HotspotCluster>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    heat_map: Option<HeatMap>,
    warnings: &'a [AnalysisWarning],
}

/// CSV出力用の1行
#[derive(Serialize)]
struct HotspotRow<'a> {
    path: &'a str,
    score: f64,
    severity: Severity,
    trend: Trend,
    defects: f64,
    complexity: f64,
    churn: f64,
    coupling: f64,
    coverage: f64,
    ownership: f64,
    factors: String,
    root_causes: String,
    priority: u8,
    estimated_effort: f64,
}

impl<'a> From<&'a CodeHotspot> for HotspotRow<'a> {
    fn from(h: &'a CodeHotspot) -> Self {
        let d = &h.dimensions;
        Self {
            path: &h.path,
            score: round3(h.score),
            severity: h.severity,
            trend: h.trend,
            defects: round3(d.defects),
            complexity: round3(d.complexity),
            churn: round3(d.churn),
            coupling: round3(d.coupling),
            coverage: round3(d.coverage),
            ownership: round3(d.ownership),
            factors: h
                .factors
                .iter()
                .map(|f| f.dimension.name())
                .collect::<Vec<_>>()
                .join(";"),
            root_causes: h.root_causes.join("; "),
            priority: h.remediation.priority,
            estimated_effort: h.remediation.estimated_effort,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    config.project_root = cli.repo.clone();
    if let Some(days) = cli.time_window {
        config.historical_window_days = days;
    }

    let repo = Arc::new(
        GitRepository::open(
            &cli.repo,
            cli.get_include_patterns(),
            cli.get_exclude_patterns(),
            cli.include_merges,
        )
        .context("Failed to open repository")?,
    );

    let coverage: Option<Arc<dyn CoverageProvider>> = match &cli.coverage {
        Some(report) => Some(Arc::new(
            LcovCoverageProvider::open(report, &cli.repo)
                .context("Failed to load coverage report")?,
        )),
        None => None,
    };
    let defects: Arc<dyn DefectProvider> = match &cli.defects {
        Some(path) => {
            Arc::new(CsvDefectProvider::open(path).context("Failed to load defect counts")?)
        }
        None => repo.clone(),
    };
    let providers = Providers {
        source: repo.clone(),
        defects,
        coverage,
        vcs: repo,
    };

    let history = match &cli.history {
        Some(path) if path.exists() => {
            HotspotHistoryStore::load(path).context("Failed to load history")?
        }
        _ => HotspotHistoryStore::new(),
    };
    let history = Arc::new(history);

    let analyzer = HotspotAnalyzer::with_history(config, providers, Arc::clone(&history))
        .context("Failed to initialize analyzer")?;

    let report = analyzer.analyze_project().await;

    if let Some(path) = &cli.history {
        history.save(path).context("Failed to save history")?;
        info!("History saved to {}", path.display());
    }

    let top = &report.hotspots[..cli.top.min(report.hotspots.len())];

    match cli.format.as_str() {
        "json" => {
            let output = Report {
                hotspots: top,
                clusters: cli
                    .clusters
                    .then(|| analyzer.cluster_hotspots(&report.hotspots)),
                heat_map: cli
                    .heat_map
                    .map(|granularity| analyzer.generate_heat_map(&report.hotspots, granularity)),
                warnings: &report.warnings,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialize to JSON")?
            );
        }
        "csv" => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for hotspot in top {
                wtr.serialize(HotspotRow::from(hotspot))
                    .context("Failed to write CSV record")?;
            }
            wtr.flush().context("Failed to flush CSV writer")?;
        }
        _ => anyhow::bail!("Unsupported output format: {}", cli.format),
    }

    Ok(())
}
