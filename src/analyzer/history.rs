//! スコア履歴の保持と傾向の判定
//!
//! 履歴はアナライザーのインスタンスが所有する`HotspotHistoryStore`に蓄積されます。
//! 傾向の判定と履歴の追加は同じロックの中で行われるため、
//! 同じパスの分析が並行しても更新が失われることはありません。

use super::error::AnalyzerError;
use super::metrics::{HistoricalScore, Trend};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;

/// 呼び出し側に返す履歴の最大件数
pub const HISTORY_LIMIT: usize = 10;

/// パスごとに内部で保持する履歴の最大件数
const RETAINED_ENTRIES: usize = 100;

/// 平均を取る直近の履歴件数
const TREND_SAMPLE: usize = 3;

/// 過去のスコアと新しいスコアから傾向を判定する
#[derive(Debug, Clone, Copy)]
pub struct TrendTracker {
    delta: f64,
}

impl TrendTracker {
    pub fn new(delta: f64) -> Self {
        Self { delta }
    }

    /// # 引数
    ///
    /// - `history`: 新しいスコアを追加する前の履歴（古い順）
    /// - `score`: 新しいスコア
    pub fn classify(&self, history: &[HistoricalScore], score: f64) -> Trend {
        if history.is_empty() {
            return Trend::New;
        }
        if history.len() < TREND_SAMPLE {
            return Trend::Stable;
        }

        let recent = &history[history.len() - TREND_SAMPLE..];
        let mean = recent.iter().map(|h| h.score).sum::<f64>() / TREND_SAMPLE as f64;
        let diff = score - mean;

        if diff > self.delta {
            Trend::Worsening
        } else if diff < -self.delta {
            Trend::Improving
        } else {
            Trend::Stable
        }
    }
}

impl Default for TrendTracker {
    fn default() -> Self {
        Self::new(10.0)
    }
}

#[derive(Debug, Default)]
pub struct HotspotHistoryStore {
    entries: Mutex<BTreeMap<String, Vec<HistoricalScore>>>,
}

impl HotspotHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 傾向を判定してから新しい記録を追加します
    ///
    /// # 戻り値
    ///
    /// 判定した傾向と、追加後の直近`HISTORY_LIMIT`件の履歴を返します
    pub fn record(
        &self,
        path: &str,
        tracker: &TrendTracker,
        entry: HistoricalScore,
    ) -> (Trend, Vec<HistoricalScore>) {
        let mut entries = self.entries.lock();
        let history = entries.entry(path.to_string()).or_default();

        let trend = tracker.classify(history, entry.score);
        history.push(entry);
        if history.len() > RETAINED_ENTRIES {
            let excess = history.len() - RETAINED_ENTRIES;
            history.drain(..excess);
        }

        (trend, tail(history))
    }

    /// 直近`HISTORY_LIMIT`件の履歴
    pub fn history(&self, path: &str) -> Vec<HistoricalScore> {
        self.entries
            .lock()
            .get(path)
            .map(|history| tail(history))
            .unwrap_or_default()
    }

    /// 内部に保持している件数（`HISTORY_LIMIT`を超えることがある）
    pub fn retained(&self, path: &str) -> usize {
        self.entries.lock().get(path).map_or(0, Vec::len)
    }

    /// 履歴を持つパスの数
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn clear_path(&self, path: &str) {
        self.entries.lock().remove(path);
    }

    /// JSONファイルから履歴を読み込みます
    ///
    /// # エラー
    ///
    /// 以下の場合にエラーを返します：
    /// - ファイルの読み込みに失敗
    /// - JSONの解析に失敗
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| AnalyzerError::FileUnreadable {
                path: path.display().to_string(),
                source,
            })?;
        let entries: BTreeMap<String, Vec<HistoricalScore>> = serde_json::from_str(&content)
            .map_err(|e| {
                AnalyzerError::AnalysisError(format!(
                    "Invalid history file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Self {
            entries: Mutex::new(entries),
        })
    }

    /// 履歴をJSONファイルに書き出します
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&*self.entries.lock())
            .map_err(|e| AnalyzerError::AnalysisError(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            AnalyzerError::AnalysisError(format!(
                "Failed to write history file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

fn tail(history: &[HistoricalScore]) -> Vec<HistoricalScore> {
    history[history.len().saturating_sub(HISTORY_LIMIT)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::metrics::Dimension;
    use chrono::Utc;

    fn entry(score: f64) -> HistoricalScore {
        HistoricalScore {
            timestamp: Utc::now(),
            score,
            primary_dimension: Dimension::Complexity,
        }
    }

    #[test]
    fn test_classify_trend() {
        let tracker = TrendTracker::default();
        let history = vec![entry(50.0), entry(50.0), entry(50.0)];

        assert_eq!(tracker.classify(&[], 90.0), Trend::New);
        assert_eq!(tracker.classify(&history[..2], 90.0), Trend::Stable);
        assert_eq!(tracker.classify(&history, 65.0), Trend::Worsening);
        assert_eq!(tracker.classify(&history, 52.0), Trend::Stable);
        assert_eq!(tracker.classify(&history, 35.0), Trend::Improving);
        assert_eq!(tracker.classify(&history, 60.0), Trend::Stable);
    }

    #[test]
    fn test_classify_uses_last_three_entries() {
        let tracker = TrendTracker::default();
        let history = vec![entry(0.0), entry(0.0), entry(70.0), entry(70.0), entry(70.0)];
        assert_eq!(tracker.classify(&history, 75.0), Trend::Stable);
    }

    #[test]
    fn test_record_appends_after_classification() {
        let store = HotspotHistoryStore::new();
        let tracker = TrendTracker::default();

        let (trend, history) = store.record("a.rs", &tracker, entry(40.0));
        assert_eq!(trend, Trend::New);
        assert_eq!(history.len(), 1);

        let (trend, history) = store.record("a.rs", &tracker, entry(45.0));
        assert_eq!(trend, Trend::Stable);
        assert_eq!(history.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_is_capped_for_callers() {
        let store = HotspotHistoryStore::new();
        let tracker = TrendTracker::default();
        for i in 0..15 {
            store.record("a.rs", &tracker, entry(i as f64));
        }

        let history = store.history("a.rs");
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.first().unwrap().score, 5.0);
        assert_eq!(history.last().unwrap().score, 14.0);
        assert_eq!(store.retained("a.rs"), 15);
    }

    #[test]
    fn test_internal_retention_is_bounded() {
        let store = HotspotHistoryStore::new();
        let tracker = TrendTracker::default();
        for i in 0..(RETAINED_ENTRIES + 5) {
            store.record("a.rs", &tracker, entry(i as f64));
        }
        assert_eq!(store.retained("a.rs"), RETAINED_ENTRIES);
    }

    #[test]
    fn test_clear() {
        let store = HotspotHistoryStore::new();
        let tracker = TrendTracker::default();
        store.record("a.rs", &tracker, entry(1.0));
        store.record("b.rs", &tracker, entry(1.0));

        store.clear_path("a.rs");
        assert!(store.history("a.rs").is_empty());
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("history.json");

        let store = HotspotHistoryStore::new();
        let tracker = TrendTracker::default();
        store.record("a.rs", &tracker, entry(30.0));
        store.record("a.rs", &tracker, entry(31.0));
        store.save(&file).unwrap();

        let loaded = HotspotHistoryStore::load(&file).unwrap();
        let history = loaded.history("a.rs");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].primary_dimension, Dimension::Complexity);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("history.json");
        std::fs::write(&file, "not json").unwrap();
        assert!(matches!(
            HotspotHistoryStore::load(&file),
            Err(AnalyzerError::AnalysisError(_))
        ));
    }
}
