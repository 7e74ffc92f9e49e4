//! CSVファイルからの欠陥数取得
//!
//! `path,defects`形式のCSV（ヘッダー行あり）を読み込みます。
//! 記載のないファイルの欠陥数は0です。

use super::provider::DefectProvider;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct DefectRecord {
    path: String,
    defects: u32,
}

#[derive(Debug, Default)]
pub struct CsvDefectProvider {
    counts: HashMap<String, u32>,
}

impl CsvDefectProvider {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open defect file: {}", path.display()))?;

        let mut counts = HashMap::new();
        for result in reader.deserialize() {
            let record: DefectRecord = result
                .with_context(|| format!("Failed to parse defect record in {}", path.display()))?;
            // 同じパスが複数行ある場合は合算
            *counts.entry(record.path).or_insert(0) += record.defects;
        }

        Ok(Self { counts })
    }
}

#[async_trait]
impl DefectProvider for CsvDefectProvider {
    async fn defect_count(&self, path: &str) -> anyhow::Result<u32> {
        Ok(self.counts.get(path).copied().unwrap_or(0))
    }
}
