//! ヒートマップの生成
//!
//! ホットスポットを指定した粒度で集約し、色付きの点の集合に変換します。
//! 色は現在の結果セットの最小値と最大値に対する相対的なスケールで決まります。

use super::metrics::{round_to_3, CodeHotspot, Severity};
use super::scoring::ScoreAggregator;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 緑 → 黄緑 → 黄 → 橙 → 赤
const COLOR_STOPS: [(u8, u8, u8); 5] = [
    (0, 176, 80),
    (146, 208, 80),
    (255, 255, 0),
    (255, 165, 0),
    (255, 0, 0),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    #[default]
    File,
    Module,
    Package,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Granularity::File),
            "module" => Ok(Granularity::Module),
            "package" => Ok(Granularity::Package),
            _ => Err(format!(
                "Invalid granularity: {}. Valid options: file, module, package",
                s
            )),
        }
    }
}

/// ヒートマップ上の1点
///
/// # フィールド
///
/// - `id`: ファイルパス、またはディレクトリの接頭辞
/// - `x`: チャーンの平均
/// - `y`: 複雑度の平均
/// - `value`: スコア（集約時はメンバーの平均）
/// - `file_count`: 集約したファイル数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMapPoint {
    pub id: String,
    #[serde(serialize_with = "round_to_3")]
    pub x: f64,
    #[serde(serialize_with = "round_to_3")]
    pub y: f64,
    #[serde(serialize_with = "round_to_3")]
    pub value: f64,
    pub file_count: usize,
    pub severity: Severity,
    pub color: String,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMap {
    pub granularity: Granularity,
    pub points: Vec<HeatMapPoint>,
    #[serde(serialize_with = "round_to_3")]
    pub min_score: f64,
    #[serde(serialize_with = "round_to_3")]
    pub max_score: f64,
}

pub struct HeatMapGenerator {
    aggregator: ScoreAggregator,
    module_depth: usize,
    package_depth: usize,
}

impl HeatMapGenerator {
    pub fn new(aggregator: ScoreAggregator, module_depth: usize, package_depth: usize) -> Self {
        Self {
            aggregator,
            module_depth,
            package_depth,
        }
    }

    /// ヒートマップを生成します
    ///
    /// 点はスコアの降順に並びます。
    pub fn generate(&self, hotspots: &[CodeHotspot], granularity: Granularity) -> HeatMap {
        let mut points: Vec<HeatMapPoint> = match granularity {
            Granularity::File => hotspots
                .iter()
                .map(|h| {
                    point(
                        h.path.clone(),
                        h.dimensions.churn,
                        h.dimensions.complexity,
                        h.score,
                        1,
                        h.severity,
                    )
                })
                .collect(),
            Granularity::Module => self.grouped(hotspots, self.module_depth),
            Granularity::Package => self.grouped(hotspots, self.package_depth),
        };
        points.sort_by(|a, b| b.value.total_cmp(&a.value));

        let min_score = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
        let max_score = points
            .iter()
            .map(|p| p.value)
            .fold(f64::NEG_INFINITY, f64::max);
        let (min_score, max_score) = if points.is_empty() {
            (0.0, 0.0)
        } else {
            (min_score, max_score)
        };

        for p in &mut points {
            p.color = color_for(p.value, min_score, max_score);
        }

        HeatMap {
            granularity,
            points,
            min_score,
            max_score,
        }
    }

    fn grouped(&self, hotspots: &[CodeHotspot], depth: usize) -> Vec<HeatMapPoint> {
        let mut groups: IndexMap<String, Vec<&CodeHotspot>> = IndexMap::new();
        for hotspot in hotspots {
            groups
                .entry(group_key(&hotspot.path, depth))
                .or_default()
                .push(hotspot);
        }

        groups
            .into_iter()
            .map(|(key, members)| {
                let n = members.len() as f64;
                let score = members.iter().map(|h| h.score).sum::<f64>() / n;
                let churn = members.iter().map(|h| h.dimensions.churn).sum::<f64>() / n;
                let complexity = members.iter().map(|h| h.dimensions.complexity).sum::<f64>() / n;
                point(
                    key,
                    churn,
                    complexity,
                    score,
                    members.len(),
                    self.aggregator.severity(score),
                )
            })
            .collect()
    }
}

fn point(
    id: String,
    x: f64,
    y: f64,
    value: f64,
    file_count: usize,
    severity: Severity,
) -> HeatMapPoint {
    let tooltip = format!(
        "{}\nScore: {}\nSeverity: {}",
        id,
        value.round() as i64,
        severity
    );
    HeatMapPoint {
        id,
        x,
        y,
        value,
        file_count,
        severity,
        color: String::new(),
        tooltip,
    }
}

/// ディレクトリの先頭`depth`階層（ルート直下のファイルは"."）
fn group_key(path: &str, depth: usize) -> String {
    let parts: Vec<&str> = path.split(['/', '\\']).filter(|p| !p.is_empty()).collect();
    let dirs = &parts[..parts.len().saturating_sub(1)];
    if dirs.is_empty() {
        return ".".to_string();
    }
    dirs[..depth.min(dirs.len())].join("/")
}

/// 相対スケール上の位置を5色の線形補間で色に変換します
///
/// 全ての値が等しい場合は中央の色（黄）になります。
fn color_for(value: f64, min: f64, max: f64) -> String {
    let t = if max - min <= f64::EPSILON {
        0.5
    } else {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    };

    let scaled = t * (COLOR_STOPS.len() - 1) as f64;
    let index = (scaled.floor() as usize).min(COLOR_STOPS.len() - 2);
    let frac = scaled - index as f64;
    let (from, to) = (COLOR_STOPS[index], COLOR_STOPS[index + 1]);
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;

    format!(
        "#{:02x}{:02x}{:02x}",
        lerp(from.0, to.0),
        lerp(from.1, to.1),
        lerp(from.2, to.2)
    )
}
