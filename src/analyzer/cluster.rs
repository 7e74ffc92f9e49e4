//! 類似したホットスポットのクラスタリング
//!
//! 各ホットスポットを6次元の特徴ベクトル（defects, complexity, churn, coupling,
//! coverage, ownership）に変換し、ユークリッド距離に基づいてグループ化します。
//! k-meansとDBSCANのどちらかを設定で選択できます。

use super::config::ClusteringAlgorithm;
use super::metrics::{CodeHotspot, HotspotCluster};
use super::remediation::RemediationPlanner;
use indexmap::IndexMap;
use log::debug;

const MAX_CLUSTERS: usize = 5;
const MAX_ITERATIONS: usize = 100;

type Vector = [f64; 6];

/// 特徴空間で取りうる最大距離（各軸0-100）
fn max_distance() -> f64 {
    100.0 * 6f64.sqrt()
}

fn distance(a: &Vector, b: &Vector) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn mean(vectors: &[Vector], members: &[usize]) -> Vector {
    let mut sum = [0.0; 6];
    for &i in members {
        for (axis, value) in sum.iter_mut().zip(vectors[i].iter()) {
            *axis += value;
        }
    }
    sum.map(|v| v / members.len() as f64)
}

pub struct ClusterEngine {
    algorithm: ClusteringAlgorithm,
    min_cluster_size: usize,
    epsilon: f64,
}

impl ClusterEngine {
    pub fn new(algorithm: ClusteringAlgorithm, min_cluster_size: usize, epsilon: f64) -> Self {
        Self {
            algorithm,
            min_cluster_size,
            epsilon,
        }
    }

    /// ホットスポットをクラスタに分けます
    ///
    /// # 戻り値
    ///
    /// `min_cluster_size`以上のメンバーを持つクラスタを、メンバー数の多い順に返します。
    /// ホットスポットが少なすぎる場合は空のベクターを返します。
    pub fn cluster(&self, hotspots: &[CodeHotspot]) -> Vec<HotspotCluster> {
        let min = self.min_cluster_size.max(1);
        if hotspots.len() < min {
            debug!(
                "Skipping clustering: {} hotspots, at least {} required",
                hotspots.len(),
                min
            );
            return Vec::new();
        }

        let k = (hotspots.len() / min).clamp(1, MAX_CLUSTERS);
        let vectors: Vec<Vector> = hotspots.iter().map(|h| h.dimensions.to_vector()).collect();

        let mut groups = match self.algorithm {
            ClusteringAlgorithm::Kmeans => kmeans(&vectors, k),
            ClusteringAlgorithm::Dbscan => {
                let mut groups = dbscan(&vectors, self.epsilon, min);
                groups.sort_by_key(|g| std::cmp::Reverse(g.len()));
                groups.truncate(k);
                groups
            }
        };
        groups.retain(|g| g.len() >= min);
        groups.sort_by_key(|g| std::cmp::Reverse(g.len()));

        debug!(
            "Formed {} clusters from {} hotspots (k = {})",
            groups.len(),
            hotspots.len(),
            k
        );

        groups
            .iter()
            .enumerate()
            .map(|(i, members)| build_cluster(i + 1, hotspots, &vectors, members))
            .collect()
    }
}

fn build_cluster(
    number: usize,
    hotspots: &[CodeHotspot],
    vectors: &[Vector],
    members: &[usize],
) -> HotspotCluster {
    let center = mean(vectors, members);
    let mut centroid = members[0];
    for &i in &members[1..] {
        if distance(&vectors[i], &center) < distance(&vectors[centroid], &center) {
            centroid = i;
        }
    }

    let member_hotspots: Vec<CodeHotspot> = members.iter().map(|&i| hotspots[i].clone()).collect();

    HotspotCluster {
        id: format!("cluster-{}", number),
        density: density(vectors, members),
        common_root_cause: common_root_cause(&member_hotspots),
        cluster_remediation: RemediationPlanner.plan_cluster(&member_hotspots),
        centroid: hotspots[centroid].clone(),
        hotspots: member_hotspots,
    }
}

/// メンバー間の平均類似度（1 - 距離/最大距離）
fn density(vectors: &[Vector], members: &[usize]) -> f64 {
    if members.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (n, &a) in members.iter().enumerate() {
        for &b in &members[n + 1..] {
            total += 1.0 - distance(&vectors[a], &vectors[b]) / max_distance();
            pairs += 1;
        }
    }
    total / pairs as f64
}

/// メンバーの半数以上が共有する根本原因
fn common_root_cause(members: &[CodeHotspot]) -> Option<String> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for hotspot in members {
        for cause in &hotspot.root_causes {
            *counts.entry(cause.as_str()).or_insert(0) += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (cause, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((cause, count));
        }
    }

    best.filter(|(_, count)| count * 2 >= members.len())
        .map(|(cause, _)| cause.to_string())
}

fn nearest(vector: &Vector, centroids: &[Vector]) -> usize {
    let mut best = 0;
    for (i, centroid) in centroids.iter().enumerate().skip(1) {
        if distance(vector, centroid) < distance(vector, &centroids[best]) {
            best = i;
        }
    }
    best
}

/// k-means（最遠点による決定的な初期化）
fn kmeans(vectors: &[Vector], k: usize) -> Vec<Vec<usize>> {
    let mut centroids: Vec<Vector> = vec![vectors[0]];
    while centroids.len() < k.min(vectors.len()) {
        let mut farthest = 0;
        let mut farthest_distance = -1.0;
        for (i, v) in vectors.iter().enumerate() {
            let d = centroids
                .iter()
                .map(|c| distance(v, c))
                .fold(f64::INFINITY, f64::min);
            if d > farthest_distance {
                farthest = i;
                farthest_distance = d;
            }
        }
        centroids.push(vectors[farthest]);
    }

    let mut assignments = vec![usize::MAX; vectors.len()];
    for _ in 0..MAX_ITERATIONS {
        let next: Vec<usize> = vectors.iter().map(|v| nearest(v, &centroids)).collect();
        if next == assignments {
            break;
        }
        assignments = next;

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<usize> = (0..vectors.len()).filter(|&i| assignments[i] == c).collect();
            // 空のクラスタは前回の重心を維持
            if !members.is_empty() {
                *centroid = mean(vectors, &members);
            }
        }
    }

    let mut groups = vec![Vec::new(); centroids.len()];
    for (i, &c) in assignments.iter().enumerate() {
        groups[c].push(i);
    }
    groups.retain(|g| !g.is_empty());
    groups
}

/// DBSCAN（ノイズ点はどのクラスタにも含めない）
fn dbscan(vectors: &[Vector], epsilon: f64, min_points: usize) -> Vec<Vec<usize>> {
    let neighbors = |i: usize| -> Vec<usize> {
        (0..vectors.len())
            .filter(|&j| distance(&vectors[i], &vectors[j]) <= epsilon)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; vectors.len()];
    let mut visited = vec![false; vectors.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for i in 0..vectors.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let seeds = neighbors(i);
        if seeds.len() < min_points {
            continue;
        }

        let cluster = groups.len();
        groups.push(vec![i]);
        labels[i] = Some(cluster);

        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if labels[j].is_none() {
                labels[j] = Some(cluster);
                groups[cluster].push(j);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let expansion = neighbors(j);
            if expansion.len() >= min_points {
                queue.extend(expansion);
            }
        }
        groups[cluster].sort_unstable();
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::metrics::{
        Dimensions, HotspotImpact, ProductionRisk, RemediationPlan, Severity, Trend,
    };
    use proptest::prelude::*;

    fn hotspot(path: &str, v: Vector, cause: &str) -> CodeHotspot {
        CodeHotspot {
            path: path.to_string(),
            severity: Severity::Moderate,
            score: 50.0,
            dimensions: Dimensions {
                defects: v[0],
                complexity: v[1],
                churn: v[2],
                coupling: v[3],
                coverage: v[4],
                ownership: v[5],
            },
            trend: Trend::New,
            history: Vec::new(),
            factors: Vec::new(),
            root_causes: vec![cause.to_string()],
            impact: HotspotImpact {
                affected_files: 0,
                affected_developers: Vec::new(),
                potential_defects: 0,
                estimated_fix_time: 4.0,
                production_risk: ProductionRisk::Medium,
                business_impact: String::new(),
            },
            remediation: RemediationPlan {
                priority: 3,
                actions: Vec::new(),
                estimated_effort: 0.0,
                expected_improvement: 50.0,
                success_criteria: Vec::new(),
            },
        }
    }

    fn two_groups() -> Vec<CodeHotspot> {
        vec![
            hotspot("a1.rs", [90.0, 80.0, 85.0, 10.0, 10.0, 10.0], "complex"),
            hotspot("b1.rs", [5.0, 10.0, 5.0, 80.0, 90.0, 85.0], "tests"),
            hotspot("a2.rs", [85.0, 85.0, 80.0, 15.0, 5.0, 10.0], "complex"),
            hotspot("b2.rs", [10.0, 5.0, 10.0, 85.0, 85.0, 90.0], "tests"),
            hotspot("a3.rs", [95.0, 75.0, 90.0, 5.0, 15.0, 5.0], "other"),
            hotspot("b3.rs", [0.0, 15.0, 0.0, 90.0, 80.0, 80.0], "tests"),
        ]
    }

    fn paths(cluster: &HotspotCluster) -> Vec<&str> {
        let mut paths: Vec<&str> = cluster.hotspots.iter().map(|h| h.path.as_str()).collect();
        paths.sort_unstable();
        paths
    }

    #[test]
    fn test_kmeans_groups_similar_profiles() {
        let engine = ClusterEngine::new(ClusteringAlgorithm::Kmeans, 3, 25.0);
        let clusters = engine.cluster(&two_groups());

        assert_eq!(clusters.len(), 2);
        let mut groups: Vec<Vec<&str>> = clusters.iter().map(paths).collect();
        groups.sort();
        assert_eq!(
            groups,
            vec![vec!["a1.rs", "a2.rs", "a3.rs"], vec!["b1.rs", "b2.rs", "b3.rs"]]
        );
    }

    #[test]
    fn test_cluster_summary() {
        let engine = ClusterEngine::new(ClusteringAlgorithm::Kmeans, 3, 25.0);
        let clusters = engine.cluster(&two_groups());
        let a = clusters
            .iter()
            .find(|c| c.hotspots.iter().any(|h| h.path == "a1.rs"))
            .unwrap();
        let b = clusters
            .iter()
            .find(|c| c.hotspots.iter().any(|h| h.path == "b1.rs"))
            .unwrap();

        assert_eq!(a.common_root_cause.as_deref(), Some("complex"));
        assert_eq!(b.common_root_cause.as_deref(), Some("tests"));
        assert!(a.density > 0.9 && a.density <= 1.0);
        // 座標平均 [90, 80, 85, 10, 10, 8.33] に最も近いのは a1
        assert_eq!(a.centroid.path, "a1.rs");

        let plan = a.cluster_remediation.as_ref().unwrap();
        assert_eq!(plan.priority, 3);
        assert_eq!(plan.expected_improvement, 60.0);
    }

    #[test]
    fn test_dbscan_discards_noise() {
        let mut hotspots = two_groups();
        hotspots.push(hotspot("noise.rs", [50.0, 50.0, 50.0, 50.0, 50.0, 50.0], "x"));

        let engine = ClusterEngine::new(ClusteringAlgorithm::Dbscan, 3, 25.0);
        let clusters = engine.cluster(&hotspots);

        assert_eq!(clusters.len(), 2);
        assert!(clusters
            .iter()
            .all(|c| c.hotspots.iter().all(|h| h.path != "noise.rs")));
    }

    #[test]
    fn test_degenerate_input_returns_empty() {
        let engine = ClusterEngine::new(ClusteringAlgorithm::Kmeans, 3, 25.0);
        assert!(engine.cluster(&[]).is_empty());
        assert!(engine.cluster(&two_groups()[..2]).is_empty());
    }

    #[test]
    fn test_common_root_cause_requires_half() {
        let members = vec![
            hotspot("a", [0.0; 6], "x"),
            hotspot("b", [0.0; 6], "y"),
            hotspot("c", [0.0; 6], "z"),
        ];
        assert_eq!(common_root_cause(&members), None);
        assert_eq!(common_root_cause(&members[..2]), Some("x".to_string()));
    }

    proptest! {
        #[test]
        fn prop_clusters_respect_size_floor(
            points in prop::collection::vec(prop::array::uniform6(0.0..=100.0f64), 0..30),
            min in 1usize..6,
            use_dbscan in any::<bool>(),
        ) {
            let hotspots: Vec<CodeHotspot> = points
                .iter()
                .enumerate()
                .map(|(i, v)| hotspot(&format!("f{}.rs", i), *v, "c"))
                .collect();
            let algorithm = if use_dbscan {
                ClusteringAlgorithm::Dbscan
            } else {
                ClusteringAlgorithm::Kmeans
            };
            let clusters = ClusterEngine::new(algorithm, min, 30.0).cluster(&hotspots);

            prop_assert!(clusters.len() <= MAX_CLUSTERS);
            for cluster in &clusters {
                prop_assert!(cluster.hotspots.len() >= min);
            }
        }
    }
}
