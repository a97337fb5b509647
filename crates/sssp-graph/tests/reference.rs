// SPDX-License-Identifier: AGPL-3.0-only

//! Cross-check both executors against Bellman-Ford on generated graphs

use sssp_driver::{Arena, ArenaBacking, ArenaConfig};
use sssp_graph::{
    ExecutionMode, GraphConfig, GraphStore, IndexStrategy, PathEngine, Query, ReplayAccelerator,
    SearchOutcome,
};

/// Deterministic LCG so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    fn below(&mut self, bound: u32) -> u32 {
        self.next() % bound
    }
}

fn generate(seed: u64, nodes: u32, edges: u32) -> Vec<(u32, u32, u32)> {
    let mut rng = Lcg(seed);
    (0..edges)
        .map(|_| (rng.below(nodes) + 1, rng.below(nodes) + 1, rng.below(50)))
        .collect()
}

fn build(edges: &[(u32, u32, u32)], nodes: u32, index: IndexStrategy) -> GraphStore {
    let arena = Arena::open(&ArenaConfig::new(ArenaBacking::heap(1 << 20))).expect("arena");
    let config = GraphConfig::new(nodes, edges.len() as u32).with_index(index);
    let mut graph = GraphStore::new(arena, config).expect("store");
    for id in 1..=nodes {
        graph.add_node(id).expect("node");
    }
    for &(from, to, cost) in edges {
        graph.add_edge(from, to, cost).expect("edge");
    }
    graph
}

/// Distances from `start` indexed by id, `None` when unreachable
fn bellman_ford(edges: &[(u32, u32, u32)], nodes: u32, start: u32) -> Vec<Option<u64>> {
    let mut dist = vec![None; nodes as usize + 1];
    dist[start as usize] = Some(0);
    for _ in 0..nodes {
        let mut changed = false;
        for &(from, to, cost) in edges {
            if let Some(base) = dist[from as usize] {
                let candidate = base + u64::from(cost);
                if dist[to as usize].map_or(true, |d| candidate < d) {
                    dist[to as usize] = Some(candidate);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    dist
}

fn check_route(edges: &[(u32, u32, u32)], start: u32, goal: u32, result: &sssp_graph::QueryResult) {
    let first = result.route.first().expect("route start");
    let last = result.route.last().expect("route end");
    assert_eq!((first.id, first.cost), (start, 0));
    assert_eq!((last.id, last.cost), (goal, result.cost()));
    for hop in result.route.windows(2) {
        let weight = hop[1].cost - hop[0].cost;
        assert!(
            edges.contains(&(hop[0].id, hop[1].id, weight)),
            "route uses missing edge {} -> {} ({weight})",
            hop[0].id,
            hop[1].id
        );
    }
}

fn compare(seed: u64, nodes: u32, edge_count: u32, index: IndexStrategy) {
    let edges = generate(seed, nodes, edge_count);
    let mut graph = build(&edges, nodes, index);
    let mut replay = ReplayAccelerator::for_graph(&graph);
    let mut engine = PathEngine::with_channel(&mut graph, &mut replay);

    for start in 1..=nodes {
        let expected = bellman_ford(&edges, nodes, start);
        for goal in 1..=nodes {
            let local = engine.run(&Query::new(start, goal)).expect("software");
            let delegated = engine
                .run(&Query::new(start, goal).with_mode(ExecutionMode::Delegated))
                .expect("delegated");

            match expected[goal as usize] {
                Some(cost) => {
                    let cost = u32::try_from(cost).expect("small costs");
                    assert_eq!(
                        local.outcome,
                        SearchOutcome::Found { cost },
                        "seed {seed}: {start} -> {goal}"
                    );
                    check_route(&edges, start, goal, &local);
                    check_route(&edges, start, goal, &delegated);
                }
                None => {
                    assert_eq!(local.outcome, SearchOutcome::Exhausted, "seed {seed}: {start} -> {goal}");
                    assert!(local.route.is_empty());
                }
            }
            assert_eq!(delegated.outcome, local.outcome, "seed {seed}: {start} -> {goal}");
            assert_eq!(delegated.route, local.route, "seed {seed}: {start} -> {goal}");
            assert_eq!(delegated.cycles.map(u64::from), local.steps);
        }
    }
}

#[test]
fn sparse_graphs_hashed_index() {
    for seed in 0..12 {
        compare(seed, 8, 10, IndexStrategy::default());
    }
}

#[test]
fn dense_graphs_hashed_index() {
    for seed in 100..106 {
        compare(seed, 10, 40, IndexStrategy::Hashed { buckets: 4 });
    }
}

#[test]
fn graphs_with_dense_index() {
    for seed in 200..208 {
        compare(seed, 9, 25, IndexStrategy::Dense { max_id: 9 });
    }
}

#[test]
fn many_edges_per_node_span_pages() {
    let nodes = 4;
    let edges = generate(7, nodes, 60);
    let graph = build(&edges, nodes, IndexStrategy::default());
    assert!(graph.page_count() > nodes);
    drop(graph);
    compare(7, nodes, 60, IndexStrategy::default());
}
