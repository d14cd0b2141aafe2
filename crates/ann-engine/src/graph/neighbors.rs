use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashSet};

use ann_core::{EngineError, ObjectId};
use ordered_float::OrderedFloat;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};

use crate::distance::Metric;
use crate::store::ObjectStore;

/// Random entry points per graph search.
const SEED_SIZE: usize = 10;
/// Objects each build worker links per batch.
const BATCH_PER_WORKER: usize = 32;

/// Single-layer neighborhood graph over indexed object ids.
///
/// Every indexed object keeps up to `edge_size` outgoing edges chosen at
/// link time; reverse edges are added to neighbors and pruned back to
/// `2 * edge_size` by distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborGraph {
    edge_size: usize,
    edges: BTreeMap<ObjectId, Vec<ObjectId>>,
}

impl NeighborGraph {
    pub fn new(edge_size: usize) -> Self {
        Self {
            edge_size: edge_size.max(1),
            edges: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn neighbors(&self, id: ObjectId) -> &[ObjectId] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Up to `ef` closest indexed objects, ascending by distance.
    pub fn search(
        &self,
        objects: &ObjectStore,
        metric: Metric,
        query: &[f32],
        ef: usize,
    ) -> Vec<(ObjectId, f32)> {
        if self.edges.is_empty() || ef == 0 {
            return Vec::new();
        }
        if self.edges.len() <= ef {
            return self.exhaustive(objects, metric, query, ef);
        }

        let mut rng = rand::thread_rng();
        let seeds = self.edges.keys().copied().choose_multiple(&mut rng, SEED_SIZE);

        let mut visited = HashSet::new();
        // Min-heap of candidates to expand, closest first.
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat<f32>, ObjectId)>> = BinaryHeap::new();
        // Max-heap of results, worst on top.
        let mut results: BinaryHeap<(OrderedFloat<f32>, ObjectId)> = BinaryHeap::new();

        for seed in seeds {
            if !visited.insert(seed) {
                continue;
            }
            if let Some(v) = objects.get(seed) {
                let d = OrderedFloat(metric.between(query, v));
                candidates.push(Reverse((d, seed)));
                results.push((d, seed));
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        while let Some(Reverse((OrderedFloat(cand_dist), cand_id))) = candidates.pop() {
            if results.len() >= ef {
                if let Some(&(OrderedFloat(worst), _)) = results.peek() {
                    if cand_dist > worst {
                        break;
                    }
                }
            }

            for &neighbor in self.neighbors(cand_id) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let Some(v) = objects.get(neighbor) else { continue };
                let dist = metric.between(query, v);

                let should_add = results.len() < ef
                    || results.peek().map_or(true, |&(OrderedFloat(worst), _)| dist < worst);
                if should_add {
                    candidates.push(Reverse((OrderedFloat(dist), neighbor)));
                    results.push((OrderedFloat(dist), neighbor));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut found: Vec<(ObjectId, f32)> = results
            .into_iter()
            .map(|(OrderedFloat(d), id)| (id, d))
            .collect();
        sort_by_distance(&mut found);
        found
    }

    fn exhaustive(
        &self,
        objects: &ObjectStore,
        metric: Metric,
        query: &[f32],
        ef: usize,
    ) -> Vec<(ObjectId, f32)> {
        let mut found: Vec<(ObjectId, f32)> = self
            .edges
            .keys()
            .filter_map(|&id| objects.get(id).map(|v| (id, metric.between(query, v))))
            .collect();
        sort_by_distance(&mut found);
        found.truncate(ef);
        found
    }

    /// Link every id in `pending` into the graph.
    ///
    /// With `parallelism > 1` the candidate lists of a batch are searched on
    /// scoped worker threads against the graph as it stood before the batch;
    /// objects of the same batch are then compared against each other while
    /// linking sequentially.
    pub fn build(
        &mut self,
        objects: &ObjectStore,
        metric: Metric,
        pending: &[ObjectId],
        parallelism: usize,
        ef: usize,
    ) -> Result<(), EngineError> {
        let workers = parallelism.max(1);
        let batch_size = if workers == 1 { 1 } else { workers * BATCH_PER_WORKER };

        for batch in pending.chunks(batch_size) {
            let found = if workers == 1 {
                batch
                    .iter()
                    .map(|&id| self.candidates_for(objects, metric, id, ef))
                    .collect::<Vec<_>>()
            } else {
                self.parallel_candidates(objects, metric, batch, ef)?
            };

            for (i, (&id, mut candidates)) in batch.iter().zip(found).enumerate() {
                if let Some(v) = objects.get(id) {
                    candidates.extend(
                        batch[..i]
                            .iter()
                            .filter_map(|&other| objects.get(other).map(|o| (other, metric.between(v, o)))),
                    );
                }
                self.link(objects, metric, id, candidates);
            }
        }
        Ok(())
    }

    fn parallel_candidates(
        &self,
        objects: &ObjectStore,
        metric: Metric,
        batch: &[ObjectId],
        ef: usize,
    ) -> Result<Vec<Vec<(ObjectId, f32)>>, EngineError> {
        let graph = &*self;
        std::thread::scope(|s| {
            let handles: Vec<_> = batch
                .chunks(BATCH_PER_WORKER)
                .map(|part| {
                    s.spawn(move || {
                        part.iter()
                            .map(|&id| graph.candidates_for(objects, metric, id, ef))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut out = Vec::with_capacity(batch.len());
            for handle in handles {
                match handle.join() {
                    Ok(part) => out.extend(part),
                    Err(_) => return Err(EngineError::other("GraphIndex::build: worker thread panicked")),
                }
            }
            Ok(out)
        })
    }

    fn candidates_for(
        &self,
        objects: &ObjectStore,
        metric: Metric,
        id: ObjectId,
        ef: usize,
    ) -> Vec<(ObjectId, f32)> {
        match objects.get(id) {
            Some(query) => self.search(objects, metric, query, ef),
            None => Vec::new(),
        }
    }

    /// Insert `id` with edges to the closest of `candidates`.
    pub fn link(
        &mut self,
        objects: &ObjectStore,
        metric: Metric,
        id: ObjectId,
        mut candidates: Vec<(ObjectId, f32)>,
    ) {
        candidates.retain(|&(c, _)| c != id);
        sort_by_distance(&mut candidates);
        let mut seen = HashSet::new();
        let neighbors: Vec<ObjectId> = candidates
            .into_iter()
            .map(|(c, _)| c)
            .filter(|c| seen.insert(*c))
            .take(self.edge_size)
            .collect();

        self.edges.insert(id, neighbors.clone());

        let max_edges = self.edge_size * 2;
        for neighbor in neighbors {
            let list = self.edges.entry(neighbor).or_default();
            if !list.contains(&id) {
                list.push(id);
            }
            if list.len() > max_edges {
                self.prune(objects, metric, neighbor);
            }
        }
    }

    fn prune(&mut self, objects: &ObjectStore, metric: Metric, node: ObjectId) {
        let Some(nv) = objects.get(node) else { return };
        let Some(list) = self.edges.get(&node) else { return };
        let mut scored: Vec<(ObjectId, f32)> = list
            .iter()
            .filter_map(|&n| objects.get(n).map(|v| (n, metric.between(nv, v))))
            .collect();
        sort_by_distance(&mut scored);
        scored.truncate(self.edge_size * 2);
        self.edges.insert(node, scored.into_iter().map(|(n, _)| n).collect());
    }

    /// Drop `id` and reconnect its former neighbors to each other.
    /// Returns false when `id` was not indexed.
    pub fn unlink(&mut self, objects: &ObjectStore, metric: Metric, id: ObjectId) -> bool {
        let Some(former) = self.edges.remove(&id) else { return false };
        for list in self.edges.values_mut() {
            list.retain(|&n| n != id);
        }

        let max_edges = self.edge_size * 2;
        for &a in &former {
            let Some(av) = objects.get(a) else { continue };
            if !self.edges.contains_key(&a) {
                continue;
            }
            let mut closest: Vec<(ObjectId, f32)> = former
                .iter()
                .filter(|&&b| b != a && self.edges.contains_key(&b))
                .filter_map(|&b| objects.get(b).map(|bv| (b, metric.between(av, bv))))
                .collect();
            sort_by_distance(&mut closest);

            let list = self.edges.entry(a).or_default();
            for (b, _) in closest.into_iter().take(self.edge_size) {
                if list.len() >= max_edges {
                    break;
                }
                if !list.contains(&b) {
                    list.push(b);
                }
            }
        }
        true
    }
}

fn sort_by_distance(items: &mut [(ObjectId, f32)]) {
    items.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}
