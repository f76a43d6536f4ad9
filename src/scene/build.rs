//! SAH-based BVH builder.
//!
//! Constructs a flat BVH array from a list of triangles using binned
//! Surface Area Heuristic splits.

use super::bvh::{BvhNode, Triangle};
use crate::util::{Aabb, Vec3};

/// Number of SAH bins for split evaluation.
const NUM_BINS: usize = 12;

/// Cost ratio: traversal vs intersection.
const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Maximum triangles per leaf before forcing a split.
pub const MAX_LEAF_SIZE: usize = 4;

/// Built BVH result.
pub struct Bvh {
    /// Flat node array (index 0 = root).
    pub nodes: Vec<BvhNode>,
    /// Reordered triangle indices (leaves reference into this).
    pub tri_indices: Vec<usize>,
}

#[derive(Clone, Copy)]
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Default for Bin {
    fn default() -> Self {
        Self {
            bounds: Aabb::EMPTY,
            count: 0,
        }
    }
}

struct Task {
    node_idx: usize,
    start: usize,
    end: usize, // exclusive
}

/// Split candidate found by the binned sweep.
struct Split {
    axis: usize,
    pos: f32,
    cost: f32,
}

/// Build BVH from triangles using SAH.
///
/// Triangles are not modified; `tri_indices` maps leaf ranges into the input slice.
#[tracing::instrument(skip_all, fields(tri_count = triangles.len()))]
pub fn build_bvh(triangles: &[Triangle]) -> Bvh {
    let n = triangles.len();
    if n == 0 {
        return Bvh {
            nodes: vec![BvhNode::new(&Aabb::new(Vec3::ZERO, Vec3::ZERO), 0, 0)],
            tri_indices: vec![],
        };
    }

    let centroids: Vec<Vec3> = triangles.iter().map(Triangle::centroid).collect();
    let aabbs: Vec<Aabb> = triangles.iter().map(Triangle::aabb).collect();

    let mut indices: Vec<usize> = (0..n).collect();
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);
    nodes.push(BvhNode::zeroed_placeholder());

    // Explicit stack, large scenes would overflow recursion
    let mut stack = vec![Task { node_idx: 0, start: 0, end: n }];

    while let Some(Task { node_idx, start, end }) = stack.pop() {
        let count = end - start;

        let mut node_aabb = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            node_aabb.grow(&aabbs[idx]);
        }

        if count <= MAX_LEAF_SIZE {
            nodes[node_idx] = BvhNode::new(&node_aabb, start as u32, count as u32);
            continue;
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for &idx in &indices[start..end] {
            centroid_bounds.grow_point(centroids[idx]);
        }

        let leaf_cost = count as f32 * INTERSECT_COST * node_aabb.area();
        let split = find_best_split(&indices[start..end], &aabbs, &centroids, &centroid_bounds)
            .filter(|s| s.cost < leaf_cost);

        let Some(split) = split else {
            nodes[node_idx] = BvhNode::new(&node_aabb, start as u32, count as u32);
            continue;
        };

        let mid = partition_in_place(&mut indices[start..end], |&idx| {
            centroids[idx][split.axis] < split.pos
        }) + start;

        // Degenerate partition: split in the middle
        let mid = if mid == start || mid == end { (start + end) / 2 } else { mid };

        let left_idx = nodes.len();
        nodes.push(BvhNode::zeroed_placeholder());
        nodes.push(BvhNode::zeroed_placeholder());
        nodes[node_idx] = BvhNode::new(&node_aabb, left_idx as u32, 0);

        // Right first so the left subtree is built first (depth-first order)
        stack.push(Task { node_idx: left_idx + 1, start: mid, end });
        stack.push(Task { node_idx: left_idx, start, end: mid });
    }

    tracing::debug!(nodes = nodes.len(), "BVH built");

    Bvh {
        nodes,
        tri_indices: indices,
    }
}

impl BvhNode {
    fn zeroed_placeholder() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// SAH binned split search across all 3 axes.
fn find_best_split(
    indices: &[usize],
    aabbs: &[Aabb],
    centroids: &[Vec3],
    centroid_bounds: &Aabb,
) -> Option<Split> {
    let mut best: Option<Split> = None;

    for axis in 0..3 {
        let lo = centroid_bounds.min[axis];
        let extent = centroid_bounds.max[axis] - lo;
        if extent < 1e-8 {
            continue;
        }

        let mut bins = [Bin::default(); NUM_BINS];
        let inv_extent = NUM_BINS as f32 / extent;

        for &idx in indices {
            let bin_id = (((centroids[idx][axis] - lo) * inv_extent) as usize).min(NUM_BINS - 1);
            bins[bin_id].bounds.grow(&aabbs[idx]);
            bins[bin_id].count += 1;
        }

        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left_count[i - 1] as f32 * left_area[i - 1] + sweep_count as f32 * sweep.area());

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(Split {
                    axis,
                    pos: lo + (i as f32 / NUM_BINS as f32) * extent,
                    cost,
                });
            }
        }
    }

    best
}

/// Partition slice in-place. Returns count of elements where predicate is true.
fn partition_in_place<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}
