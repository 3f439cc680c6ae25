//! # Barnes–Hut Quadtree (2D)
//!
//! Spatial index used to approximate the gravitational force on every body in
//! `O(N log N)` instead of the all-pairs `O(N²)` sum.
//!
//! ## Layout
//!
//! Nodes live in a flat arena (`Vec<Node>`) and refer to their children by
//! index. [`Quadtree::clear`] truncates the arena back to a single empty root,
//! keeping the allocation, so rebuilding the tree every step does not churn
//! the heap.
//!
//! Each node covers one [`Region`] and stores at most one body index:
//! - an **empty** node stores nothing,
//! - a **leaf** (no children) stores exactly one inserted body,
//! - an **internal** node stores a transient aggregate in the [`BodyStore`]
//!   carrying the total mass and center of mass of its whole subtree.
//!
//! Aggregates are created while inserting: every time a body passes through an
//! internal node, the node's aggregate is merged with the body into a fresh
//! transient body. Nothing is computed bottom-up afterwards.
//!
//! ## Opening angle
//!
//! While evaluating the force on body `b`, an internal node whose region size
//! `s` and aggregate distance `d` satisfy `s² / d² < θ²` is treated as a
//! single body. Smaller `θ` opens more nodes: `θ = 0` visits every leaf and
//! reproduces direct summation.

use crate::simulation::bodies::{BodyStore, ForceHandle};
use crate::simulation::error::SimError;
use crate::simulation::region::{Quadrant, Region};

const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct Node {
    region: Region,
    body: Option<usize>,
    children: [Option<usize>; 4], // indices into Quadtree::nodes, NW/NE/SE/SW
}

impl Node {
    fn empty(region: Region) -> Self {
        Self {
            region,
            body: None,
            children: [None; 4],
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Barnes–Hut quadtree over the bodies of one simulation step.
pub struct Quadtree {
    nodes: Vec<Node>,
    region: Region,
    theta: f64,
}

impl Quadtree {
    /// Empty tree covering `region`, opening nodes at ratio `theta`.
    pub fn new(region: Region, theta: f64) -> Self {
        let mut nodes = Vec::new();
        nodes.push(Node::empty(region));
        Self { nodes, region, theta }
    }

    /// Drop every node; the root becomes empty again.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::empty(self.region));
    }

    /// Insert body `body` (read from `bodies`) into the tree.
    ///
    /// Walks down from the root:
    ///
    /// 1. **Empty node**: store the body here and stop.
    /// 2. **Internal node**: replace the node's aggregate with
    ///    `merge(aggregate, body)`, then continue in the child quadrant that
    ///    contains the body (created on demand).
    /// 3. **Leaf holding another body `c`**: move `c` into a new child for
    ///    its quadrant. The node is now internal and still holds `c`, so the
    ///    next pass takes case 2 and merges `c` with `body`.
    ///
    /// The walk is a loop rather than recursion: two bodies at the same
    /// position keep splitting the same quadrant, and each level costs one
    /// aggregate, so the walk ends with [`SimError::CapacityExceeded`] instead
    /// of running out of stack.
    ///
    /// Each body must be inserted at most once per build.
    pub fn insert(&mut self, body: usize, bodies: &mut BodyStore) -> Result<(), SimError> {
        let mut node = ROOT;
        loop {
            match self.nodes[node].body {
                None => {
                    self.nodes[node].body = Some(body);
                    return Ok(());
                }
                Some(held) if self.nodes[node].is_leaf() => {
                    debug_assert_ne!(held, body, "body {body} inserted twice");
                    let child = self.child_for(node, held, bodies);
                    self.nodes[child].body = Some(held);
                }
                Some(aggregate) => {
                    let merged = bodies.merge(aggregate, body)?;
                    self.nodes[node].body = Some(merged);
                    node = self.child_for(node, body, bodies);
                }
            }
        }
    }

    /// Accumulate the approximate force on `body` into its locked accumulator.
    ///
    /// The tree must not change while this runs; callers share it read-only
    /// across workers.
    pub fn update_force(&self, body: usize, bodies: &BodyStore, force: &mut ForceHandle<'_>) {
        self.visit(ROOT, body, bodies, force);
    }

    fn visit(&self, node_idx: usize, body: usize, bodies: &BodyStore, force: &mut ForceHandle<'_>) {
        let node = &self.nodes[node_idx];
        let Some(held) = node.body else {
            return;
        };

        if node.is_leaf() {
            if held != body {
                bodies.accumulate_force(force, held);
            }
            return;
        }

        // Far enough away: the aggregate stands in for the whole subtree
        let ratio = node.region.size_squared() / bodies.distance_squared(body, held);
        if ratio < self.theta * self.theta {
            bodies.accumulate_force(force, held);
            return;
        }

        for child in node.children.iter().flatten() {
            self.visit(*child, body, bodies, force);
        }
    }

    /// Child of `node` in the quadrant holding `body`, created if absent.
    /// Positions that match no quadrant (only possible for `NaN`) go south-west.
    fn child_for(&mut self, node: usize, body: usize, bodies: &BodyStore) -> usize {
        let region = self.nodes[node].region;
        let quadrant = bodies
            .quadrant_of(body, &region)
            .unwrap_or(Quadrant::SouthWest);

        if let Some(child) = self.nodes[node].children[quadrant.index()] {
            return child;
        }
        let child = self.nodes.len();
        self.nodes.push(Node::empty(region.quadrant(quadrant)));
        self.nodes[node].children[quadrant.index()] = Some(child);
        child
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Body (or aggregate) held by the root, `None` for an empty tree.
    pub fn root_body(&self) -> Option<usize> {
        self.nodes[ROOT].body
    }

    /// Nodes allocated in the current build, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bodies held by leaves, in arena order.
    pub fn leaf_bodies(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .filter_map(|n| n.body)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_bodies().count()
    }
}
