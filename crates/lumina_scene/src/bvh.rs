//! Bounding volume hierarchy with median splits
//!
//! Each interior node splits its triangles at the median centroid along the
//! longest axis of the centroid bounds. Nodes are stored flat; the left
//! child of an interior node immediately follows it.

use glam::Vec3;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

use lumina_core::geometry::{Aabb, Ray, Triangle};
use lumina_core::interfaces::{next_accel_generation, Accel, AccelGeometry, AccelHit};
use lumina_core::{Component, ConfigExt, ConfigValue, ConstructContext, Error, Result};

/// Default maximum number of triangles per leaf
pub const DEFAULT_MAX_LEAF: usize = 4;

#[derive(Clone, Copy, Debug)]
struct TriRef {
    primitive: usize,
    face: usize,
    tri: Triangle,
    centroid: Vec3,
}

#[derive(Clone, Copy, Debug)]
enum Node {
    Leaf { bounds: Aabb, start: usize, count: usize },
    Interior { bounds: Aabb, right: usize },
}

impl Node {
    fn bounds(&self) -> &Aabb {
        match self {
            Node::Leaf { bounds, .. } | Node::Interior { bounds, .. } => bounds,
        }
    }
}

#[derive(Default)]
struct Tree {
    nodes: Vec<Node>,
    tris: Vec<TriRef>,
}

impl Tree {
    fn build(tris: Vec<TriRef>, max_leaf: usize) -> Self {
        let mut tree = Tree {
            nodes: Vec::with_capacity(2 * tris.len() / max_leaf.max(1) + 1),
            tris,
        };
        if !tree.tris.is_empty() {
            let len = tree.tris.len();
            tree.split(0, len, max_leaf);
        }
        tree
    }

    /// Build the subtree over `tris[start..end]`, returning its node index
    fn split(&mut self, start: usize, end: usize, max_leaf: usize) -> usize {
        let range = &mut self.tris[start..end];
        let bounds = range
            .iter()
            .fold(Aabb::EMPTY, |b, t| b.union(t.tri.bounds()));
        let index = self.nodes.len();

        if range.len() <= max_leaf {
            self.nodes.push(Node::Leaf {
                bounds,
                start,
                count: end - start,
            });
            return index;
        }

        let centroid_bounds = range
            .iter()
            .fold(Aabb::EMPTY, |b, t| b.expand(t.centroid));
        let axis = centroid_bounds.largest_axis();
        let mid = range.len() / 2;
        range.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));

        // Placeholder until the right child index is known
        self.nodes.push(Node::Interior { bounds, right: 0 });
        self.split(start, start + mid, max_leaf);
        let right = self.split(start + mid, end, max_leaf);
        self.nodes[index] = Node::Interior { bounds, right };
        index
    }

    fn intersect(&self, ray: &Ray, tmin: f32, mut tmax: f32) -> Option<AccelHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let inv_dir = ray.inverse_direction();
        let mut closest = None;
        let mut stack = vec![0usize];

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.bounds().hit(ray, inv_dir, tmin, tmax) {
                continue;
            }
            match *node {
                Node::Leaf { start, count, .. } => {
                    for r in &self.tris[start..start + count] {
                        if let Some(hit) = r.tri.intersect(ray, tmin, tmax) {
                            tmax = hit.t;
                            closest = Some(AccelHit {
                                t: hit.t,
                                uv: hit.uv,
                                primitive: r.primitive,
                                face: r.face,
                            });
                        }
                    }
                }
                Node::Interior { right, .. } => {
                    stack.push(right);
                    stack.push(index + 1);
                }
            }
        }
        closest
    }
}

/// Median-split BVH accelerator
pub struct BvhAccel {
    max_leaf: usize,
    tree: RwLock<Tree>,
    generation: AtomicU64,
}

impl Default for BvhAccel {
    fn default() -> Self {
        Self {
            max_leaf: DEFAULT_MAX_LEAF,
            tree: RwLock::new(Tree::default()),
            generation: AtomicU64::new(0),
        }
    }
}

impl BvhAccel {
    pub fn node_count(&self) -> usize {
        self.tree.read().nodes.len()
    }
}

impl Component for BvhAccel {
    fn construct(&mut self, config: &ConfigValue, _ctx: &mut ConstructContext<'_>) -> Result<()> {
        let max_leaf: usize = config.value_or("max_leaf", DEFAULT_MAX_LEAF)?;
        if max_leaf == 0 {
            return Err(Error::validation("max_leaf", "must be at least 1"));
        }
        self.max_leaf = max_leaf;
        Ok(())
    }

    fn serialize(&self) -> Option<ConfigValue> {
        Some(json!({ "max_leaf": self.max_leaf }))
    }

    fn as_accel(&self) -> Option<&(dyn Accel + 'static)> {
        Some(self)
    }
}

impl Accel for BvhAccel {
    fn build(&self, geometry: &[AccelGeometry]) -> Result<()> {
        let tris: Vec<TriRef> = geometry
            .iter()
            .flat_map(|g| {
                g.triangles.iter().enumerate().map(move |(face, tri)| TriRef {
                    primitive: g.primitive,
                    face,
                    tri: *tri,
                    centroid: tri.centroid(),
                })
            })
            .collect();
        let count = tris.len();
        let tree = Tree::build(tris, self.max_leaf);
        log::debug!("BVH over {} triangles, {} nodes", count, tree.nodes.len());
        *self.tree.write() = tree;
        self.generation.store(next_accel_generation(), Ordering::Release);
        Ok(())
    }

    fn intersect(&self, ray: &Ray, tmin: f32, tmax: f32) -> Option<AccelHit> {
        self.tree.read().intersect(ray, tmin, tmax)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
