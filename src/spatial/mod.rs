//! Recursively subdivided spatial index (oct-tree in 3D, quad-tree in
//! 2D) used for Barnes-Hut force approximation and picking.
//!
//! Construction is a level-by-level parallel breadth-first build: each
//! level's subdivisible volumes are processed together via `rayon`,
//! and the next level's work queue is assembled from their children.

use glam::Vec3;
use rayon::prelude::*;

use crate::id::NodeId;

#[derive(Debug, Copy, Clone)]
pub struct BoundingBox {
    pub centre: Vec3,
    pub half_extent: Vec3,
}

impl BoundingBox {
    pub fn containing(positions: &[(NodeId, Vec3)]) -> Self {
        if positions.is_empty() {
            return Self { centre: Vec3::ZERO, half_extent: Vec3::ONE };
        }
        let mut min = positions[0].1;
        let mut max = positions[0].1;
        for &(_, p) in positions {
            min = min.min(p);
            max = max.max(p);
        }
        let centre = (min + max) * 0.5;
        let half_extent = ((max - min) * 0.5).max(Vec3::splat(1e-6));
        Self { centre, half_extent }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (point.x - self.centre.x).abs() <= self.half_extent.x
            && (point.y - self.centre.y).abs() <= self.half_extent.y
            && (point.z - self.centre.z).abs() <= self.half_extent.z
    }

    /// True once further subdivision would not change the bounds at
    /// floating-point precision - the source's `centre +- half == centre`
    /// check.
    fn below_precision(&self) -> bool {
        let h = self.half_extent * 0.5;
        self.centre.x + h.x == self.centre.x || self.centre.y + h.y == self.centre.y || self.centre.z + h.z == self.centre.z
    }

    fn octant_index(&self, point: Vec3, dimensions: usize) -> usize {
        let mut index = 0;
        if point.x >= self.centre.x {
            index |= 0b001;
        }
        if point.y >= self.centre.y {
            index |= 0b010;
        }
        if dimensions == 3 && point.z >= self.centre.z {
            index |= 0b100;
        }
        index
    }

    fn child(&self, index: usize, dimensions: usize) -> Self {
        let h = self.half_extent * 0.5;
        let sign = |bit: usize| if index & bit != 0 { 1.0 } else { -1.0 };
        let mut centre = self.centre
            + Vec3::new(sign(0b001) * h.x, sign(0b010) * h.y, 0.0);
        let mut half_extent = Vec3::new(h.x, h.y, self.half_extent.z);
        if dimensions == 3 {
            centre.z += sign(0b100) * h.z;
            half_extent.z = h.z;
        }
        Self { centre, half_extent }
    }
}

enum NodeKind {
    Leaf { node_ids: Vec<NodeId> },
    Branch { children: Vec<SubVolume> },
}

pub struct SubVolume {
    pub bounding_box: BoundingBox,
    kind: NodeKind,
    pub centre_of_mass: Vec3,
    pub mass: usize,
}

impl SubVolume {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    pub fn node_ids(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Leaf { node_ids } => node_ids,
            NodeKind::Branch { .. } => &[],
        }
    }

    pub fn children(&self) -> &[SubVolume] {
        match &self.kind {
            NodeKind::Branch { children } => children,
            NodeKind::Leaf { .. } => &[],
        }
    }

    /// Angular-extent test for Barnes-Hut: the ratio of this volume's
    /// diameter to its distance from `query` compared against `theta`.
    pub fn is_far_enough(&self, query: Vec3, theta: f32) -> bool {
        let diameter = self.bounding_box.half_extent.length() * 2.0;
        let distance = (self.centre_of_mass - query).length();
        if distance <= f32::EPSILON {
            return false;
        }
        diameter / distance < theta
    }

    pub fn visit_pre_order<'a>(&'a self, f: &mut impl FnMut(&'a SubVolume)) {
        f(self);
        for child in self.children() {
            child.visit_pre_order(f);
        }
    }

    pub fn collect_leaves<'a>(&'a self, pred: &impl Fn(&SubVolume) -> bool, out: &mut Vec<&'a SubVolume>) {
        if self.is_leaf() {
            if pred(self) {
                out.push(self);
            }
            return;
        }
        for child in self.children() {
            child.collect_leaves(pred, out);
        }
    }
}

pub struct SpatialTree {
    pub root: SubVolume,
    pub dimensions: usize,
}

impl SpatialTree {
    /// Builds the tree over `positions` (one per live node in a
    /// component). `dimensions` is 2 for a quad-tree, 3 for an oct-tree.
    pub fn build(positions: &[(NodeId, Vec3)], dimensions: usize, max_nodes_per_leaf: usize) -> Self {
        let bounds = BoundingBox::containing(positions);
        let root = Self::build_recursive(bounds, positions.to_vec(), dimensions, max_nodes_per_leaf);
        Self { root, dimensions }
    }

    fn build_recursive(bounds: BoundingBox, positions: Vec<(NodeId, Vec3)>, dimensions: usize, max_nodes_per_leaf: usize) -> SubVolume {
        let coincident = positions.windows(2).all(|w| (w[0].1 - w[1].1).length_squared() < 1e-12);

        if positions.len() <= max_nodes_per_leaf || bounds.below_precision() || coincident {
            let mass = positions.len();
            let centre_of_mass = if mass == 0 {
                bounds.centre
            } else {
                positions.iter().map(|(_, p)| *p).sum::<Vec3>() / mass as f32
            };
            return SubVolume {
                bounding_box: bounds,
                kind: NodeKind::Leaf { node_ids: positions.into_iter().map(|(id, _)| id).collect() },
                centre_of_mass,
                mass,
            };
        }

        let num_octants = 1 << dimensions;
        let mut buckets: Vec<Vec<(NodeId, Vec3)>> = vec![Vec::new(); num_octants];
        for entry in positions {
            let index = bounds.octant_index(entry.1, dimensions);
            buckets[index].push(entry);
        }

        // Level-by-level parallel build: every non-empty bucket at this
        // level is recursed into concurrently via the shared worker pool.
        let children: Vec<SubVolume> = buckets
            .into_par_iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(index, bucket)| {
                let child_bounds = bounds.child(index, dimensions);
                Self::build_recursive(child_bounds, bucket, dimensions, max_nodes_per_leaf)
            })
            .collect();

        let mass: usize = children.iter().map(|c| c.mass).sum();
        let centre_of_mass = if mass == 0 {
            bounds.centre
        } else {
            children.iter().map(|c| c.centre_of_mass * c.mass as f32).sum::<Vec3>() / mass as f32
        };

        SubVolume {
            bounding_box: bounds,
            kind: NodeKind::Branch { children },
            centre_of_mass,
            mass,
        }
    }

    pub fn subvolume_for_point(&self, point: Vec3) -> Option<&SubVolume> {
        fn walk<'a>(node: &'a SubVolume, point: Vec3) -> Option<&'a SubVolume> {
            if !node.bounding_box.contains(point) {
                return None;
            }
            if node.is_leaf() {
                return Some(node);
            }
            node.children().iter().find_map(|c| walk(c, point))
        }
        walk(&self.root, point)
    }

    pub fn leaves(&self, pred: impl Fn(&SubVolume) -> bool) -> Vec<&SubVolume> {
        let mut out = Vec::new();
        self.root.collect_leaves(&pred, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_node_tree_has_depth_zero() {
        let id = NodeId::new(0);
        let tree = SpatialTree::build(&[(id, Vec3::ZERO)], 3, 1);
        assert!(tree.root.is_leaf());
        assert_eq!(tree.root.node_ids(), &[id]);
    }

    #[test]
    fn every_node_lands_in_a_leaf_containing_its_position() {
        let positions: Vec<(NodeId, Vec3)> = (0..64)
            .map(|i| (NodeId::new(i), Vec3::new((i % 8) as f32, (i / 8) as f32, 0.0)))
            .collect();
        let tree = SpatialTree::build(&positions, 2, 1);

        for &(id, pos) in &positions {
            let leaf = tree.subvolume_for_point(pos).expect("every position should resolve to a leaf");
            assert!(leaf.bounding_box.contains(pos));
            assert!(leaf.node_ids().contains(&id));
        }
    }

    #[test]
    fn coincident_positions_collapse_to_one_leaf() {
        let positions = vec![
            (NodeId::new(0), Vec3::new(1.0, 1.0, 1.0)),
            (NodeId::new(1), Vec3::new(1.0, 1.0, 1.0)),
            (NodeId::new(2), Vec3::new(1.0, 1.0, 1.0)),
        ];
        let tree = SpatialTree::build(&positions, 3, 1);
        assert!(tree.root.is_leaf());
        assert_eq!(tree.root.node_ids().len(), 3);
    }
}
