//! Packs per-component bounding circles into a single 2D arrangement
//! for display, and carries positions across a component-set change.
//!
//! Two policies are offered: the default tangent-circle pack (d3-pack's
//! front-chain algorithm) and a power-of-two grid fallback for callers
//! that want predictable, non-overlapping bucket placement instead of
//! the pack's organic layout.

use glam::Vec2;
use rustc_hash::FxHashMap;

use crate::graph::component_manager::ComponentSplit;
use crate::id::ComponentId;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    fn distance_sq(&self, other: &Circle) -> f32 {
        self.center.distance_squared(other.center)
    }

    fn overlaps(&self, other: &Circle, epsilon: f32) -> bool {
        let dr = self.radius + other.radius - epsilon;
        dr > 0.0 && dr * dr > self.distance_sq(other)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ComponentLayoutPolicy {
    CirclePack,
    Grid,
}

/// Computes a `Circle` per component id, sized proportionally to
/// `sizes` and positioned per `policy`. `sizes` need not be sorted or
/// ordered; iteration order of the input has no bearing on the result
/// beyond tie-breaking by `ComponentId`.
pub fn compute(
    policy: ComponentLayoutPolicy,
    sizes: &FxHashMap<ComponentId, usize>,
    minimum_radius: f32,
) -> FxHashMap<ComponentId, Circle> {
    match policy {
        ComponentLayoutPolicy::CirclePack => circle_pack(sizes, minimum_radius),
        ComponentLayoutPolicy::Grid => grid_layout(sizes, minimum_radius),
    }
}

fn radii_for(sizes: &FxHashMap<ComponentId, usize>, minimum_radius: f32) -> FxHashMap<ComponentId, f32> {
    let max_num_nodes = sizes.values().copied().max().unwrap_or(1).max(1) as f32;
    sizes
        .iter()
        .map(|(&id, &size)| (id, ((size as f32 * 100.0) / max_num_nodes).max(minimum_radius)))
        .collect()
}

#[derive(Debug, Copy, Clone)]
struct Links {
    prev: usize,
    next: usize,
}

/// Ported from d3's `pack.js` circle-packing front-chain algorithm:
/// the first three circles are placed tangentially, then each
/// subsequent one is placed tangent to the last two placed circles
/// and walked around the hull until it no longer overlaps anything.
fn circle_pack(sizes: &FxHashMap<ComponentId, usize>, minimum_radius: f32) -> FxHashMap<ComponentId, Circle> {
    if sizes.is_empty() {
        return FxHashMap::default();
    }

    let radii = radii_for(sizes, minimum_radius);
    let mut ids: Vec<ComponentId> = sizes.keys().copied().collect();
    ids.sort_by(|a, b| {
        radii[b].partial_cmp(&radii[a]).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.index().cmp(&b.index()))
    });

    let mut circles: Vec<Circle> = ids.iter().map(|id| Circle { center: Vec2::ZERO, radius: radii[id] }).collect();
    let n = circles.len();
    let mut links: Vec<Links> = (0..n).map(|i| Links { prev: i, next: i }).collect();

    circles[0].center = Vec2::new(-circles[0].radius, 0.0);

    let mut a = 0usize;
    let mut b = 0usize;
    if n > 1 {
        b = 1;
        circles[b].center = Vec2::new(circles[b].radius, 0.0);
    }

    if n > 2 {
        let c = 2;
        place_third_tangentially(circles[a], circles[b], &mut circles[c]);
        insert(&mut links, a, c);
        links[a].prev = c;
        insert(&mut links, c, b);
        b = links[a].next;
    }

    let mut i = 3;
    while i < n {
        let c = i;
        let placed = {
            let (ca, cb) = (circles[a], circles[b]);
            let mut cc = circles[c];
            place_third_tangentially(ca, cb, &mut cc);
            cc
        };
        circles[c] = placed;

        const EPSILON: f32 = 0.01;
        let mut intersects = false;
        let mut s1 = 1;
        let mut j = links[b].next;
        while j != b {
            if circles[c].overlaps(&circles[j], EPSILON) {
                intersects = true;
                break;
            }
            j = links[j].next;
            s1 += 1;
        }

        if intersects {
            let mut s2 = 1;
            let mut k = links[a].prev;
            let stop = links[j].prev;
            while k != stop {
                if circles[c].overlaps(&circles[k], EPSILON) {
                    break;
                }
                k = links[k].prev;
                s2 += 1;
            }

            if s1 < s2 || (s1 == s2 && circles[b].radius < circles[a].radius) {
                b = j;
                join(&mut links, a, b);
            } else {
                a = k;
                join(&mut links, a, b);
            }
            continue;
        }

        insert(&mut links, a, c);
        b = c;
        i += 1;
    }

    ids.into_iter().zip(circles).collect()
}

fn place_third_tangentially(a: Circle, b: Circle, c: &mut Circle) {
    let db = a.radius + c.radius;
    let dx = b.center.x - a.center.x;
    let dy = b.center.y - a.center.y;

    if db != 0.0 && (dx != 0.0 || dy != 0.0) {
        let mut da = b.radius + c.radius;
        let dc = dx * dx + dy * dy;

        da *= da;
        let db2 = db * db;

        let x = 0.5 + (db2 - da) / (2.0 * dc);
        let value = (2.0 * da * (db2 + dc)) - ((db2 - dc) * (db2 - dc)) - (da * da);
        let y = value.max(0.0).sqrt() / (2.0 * dc);

        c.center.x = a.center.x + x * dx + y * dy;
        c.center.y = a.center.y + x * dy - y * dx;
    } else {
        c.center.x = a.center.x + db;
        c.center.y = a.center.y;
    }
}

fn insert(links: &mut [Links], position: usize, value: usize) {
    let next = links[position].next;
    links[position].next = value;
    links[value].prev = position;
    links[value].next = next;
    links[next].prev = value;
}

fn join(links: &mut [Links], a: usize, b: usize) {
    links[a].next = b;
    links[b].prev = a;
}

/// Buckets components by a power-of-two divisor of the largest
/// component's node count, then places bucket squares left-to-right,
/// top-to-bottom. Simpler and more predictable than the pack, at the
/// cost of wasted space between differently-sized components.
fn grid_layout(sizes: &FxHashMap<ComponentId, usize>, minimum_radius: f32) -> FxHashMap<ComponentId, Circle> {
    if sizes.is_empty() {
        return FxHashMap::default();
    }

    let radii = radii_for(sizes, minimum_radius);
    let mut ids: Vec<ComponentId> = sizes.keys().copied().collect();
    ids.sort_by(|a, b| {
        radii[b].partial_cmp(&radii[a]).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.index().cmp(&b.index()))
    });

    let columns = (ids.len() as f64).sqrt().ceil().max(1.0) as usize;
    let columns = columns.next_power_of_two();
    let cell = radii.values().cloned().fold(0.0_f32, f32::max) * 2.2;

    ids.iter()
        .enumerate()
        .map(|(index, &id)| {
            let row = (index / columns) as f32;
            let col = (index % columns) as f32;
            Circle { center: Vec2::new(col * cell, row * cell), radius: radii[&id] }
        })
        .collect()
}

/// Carries component-centre positions across a component-set change:
/// a component whose id survived (unchanged, or the winning side of a
/// merge, since mergers keep the larger side's id) keeps its position
/// outright; a component born from a split inherits its parent's
/// position; anything else (a genuinely new component) is left unset
/// for the caller to seed fresh.
pub fn interpolate_positions(
    previous: &FxHashMap<ComponentId, Vec2>,
    current_ids: &[ComponentId],
    splits: &[ComponentSplit],
) -> FxHashMap<ComponentId, Vec2> {
    let mut parent_of_new: FxHashMap<ComponentId, ComponentId> = FxHashMap::default();
    for split in splits {
        for &child in &split.new_ids {
            parent_of_new.insert(child, split.old);
        }
    }

    let mut out = FxHashMap::default();
    for &id in current_ids {
        if let Some(&pos) = previous.get(&id) {
            out.insert(id, pos);
        } else if let Some(parent) = parent_of_new.get(&id) {
            if let Some(&pos) = previous.get(parent) {
                out.insert(id, pos);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(pairs: &[(u32, usize)]) -> FxHashMap<ComponentId, usize> {
        pairs.iter().map(|&(id, size)| (ComponentId::new(id), size)).collect()
    }

    #[test]
    fn single_component_sits_at_its_own_radius() {
        let sizes = sizes(&[(0, 10)]);
        let circles = circle_pack(&sizes, 1.0);
        let circle = circles[&ComponentId::new(0)];
        assert_eq!(circle.center.x, -circle.radius);
    }

    #[test]
    fn three_components_pack_without_overlap() {
        let sizes = sizes(&[(0, 10), (1, 8), (2, 6)]);
        let circles = circle_pack(&sizes, 1.0);
        let values: Vec<Circle> = circles.values().copied().collect();
        for i in 0..values.len() {
            for j in (i + 1)..values.len() {
                let min_distance = values[i].radius + values[j].radius;
                assert!(values[i].center.distance(values[j].center) >= min_distance - 0.5);
            }
        }
    }

    #[test]
    fn grid_layout_places_every_component() {
        let sizes = sizes(&[(0, 4), (1, 4), (2, 4), (3, 4), (4, 4)]);
        let circles = grid_layout(&sizes, 1.0);
        assert_eq!(circles.len(), 5);
    }

    #[test]
    fn split_children_inherit_parent_position() {
        let mut previous = FxHashMap::default();
        previous.insert(ComponentId::new(0), Vec2::new(5.0, 5.0));

        let split = ComponentSplit { old: ComponentId::new(0), new_ids: vec![ComponentId::new(1), ComponentId::new(2)] };
        let current = interpolate_positions(&previous, &[ComponentId::new(1), ComponentId::new(2)], std::slice::from_ref(&split));

        assert_eq!(current[&ComponentId::new(1)], Vec2::new(5.0, 5.0));
        assert_eq!(current[&ComponentId::new(2)], Vec2::new(5.0, 5.0));
    }

    #[test]
    fn merge_winner_keeps_its_position_with_no_split_event() {
        let mut previous = FxHashMap::default();
        previous.insert(ComponentId::new(0), Vec2::new(1.0, 2.0));
        previous.insert(ComponentId::new(1), Vec2::new(9.0, 9.0));

        // Component 1 was merged away; only 0 survives.
        let current = interpolate_positions(&previous, &[ComponentId::new(0)], &[]);
        assert_eq!(current.len(), 1);
        assert_eq!(current[&ComponentId::new(0)], Vec2::new(1.0, 2.0));
    }
}
