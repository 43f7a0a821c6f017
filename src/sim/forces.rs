use std::f32::consts::TAU;

use crate::geom::{Vec2, vec2};

use super::quadtree::QuadNode;

/// Deterministic unit direction for a pair of coincident nodes, in place of
/// the undefined separation vector. The golden-ratio mix keeps distinct
/// pairs pointing different ways.
pub(super) fn separation_jitter(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * TAU;
    vec2(angle.cos(), angle.sin())
}

/// Accumulates the many-body repulsion acting on one node.
///
/// Distant cells whose angular size falls under `theta` contribute as a
/// single mass at their center; leaves are exact pairwise. `strength` is the
/// alpha-scaled charge magnitude, and `softening` keeps the inverse-square
/// law finite at small separations.
pub(super) fn accumulate_repulsion(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    strength: f32,
    softening: f32,
    theta: f32,
    force: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other in &node.points {
            if other == index {
                continue;
            }
            let delta = point - positions[other];
            let distance_sq = delta.length_sq();
            let direction = if distance_sq > 1e-8 {
                delta / distance_sq.sqrt()
            } else {
                separation_jitter(index, other)
            };
            *force += direction * (strength / (distance_sq + softening));
        }
        return;
    }

    let delta = point - node.center_of_mass;
    let distance_sq = delta.length_sq().max(1e-4);
    let distance = distance_sq.sqrt();
    let far_enough = !node.bounds.contains(point) && (node.bounds.side() / distance) < theta;

    if far_enough {
        let direction = delta / distance;
        *force += direction * ((strength * node.mass) / (distance_sq + softening));
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion(child, index, positions, strength, softening, theta, force);
    }
}

/// Pushes overlapping nodes apart along their separation vector, directly in
/// position space, until non-overlapping or the pass limit runs out.
///
/// Nodes flagged in `locked` (pinned by a drag) never move; their overlap is
/// shoved entirely onto the free partner. Returns the number of overlaps
/// resolved.
pub(super) fn resolve_collisions(
    positions: &mut [Vec2],
    radii: &[f32],
    locked: &[bool],
    passes: usize,
) -> usize {
    let count = positions.len();
    if count < 2 {
        return 0;
    }
    let max_radius = radii.iter().fold(0.0_f32, |acc, &radius| acc.max(radius));

    let mut total = 0;
    for _ in 0..passes {
        let Some(tree) = QuadNode::build(positions) else {
            break;
        };
        let mut resolved = 0;
        for index in 0..count {
            resolved += separate_overlaps(&tree, index, positions, radii, locked, max_radius);
        }
        total += resolved;
        if resolved == 0 {
            break;
        }
    }
    total
}

fn separate_overlaps(
    node: &QuadNode,
    index: usize,
    positions: &mut [Vec2],
    radii: &[f32],
    locked: &[bool],
    max_radius: f32,
) -> usize {
    let reach = radii[index] + max_radius;
    if node.bounds.distance_sq_to_point(positions[index]) > reach * reach {
        return 0;
    }

    if node.is_leaf() {
        let mut resolved = 0;
        for &other in &node.points {
            // Each unordered pair is handled once, from its lower index.
            if other <= index {
                continue;
            }
            let min_distance = radii[index] + radii[other];
            let delta = positions[index] - positions[other];
            let distance_sq = delta.length_sq();
            if distance_sq >= min_distance * min_distance {
                continue;
            }

            let distance = distance_sq.sqrt();
            let direction = if distance > 1e-4 {
                delta / distance
            } else {
                separation_jitter(index, other)
            };
            let overlap = min_distance - distance;

            match (locked[index], locked[other]) {
                (false, false) => {
                    positions[index] += direction * (overlap * 0.5);
                    positions[other] -= direction * (overlap * 0.5);
                }
                (true, false) => positions[other] -= direction * overlap,
                (false, true) => positions[index] += direction * overlap,
                (true, true) => continue,
            }
            resolved += 1;
        }
        return resolved;
    }

    let mut resolved = 0;
    for child in node.children.iter().flatten() {
        resolved += separate_overlaps(child, index, positions, radii, locked, max_radius);
    }
    resolved
}
