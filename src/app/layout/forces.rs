use glam::Vec3;

use crate::util::fallback_direction;

use super::octree::OctNode;

const MIN_DISTANCE: f32 = 0.0001;

#[derive(Clone, Copy)]
pub(super) struct RepulsionParams {
    pub(super) strength: f32,
    pub(super) softening: f32,
    pub(super) theta: f32,
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) max_distance_sq: f32,
}

fn separation(positions: &[Vec3], from: usize, to: usize) -> (Vec3, f32) {
    let delta = positions[from] - positions[to];
    let distance = delta.length();
    if distance > MIN_DISTANCE {
        (delta / distance, distance)
    } else {
        (fallback_direction(from.min(to), from.max(to)) * sign(from, to), 0.0)
    }
}

fn sign(from: usize, to: usize) -> f32 {
    if from < to { 1.0 } else { -1.0 }
}

pub(super) fn accumulate_repulsion_for_node(
    node: &OctNode,
    index: usize,
    positions: &[Vec3],
    params: RepulsionParams,
    impulse: &mut Vec3,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index {
                continue;
            }
            let (direction, distance) = separation(positions, index, other);
            *impulse += direction * (params.strength / (distance * distance + params.softening));
        }
        return;
    }

    let delta = point - node.center_of_mass;
    let distance_sq = delta.length_squared().max(MIN_DISTANCE);
    let distance = distance_sq.sqrt();
    let can_approximate = !node.bounds.contains(point)
        && (node.bounds.side_length() / distance) < params.theta
        && node.mass > 1.0;

    if can_approximate {
        let scaled = (params.strength * node.mass) / (distance_sq + params.softening);
        *impulse += (delta / distance) * scaled;
        return;
    }

    for child in node.children() {
        accumulate_repulsion_for_node(child, index, positions, params, impulse);
    }
}

fn collide(
    from: usize,
    to: usize,
    positions: &[Vec3],
    radii: &[f32],
    params: CollisionParams,
    impulses: &mut [Vec3],
) {
    let min_distance = radii[from] + radii[to];
    let (direction, distance) = separation(positions, from, to);
    if distance < min_distance {
        let push = direction * ((min_distance - distance) * params.strength * 0.5);
        impulses[from] += push;
        impulses[to] -= push;
    }
}

pub(super) fn accumulate_collision_pairs(
    node_a: &OctNode,
    node_b: &OctNode,
    same_node: bool,
    positions: &[Vec3],
    radii: &[f32],
    params: CollisionParams,
    impulses: &mut [Vec3],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    collide(from, to, positions, radii, params, impulses);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    collide(from, to, positions, radii, params, impulses);
                }
            }
        }
        return;
    }

    if same_node {
        let children = node_a.children().collect::<Vec<_>>();
        for (offset, child_a) in children.iter().enumerate() {
            accumulate_collision_pairs(child_a, child_a, true, positions, radii, params, impulses);
            for child_b in &children[offset + 1..] {
                accumulate_collision_pairs(
                    child_a, child_b, false, positions, radii, params, impulses,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children() {
            accumulate_collision_pairs(child, node_b, false, positions, radii, params, impulses);
        }
    } else {
        for child in node_b.children() {
            accumulate_collision_pairs(node_a, child, false, positions, radii, params, impulses);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exact impulse per node plus the summed magnitude of its pair terms.
    fn brute_force_repulsion(positions: &[Vec3], params: RepulsionParams) -> Vec<(Vec3, f32)> {
        (0..positions.len())
            .map(|index| {
                (0..positions.len())
                    .filter(|&other| other != index)
                    .map(|other| {
                        let (direction, distance) = separation(positions, index, other);
                        direction * (params.strength / (distance * distance + params.softening))
                    })
                    .fold((Vec3::ZERO, 0.0), |(sum, total), impulse| {
                        (sum + impulse, total + impulse.length())
                    })
            })
            .collect()
    }

    #[test]
    fn coincident_points_are_pushed_apart() {
        let positions = [Vec3::ZERO, Vec3::ZERO];
        let tree = OctNode::build(&positions).unwrap();
        let params = RepulsionParams {
            strength: 100.0,
            softening: 1.0,
            theta: 0.8,
        };

        let mut first = Vec3::ZERO;
        let mut second = Vec3::ZERO;
        accumulate_repulsion_for_node(&tree, 0, &positions, params, &mut first);
        accumulate_repulsion_for_node(&tree, 1, &positions, params, &mut second);

        assert!(first.is_finite() && second.is_finite());
        assert!(first.length() > 0.0);
        assert!((first + second).length() < 1e-4);
    }

    #[test]
    fn barnes_hut_tracks_exact_repulsion() {
        let positions = (0..300)
            .map(|index| {
                let index = index as f32;
                Vec3::new(
                    (index * 1.3).sin() * 200.0,
                    (index * 0.7).cos() * 150.0,
                    (index * 0.31).sin() * 120.0,
                )
            })
            .collect::<Vec<_>>();
        let params = RepulsionParams {
            strength: 3000.0,
            softening: 100.0,
            theta: 0.8,
        };
        let tree = OctNode::build(&positions).unwrap();
        let exact = brute_force_repulsion(&positions, params);

        for index in [0, 17, 150, 299] {
            let mut approx = Vec3::ZERO;
            accumulate_repulsion_for_node(&tree, index, &positions, params, &mut approx);
            let (net, total) = exact[index];
            let error = (approx - net).length();
            assert!(error <= total * 0.05, "index {index}: error {error} of {total}");
        }
    }

    #[test]
    fn overlapping_nodes_collide_symmetrically() {
        let positions = [Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 0.0)];
        let radii = [2.0, 2.0, 2.0];
        let tree = OctNode::build(&positions).unwrap();
        let mut impulses = vec![Vec3::ZERO; 3];

        accumulate_collision_pairs(
            &tree,
            &tree,
            true,
            &positions,
            &radii,
            CollisionParams {
                strength: 1.0,
                max_distance_sq: 16.0,
            },
            &mut impulses,
        );

        assert!(impulses[0].x < 0.0);
        assert!(impulses[1].x > 0.0);
        assert_eq!(impulses[2], Vec3::ZERO);
        assert!((impulses[0] + impulses[1]).length() < 1e-5);
    }
}
