use glam::Vec3;

const OCTREE_LEAF_CAPACITY: usize = 12;
const OCTREE_MAX_DEPTH: usize = 10;

#[derive(Clone, Copy)]
pub(super) struct CubeBounds {
    pub(super) center: Vec3,
    pub(super) half_extent: f32,
}

impl CubeBounds {
    fn from_points(points: &[Vec3]) -> Option<Self> {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }

        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let center = (min + max) * 0.5;
        let span = (max - min).max(Vec3::ONE);
        let half_extent = (span.max_element() * 0.5) + 1.0;

        Some(Self {
            center,
            half_extent,
        })
    }

    pub(super) fn contains(self, point: Vec3) -> bool {
        let offset = (point - self.center).abs();
        offset.max_element() <= self.half_extent
    }

    fn child(self, octant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let sign = |bit: usize| if octant & bit == 0 { -quarter } else { quarter };

        Self {
            center: self.center + Vec3::new(sign(1), sign(2), sign(4)),
            half_extent: quarter,
        }
    }

    fn octant_for(self, point: Vec3) -> usize {
        usize::from(point.x >= self.center.x)
            | (usize::from(point.y >= self.center.y) << 1)
            | (usize::from(point.z >= self.center.z) << 2)
    }

    pub(super) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }

    pub(super) fn distance_sq_to(self, other: Self) -> f32 {
        let gap = (self.center - other.center).abs()
            - Vec3::splat(self.half_extent + other.half_extent);
        gap.max(Vec3::ZERO).length_squared()
    }
}

pub(super) struct OctNode {
    pub(super) bounds: CubeBounds,
    pub(super) center_of_mass: Vec3,
    pub(super) mass: f32,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<OctNode>>; 8],
}

impl OctNode {
    pub(super) fn build(positions: &[Vec3]) -> Option<Self> {
        let bounds = CubeBounds::from_points(positions)?;
        let indices = (0..positions.len()).collect::<Vec<_>>();
        Some(Self::build_node(bounds, indices, positions, 0))
    }

    fn build_node(
        bounds: CubeBounds,
        indices: Vec<usize>,
        positions: &[Vec3],
        depth: usize,
    ) -> Self {
        let mut center_of_mass = Vec3::ZERO;
        for &index in &indices {
            center_of_mass += positions[index];
        }

        let mass = indices.len() as f32;
        if mass > 0.0 {
            center_of_mass /= mass;
        }

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= OCTREE_MAX_DEPTH || node.indices.len() <= OCTREE_LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 8, _>(|_| Vec::new());
        for &index in &node.indices {
            buckets[bounds.octant_for(positions[index])].push(index);
        }

        let non_empty = buckets.iter().filter(|bucket| !bucket.is_empty()).count();
        if non_empty <= 1 {
            return node;
        }

        for (octant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            node.children[octant] = Some(Box::new(Self::build_node(
                bounds.child(octant),
                bucket,
                positions,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }

    pub(super) fn children(&self) -> impl Iterator<Item = &OctNode> {
        self.children.iter().filter_map(|child| child.as_deref())
    }
}
