use crate::geom::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 16;

/// Square axis-aligned region of the layout plane.
#[derive(Clone, Copy, Debug)]
pub(super) struct QuadBounds {
    pub(super) min: Vec2,
    pub(super) max: Vec2,
}

impl QuadBounds {
    /// Smallest square (with a little slack) enclosing all points.
    fn around(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for point in points {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let center = (min + max) * 0.5;
        let half = (((max.x - min.x).max(max.y - min.y)) * 0.5).max(0.5) + 0.5;
        Some(Self {
            min: center - vec2(half, half),
            max: center + vec2(half, half),
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    pub(super) fn side(self) -> f32 {
        self.max.x - self.min.x
    }

    fn center(self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    fn quadrant(self, point: Vec2) -> usize {
        let mid = self.center();
        match (point.x >= mid.x, point.y >= mid.y) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    fn child(self, quadrant: usize) -> Self {
        let mid = self.center();
        let (min, max) = match quadrant {
            0 => (self.min, mid),
            1 => (vec2(mid.x, self.min.y), vec2(self.max.x, mid.y)),
            2 => (vec2(self.min.x, mid.y), vec2(mid.x, self.max.y)),
            _ => (mid, self.max),
        };
        Self { min, max }
    }

    /// Squared distance from a point to this region; zero inside it.
    pub(super) fn distance_sq_to_point(self, point: Vec2) -> f32 {
        let dx = (self.min.x - point.x).max(point.x - self.max.x).max(0.0);
        let dy = (self.min.y - point.y).max(point.y - self.max.y).max(0.0);
        (dx * dx) + (dy * dy)
    }
}

/// Barnes-Hut quadtree over node positions. Interior cells carry aggregate
/// mass and center of mass; leaves carry the point indices themselves.
pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    pub(super) points: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    /// Returns `None` when there are no points or any coordinate is non-finite.
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let bounds = QuadBounds::around(positions)?;
        let indices = (0..positions.len()).collect();
        Some(Self::subdivide(bounds, indices, positions, 0))
    }

    fn subdivide(bounds: QuadBounds, indices: Vec<usize>, positions: &[Vec2], depth: usize) -> Self {
        let mass = indices.len() as f32;
        let mut center_of_mass = Vec2::ZERO;
        for &index in &indices {
            center_of_mass += positions[index];
        }
        if mass > 0.0 {
            center_of_mass /= mass;
        }

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            points: indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= MAX_DEPTH || node.points.len() <= LEAF_CAPACITY {
            return node;
        }

        let mut buckets: [Vec<usize>; 4] = std::array::from_fn(|_| Vec::new());
        for &index in &node.points {
            buckets[bounds.quadrant(positions[index])].push(index);
        }

        // All points piled into one quadrant: splitting further cannot make
        // progress, keep the pile as a leaf.
        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            node.children[quadrant] = Some(Box::new(Self::subdivide(
                bounds.child(quadrant),
                bucket,
                positions,
                depth + 1,
            )));
        }
        node.points.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}
