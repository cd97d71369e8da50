// Geometry primitives for the navigation core.
//
// World coordinates follow the nav-mesh convention: +x is east, +y is south
// (so north is -y), +z is up. An area's "north-west" corner therefore holds
// the minimum x and y, and its "south-east" corner the maximum.
//
// Contents:
// - `Extent`: axis-aligned bounding box (`lo <= hi` componentwise).
// - `Direction`: the four cardinal sides of an area, with rotation,
//   opposite, angle and vector conversions.
// - `Corner`: the four corners of an area quad.
// - `LadderDirection`: up/down travel on a ladder.
// - Free functions for closest-point and 2D helpers used by the path and
//   locomotion code.
//
// See also: `nav_area.rs` which builds on these, `path.rs` for the
// closest-point-on-segment queries.

use serde::{Deserialize, Serialize};

pub use glam::{Vec2, Vec3};

// ---------------------------------------------------------------------------
// Extent
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box. Invariant: `lo <= hi` componentwise.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub lo: Vec3,
    pub hi: Vec3,
}

impl Extent {
    /// Build from two arbitrary corners; the result is normalized so the
    /// invariant holds regardless of argument order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            lo: a.min(b),
            hi: a.max(b),
        }
    }

    /// A zero-volume extent at a single point.
    pub fn from_point(p: Vec3) -> Self {
        Self { lo: p, hi: p }
    }

    /// Grow to include `p`.
    pub fn encompass_point(&mut self, p: Vec3) {
        self.lo = self.lo.min(p);
        self.hi = self.hi.max(p);
    }

    /// Grow to include another extent.
    pub fn encompass(&mut self, other: &Extent) {
        self.encompass_point(other.lo);
        self.encompass_point(other.hi);
    }

    pub fn size_x(&self) -> f32 {
        self.hi.x - self.lo.x
    }

    pub fn size_y(&self) -> f32 {
        self.hi.y - self.lo.y
    }

    pub fn size_z(&self) -> f32 {
        self.hi.z - self.lo.z
    }

    /// Footprint area in the XY plane.
    pub fn area(&self) -> f32 {
        self.size_x() * self.size_y()
    }

    pub fn center(&self) -> Vec3 {
        (self.lo + self.hi) * 0.5
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.lo.x
            && p.x <= self.hi.x
            && p.y >= self.lo.y
            && p.y <= self.hi.y
            && p.z >= self.lo.z
            && p.z <= self.hi.z
    }

    /// True if the two boxes share any volume (touching faces count).
    pub fn is_overlapping(&self, other: &Extent) -> bool {
        self.lo.x <= other.hi.x
            && self.hi.x >= other.lo.x
            && self.lo.y <= other.hi.y
            && self.hi.y >= other.lo.y
            && self.lo.z <= other.hi.z
            && self.hi.z >= other.lo.z
    }

    /// True if `other` lies entirely within this extent, shrunk by
    /// `tolerance` on every side.
    pub fn is_encompassing(&self, other: &Extent, tolerance: f32) -> bool {
        self.lo.x <= other.lo.x + tolerance
            && self.hi.x + tolerance >= other.hi.x
            && self.lo.y <= other.lo.y + tolerance
            && self.hi.y + tolerance >= other.hi.y
            && self.lo.z <= other.lo.z + tolerance
            && self.hi.z + tolerance >= other.hi.z
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// One of the four sides of a nav area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

pub const NUM_DIRECTIONS: usize = 4;

impl Direction {
    pub const ALL: [Direction; NUM_DIRECTIONS] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Map a raw direction index back to a `Direction`.
    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Opposite of a raw direction index. Anything outside `0..4` yields
    /// `North`.
    pub fn opposite_raw(raw: i32) -> Direction {
        usize::try_from(raw)
            .ok()
            .and_then(Direction::from_index)
            .map(Direction::opposite)
            .unwrap_or(Direction::North)
    }

    /// The side 90 degrees counter-clockwise (viewed from above).
    pub fn left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
            Direction::West => Direction::South,
        }
    }

    /// The side 90 degrees clockwise (viewed from above).
    pub fn right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::South => Direction::West,
            Direction::East => Direction::South,
            Direction::West => Direction::North,
        }
    }

    /// Unit vector in the XY plane pointing out of this side.
    pub fn to_vector_2d(self) -> Vec2 {
        match self {
            Direction::North => Vec2::new(0.0, -1.0),
            Direction::South => Vec2::new(0.0, 1.0),
            Direction::East => Vec2::new(1.0, 0.0),
            Direction::West => Vec2::new(-1.0, 0.0),
        }
    }

    /// Yaw angle in degrees.
    pub fn to_angle(self) -> f32 {
        match self {
            Direction::North => 270.0,
            Direction::South => 90.0,
            Direction::East => 0.0,
            Direction::West => 180.0,
        }
    }

    /// Classify a yaw angle (degrees) into a side.
    ///
    /// The angle is first wrapped into `[0, 360]`. Boundaries are exact:
    /// below 45 or above 315 is east, `[45, 135)` south, `[135, 225)` west,
    /// everything else north.
    pub fn from_angle(angle: f32) -> Direction {
        let mut angle = angle;
        while angle < 0.0 {
            angle += 360.0;
        }
        while angle > 360.0 {
            angle -= 360.0;
        }

        if !(45.0..=315.0).contains(&angle) {
            return Direction::East;
        }
        if (45.0..135.0).contains(&angle) {
            return Direction::South;
        }
        if (135.0..225.0).contains(&angle) {
            return Direction::West;
        }
        Direction::North
    }

    /// Classify a 2D offset into the dominant side.
    pub fn from_delta(delta: Vec2) -> Direction {
        if delta.x.abs() > delta.y.abs() {
            if delta.x > 0.0 {
                Direction::East
            } else {
                Direction::West
            }
        } else if delta.y > 0.0 {
            Direction::South
        } else {
            Direction::North
        }
    }
}

/// Offset `v` by `amount` along the outward vector of `dir`.
pub fn add_direction_vector(v: Vec3, dir: Direction, amount: f32) -> Vec3 {
    let d = dir.to_vector_2d() * amount;
    Vec3::new(v.x + d.x, v.y + d.y, v.z)
}

/// Corners of an area quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    NorthWest = 0,
    NorthEast = 1,
    SouthEast = 2,
    SouthWest = 3,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::NorthWest,
        Corner::NorthEast,
        Corner::SouthEast,
        Corner::SouthWest,
    ];
}

/// Vertical travel direction on a ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LadderDirection {
    Up,
    Down,
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Closest point to `pos` on the segment `[start, end]`, and the parametric
/// position `t` in `[0, 1]` of that point.
pub fn closest_point_on_segment(pos: Vec3, start: Vec3, end: Vec3) -> (Vec3, f32) {
    let to = end - start;
    let length_sq = to.length_squared();
    if length_sq <= f32::EPSILON {
        return (start, 0.0);
    }
    let t = ((pos - start).dot(to) / length_sq).clamp(0.0, 1.0);
    (start + to * t, t)
}

/// Drop the z component.
pub fn xy(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.y)
}
