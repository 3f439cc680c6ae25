//! Axis-aligned square regions and their quadrant geometry.
//!
//! Coordinates follow the screen convention the viewer uses: "north" is the
//! smaller `y`, "west" the smaller `x`. Splitting a region yields four
//! half-size children that exactly tile the parent:
//!
//! ```text
//!   (xmin,ymin) +------+------+
//!               |  NW  |  NE  |
//!               +------+------+ ymid
//!               |  SW  |  SE  |
//!               +------+------+ (xmax,ymax)
//!                     xmid
//! ```
//!
//! All containment tests are inclusive, so a point on a dividing line is
//! inside two (or four) children. [`Region::quadrant_of`] settles that by
//! testing in the fixed order NW, NE, SE, SW and taking the first match.

use crate::simulation::bodies::NVec2;

/// One of the four children of a [`Region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NorthWest = 0,
    NorthEast = 1,
    SouthEast = 2,
    SouthWest = 3,
}

impl Quadrant {
    /// Quadrants in tie-break order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthEast,
        Quadrant::SouthWest,
    ];

    /// Slot of this quadrant in a node's child array.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Axis-aligned square region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    min: NVec2,
    max: NVec2,
    mid: NVec2,
}

impl Region {
    /// Square of edge length `size` centered on `center`.
    pub fn from_center(center: NVec2, size: f64) -> Self {
        let half = size / 2.0;
        Self {
            min: NVec2::new(center.x - half, center.y - half),
            max: NVec2::new(center.x + half, center.y + half),
            mid: center,
        }
    }

    /// Region spanning the two corners. Callers pass a square.
    pub fn from_corners(min: NVec2, max: NVec2) -> Self {
        Self {
            min,
            max,
            mid: (min + max) * 0.5,
        }
    }

    pub fn min(&self) -> NVec2 {
        self.min
    }

    pub fn max(&self) -> NVec2 {
        self.max
    }

    pub fn center(&self) -> NVec2 {
        self.mid
    }

    /// Edge length.
    pub fn size(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Squared edge length, the numerator of the opening-angle test.
    pub fn size_squared(&self) -> f64 {
        let s = self.size();
        s * s
    }

    pub fn area(&self) -> f64 {
        (self.max.x - self.min.x) * (self.max.y - self.min.y)
    }

    /// Inclusive bounds test. `NaN` coordinates are never contained.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min.x && x <= self.max.x && y >= self.min.y && y <= self.max.y
    }

    /// Materialise the child region for `which`.
    pub fn quadrant(&self, which: Quadrant) -> Region {
        let (min, max) = self.quadrant_corners(which);
        Region::from_corners(min, max)
    }

    /// Same as `self.quadrant(which).contains(x, y)` without building the child.
    pub fn contains_in_quadrant(&self, which: Quadrant, x: f64, y: f64) -> bool {
        let (min, max) = self.quadrant_corners(which);
        x >= min.x && x <= max.x && y >= min.y && y <= max.y
    }

    /// First quadrant (in [`Quadrant::ALL`] order) containing the point, or
    /// `None` if the point lies outside this region.
    pub fn quadrant_of(&self, x: f64, y: f64) -> Option<Quadrant> {
        Quadrant::ALL
            .into_iter()
            .find(|&q| self.contains_in_quadrant(q, x, y))
    }

    fn quadrant_corners(&self, which: Quadrant) -> (NVec2, NVec2) {
        let (min, mid, max) = (self.min, self.mid, self.max);
        match which {
            Quadrant::NorthWest => (min, mid),
            Quadrant::NorthEast => (NVec2::new(mid.x, min.y), NVec2::new(max.x, mid.y)),
            Quadrant::SouthEast => (mid, max),
            Quadrant::SouthWest => (NVec2::new(min.x, mid.y), NVec2::new(mid.x, max.y)),
        }
    }
}
