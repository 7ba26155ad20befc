//! Mask-based collision detection.
//!
//! Overlap testing picks the cheapest sufficient test for a pair: two
//! rectangle shapes use an AABB test, two disks a center-distance test, and
//! everything else (including mismatched shapes) falls back to a full
//! pixel-mask overlap for correctness.  The collision normal is estimated
//! by central finite differences of overlap area at the current offset
//! ± 1 pixel per axis.

use serde::{Deserialize, Serialize};

/// Integer pixel rectangle: a position plus the mask dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Rect {
        Rect { x, y, w, h }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }
}

/// Which overlap test an object type wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionShape {
    #[default]
    Rectangle,
    Disk,
    Precise,
}

/// Per-pixel occupancy bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// A fully set mask (every pixel occupied).
    pub fn filled(width: u32, height: u32) -> Mask {
        Mask {
            width,
            height,
            bits: vec![true; (width * height) as usize],
        }
    }

    /// A disk inscribed in the given square of pixels.
    pub fn disk(diameter: u32) -> Mask {
        let mut mask = Mask {
            width: diameter,
            height: diameter,
            bits: vec![false; (diameter * diameter) as usize],
        };
        let r = diameter as f64 / 2.0;
        for y in 0..diameter {
            for x in 0..diameter {
                let dx = x as f64 + 0.5 - r;
                let dy = y as f64 + 0.5 - r;
                if dx * dx + dy * dy <= r * r {
                    mask.set(x as i64, y as i64, true);
                }
            }
        }
        mask
    }

    /// Build from rows of text, `#` marking occupied pixels.  Handy for
    /// config files and tests.
    pub fn from_rows(rows: &[&str]) -> Mask {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let mut mask = Mask {
            width,
            height,
            bits: vec![false; (width * height) as usize],
        };
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    mask.set(x as i64, y as i64, true);
                }
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel test; coordinates outside the mask read as empty.
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.bits[(y as u32 * self.width + x as u32) as usize]
    }

    pub fn set(&mut self, x: i64, y: i64, value: bool) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        self.bits[(y as u32 * self.width + x as u32) as usize] = value;
    }

    /// Count of set pixels shared with `other` placed at `offset` (other's
    /// origin relative to ours).
    pub fn overlap_area(&self, other: &Mask, offset: (i64, i64)) -> u64 {
        let (ox, oy) = offset;
        let x0 = ox.max(0);
        let y0 = oy.max(0);
        let x1 = (ox + other.width as i64).min(self.width as i64);
        let y1 = (oy + other.height as i64).min(self.height as i64);
        let mut count = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                if self.get(x, y) && other.get(x - ox, y - oy) {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Everything the pair test needs to know about one body.
pub struct Collider<'a> {
    pub shape: CollisionShape,
    pub rect: Rect,
    pub radius: f64,
    pub mask: &'a Mask,
}

impl Collider<'_> {
    fn offset_to(&self, other: &Collider<'_>) -> (i64, i64) {
        (other.rect.x - self.rect.x, other.rect.y - self.rect.y)
    }
}

/// Whether two bodies overlap, using the cheapest sufficient test.
pub fn colliders_overlap(a: &Collider<'_>, b: &Collider<'_>) -> bool {
    match (a.shape, b.shape) {
        (CollisionShape::Rectangle, CollisionShape::Rectangle) => a.rect.overlaps(&b.rect),
        (CollisionShape::Disk, CollisionShape::Disk) => {
            let (ax, ay) = a.rect.center();
            let (bx, by) = b.rect.center();
            let (dx, dy) = (bx - ax, by - ay);
            let reach = a.radius + b.radius;
            dx * dx + dy * dy <= reach * reach
        }
        // mismatched shapes always fall back to mask overlap
        _ => a.mask.overlap_area(b.mask, a.offset_to(b)) > 0,
    }
}

/// Overlapping set-pixel count between two bodies at their current offset.
pub fn mask_overlap(a: &Collider<'_>, b: &Collider<'_>) -> u64 {
    a.mask.overlap_area(b.mask, a.offset_to(b))
}

/// Approximate collision normal from `a`'s perspective: central finite
/// differences of overlap area at the current offset ± 1 pixel per axis.
/// None when the bodies do not overlap, or when one is fully inside the
/// other (both differences zero).
pub fn collision_normal(a: &Collider<'_>, b: &Collider<'_>) -> Option<(i64, i64)> {
    let (ox, oy) = a.offset_to(b);
    if a.mask.overlap_area(b.mask, (ox, oy)) == 0 {
        return None;
    }
    let nx = a.mask.overlap_area(b.mask, (ox + 1, oy)) as i64
        - a.mask.overlap_area(b.mask, (ox - 1, oy)) as i64;
    let ny = a.mask.overlap_area(b.mask, (ox, oy + 1)) as i64
        - a.mask.overlap_area(b.mask, (ox, oy - 1)) as i64;
    if nx == 0 && ny == 0 {
        return None;
    }
    Some((nx, ny))
}

/// Positional correction pushing a body out of a solid collider: distance
/// `overlap / (nx² + ny²) + 0.5` along the normal, rounded per axis.  A
/// degenerate normal yields no displacement.
pub fn solid_displacement(overlap: u64, normal: (i64, i64)) -> Option<(i64, i64)> {
    let (nx, ny) = normal;
    let divisor = (nx * nx + ny * ny) as f64;
    if divisor == 0.0 {
        return None;
    }
    let distance = overlap as f64 / divisor + 0.5;
    Some((
        (distance * nx as f64 + 0.5).floor() as i64,
        (distance * ny as f64 + 0.5).floor() as i64,
    ))
}
