//! Integer geometry in physical pixels.

use serde::Deserialize;
use std::fmt;

/// A width/height pair in physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A size is empty when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered, saturating on overflow.
    pub fn area(&self) -> u64 {
        u64::from(self.width).saturating_mul(u64::from(self.height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle. `x`/`y` may be negative; an empty rectangle
/// (zero or negative extent) covers no pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle at the origin covering `size`.
    pub fn from_size(size: Size) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(size.width).unwrap_or(i32::MAX),
            i32::try_from(size.height).unwrap_or(i32::MAX),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            u64::from(self.width.unsigned_abs()) * u64::from(self.height.unsigned_abs())
        }
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Whether `other` lies completely inside `self`. Empty rectangles are
    /// contained by everything.
    pub fn contains_rect(&self, other: &Rectangle) -> bool {
        other.is_empty()
            || (other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom())
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The overlapping part of both rectangles, if any.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Some(Rectangle::new(
            x,
            y,
            self.right().min(other.right()) - x,
            self.bottom().min(other.bottom()) - y,
        ))
    }

    /// Smallest rectangle containing both. An empty operand is ignored.
    pub fn bounding_union(&self, other: &Rectangle) -> Rectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rectangle::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// `self - other` as up to four disjoint rectangles.
    pub fn subtract(&self, other: &Rectangle) -> Vec<Rectangle> {
        let Some(overlap) = self.intersection(other) else {
            return if self.is_empty() { Vec::new() } else { vec![*self] };
        };

        let mut pieces = Vec::with_capacity(4);
        // Top band
        if self.y < overlap.y {
            pieces.push(Rectangle::new(self.x, self.y, self.width, overlap.y - self.y));
        }
        // Bottom band
        if overlap.bottom() < self.bottom() {
            pieces.push(Rectangle::new(self.x, overlap.bottom(), self.width, self.bottom() - overlap.bottom()));
        }
        // Left and right within the overlap rows
        if self.x < overlap.x {
            pieces.push(Rectangle::new(self.x, overlap.y, overlap.x - self.x, overlap.height));
        }
        if overlap.right() < self.right() {
            pieces.push(Rectangle::new(overlap.right(), overlap.y, self.right() - overlap.right(), overlap.height));
        }
        pieces
    }
}
