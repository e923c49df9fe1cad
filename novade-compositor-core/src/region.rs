//! Regions: collections of rectangles describing areas such as output damage.

use crate::geometry::{Rectangle, Size};

/// A region as a collection of non-overlapping rectangles.
///
/// `add` and `subtract` keep the rectangles pairwise disjoint, so the
/// region's area is the sum of its rectangles' areas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rectangles: Vec<Rectangle>,
}

impl Region {
    /// Creates a new, empty `Region`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A region covering exactly `rect`.
    pub fn from_rect(rect: Rectangle) -> Self {
        let mut region = Self::new();
        region.add(rect);
        region
    }

    /// A region covering a whole surface of `size`, anchored at the origin.
    pub fn from_size(size: Size) -> Self {
        Self::from_rect(Rectangle::from_size(size))
    }

    /// Clears all rectangles from the region, making it empty.
    pub fn clear(&mut self) {
        self.rectangles.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rectangles.is_empty()
    }

    /// The disjoint rectangles currently defining the region.
    pub fn rects(&self) -> &[Rectangle] {
        &self.rectangles
    }

    pub fn area(&self) -> u64 {
        self.rectangles.iter().map(Rectangle::area).sum()
    }

    /// Bounding box of the whole region, `None` when empty.
    pub fn extents(&self) -> Option<Rectangle> {
        self.rectangles
            .iter()
            .copied()
            .reduce(|acc, r| acc.bounding_union(&r))
    }

    /// Adds a rectangle to the region.
    ///
    /// Parts of `new_rect` already covered are clipped away before the
    /// remainder is appended, so existing rectangles are never modified.
    pub fn add(&mut self, new_rect: Rectangle) {
        if new_rect.is_empty() {
            return;
        }
        let mut pieces = vec![new_rect];
        for existing in &self.rectangles {
            if pieces.is_empty() {
                return;
            }
            pieces = pieces
                .iter()
                .flat_map(|piece| piece.subtract(existing))
                .collect();
        }
        self.rectangles.extend(pieces);
    }

    /// Adds every rectangle of `other` to this region.
    pub fn union(&mut self, other: &Region) {
        for rect in &other.rectangles {
            self.add(*rect);
        }
    }

    /// Removes the area covered by `sub_rect` from the region.
    pub fn subtract(&mut self, sub_rect: Rectangle) {
        if sub_rect.is_empty() {
            return;
        }
        self.rectangles = self
            .rectangles
            .iter()
            .flat_map(|rect| rect.subtract(&sub_rect))
            .collect();
    }

    /// Restricts the region to the area inside `clip`.
    pub fn intersect(&mut self, clip: Rectangle) {
        self.rectangles = self
            .rectangles
            .iter()
            .filter_map(|rect| rect.intersection(&clip))
            .collect();
    }

    /// Whether `rect` is entirely covered by the region.
    pub fn covers(&self, rect: Rectangle) -> bool {
        if rect.is_empty() {
            return true;
        }
        let mut uncovered = vec![rect];
        for existing in &self.rectangles {
            uncovered = uncovered.iter().flat_map(|r| r.subtract(existing)).collect();
            if uncovered.is_empty() {
                return true;
            }
        }
        false
    }

    pub fn intersects(&self, rect: &Rectangle) -> bool {
        self.rectangles.iter().any(|r| r.intersects(rect))
    }
}

impl From<Rectangle> for Region {
    fn from(rect: Rectangle) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<Rectangle> for Region {
    fn from_iter<I: IntoIterator<Item = Rectangle>>(iter: I) -> Self {
        let mut region = Self::new();
        for rect in iter {
            region.add(rect);
        }
        region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn assert_disjoint(region: &Region) {
        let rects = region.rects();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn new_region_is_empty() {
        let region = Region::new();
        assert!(region.is_empty());
        assert_eq!(region.extents(), None);
        assert_eq!(region.area(), 0);
    }

    #[test]
    fn add_empty_rectangle_is_ignored() {
        let mut region = Region::new();
        region.add(Rectangle::new(5, 5, 0, 10));
        assert!(region.is_empty());
    }

    #[test]
    fn add_overlapping_keeps_rectangles_disjoint() {
        let mut region = Region::new();
        region.add(Rectangle::new(0, 0, 10, 10));
        region.add(Rectangle::new(5, 5, 10, 10));
        assert_disjoint(&region);
        assert_eq!(region.area(), 100 + 100 - 25);
        assert_eq!(region.extents(), Some(Rectangle::new(0, 0, 15, 15)));
    }

    #[test]
    fn add_already_covered_rect_changes_nothing() {
        let mut region = Region::from_rect(Rectangle::new(0, 0, 100, 100));
        let before = region.clone();
        region.add(Rectangle::new(10, 10, 20, 20));
        assert_eq!(region, before);
    }

    #[test]
    fn subtract_punches_hole() {
        let mut region = Region::from_size(Size::new(10, 10));
        region.subtract(Rectangle::new(2, 2, 3, 3));
        assert_disjoint(&region);
        assert_eq!(region.area(), 91);
        assert!(!region.covers(Rectangle::new(2, 2, 1, 1)));
        assert!(region.covers(Rectangle::new(0, 0, 10, 2)));
    }

    #[rstest]
    #[case(Rectangle::new(0, 0, 5, 5), true)]
    #[case(Rectangle::new(5, 0, 5, 10), true)]
    #[case(Rectangle::new(8, 8, 5, 5), false)]
    fn covers_checks_full_containment(#[case] probe: Rectangle, #[case] expected: bool) {
        let region: Region = [Rectangle::new(0, 0, 5, 10), Rectangle::new(5, 0, 5, 10)]
            .into_iter()
            .collect();
        assert_eq!(region.covers(probe), expected);
    }

    #[test]
    fn union_and_intersect() {
        let mut a = Region::from_rect(Rectangle::new(0, 0, 10, 10));
        let b = Region::from_rect(Rectangle::new(20, 0, 10, 10));
        a.union(&b);
        assert_eq!(a.area(), 200);
        a.intersect(Rectangle::new(5, 0, 20, 5));
        assert_eq!(a.area(), 5 * 5 + 5 * 5);
        a.clear();
        assert!(a.is_empty());
    }
}
