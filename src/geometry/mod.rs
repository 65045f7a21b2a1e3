//! Integer pixel geometry used by the segmentation stages.
//!
//! All coordinates are in raster space: origin at the top-left pixel, x grows
//! to the right and y grows downward.

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl PixelRect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use classified_sections::geometry::PixelRect;
    ///
    /// let rect = PixelRect::new(10, 20, 100, 50);
    /// assert_eq!(rect.right(), 110);
    /// assert_eq!(rect.bottom(), 70);
    /// ```
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two corners (exclusive bottom-right).
    pub fn from_corners(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: x1.abs_diff(x0),
            height: y1.abs_diff(y0),
        }
    }

    /// Left edge (inclusive).
    pub fn left(&self) -> u32 {
        self.x
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Top edge (inclusive).
    pub fn top(&self) -> u32 {
        self.y
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if this rectangle overlaps another.
    ///
    /// # Examples
    ///
    /// ```
    /// use classified_sections::geometry::PixelRect;
    ///
    /// let a = PixelRect::new(0, 0, 100, 100);
    /// let b = PixelRect::new(50, 50, 100, 100);
    /// let c = PixelRect::new(200, 200, 10, 10);
    /// assert!(a.intersects(&b));
    /// assert!(!a.intersects(&c));
    /// ```
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }

    /// Smallest rectangle containing both rectangles.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        PixelRect::from_corners(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Translate by a non-negative offset.
    pub fn offset(&self, dx: u32, dy: u32) -> PixelRect {
        PixelRect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grow the rectangle by `pad` pixels on every side, clipped to a
    /// `bound_w` x `bound_h` raster.
    ///
    /// # Examples
    ///
    /// ```
    /// use classified_sections::geometry::PixelRect;
    ///
    /// let r = PixelRect::new(5, 40, 20, 20).padded(10, 100, 100);
    /// assert_eq!(r, PixelRect::new(0, 30, 35, 40));
    /// ```
    pub fn padded(&self, pad: u32, bound_w: u32, bound_h: u32) -> PixelRect {
        let x0 = self.left().saturating_sub(pad);
        let y0 = self.top().saturating_sub(pad);
        let x1 = self.right().saturating_add(pad).min(bound_w);
        let y1 = self.bottom().saturating_add(pad).min(bound_h);
        PixelRect::from_corners(x0, y0, x1.max(x0), y1.max(y0))
    }

    /// Clip the rectangle so it lies inside a `bound_w` x `bound_h` raster.
    pub fn clipped(&self, bound_w: u32, bound_h: u32) -> PixelRect {
        let x0 = self.left().min(bound_w);
        let y0 = self.top().min(bound_h);
        let x1 = self.right().min(bound_w);
        let y1 = self.bottom().min(bound_h);
        PixelRect::from_corners(x0, y0, x1, y1)
    }
}
