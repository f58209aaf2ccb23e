use std::ops::{Add, Sub};

pub use euclid::{Point2D as Point, Size2D as Extent};

/// Unit tag for coordinates measured in physical window pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScreenPx;

/// An axis-aligned rectangle. The right and bottom edges are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect<T, U>(euclid::Box2D<T, U>);

impl<T, U> Rect<T, U> {
    pub fn new(origin: Point<T, U>, extent: Extent<T, U>) -> Self
    where
        T: Copy + Add<T, Output = T>,
    {
        Self(euclid::Box2D::from_origin_and_size(origin, extent))
    }

    /// A rectangle anchored at the origin that covers `extent`.
    pub fn from_extent(extent: Extent<T, U>) -> Self
    where
        T: Copy + Default + Add<T, Output = T>,
    {
        Self::new(Point::new(T::default(), T::default()), extent)
    }

    pub fn top_left(&self) -> Point<T, U>
    where
        T: Copy,
    {
        self.0.min
    }

    pub fn extent(&self) -> Extent<T, U>
    where
        T: Copy + Sub<T, Output = T>,
    {
        self.0.size()
    }

    pub fn contains(&self, point: Point<T, U>) -> bool
    where
        T: PartialOrd,
    {
        self.0.contains(point)
    }
}
