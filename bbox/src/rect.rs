use super::{HW, TLBR};
use crate::common::*;

/// A rectangle given by its top, left, bottom and right edges.
///
/// The center and size accessors are derived from the edges.
pub trait Rect {
    type Type: Copy + Num + PartialOrd;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;

    fn h(&self) -> Self::Type {
        self.b() - self.t()
    }

    fn w(&self) -> Self::Type {
        self.r() - self.l()
    }

    fn cy(&self) -> Self::Type {
        (self.t() + self.b()) / two::<Self::Type>()
    }

    fn cx(&self) -> Self::Type {
        (self.l() + self.r()) / two::<Self::Type>()
    }

    fn tlbr(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.b(), self.r()]
    }

    fn to_tlbr(&self) -> TLBR<Self::Type> {
        TLBR {
            t: self.t(),
            l: self.l(),
            b: self.b(),
            r: self.r(),
        }
    }

    /// Check if the rectangle lies within an image of the given size.
    fn is_within(&self, size: &HW<Self::Type>) -> bool {
        let zero = Self::Type::zero();
        self.t() >= zero && self.l() >= zero && self.b() <= size.h() && self.r() <= size.w()
    }
}

/// Operations on rectangles with real coordinates.
pub trait RectFloat: Rect
where
    Self::Type: Float,
{
    /// Mirror the rectangle horizontally inside an image of width `width`.
    ///
    /// The left edge maps to `width - r` and the right edge to `width - l`.
    /// Vertical coordinates are kept.
    fn hflip(&self, width: Self::Type) -> TLBR<Self::Type> {
        TLBR {
            t: self.t(),
            l: width - self.r(),
            b: self.b(),
            r: width - self.l(),
        }
    }

    /// Move the rectangle without resizing it so that its origin lies in
    /// `[0, extent - size]` on both axes.
    ///
    /// Each origin coordinate becomes `min(max(origin, 0), extent - size)`.
    /// A rectangle larger than the image ends up with a negative origin.
    fn clamp_origin(&self, size: &HW<Self::Type>) -> TLBR<Self::Type> {
        let zero = Self::Type::zero();
        let (h, w) = (self.h(), self.w());
        let t = self.t().max(zero).min(size.h() - h);
        let l = self.l().max(zero).min(size.w() - w);
        TLBR {
            t,
            l,
            b: t + h,
            r: l + w,
        }
    }

    /// Round every edge to the nearest integer.
    fn round(&self) -> TLBR<Self::Type> {
        TLBR {
            t: self.t().round(),
            l: self.l().round(),
            b: self.b().round(),
            r: self.r().round(),
        }
    }

    fn is_finite(&self) -> bool {
        self.tlbr().iter().all(|val| val.is_finite())
    }
}

impl<R> RectFloat for R
where
    R: Rect,
    R::Type: Float,
{
}

pub(crate) fn two<T>() -> T
where
    T: Num,
{
    T::one() + T::one()
}
