use super::{rect::two, Rect};
use crate::common::*;

/// A rectangle stored by its edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T> {
    /// Convert the coordinates to another numeric type, if representable.
    pub fn try_cast<V>(self) -> Option<TLBR<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        let Self { t, l, b, r } = self;
        Some(TLBR {
            t: V::from(t)?,
            l: V::from(l)?,
            b: V::from(b)?,
            r: V::from(r)?,
        })
    }
}

impl<T> TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    pub fn try_from_tlbr([t, l, b, r]: [T; 4]) -> Result<Self> {
        ensure!(
            b >= t && r >= l,
            "bottom and right edges must not precede top and left edges"
        );
        Ok(Self { t, l, b, r })
    }

    pub fn try_from_tlhw([t, l, h, w]: [T; 4]) -> Result<Self> {
        Self::try_from_tlbr([t, l, t + h, l + w])
    }

    pub fn try_from_cycxhw([cy, cx, h, w]: [T; 4]) -> Result<Self> {
        let zero = T::zero();
        ensure!(h >= zero && w >= zero, "height and width must be non-negative");
        let (half_h, half_w) = (h / two(), w / two());
        Ok(Self {
            t: cy - half_h,
            l: cx - half_w,
            b: cy + half_h,
            r: cx + half_w,
        })
    }

    /// The square with side length `side` centered at (`cy`, `cx`).
    pub fn try_square(cy: T, cx: T, side: T) -> Result<Self> {
        Self::try_from_cycxhw([cy, cx, side, side])
    }
}

impl<T> Rect for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> T {
        self.t
    }

    fn l(&self) -> T {
        self.l
    }

    fn b(&self) -> T {
        self.b
    }

    fn r(&self) -> T {
        self.r
    }
}
