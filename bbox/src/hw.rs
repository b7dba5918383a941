use crate::common::*;

/// The height and width of an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HW<T> {
    h: T,
    w: T,
}

impl<T> HW<T>
where
    T: Copy + Num + PartialOrd,
{
    pub fn try_from_hw([h, w]: [T; 2]) -> Result<Self> {
        let zero = T::zero();
        ensure!(h >= zero && w >= zero, "height and width must be non-negative");
        Ok(Self { h, w })
    }

    /// Panics if either side is negative.
    pub fn from_hw(hw: [T; 2]) -> Self {
        Self::try_from_hw(hw).unwrap()
    }

    pub fn h(&self) -> T {
        self.h
    }

    pub fn w(&self) -> T {
        self.w
    }
}
