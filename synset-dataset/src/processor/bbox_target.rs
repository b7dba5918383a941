//! Bounding box regression targets.

use crate::common::*;

/// The regression target of an object box relative to a square patch.
///
/// The offsets are measured between the box and patch centers and the sizes
/// are ratios to the patch side `P`:
///
/// * `dx = (box_cx - patch_cx) / P`
/// * `dy = (box_cy - patch_cy) / P`
/// * `dw = box_w / P - 1`
/// * `dh = box_h / P - 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBoxTarget {
    pub dx: f64,
    pub dy: f64,
    pub dw: f64,
    pub dh: f64,
}

impl BBoxTarget {
    pub fn encode<B, P>(object: &B, patch: &P) -> Self
    where
        B: Rect<Type = f64>,
        P: Rect<Type = f64>,
    {
        let side = patch.w();
        Self {
            dx: ((object.l() + object.r()) - (patch.l() + patch.r())) * 0.5 / side,
            dy: ((object.t() + object.b()) - (patch.t() + patch.b())) * 0.5 / side,
            dw: object.w() / side - 1.0,
            dh: object.h() / side - 1.0,
        }
    }

    /// Recover the object box from the target and its patch.
    pub fn decode<P>(&self, patch: &P) -> Result<TLBR<f64>>
    where
        P: Rect<Type = f64>,
    {
        let side = patch.w();
        let cx = patch.cx() + self.dx * side;
        let cy = patch.cy() + self.dy * side;
        let w = (self.dw + 1.0) * side;
        let h = (self.dh + 1.0) * side;
        TLBR::try_from_cycxhw([cy, cx, h, w])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.dx, self.dy, self.dw, self.dh]
    }

    pub fn to_tensor(&self) -> Array1<f32> {
        self.to_array().iter().map(|&val| val as f32).collect()
    }
}
