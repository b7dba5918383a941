//! Rectangle geometry for boxes and crop windows in image coordinates.

mod common;

pub mod hw;
pub mod rect;
pub mod tlbr;

pub use hw::*;
pub use rect::*;
pub use tlbr::*;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat};
}
