//! Id-buffer object picking.
//!
//! Every pickable object is drawn into an offscreen target with a flat color
//! that encodes its [`PickId`]. Resolving a click reads back the single pixel
//! under the cursor and decodes it. A pixel that no object covered decodes to
//! "nothing" (`None`, id 0).
//!
//! Two targets share this contract through [`PickingTarget`]:
//!
//! - [`PickingBuffer`]: the GPU render target used by the windowed runner
//! - [`SoftwarePickingBuffer`]: a CPU rasterizer for headless use
//!
//! # Color Encoding
//!
//! | Channel | Bits of the id |
//! |---------|----------------|
//! | r       | 0..8           |
//! | g       | 8..16          |
//! | b       | 16..24         |
//! | a       | always 255     |
//!
//! Ids up to 255 therefore occupy the red channel only.
//!
//! # Example
//!
//! ```
//! use scenepick::PickId;
//!
//! let id = PickId::new(2).unwrap();
//! let color = id.to_rgba8();
//! assert_eq!(color, [2, 0, 0, 255]);
//! assert_eq!(PickId::from_rgba8(color), Some(id));
//! assert_eq!(PickId::from_rgba8([0, 0, 0, 255]), None);
//! ```

mod buffer;
mod software;

pub use buffer::{PICKING_DEPTH_FORMAT, PICKING_FORMAT, PickingBuffer};
pub use software::SoftwarePickingBuffer;

use std::num::NonZeroU32;

/// Unique, non-zero identifier of a pickable object.
///
/// Zero is reserved for "no object", which is why the id wraps a
/// [`NonZeroU32`]. Only the low 24 bits fit in a color, so ids above
/// [`PickId::MAX`] are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PickId(NonZeroU32);

impl PickId {
    /// Largest id that survives the 24-bit color encoding.
    pub const MAX: u32 = 0x00ff_ffff;

    /// Creates an id, or `None` for 0 and values above [`PickId::MAX`].
    pub fn new(id: u32) -> Option<Self> {
        if id > Self::MAX {
            return None;
        }
        NonZeroU32::new(id).map(Self)
    }

    /// The raw integer id.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Encodes the id as an RGBA8 color.
    pub fn to_rgba8(self) -> [u8; 4] {
        let id = self.get();
        [
            (id & 0xff) as u8,
            ((id >> 8) & 0xff) as u8,
            ((id >> 16) & 0xff) as u8,
            255,
        ]
    }

    /// Encodes the id as a normalized color, as written by the picking shader.
    pub fn to_color(self) -> [f32; 4] {
        self.to_rgba8().map(|c| c as f32 / 255.0)
    }

    /// Decodes a read-back pixel. Alpha is ignored.
    pub fn from_rgba8(rgba: [u8; 4]) -> Option<Self> {
        let id = rgba[0] as u32 | (rgba[1] as u32) << 8 | (rgba[2] as u32) << 16;
        Self::new(id)
    }
}

impl std::fmt::Display for PickId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.get())
    }
}

/// Raw form of a pick result, with 0 meaning "no object".
pub fn pick_index(result: Option<PickId>) -> u32 {
    result.map_or(0, PickId::get)
}

/// An offscreen target that maps pixels to object ids.
///
/// Coordinates passed to [`PickingTarget::pick`] use a bottom-left origin
/// (y grows upwards), like GL window coordinates. Values outside the target
/// are clamped to the nearest edge pixel.
pub trait PickingTarget {
    /// Current size in pixels as `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Reallocates the target for a new viewport size. Contents are lost.
    fn resize(&mut self, width: u32, height: u32);

    /// Id stored at pixel `(x, y)`, or `None` for background.
    fn pick(&self, x: u32, y: u32) -> Option<PickId>;

    /// Releases the target's resources. Calling this more than once is a no-op.
    fn finalize(&mut self);

    /// Whether [`PickingTarget::finalize`] has run.
    fn is_finalized(&self) -> bool;
}

/// Clamps `(x, y)` into a `width × height` target. Returns `None` for an empty target.
pub(crate) fn clamp_to_target(x: u32, y: u32, width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    Some((x.min(width - 1), y.min(height - 1)))
}
