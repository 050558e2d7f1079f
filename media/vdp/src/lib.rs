// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interface to a hardware video decode and presentation device.
//!
//! The device is reached only through the [`Device`] trait: it creates and destroys device-side
//! objects (video surfaces, output surfaces, bitmap surfaces, decoders, video mixers and
//! presentation queues), decodes pictures, composites them and presents the result. Every call
//! reports one of the closed set of [`Status`] codes. The windowing side is reached through the
//! [`DrawableService`] trait.
//!
//! [`fake::FakeDevice`] and [`fake::FakeDrawables`] are software implementations that keep track
//! of every object and call, for tests and for running without hardware.

mod device;
mod drawable;
pub mod fake;
mod mixer;
mod picture;
mod status;

pub use device::*;
pub use drawable::*;
pub use mixer::*;
pub use picture::*;
pub use status::*;

/// Raw handle of a device object.
pub type Handle = u32;
pub type VideoSurface = Handle;
pub type OutputSurface = Handle;
pub type BitmapSurface = Handle;
pub type Decoder = Handle;
pub type VideoMixer = Handle;
pub type PresentationQueue = Handle;
pub type PresentationQueueTarget = Handle;

/// Window system drawable (X11 window or pixmap id).
pub type Drawable = u64;

/// Handle value no device object ever has.
pub const INVALID_HANDLE: Handle = 0xffff_ffff;

/// Chroma sampling of a video surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChromaType {
    Yuv420,
    Yuv422,
    Yuv444,
}

/// Pixel layouts a video surface can be read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YCbCrFormat {
    Nv12,
    Yv12,
    Uyvy,
    Yuyv,
    Y8U8V8A8,
    V8U8Y8A8,
}

impl YCbCrFormat {
    /// Chroma sampling this layout carries.
    pub fn chroma_type(&self) -> ChromaType {
        match self {
            YCbCrFormat::Nv12 | YCbCrFormat::Yv12 => ChromaType::Yuv420,
            YCbCrFormat::Uyvy | YCbCrFormat::Yuyv => ChromaType::Yuv422,
            YCbCrFormat::Y8U8V8A8 | YCbCrFormat::V8U8Y8A8 => ChromaType::Yuv444,
        }
    }
}

/// Pixel layouts of output and bitmap surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgbaFormat {
    B8G8R8A8,
    R8G8B8A8,
    R10G10B10A2,
    B10G10R10A2,
    A8,
}

/// The kind of surface a format support query applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Video(ChromaType),
    Output,
    Bitmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    YCbCr(YCbCrFormat),
    Rgba(RgbaFormat),
}

/// A rectangle in device coordinates; `x1`/`y1` are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Rect {
        Rect { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// A straight RGBA colour, each component in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl Color {
    /// Unpacks a `0xAARRGGBB` value.
    pub fn from_argb(argb: u32) -> Color {
        let component = |shift: u32| ((argb >> shift) & 0xff) as f32 / 255.0;
        Color {
            red: component(16),
            green: component(8),
            blue: component(0),
            alpha: component(24),
        }
    }
}
