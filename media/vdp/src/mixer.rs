// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Video mixer and output surface composition parameters.

use crate::BitmapSurface;
use crate::Color;
use crate::OutputSurface;
use crate::Rect;
use crate::VideoSurface;

/// Colour space conversion matrix, three rows of `[y, cb, cr, offset]` coefficients.
pub type CscMatrix = [[f32; 4]; 3];

/// Processing amplifier values used to generate a `CscMatrix`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Procamp {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
}

impl Default for Procamp {
    fn default() -> Self {
        Procamp {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            hue: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorStandard {
    ItuR601,
    ItuR709,
    Smpte240M,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMixerFeature {
    DeinterlaceTemporal,
    DeinterlaceTemporalSpatial,
    InverseTelecine,
    NoiseReduction,
    Sharpness,
    LumaKey,
    /// High quality scaling at the given level (1 to 9).
    HighQualityScaling(u8),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoMixerAttribute {
    BackgroundColor(Color),
    CscMatrix(CscMatrix),
    NoiseReductionLevel(f32),
    SharpnessLevel(f32),
    SkipChromaDeinterlace(bool),
}

/// Which part of the current source surface a mixer render samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStructure {
    Frame,
    TopField,
    BottomField,
}

/// An RGBA layer blended over the video by the mixer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layer {
    pub source: OutputSurface,
    pub source_rect: Option<Rect>,
    pub destination_rect: Option<Rect>,
}

/// Arguments of `Device::video_mixer_render`.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerRender<'a> {
    pub background: Option<OutputSurface>,
    pub field: FieldStructure,
    pub past: &'a [VideoSurface],
    pub current: VideoSurface,
    pub future: &'a [VideoSurface],
    pub source_rect: Option<Rect>,
    pub destination: OutputSurface,
    pub destination_rect: Option<Rect>,
    pub destination_video_rect: Option<Rect>,
    pub layers: &'a [Layer],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendEquation {
    Subtract,
    ReverseSubtract,
    Add,
    Min,
    Max,
}

/// Blending applied by `Device::output_surface_render_bitmap_surface`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub color_equation: BlendEquation,
    pub alpha_equation: BlendEquation,
    pub constant: Color,
}

impl BlendState {
    /// Source-over blending of premultiplied sources.
    pub fn source_over() -> BlendState {
        BlendState {
            src_color: BlendFactor::One,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            color_equation: BlendEquation::Add,
            alpha_equation: BlendEquation::Add,
            constant: Color::default(),
        }
    }
}

/// Arguments of `Device::output_surface_render_bitmap_surface`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitmapRender {
    pub destination: OutputSurface,
    pub destination_rect: Option<Rect>,
    pub source: BitmapSurface,
    pub source_rect: Option<Rect>,
    /// Colour multiplied with the source, used for global alpha.
    pub color: Option<Color>,
    pub blend: BlendState,
}

/// Presentation state of an output surface in a presentation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationStatus {
    Idle,
    Queued,
    Visible,
}
