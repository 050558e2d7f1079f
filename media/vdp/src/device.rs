// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The interface that decode/present devices need to implement.

use crate::BitmapRender;
use crate::BitmapSurface;
use crate::ChromaType;
use crate::Color;
use crate::ColorStandard;
use crate::CscMatrix;
use crate::Decoder;
use crate::DecoderCaps;
use crate::DecoderProfile;
use crate::Drawable;
use crate::MixerRender;
use crate::OutputSurface;
use crate::PictureInfo;
use crate::PixelFormat;
use crate::PresentationQueue;
use crate::PresentationQueueTarget;
use crate::PresentationStatus;
use crate::Procamp;
use crate::Rect;
use crate::Result;
use crate::RgbaFormat;
use crate::SurfaceKind;
use crate::VideoMixer;
use crate::VideoMixerAttribute;
use crate::VideoMixerFeature;
use crate::VideoSurface;
use crate::VideoSurfaceCaps;
use crate::YCbCrFormat;

/// A decode and presentation device.
///
/// Objects created through one of the `*_create` methods stay valid until passed to the
/// matching `*_destroy` method. Handles are never reused while the object is alive.
pub trait Device {
    /// Human readable description of the implementation.
    fn get_information_string(&self) -> Result<String>;

    fn get_api_version(&self) -> Result<u32>;

    /// Returns whether `format` can be used with surfaces of `kind`.
    fn query_format_support(&self, kind: SurfaceKind, format: PixelFormat) -> Result<bool>;

    fn video_surface_query_capabilities(&self, chroma: ChromaType) -> Result<VideoSurfaceCaps>;

    fn video_surface_create(
        &mut self,
        chroma: ChromaType,
        width: u32,
        height: u32,
    ) -> Result<VideoSurface>;

    fn video_surface_destroy(&mut self, surface: VideoSurface) -> Result<()>;

    /// Copies the content of `surface` into `planes`, laid out as `format` with `pitches`.
    fn video_surface_get_bits(
        &mut self,
        surface: VideoSurface,
        format: YCbCrFormat,
        planes: &mut [&mut [u8]],
        pitches: &[u32],
    ) -> Result<()>;

    /// Replaces the content of `surface` with `planes`, laid out as `format` with `pitches`.
    fn video_surface_put_bits(
        &mut self,
        surface: VideoSurface,
        format: YCbCrFormat,
        planes: &[&[u8]],
        pitches: &[u32],
    ) -> Result<()>;

    fn output_surface_create(
        &mut self,
        format: RgbaFormat,
        width: u32,
        height: u32,
    ) -> Result<OutputSurface>;

    fn output_surface_destroy(&mut self, surface: OutputSurface) -> Result<()>;

    /// Blends a bitmap surface into an output surface.
    fn output_surface_render_bitmap_surface(&mut self, render: &BitmapRender) -> Result<()>;

    fn bitmap_surface_create(
        &mut self,
        format: RgbaFormat,
        width: u32,
        height: u32,
        frequently_accessed: bool,
    ) -> Result<BitmapSurface>;

    fn bitmap_surface_destroy(&mut self, surface: BitmapSurface) -> Result<()>;

    fn bitmap_surface_put_bits(
        &mut self,
        surface: BitmapSurface,
        data: &[u8],
        pitch: u32,
        rect: Option<Rect>,
    ) -> Result<()>;

    fn decoder_query_capabilities(&self, profile: DecoderProfile) -> Result<DecoderCaps>;

    fn decoder_create(
        &mut self,
        profile: DecoderProfile,
        width: u32,
        height: u32,
        max_references: u32,
    ) -> Result<Decoder>;

    fn decoder_destroy(&mut self, decoder: Decoder) -> Result<()>;

    /// Decodes one picture into `target` from `bitstream`, a list of byte buffers.
    fn decoder_render(
        &mut self,
        decoder: Decoder,
        target: VideoSurface,
        picture_info: &PictureInfo,
        bitstream: &[&[u8]],
    ) -> Result<()>;

    fn video_mixer_create(
        &mut self,
        features: &[VideoMixerFeature],
        width: u32,
        height: u32,
        chroma: ChromaType,
    ) -> Result<VideoMixer>;

    fn video_mixer_destroy(&mut self, mixer: VideoMixer) -> Result<()>;

    fn video_mixer_set_attribute_values(
        &mut self,
        mixer: VideoMixer,
        attributes: &[VideoMixerAttribute],
    ) -> Result<()>;

    /// Scales, deinterlaces and colour converts a video surface into an output surface.
    fn video_mixer_render(&mut self, mixer: VideoMixer, render: &MixerRender) -> Result<()>;

    fn generate_csc_matrix(&self, procamp: &Procamp, standard: ColorStandard)
        -> Result<CscMatrix>;

    fn presentation_queue_target_create(
        &mut self,
        drawable: Drawable,
    ) -> Result<PresentationQueueTarget>;

    fn presentation_queue_target_destroy(&mut self, target: PresentationQueueTarget)
        -> Result<()>;

    fn presentation_queue_create(
        &mut self,
        target: PresentationQueueTarget,
    ) -> Result<PresentationQueue>;

    fn presentation_queue_destroy(&mut self, queue: PresentationQueue) -> Result<()>;

    fn presentation_queue_set_background_color(
        &mut self,
        queue: PresentationQueue,
        color: Color,
    ) -> Result<()>;

    /// Queues `surface` for display no earlier than `earliest_time`, clipped to
    /// `clip_width`x`clip_height`.
    fn presentation_queue_display(
        &mut self,
        queue: PresentationQueue,
        surface: OutputSurface,
        clip_width: u32,
        clip_height: u32,
        earliest_time: u64,
    ) -> Result<()>;

    /// Blocks until `surface` is neither queued nor visible and returns the time it was first
    /// presented.
    fn presentation_queue_block_until_surface_idle(
        &mut self,
        queue: PresentationQueue,
        surface: OutputSurface,
    ) -> Result<u64>;

    fn presentation_queue_query_surface_status(
        &self,
        queue: PresentationQueue,
        surface: OutputSurface,
    ) -> Result<PresentationStatus>;
}
