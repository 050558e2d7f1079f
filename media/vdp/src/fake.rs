// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Software device and drawable services.
//!
//! `FakeDevice` implements every device call without hardware: objects are tracked in a map,
//! decode and composition requests are recorded, and presentation queues keep the list of
//! surfaces queued but not yet waited for. A failure can be injected into the next call of any
//! mutating operation with `fail_next`.

use std::cell::Cell;
use std::collections::BTreeMap;

use log::debug;

use crate::BitmapRender;
use crate::BitmapSurface;
use crate::ChromaType;
use crate::Color;
use crate::ColorStandard;
use crate::CscMatrix;
use crate::Decoder;
use crate::DecoderCaps;
use crate::DecoderProfile;
use crate::Device;
use crate::Drawable;
use crate::DrawableService;
use crate::Error;
use crate::FieldStructure;
use crate::Handle;
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

const MAX_SURFACE_SIZE: u32 = 4096;

/// Mutating device operations a failure can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FakeOp {
    BitmapSurfaceCreate,
    BitmapSurfaceDestroy,
    BitmapSurfacePutBits,
    DecoderCreate,
    DecoderDestroy,
    DecoderRender,
    OutputSurfaceCreate,
    OutputSurfaceDestroy,
    OutputSurfaceRenderBitmap,
    PresentationQueueBlock,
    PresentationQueueCreate,
    PresentationQueueDestroy,
    PresentationQueueDisplay,
    PresentationQueueSetBackground,
    PresentationQueueTargetCreate,
    PresentationQueueTargetDestroy,
    VideoMixerCreate,
    VideoMixerDestroy,
    VideoMixerRender,
    VideoMixerSetAttributes,
    VideoSurfaceCreate,
    VideoSurfaceDestroy,
    VideoSurfaceGetBits,
    VideoSurfacePutBits,
}

/// Kinds of objects a `FakeDevice` tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeObjectKind {
    BitmapSurface,
    Decoder,
    OutputSurface,
    PresentationQueue,
    PresentationQueueTarget,
    VideoMixer,
    VideoSurface,
}

enum FakeObject {
    VideoSurface {
        chroma: ChromaType,
        planes: Vec<Vec<u8>>,
    },
    OutputSurface {
        width: u32,
        height: u32,
    },
    BitmapSurface {
        data: Vec<u8>,
    },
    Decoder {
        profile: DecoderProfile,
    },
    VideoMixer {
        attributes: Vec<VideoMixerAttribute>,
    },
    Target {
        drawable: Drawable,
    },
    Queue {
        target: PresentationQueueTarget,
        /// Surfaces displayed and not waited for yet, oldest first.
        pending: Vec<OutputSurface>,
        background: Color,
    },
}

impl FakeObject {
    fn kind(&self) -> FakeObjectKind {
        match self {
            FakeObject::VideoSurface { .. } => FakeObjectKind::VideoSurface,
            FakeObject::OutputSurface { .. } => FakeObjectKind::OutputSurface,
            FakeObject::BitmapSurface { .. } => FakeObjectKind::BitmapSurface,
            FakeObject::Decoder { .. } => FakeObjectKind::Decoder,
            FakeObject::VideoMixer { .. } => FakeObjectKind::VideoMixer,
            FakeObject::Target { .. } => FakeObjectKind::PresentationQueueTarget,
            FakeObject::Queue { .. } => FakeObjectKind::PresentationQueue,
        }
    }
}

/// A `presentation_queue_display` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub queue: PresentationQueue,
    pub surface: OutputSurface,
    pub clip_width: u32,
    pub clip_height: u32,
}

/// A `video_mixer_render` call.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerRenderRecord {
    pub mixer: VideoMixer,
    pub field: FieldStructure,
    pub past: Vec<VideoSurface>,
    pub current: VideoSurface,
    pub destination: OutputSurface,
    pub source_rect: Option<Rect>,
    pub destination_rect: Option<Rect>,
}

/// A `decoder_render` call, with the bitstream buffers concatenated.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRecord {
    pub decoder: Decoder,
    pub target: VideoSurface,
    pub picture_info: PictureInfo,
    pub bitstream: Vec<u8>,
}

pub struct FakeDevice {
    objects: BTreeMap<Handle, FakeObject>,
    next_handle: Handle,
    failures: BTreeMap<FakeOp, Error>,
    profiles: Vec<DecoderProfile>,
    clock: u64,
    presentations: Vec<Presentation>,
    idle_waits: Vec<(PresentationQueue, OutputSurface)>,
    mixer_renders: Vec<MixerRenderRecord>,
    bitmap_renders: Vec<BitmapRender>,
    decodes: Vec<DecodeRecord>,
    csc_generations: Cell<usize>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDevice {
    /// Creates a device supporting every decoder profile.
    pub fn new() -> FakeDevice {
        FakeDevice::with_profiles(&[
            DecoderProfile::Mpeg1,
            DecoderProfile::Mpeg2Simple,
            DecoderProfile::Mpeg2Main,
            DecoderProfile::H264Baseline,
            DecoderProfile::H264Main,
            DecoderProfile::H264High,
            DecoderProfile::Vc1Simple,
            DecoderProfile::Vc1Main,
            DecoderProfile::Vc1Advanced,
            DecoderProfile::Mpeg4PartSp,
            DecoderProfile::Mpeg4PartAsp,
        ])
    }

    /// Creates a device supporting only `profiles`.
    pub fn with_profiles(profiles: &[DecoderProfile]) -> FakeDevice {
        FakeDevice {
            objects: BTreeMap::new(),
            next_handle: 1,
            failures: BTreeMap::new(),
            profiles: profiles.to_vec(),
            clock: 0,
            presentations: Vec::new(),
            idle_waits: Vec::new(),
            mixer_renders: Vec::new(),
            bitmap_renders: Vec::new(),
            decodes: Vec::new(),
            csc_generations: Cell::new(0),
        }
    }

    /// Makes the next call of `op` fail with `error`.
    pub fn fail_next(&mut self, op: FakeOp, error: Error) {
        self.failures.insert(op, error);
    }

    /// Number of live objects of `kind`.
    pub fn count(&self, kind: FakeObjectKind) -> usize {
        self.objects.values().filter(|o| o.kind() == kind).count()
    }

    /// Number of live objects of any kind.
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn kind_of(&self, handle: Handle) -> Option<FakeObjectKind> {
        self.objects.get(&handle).map(FakeObject::kind)
    }

    pub fn presentations(&self) -> &[Presentation] {
        &self.presentations
    }

    pub fn idle_waits(&self) -> &[(PresentationQueue, OutputSurface)] {
        &self.idle_waits
    }

    pub fn mixer_renders(&self) -> &[MixerRenderRecord] {
        &self.mixer_renders
    }

    pub fn bitmap_renders(&self) -> &[BitmapRender] {
        &self.bitmap_renders
    }

    pub fn decodes(&self) -> &[DecodeRecord] {
        &self.decodes
    }

    pub fn csc_generations(&self) -> usize {
        self.csc_generations.get()
    }

    /// Attributes applied to `mixer`, in call order.
    pub fn mixer_attributes(&self, mixer: VideoMixer) -> Vec<VideoMixerAttribute> {
        match self.objects.get(&mixer) {
            Some(FakeObject::VideoMixer { attributes }) => attributes.clone(),
            _ => Vec::new(),
        }
    }

    /// Content last uploaded into a bitmap surface.
    pub fn bitmap_data(&self, surface: BitmapSurface) -> Option<&[u8]> {
        match self.objects.get(&surface) {
            Some(FakeObject::BitmapSurface { data }) => Some(data),
            _ => None,
        }
    }

    /// Size of an output surface.
    pub fn output_surface_size(&self, surface: OutputSurface) -> Option<(u32, u32)> {
        match self.objects.get(&surface) {
            Some(FakeObject::OutputSurface { width, height }) => Some((*width, *height)),
            _ => None,
        }
    }

    pub fn queue_background(&self, queue: PresentationQueue) -> Option<Color> {
        match self.objects.get(&queue) {
            Some(FakeObject::Queue { background, .. }) => Some(*background),
            _ => None,
        }
    }

    /// Drawable a presentation queue ends up on.
    pub fn queue_drawable(&self, queue: PresentationQueue) -> Option<Drawable> {
        let target = match self.objects.get(&queue) {
            Some(FakeObject::Queue { target, .. }) => *target,
            _ => return None,
        };
        match self.objects.get(&target) {
            Some(FakeObject::Target { drawable }) => Some(*drawable),
            _ => None,
        }
    }

    fn check(&mut self, op: FakeOp) -> Result<()> {
        match self.failures.remove(&op) {
            Some(e) => {
                debug!("fake device: injected failure in {:?}: {}", op, e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn insert(&mut self, object: FakeObject) -> Handle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.objects.insert(handle, object);
        handle
    }

    fn remove(&mut self, handle: Handle, kind: FakeObjectKind) -> Result<FakeObject> {
        match self.objects.get(&handle) {
            Some(o) if o.kind() == kind => self.objects.remove(&handle).ok_or(Error::InvalidHandle),
            _ => Err(Error::InvalidHandle),
        }
    }

    fn expect_kind(&self, handle: Handle, kind: FakeObjectKind) -> Result<()> {
        match self.objects.get(&handle) {
            Some(o) if o.kind() == kind => Ok(()),
            _ => Err(Error::InvalidHandle),
        }
    }

    fn check_size(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidValue);
        }
        if width > MAX_SURFACE_SIZE || height > MAX_SURFACE_SIZE {
            return Err(Error::Resources);
        }
        Ok(())
    }
}

impl Device for FakeDevice {
    fn get_information_string(&self) -> Result<String> {
        Ok("Fake VDP device".to_string())
    }

    fn get_api_version(&self) -> Result<u32> {
        Ok(1)
    }

    fn query_format_support(&self, kind: SurfaceKind, format: PixelFormat) -> Result<bool> {
        Ok(match (kind, format) {
            (SurfaceKind::Video(chroma), PixelFormat::YCbCr(format)) => {
                chroma == format.chroma_type()
                    && matches!(
                        format,
                        YCbCrFormat::Nv12
                            | YCbCrFormat::Yv12
                            | YCbCrFormat::Uyvy
                            | YCbCrFormat::Yuyv
                    )
            }
            (SurfaceKind::Output, PixelFormat::Rgba(format))
            | (SurfaceKind::Bitmap, PixelFormat::Rgba(format)) => {
                matches!(format, RgbaFormat::B8G8R8A8 | RgbaFormat::R8G8B8A8)
            }
            _ => false,
        })
    }

    fn video_surface_query_capabilities(&self, chroma: ChromaType) -> Result<VideoSurfaceCaps> {
        Ok(VideoSurfaceCaps {
            supported: chroma != ChromaType::Yuv444,
            max_width: MAX_SURFACE_SIZE,
            max_height: MAX_SURFACE_SIZE,
        })
    }

    fn video_surface_create(
        &mut self,
        chroma: ChromaType,
        width: u32,
        height: u32,
    ) -> Result<VideoSurface> {
        self.check(FakeOp::VideoSurfaceCreate)?;
        if chroma == ChromaType::Yuv444 {
            return Err(Error::Unsupported);
        }
        Self::check_size(width, height)?;
        Ok(self.insert(FakeObject::VideoSurface {
            chroma,
            planes: Vec::new(),
        }))
    }

    fn video_surface_destroy(&mut self, surface: VideoSurface) -> Result<()> {
        self.check(FakeOp::VideoSurfaceDestroy)?;
        self.remove(surface, FakeObjectKind::VideoSurface).map(|_| ())
    }

    fn video_surface_get_bits(
        &mut self,
        surface: VideoSurface,
        format: YCbCrFormat,
        planes: &mut [&mut [u8]],
        _pitches: &[u32],
    ) -> Result<()> {
        self.check(FakeOp::VideoSurfaceGetBits)?;
        let stored = match self.objects.get(&surface) {
            Some(FakeObject::VideoSurface { chroma, planes }) => {
                if *chroma != format.chroma_type() {
                    return Err(Error::InvalidValue);
                }
                planes
            }
            _ => return Err(Error::InvalidHandle),
        };
        for (index, plane) in planes.iter_mut().enumerate() {
            let source = stored.get(index).map(Vec::as_slice).unwrap_or(&[]);
            let len = source.len().min(plane.len());
            plane[..len].copy_from_slice(&source[..len]);
            plane[len..].fill(0);
        }
        Ok(())
    }

    fn video_surface_put_bits(
        &mut self,
        surface: VideoSurface,
        format: YCbCrFormat,
        planes: &[&[u8]],
        _pitches: &[u32],
    ) -> Result<()> {
        self.check(FakeOp::VideoSurfacePutBits)?;
        match self.objects.get_mut(&surface) {
            Some(FakeObject::VideoSurface {
                chroma,
                planes: stored,
            }) => {
                if *chroma != format.chroma_type() {
                    return Err(Error::InvalidValue);
                }
                *stored = planes.iter().map(|p| p.to_vec()).collect();
                Ok(())
            }
            _ => Err(Error::InvalidHandle),
        }
    }

    fn output_surface_create(
        &mut self,
        _format: RgbaFormat,
        width: u32,
        height: u32,
    ) -> Result<OutputSurface> {
        self.check(FakeOp::OutputSurfaceCreate)?;
        Self::check_size(width, height)?;
        Ok(self.insert(FakeObject::OutputSurface { width, height }))
    }

    fn output_surface_destroy(&mut self, surface: OutputSurface) -> Result<()> {
        self.check(FakeOp::OutputSurfaceDestroy)?;
        self.remove(surface, FakeObjectKind::OutputSurface)
            .map(|_| ())
    }

    fn output_surface_render_bitmap_surface(&mut self, render: &BitmapRender) -> Result<()> {
        self.check(FakeOp::OutputSurfaceRenderBitmap)?;
        self.expect_kind(render.destination, FakeObjectKind::OutputSurface)?;
        self.expect_kind(render.source, FakeObjectKind::BitmapSurface)?;
        self.bitmap_renders.push(*render);
        Ok(())
    }

    fn bitmap_surface_create(
        &mut self,
        _format: RgbaFormat,
        width: u32,
        height: u32,
        _frequently_accessed: bool,
    ) -> Result<BitmapSurface> {
        self.check(FakeOp::BitmapSurfaceCreate)?;
        Self::check_size(width, height)?;
        Ok(self.insert(FakeObject::BitmapSurface { data: Vec::new() }))
    }

    fn bitmap_surface_destroy(&mut self, surface: BitmapSurface) -> Result<()> {
        self.check(FakeOp::BitmapSurfaceDestroy)?;
        self.remove(surface, FakeObjectKind::BitmapSurface)
            .map(|_| ())
    }

    fn bitmap_surface_put_bits(
        &mut self,
        surface: BitmapSurface,
        data: &[u8],
        _pitch: u32,
        _rect: Option<Rect>,
    ) -> Result<()> {
        self.check(FakeOp::BitmapSurfacePutBits)?;
        match self.objects.get_mut(&surface) {
            Some(FakeObject::BitmapSurface { data: stored }) => {
                *stored = data.to_vec();
                Ok(())
            }
            _ => Err(Error::InvalidHandle),
        }
    }

    fn decoder_query_capabilities(&self, profile: DecoderProfile) -> Result<DecoderCaps> {
        if !self.profiles.contains(&profile) {
            return Ok(DecoderCaps::default());
        }
        let max_references = match profile {
            DecoderProfile::H264Baseline | DecoderProfile::H264Main | DecoderProfile::H264High => {
                16
            }
            _ => 2,
        };
        Ok(DecoderCaps {
            supported: true,
            max_level: 51,
            max_references,
            max_width: MAX_SURFACE_SIZE,
            max_height: MAX_SURFACE_SIZE,
        })
    }

    fn decoder_create(
        &mut self,
        profile: DecoderProfile,
        width: u32,
        height: u32,
        _max_references: u32,
    ) -> Result<Decoder> {
        self.check(FakeOp::DecoderCreate)?;
        if !self.profiles.contains(&profile) {
            return Err(Error::Unsupported);
        }
        Self::check_size(width, height)?;
        Ok(self.insert(FakeObject::Decoder { profile }))
    }

    fn decoder_destroy(&mut self, decoder: Decoder) -> Result<()> {
        self.check(FakeOp::DecoderDestroy)?;
        self.remove(decoder, FakeObjectKind::Decoder).map(|_| ())
    }

    fn decoder_render(
        &mut self,
        decoder: Decoder,
        target: VideoSurface,
        picture_info: &PictureInfo,
        bitstream: &[&[u8]],
    ) -> Result<()> {
        self.check(FakeOp::DecoderRender)?;
        let profile = match self.objects.get(&decoder) {
            Some(FakeObject::Decoder { profile }) => *profile,
            _ => return Err(Error::InvalidHandle),
        };
        self.expect_kind(target, FakeObjectKind::VideoSurface)?;
        let matches_profile = match picture_info {
            PictureInfo::Mpeg12(_) => matches!(
                profile,
                DecoderProfile::Mpeg1 | DecoderProfile::Mpeg2Simple | DecoderProfile::Mpeg2Main
            ),
            PictureInfo::H264(_) => matches!(
                profile,
                DecoderProfile::H264Baseline | DecoderProfile::H264Main | DecoderProfile::H264High
            ),
            PictureInfo::Vc1(_) => matches!(
                profile,
                DecoderProfile::Vc1Simple | DecoderProfile::Vc1Main | DecoderProfile::Vc1Advanced
            ),
            PictureInfo::Mpeg4Part2(_) => matches!(
                profile,
                DecoderProfile::Mpeg4PartSp | DecoderProfile::Mpeg4PartAsp
            ),
        };
        if !matches_profile {
            return Err(Error::InvalidValue);
        }
        self.decodes.push(DecodeRecord {
            decoder,
            target,
            picture_info: picture_info.clone(),
            bitstream: bitstream.concat(),
        });
        Ok(())
    }

    fn video_mixer_create(
        &mut self,
        _features: &[VideoMixerFeature],
        width: u32,
        height: u32,
        _chroma: ChromaType,
    ) -> Result<VideoMixer> {
        self.check(FakeOp::VideoMixerCreate)?;
        Self::check_size(width, height)?;
        Ok(self.insert(FakeObject::VideoMixer {
            attributes: Vec::new(),
        }))
    }

    fn video_mixer_destroy(&mut self, mixer: VideoMixer) -> Result<()> {
        self.check(FakeOp::VideoMixerDestroy)?;
        self.remove(mixer, FakeObjectKind::VideoMixer).map(|_| ())
    }

    fn video_mixer_set_attribute_values(
        &mut self,
        mixer: VideoMixer,
        attributes: &[VideoMixerAttribute],
    ) -> Result<()> {
        self.check(FakeOp::VideoMixerSetAttributes)?;
        match self.objects.get_mut(&mixer) {
            Some(FakeObject::VideoMixer { attributes: stored }) => {
                stored.extend_from_slice(attributes);
                Ok(())
            }
            _ => Err(Error::InvalidHandle),
        }
    }

    fn video_mixer_render(&mut self, mixer: VideoMixer, render: &MixerRender) -> Result<()> {
        self.check(FakeOp::VideoMixerRender)?;
        self.expect_kind(mixer, FakeObjectKind::VideoMixer)?;
        self.expect_kind(render.current, FakeObjectKind::VideoSurface)?;
        self.expect_kind(render.destination, FakeObjectKind::OutputSurface)?;
        self.mixer_renders.push(MixerRenderRecord {
            mixer,
            field: render.field,
            past: render.past.to_vec(),
            current: render.current,
            destination: render.destination,
            source_rect: render.source_rect,
            destination_rect: render.destination_rect,
        });
        Ok(())
    }

    fn generate_csc_matrix(
        &self,
        procamp: &Procamp,
        standard: ColorStandard,
    ) -> Result<CscMatrix> {
        self.csc_generations.set(self.csc_generations.get() + 1);
        let (kr, kb) = match standard {
            ColorStandard::ItuR601 => (0.299, 0.114),
            ColorStandard::ItuR709 => (0.2126, 0.0722),
            ColorStandard::Smpte240M => (0.2122, 0.0865),
        };
        let gain = procamp.contrast;
        let chroma = procamp.contrast * procamp.saturation;
        let (sin, cos) = procamp.hue.sin_cos();
        let kg = 1.0 - kr - kb;
        let cr_r = 2.0 * (1.0 - kr);
        let cb_b = 2.0 * (1.0 - kb);
        let cb_g = -2.0 * kb * (1.0 - kb) / kg;
        let cr_g = -2.0 * kr * (1.0 - kr) / kg;
        let row = |cb: f32, cr: f32| {
            [
                gain,
                chroma * (cb * cos - cr * sin),
                chroma * (cr * cos + cb * sin),
                procamp.brightness,
            ]
        };
        Ok([row(0.0, cr_r), row(cb_g, cr_g), row(cb_b, 0.0)])
    }

    fn presentation_queue_target_create(
        &mut self,
        drawable: Drawable,
    ) -> Result<PresentationQueueTarget> {
        self.check(FakeOp::PresentationQueueTargetCreate)?;
        Ok(self.insert(FakeObject::Target { drawable }))
    }

    fn presentation_queue_target_destroy(
        &mut self,
        target: PresentationQueueTarget,
    ) -> Result<()> {
        self.check(FakeOp::PresentationQueueTargetDestroy)?;
        let in_use = self
            .objects
            .values()
            .any(|o| matches!(o, FakeObject::Queue { target: t, .. } if *t == target));
        if in_use {
            return Err(Error::Error);
        }
        self.remove(target, FakeObjectKind::PresentationQueueTarget)
            .map(|_| ())
    }

    fn presentation_queue_create(
        &mut self,
        target: PresentationQueueTarget,
    ) -> Result<PresentationQueue> {
        self.check(FakeOp::PresentationQueueCreate)?;
        self.expect_kind(target, FakeObjectKind::PresentationQueueTarget)?;
        Ok(self.insert(FakeObject::Queue {
            target,
            pending: Vec::new(),
            background: Color::default(),
        }))
    }

    fn presentation_queue_destroy(&mut self, queue: PresentationQueue) -> Result<()> {
        self.check(FakeOp::PresentationQueueDestroy)?;
        self.remove(queue, FakeObjectKind::PresentationQueue)
            .map(|_| ())
    }

    fn presentation_queue_set_background_color(
        &mut self,
        queue: PresentationQueue,
        color: Color,
    ) -> Result<()> {
        self.check(FakeOp::PresentationQueueSetBackground)?;
        match self.objects.get_mut(&queue) {
            Some(FakeObject::Queue { background, .. }) => {
                *background = color;
                Ok(())
            }
            _ => Err(Error::InvalidHandle),
        }
    }

    fn presentation_queue_display(
        &mut self,
        queue: PresentationQueue,
        surface: OutputSurface,
        clip_width: u32,
        clip_height: u32,
        _earliest_time: u64,
    ) -> Result<()> {
        self.check(FakeOp::PresentationQueueDisplay)?;
        self.expect_kind(surface, FakeObjectKind::OutputSurface)?;
        match self.objects.get_mut(&queue) {
            Some(FakeObject::Queue { pending, .. }) => pending.push(surface),
            _ => return Err(Error::InvalidHandle),
        }
        self.presentations.push(Presentation {
            queue,
            surface,
            clip_width,
            clip_height,
        });
        Ok(())
    }

    fn presentation_queue_block_until_surface_idle(
        &mut self,
        queue: PresentationQueue,
        surface: OutputSurface,
    ) -> Result<u64> {
        self.check(FakeOp::PresentationQueueBlock)?;
        match self.objects.get_mut(&queue) {
            Some(FakeObject::Queue { pending, .. }) => pending.retain(|s| *s != surface),
            _ => return Err(Error::InvalidHandle),
        }
        self.idle_waits.push((queue, surface));
        self.clock += 1;
        Ok(self.clock)
    }

    fn presentation_queue_query_surface_status(
        &self,
        queue: PresentationQueue,
        surface: OutputSurface,
    ) -> Result<PresentationStatus> {
        match self.objects.get(&queue) {
            Some(FakeObject::Queue { pending, .. }) => {
                Ok(match pending.iter().rposition(|s| *s == surface) {
                    Some(index) if index + 1 == pending.len() => PresentationStatus::Visible,
                    Some(_) => PresentationStatus::Queued,
                    None => PresentationStatus::Idle,
                })
            }
            _ => Err(Error::InvalidHandle),
        }
    }
}

/// Windows with a fixed display size and scripted resize notifications.
pub struct FakeDrawables {
    display: (u32, u32),
    windows: BTreeMap<Drawable, (u32, u32)>,
    pixmaps: BTreeMap<Drawable, (u32, u32)>,
    pending_resizes: BTreeMap<Drawable, (u32, u32)>,
}

impl FakeDrawables {
    pub fn new(display_width: u32, display_height: u32) -> FakeDrawables {
        FakeDrawables {
            display: (display_width, display_height),
            windows: BTreeMap::new(),
            pixmaps: BTreeMap::new(),
            pending_resizes: BTreeMap::new(),
        }
    }

    pub fn add_window(&mut self, drawable: Drawable, width: u32, height: u32) {
        self.windows.insert(drawable, (width, height));
    }

    pub fn add_pixmap(&mut self, drawable: Drawable, width: u32, height: u32) {
        self.pixmaps.insert(drawable, (width, height));
    }

    /// Changes the size of a drawable without leaving a notification in the event stream.
    pub fn resize(&mut self, drawable: Drawable, width: u32, height: u32) {
        if let Some(size) = self.windows.get_mut(&drawable) {
            *size = (width, height);
        } else if let Some(size) = self.pixmaps.get_mut(&drawable) {
            *size = (width, height);
        }
    }

    /// Leaves (or with `None`, drains) a resize notification for `drawable`.
    pub fn set_pending_resize(&mut self, drawable: Drawable, size: Option<(u32, u32)>) {
        match size {
            Some(size) => {
                self.pending_resizes.insert(drawable, size);
            }
            None => {
                self.pending_resizes.remove(&drawable);
            }
        }
    }
}

impl DrawableService for FakeDrawables {
    fn display_size(&self) -> (u32, u32) {
        self.display
    }

    fn geometry(&self, drawable: Drawable) -> Result<(u32, u32)> {
        self.windows
            .get(&drawable)
            .or_else(|| self.pixmaps.get(&drawable))
            .copied()
            .ok_or(Error::InvalidHandle)
    }

    fn is_window(&self, drawable: Drawable) -> bool {
        self.windows.contains_key(&drawable)
    }

    fn pending_resize(&self, drawable: Drawable) -> Option<(u32, u32)> {
        self.pending_resizes.get(&drawable).copied()
    }
}
