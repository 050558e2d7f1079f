// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decode configurations and contexts.
//!
//! A picture is decoded in three steps: `begin_picture` selects the target surface,
//! `render_picture` queues parameter and data buffers, and `end_picture` translates the queued
//! buffers into a device picture description plus bitstream and submits them to the device
//! decoder.

mod h264;
mod mpeg2;
mod mpeg4;
mod vc1;

use log::debug;
use log::warn;
use vdp::ChromaType;
use vdp::DecoderProfile;
use vdp::Device;
use vdp::PictureInfo;
use vdp::PictureInfoH264;
use vdp::PictureInfoMpeg4Part2;
use vdp::PictureInfoVc1;

use crate::error::device_error;
use crate::error::DeviceOp;
use crate::error::Error;
use crate::error::Result;
use crate::mixer;
use crate::registry::MixerId;
use crate::registry::Registry;
use crate::va::BufferContent;
use crate::va::BufferId;
use crate::va::BufferType;
use crate::va::Codec;
use crate::va::ConfigAttrib;
use crate::va::ConfigAttribType;
use crate::va::ConfigId;
use crate::va::ContextId;
use crate::va::Entrypoint;
use crate::va::IqMatrix;
use crate::va::PictureParameter;
use crate::va::Profile;
use crate::va::SliceParameters;
use crate::va::SurfaceId;
use crate::va::SurfaceStatus;
use crate::va::VA_ATTRIB_NOT_SUPPORTED;
use crate::va::VA_INVALID_SURFACE;
use crate::va::VA_RT_FORMAT_YUV420;

/// Device decoder profile used for `profile`.
///
/// Baseline H.264 streams are decoded with the main profile decoder, which handles every
/// baseline stream that does not use FMO or ASO.
pub fn device_profile(profile: Profile) -> Option<DecoderProfile> {
    Some(match profile {
        Profile::Mpeg2Simple => DecoderProfile::Mpeg2Simple,
        Profile::Mpeg2Main => DecoderProfile::Mpeg2Main,
        Profile::Mpeg4Simple => DecoderProfile::Mpeg4PartSp,
        Profile::Mpeg4AdvancedSimple => DecoderProfile::Mpeg4PartAsp,
        Profile::H264Baseline | Profile::H264ConstrainedBaseline | Profile::H264Main => {
            DecoderProfile::H264Main
        }
        Profile::H264High => DecoderProfile::H264High,
        Profile::Vc1Simple => DecoderProfile::Vc1Simple,
        Profile::Vc1Main => DecoderProfile::Vc1Main,
        Profile::Vc1Advanced => DecoderProfile::Vc1Advanced,
        Profile::None
        | Profile::Mpeg4Main
        | Profile::H263Baseline
        | Profile::JpegBaseline => return None,
    })
}

fn is_supported(device: &dyn Device, profile: Profile) -> bool {
    device_profile(profile)
        .and_then(|p| device.decoder_query_capabilities(p).ok())
        .map(|caps| caps.supported)
        .unwrap_or(false)
}

/// Profiles the device can decode.
pub fn query_profiles(device: &dyn Device) -> Vec<Profile> {
    Profile::ALL
        .iter()
        .copied()
        .filter(|&p| is_supported(device, p))
        .collect()
}

/// Entrypoints available for `profile`; only slice level decoding is offered.
pub fn query_entrypoints(device: &dyn Device, profile: Profile) -> Result<Vec<Entrypoint>> {
    if !is_supported(device, profile) {
        return Err(Error::UnsupportedProfile(profile));
    }
    Ok(vec![Entrypoint::Vld])
}

/// Fills in the values the driver supports for `attributes`.
pub fn get_config_attributes(
    device: &dyn Device,
    profile: Profile,
    entrypoint: Entrypoint,
    attributes: &mut [ConfigAttrib],
) -> Result<()> {
    if !is_supported(device, profile) {
        return Err(Error::UnsupportedProfile(profile));
    }
    if entrypoint != Entrypoint::Vld {
        return Err(Error::UnsupportedEntrypoint(entrypoint));
    }
    for attribute in attributes {
        attribute.value = match attribute.attrib_type {
            ConfigAttribType::RtFormat => VA_RT_FORMAT_YUV420,
            _ => VA_ATTRIB_NOT_SUPPORTED,
        };
    }
    Ok(())
}

pub struct Config {
    pub profile: Profile,
    pub entrypoint: Entrypoint,
    pub attributes: Vec<ConfigAttrib>,
}

pub fn create_config(
    registry: &mut Registry,
    device: &dyn Device,
    profile: Profile,
    entrypoint: Entrypoint,
    attributes: &[ConfigAttrib],
) -> Result<ConfigId> {
    if !is_supported(device, profile) {
        return Err(Error::UnsupportedProfile(profile));
    }
    if entrypoint != Entrypoint::Vld {
        return Err(Error::UnsupportedEntrypoint(entrypoint));
    }
    for attribute in attributes {
        if attribute.attrib_type == ConfigAttribType::RtFormat
            && attribute.value & VA_RT_FORMAT_YUV420 == 0
        {
            return Err(Error::UnsupportedRtFormat(attribute.value));
        }
    }
    let id = registry.configs.allocate(Config {
        profile,
        entrypoint,
        attributes: vec![ConfigAttrib {
            attrib_type: ConfigAttribType::RtFormat,
            value: VA_RT_FORMAT_YUV420,
        }],
    })?;
    debug!("config {:#010x}: {:?} {:?}", id, profile, entrypoint);
    Ok(id)
}

pub fn destroy_config(registry: &mut Registry, id: ConfigId) -> Result<()> {
    registry.config(id)?;
    registry.configs.free(id)?;
    Ok(())
}

pub struct Context {
    pub config: ConfigId,
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    pub flags: u32,
    pub render_targets: Vec<SurfaceId>,
    decoder: vdp::Decoder,
    /// Mixer referenced for the lifetime of the context.
    mixer: MixerId,
    /// Target of the picture being assembled.
    pub current: Option<SurfaceId>,
    /// Buffers queued for the current picture, in submission order.
    pub pending_buffers: Vec<BufferId>,
    /// Picture state carried from one picture to the next, such as quantiser matrices.
    picture_info: PictureInfo,
}

fn initial_picture_info(codec: Codec) -> PictureInfo {
    match codec {
        Codec::Mpeg2 => PictureInfo::Mpeg12(mpeg2::initial_picture_info()),
        Codec::Mpeg4 => PictureInfo::Mpeg4Part2(PictureInfoMpeg4Part2::default()),
        Codec::H264 => PictureInfo::H264(Box::new(PictureInfoH264::default())),
        Codec::Vc1 => PictureInfo::Vc1(PictureInfoVc1::default()),
    }
}

/// Creates a decode context for `width`x`height` pictures rendering into `render_targets`.
#[allow(clippy::too_many_arguments)]
pub fn create_context(
    registry: &mut Registry,
    device: &mut dyn Device,
    config: ConfigId,
    width: u32,
    height: u32,
    flags: u32,
    render_targets: &[SurfaceId],
    history_len: usize,
) -> Result<ContextId> {
    let profile = registry.config(config)?.profile;
    let codec = profile.codec().ok_or(Error::UnsupportedProfile(profile))?;
    let decoder_profile = device_profile(profile).ok_or(Error::UnsupportedProfile(profile))?;
    for &target in render_targets {
        if registry.surface(target)?.context.is_some() {
            return Err(Error::SurfaceBusy(target));
        }
    }

    let caps = device
        .decoder_query_capabilities(decoder_profile)
        .map_err(device_error(DeviceOp::DecoderQueryCapabilities))?;
    if !caps.supported {
        return Err(Error::UnsupportedProfile(profile));
    }
    if width == 0 || height == 0 || width > caps.max_width || height > caps.max_height {
        return Err(Error::ResolutionNotSupported { width, height });
    }
    let max_references = match codec {
        Codec::H264 => 16,
        _ => 2,
    };
    let decoder = device
        .decoder_create(decoder_profile, width, height, max_references)
        .map_err(device_error(DeviceOp::DecoderCreate))?;
    let mixer = match mixer::acquire(
        registry,
        device,
        width,
        height,
        ChromaType::Yuv420,
        history_len,
    ) {
        Ok(mixer) => mixer,
        Err(e) => {
            destroy_decoder(device, decoder);
            return Err(e);
        }
    };

    let context = Context {
        config,
        codec,
        width,
        height,
        flags,
        render_targets: render_targets.to_vec(),
        decoder,
        mixer,
        current: None,
        pending_buffers: Vec::new(),
        picture_info: initial_picture_info(codec),
    };
    let id = match registry.contexts.allocate(context) {
        Ok(id) => id,
        Err(e) => {
            if let Err(e) = mixer::unref(registry, device, mixer) {
                warn!("failed to release mixer: {}", e);
            }
            destroy_decoder(device, decoder);
            return Err(e.into());
        }
    };
    for &target in render_targets {
        registry.surface_mut(target)?.context = Some(id);
    }
    debug!(
        "context {:#010x}: {:?} {}x{}, {} render targets",
        id,
        profile,
        width,
        height,
        render_targets.len()
    );
    Ok(id)
}

fn destroy_decoder(device: &mut dyn Device, decoder: vdp::Decoder) {
    if let Err(e) = device.decoder_destroy(decoder) {
        warn!("failed to destroy decoder: {}", e);
    }
}

/// Frees the buffers of the current picture that were destroyed while queued.
fn release_pending(registry: &mut Registry, context: ContextId) -> Result<()> {
    let pending = std::mem::take(&mut registry.context_mut(context)?.pending_buffers);
    for id in pending {
        let delayed = registry
            .buffers
            .get(id)
            .map(|b| b.delayed_destroy)
            .unwrap_or(false);
        if delayed {
            registry.buffers.free(id)?;
        }
    }
    Ok(())
}

pub fn destroy_context(
    registry: &mut Registry,
    device: &mut dyn Device,
    id: ContextId,
) -> Result<()> {
    registry.context(id)?;
    release_pending(registry, id)?;
    let context = registry.contexts.free(id)?;
    for target in context.render_targets {
        if let Some(surface) = registry.surfaces.get_mut(target) {
            if surface.context == Some(id) {
                surface.context = None;
            }
        }
    }
    mixer::unref(registry, device, context.mixer)?;
    destroy_decoder(device, context.decoder);
    debug!("destroyed context {:#010x}", id);
    Ok(())
}

/// Starts a picture decoding into `target`.
pub fn begin_picture(registry: &mut Registry, id: ContextId, target: SurfaceId) -> Result<()> {
    registry.context(id)?;
    registry.surface(target)?;
    // Buffers of an abandoned picture are dropped.
    release_pending(registry, id)?;
    registry.context_mut(id)?.current = Some(target);
    registry.surface_mut(target)?.status = SurfaceStatus::Rendering;
    Ok(())
}

/// Codec of a typed buffer content, or `None` for raw bytes.
fn content_codec(content: &BufferContent) -> Option<Codec> {
    match content {
        BufferContent::Bytes(_) => None,
        BufferContent::PictureParameter(PictureParameter::Mpeg2(_))
        | BufferContent::IqMatrix(IqMatrix::Mpeg2(_))
        | BufferContent::SliceParameter(SliceParameters::Mpeg2(_)) => Some(Codec::Mpeg2),
        BufferContent::PictureParameter(PictureParameter::Mpeg4(_))
        | BufferContent::IqMatrix(IqMatrix::Mpeg4(_))
        | BufferContent::SliceParameter(SliceParameters::Mpeg4(_)) => Some(Codec::Mpeg4),
        BufferContent::PictureParameter(PictureParameter::H264(_))
        | BufferContent::IqMatrix(IqMatrix::H264(_))
        | BufferContent::SliceParameter(SliceParameters::H264(_)) => Some(Codec::H264),
        BufferContent::PictureParameter(PictureParameter::Vc1(_))
        | BufferContent::SliceParameter(SliceParameters::Vc1(_)) => Some(Codec::Vc1),
    }
}

fn accepts(codec: Codec, buffer_type: BufferType) -> bool {
    match buffer_type {
        BufferType::PictureParameter | BufferType::SliceParameter | BufferType::SliceData => true,
        BufferType::IqMatrix => codec != Codec::Vc1,
        BufferType::BitPlane => codec == Codec::Vc1,
        _ => false,
    }
}

/// Queues `buffers` for the current picture.
///
/// Every buffer is checked before any is queued.
pub fn render_picture(registry: &mut Registry, id: ContextId, buffers: &[BufferId]) -> Result<()> {
    let context = registry.context(id)?;
    if context.current.is_none() {
        return Err(Error::InvalidParameter("no picture was started"));
    }
    let codec = context.codec;
    for &buffer_id in buffers {
        let buffer = registry.buffer(buffer_id)?;
        let matching = content_codec(&buffer.content)
            .map(|c| c == codec)
            .unwrap_or(true);
        if !accepts(codec, buffer.buffer_type) || !matching {
            return Err(Error::UnsupportedBufferType {
                buffer_type: buffer.buffer_type,
                codec,
            });
        }
    }
    registry
        .context_mut(id)?
        .pending_buffers
        .extend_from_slice(buffers);
    Ok(())
}

/// Device surface of a reference picture; the invalid id stands for no reference.
fn reference(registry: &Registry, id: SurfaceId) -> Result<vdp::VideoSurface> {
    if id == VA_INVALID_SURFACE {
        return Ok(vdp::INVALID_HANDLE);
    }
    Ok(registry.surface(id)?.device_surface)
}

fn apply_picture_parameter(
    registry: &Registry,
    info: &mut PictureInfo,
    param: &PictureParameter,
) -> Result<()> {
    match (info, param) {
        (PictureInfo::Mpeg12(info), PictureParameter::Mpeg2(p)) => mpeg2::update_picture(
            info,
            p,
            reference(registry, p.forward_reference_picture)?,
            reference(registry, p.backward_reference_picture)?,
        ),
        (PictureInfo::Mpeg4Part2(info), PictureParameter::Mpeg4(p)) => mpeg4::update_picture(
            info,
            p,
            reference(registry, p.forward_reference_picture)?,
            reference(registry, p.backward_reference_picture)?,
        ),
        (PictureInfo::H264(info), PictureParameter::H264(p)) => {
            h264::update_picture(info, p, |id| {
                registry.surfaces.get(id).map(|s| s.device_surface)
            })
        }
        (PictureInfo::Vc1(info), PictureParameter::Vc1(p)) => vc1::update_picture(
            info,
            p,
            reference(registry, p.forward_reference_picture)?,
            reference(registry, p.backward_reference_picture)?,
        ),
        _ => return Err(Error::Inconsistent("picture parameter of another codec")),
    }
    Ok(())
}

fn apply_iq_matrix(info: &mut PictureInfo, iq: &IqMatrix) -> Result<()> {
    match (info, iq) {
        (PictureInfo::Mpeg12(info), IqMatrix::Mpeg2(iq)) => mpeg2::update_iq_matrix(info, iq),
        (PictureInfo::Mpeg4Part2(info), IqMatrix::Mpeg4(iq)) => mpeg4::update_iq_matrix(info, iq),
        (PictureInfo::H264(info), IqMatrix::H264(iq)) => h264::update_iq_matrix(info, iq),
        _ => return Err(Error::Inconsistent("quantiser matrix of another codec")),
    }
    Ok(())
}

fn set_slice_count(info: &mut PictureInfo, count: u32) {
    match info {
        PictureInfo::Mpeg12(info) => info.slice_count = count,
        PictureInfo::H264(info) => info.slice_count = count,
        PictureInfo::Vc1(info) => info.slice_count = count,
        PictureInfo::Mpeg4Part2(_) => {}
    }
}

/// Assembles the picture description and bitstream of the queued buffers.
fn translate(
    registry: &Registry,
    codec: Codec,
    info: &mut PictureInfo,
    pending: &[BufferId],
) -> Result<Vec<Vec<u8>>> {
    // Picture parameters first and matrices second, whatever order they were queued in.
    let mut has_picture_parameter = false;
    for &id in pending {
        if let BufferContent::PictureParameter(param) = &registry.buffer(id)?.content {
            apply_picture_parameter(registry, info, param)?;
            has_picture_parameter = true;
        }
    }
    if !has_picture_parameter {
        return Err(Error::MissingPictureParameter);
    }
    for &id in pending {
        if let BufferContent::IqMatrix(iq) = &registry.buffer(id)?.content {
            apply_iq_matrix(info, iq)?;
        }
    }
    let vc1_advanced = match &*info {
        PictureInfo::Vc1(_) => pending.iter().any(|&id| {
            matches!(
                registry.buffers.get(id).map(|b| &b.content),
                Some(BufferContent::PictureParameter(PictureParameter::Vc1(p)))
                    if p.sequence_fields.profile == vc1::PROFILE_ADVANCED
            )
        }),
        _ => false,
    };

    let mut bitstream = Vec::new();
    let mut ranges: Option<Vec<(u32, u32)>> = None;
    let mut slice_count = 0usize;
    for &id in pending {
        let buffer = registry.buffer(id)?;
        match (&buffer.content, buffer.buffer_type) {
            (BufferContent::SliceParameter(slices), _) => {
                if let (PictureInfo::H264(info), SliceParameters::H264(slices)) =
                    (&mut *info, slices)
                {
                    if slice_count == 0 {
                        h264::update_slices(info, slices);
                    }
                }
                ranges = Some(slices.data_ranges());
            }
            (BufferContent::Bytes(data), BufferType::SliceData) => {
                let ranges = ranges
                    .as_ref()
                    .ok_or(Error::InvalidParameter("slice data without slice parameters"))?;
                for &(offset, size) in ranges {
                    let start = offset as usize;
                    let end = start + size as usize;
                    let slice = data
                        .get(start..end)
                        .ok_or(Error::InvalidParameter("slice outside of its data buffer"))?;
                    let mut chunk = Vec::with_capacity(slice.len() + 4);
                    match codec {
                        Codec::H264 => chunk.extend_from_slice(&h264::START_CODE),
                        Codec::Vc1 if vc1_advanced => {
                            if let Some(code) = vc1::start_code(slice_count, slice) {
                                chunk.extend_from_slice(&code);
                            }
                        }
                        _ => {}
                    }
                    chunk.extend_from_slice(slice);
                    bitstream.push(chunk);
                    slice_count += 1;
                }
            }
            // The device parses VC-1 bitplanes from the bitstream itself.
            _ => {}
        }
    }
    set_slice_count(info, slice_count as u32);
    Ok(bitstream)
}

/// Submits the current picture to the device decoder.
///
/// The queued buffers are released whether or not decoding succeeds.
pub fn end_picture(registry: &mut Registry, device: &mut dyn Device, id: ContextId) -> Result<()> {
    let context = registry.context(id)?;
    let target = context
        .current
        .ok_or(Error::InvalidParameter("no picture was started"))?;
    let (codec, decoder) = (context.codec, context.decoder);
    let mut info = context.picture_info.clone();
    let pending = context.pending_buffers.clone();

    let result = translate(registry, codec, &mut info, &pending).and_then(|bitstream| {
        let device_target = registry.surface(target)?.device_surface;
        let chunks: Vec<&[u8]> = bitstream.iter().map(Vec::as_slice).collect();
        device
            .decoder_render(decoder, device_target, &info, &chunks)
            .map_err(device_error(DeviceOp::DecoderRender))
    });

    release_pending(registry, id)?;
    let context = registry.context_mut(id)?;
    context.current = None;
    if result.is_ok() {
        context.picture_info = info;
    }
    if let Some(surface) = registry.surfaces.get_mut(target) {
        surface.status = SurfaceStatus::Ready;
    }
    result
}
