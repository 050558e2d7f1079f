// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Cache of device video mixers.
//!
//! A video mixer is expensive to create and only depends on the source size and chroma type, so
//! mixers are shared between every surface and context with the same parameters. A mixer lives
//! as long as someone holds a reference to it.

use std::collections::VecDeque;

use log::debug;
use log::warn;
use vdp::ChromaType;
use vdp::ColorStandard;
use vdp::Device;
use vdp::FieldStructure;
use vdp::MixerRender;
use vdp::VideoMixerAttribute;
use vdp::VideoMixerFeature;

use crate::attributes::DisplayAttributes;
use crate::error::device_error;
use crate::error::DeviceOp;
use crate::error::Result;
use crate::registry::MixerId;
use crate::registry::Registry;
use crate::va::SurfaceId;
use crate::va::VaRect;

pub struct Mixer {
    pub device_mixer: vdp::VideoMixer,
    pub width: u32,
    pub height: u32,
    pub chroma: ChromaType,
    refcount: u32,
    /// Newest procamp change folded into the device CSC matrix.
    procamp_mtime: u64,
    /// Newest background colour change applied to the device.
    background_mtime: u64,
    standard: ColorStandard,
    /// Recently rendered source surfaces, most recent first.
    history: VecDeque<vdp::VideoSurface>,
    history_len: usize,
}

/// What to composite in `Mixer::render`.
#[derive(Debug, Clone, Copy)]
pub struct Composition {
    pub source: vdp::VideoSurface,
    pub field: FieldStructure,
    pub source_rect: VaRect,
    pub destination: vdp::OutputSurface,
    pub destination_rect: VaRect,
}

impl Mixer {
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    fn matches(&self, width: u32, height: u32, chroma: ChromaType) -> bool {
        self.width == width && self.height == height && self.chroma == chroma
    }

    /// Brings the device colour state up to date with `attributes`.
    ///
    /// Only attributes changed since the last update reach the device.
    pub fn update_state(
        &mut self,
        device: &mut dyn Device,
        attributes: &DisplayAttributes,
        standard: ColorStandard,
    ) -> Result<()> {
        let procamp_mtime = attributes.procamp_mtime();
        if procamp_mtime > self.procamp_mtime || standard != self.standard {
            let matrix = device
                .generate_csc_matrix(&attributes.procamp(), standard)
                .map_err(device_error(DeviceOp::GenerateCscMatrix))?;
            device
                .video_mixer_set_attribute_values(
                    self.device_mixer,
                    &[VideoMixerAttribute::CscMatrix(matrix)],
                )
                .map_err(device_error(DeviceOp::MixerSetAttributes))?;
            self.procamp_mtime = procamp_mtime;
            self.standard = standard;
        }

        let background_mtime = attributes.background_mtime();
        if background_mtime > self.background_mtime {
            device
                .video_mixer_set_attribute_values(
                    self.device_mixer,
                    &[VideoMixerAttribute::BackgroundColor(attributes.background())],
                )
                .map_err(device_error(DeviceOp::MixerSetAttributes))?;
            self.background_mtime = background_mtime;
        }
        Ok(())
    }

    /// Composites a video surface into an output surface.
    pub fn render(&mut self, device: &mut dyn Device, composition: &Composition) -> Result<()> {
        let past: Vec<vdp::VideoSurface> = self
            .history
            .iter()
            .copied()
            .filter(|&s| s != composition.source)
            .collect();
        let render = MixerRender {
            background: None,
            field: composition.field,
            past: &past,
            current: composition.source,
            future: &[],
            source_rect: Some(composition.source_rect.to_device()),
            destination: composition.destination,
            destination_rect: None,
            destination_video_rect: Some(composition.destination_rect.to_device()),
            layers: &[],
        };
        device
            .video_mixer_render(self.device_mixer, &render)
            .map_err(device_error(DeviceOp::MixerRender))?;

        if self.history_len > 0 && self.history.front() != Some(&composition.source) {
            self.history.push_front(composition.source);
            self.history.truncate(self.history_len);
        }
        Ok(())
    }
}

/// Takes a reference on a mixer for `width`x`height` sources of `chroma`, creating one if no
/// live mixer matches.
pub fn acquire(
    registry: &mut Registry,
    device: &mut dyn Device,
    width: u32,
    height: u32,
    chroma: ChromaType,
    history_len: usize,
) -> Result<MixerId> {
    let found = registry
        .mixers
        .iter()
        .find(|(_, m)| m.matches(width, height, chroma))
        .map(|(id, _)| id);
    if let Some(id) = found {
        registry.mixer_mut(id)?.refcount += 1;
        return Ok(id);
    }

    let features: &[VideoMixerFeature] = if history_len > 0 {
        &[VideoMixerFeature::DeinterlaceTemporal]
    } else {
        &[]
    };
    let device_mixer = device
        .video_mixer_create(features, width, height, chroma)
        .map_err(device_error(DeviceOp::MixerCreate))?;
    let mixer = Mixer {
        device_mixer,
        width,
        height,
        chroma,
        refcount: 1,
        procamp_mtime: 0,
        background_mtime: 0,
        standard: ColorStandard::ItuR601,
        history: VecDeque::with_capacity(history_len),
        history_len,
    };
    match registry.mixers.allocate(mixer) {
        Ok(id) => {
            debug!(
                "created mixer {:#010x} for {}x{} {:?}",
                id, width, height, chroma
            );
            Ok(id)
        }
        Err(e) => {
            if let Err(e) = device.video_mixer_destroy(device_mixer) {
                warn!("failed to destroy video mixer: {}", e);
            }
            Err(e.into())
        }
    }
}

/// Takes a reference on the mixer suitable for `surface`.
///
/// If the surface already caches a mixer that one is referenced again, otherwise a live mixer
/// with the surface parameters is shared or a new one created.
pub fn get_or_create(
    registry: &mut Registry,
    device: &mut dyn Device,
    surface: SurfaceId,
    history_len: usize,
) -> Result<MixerId> {
    let surface = registry.surface(surface)?;
    if let Some(id) = surface.mixer {
        registry.mixer_mut(id)?.refcount += 1;
        return Ok(id);
    }
    let (width, height, chroma) = (surface.width, surface.height, surface.chroma);
    acquire(registry, device, width, height, chroma, history_len)
}

/// Returns the mixer cached by `surface`, taking and caching a reference the first time.
pub fn ensure_for_surface(
    registry: &mut Registry,
    device: &mut dyn Device,
    surface: SurfaceId,
    history_len: usize,
) -> Result<MixerId> {
    if let Some(id) = registry.surface(surface)?.mixer {
        return Ok(id);
    }
    let id = get_or_create(registry, device, surface, history_len)?;
    registry.surface_mut(surface)?.mixer = Some(id);
    Ok(id)
}

/// Removes a video surface about to be destroyed from the history of every mixer.
pub fn forget_source(registry: &mut Registry, source: vdp::VideoSurface) {
    for (_, mixer) in registry.mixers.iter_mut() {
        mixer.history.retain(|&s| s != source);
    }
}

/// Drops a reference on `id`, destroying the mixer with the last one.
pub fn unref(registry: &mut Registry, device: &mut dyn Device, id: MixerId) -> Result<()> {
    let mixer = registry.mixer_mut(id)?;
    mixer.refcount = mixer.refcount.saturating_sub(1);
    if mixer.refcount > 0 {
        return Ok(());
    }
    destroy(registry, device, id)
}

/// Destroys `id` regardless of outstanding references.
pub fn destroy(registry: &mut Registry, device: &mut dyn Device, id: MixerId) -> Result<()> {
    let mixer = registry.mixers.free(id)?;
    if let Err(e) = device.video_mixer_destroy(mixer.device_mixer) {
        warn!("failed to destroy video mixer {:#010x}: {}", id, e);
    }
    debug!("destroyed mixer {:#010x}", id);
    Ok(())
}
