// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Render target surfaces.

use log::debug;
use log::warn;
use vdp::ChromaType;
use vdp::Device;

use crate::association;
use crate::association::AssociationList;
use crate::error::device_error;
use crate::error::DeviceOp;
use crate::error::Error;
use crate::error::Result;
use crate::mixer;
use crate::output;
use crate::registry::MixerId;
use crate::registry::OutputId;
use crate::registry::Registry;
use crate::va::ContextId;
use crate::va::SurfaceId;
use crate::va::SurfaceStatus;
use crate::va::VA_RT_FORMAT_YUV420;
use crate::va::VA_RT_FORMAT_YUV422;
use crate::va::VA_RT_FORMAT_YUV444;

pub struct Surface {
    /// Decode context the surface is a render target of.
    pub context: Option<ContextId>,
    pub device_surface: vdp::VideoSurface,
    pub width: u32,
    pub height: u32,
    pub chroma: ChromaType,
    pub status: SurfaceStatus,
    /// Mixer used to present the surface, referenced once on first use.
    pub mixer: Option<MixerId>,
    pub associations: AssociationList,
    /// Outputs the surface was put on, each holding one reference.
    pub outputs: Vec<OutputId>,
}

/// Chroma type of surfaces created for `rt_format`.
pub fn chroma_for_rt_format(rt_format: u32) -> Result<ChromaType> {
    match rt_format {
        VA_RT_FORMAT_YUV420 => Ok(ChromaType::Yuv420),
        VA_RT_FORMAT_YUV422 => Ok(ChromaType::Yuv422),
        VA_RT_FORMAT_YUV444 => Ok(ChromaType::Yuv444),
        _ => Err(Error::UnsupportedRtFormat(rt_format)),
    }
}

/// Creates `count` surfaces of `width`x`height`.
///
/// Either every surface is created or none is.
pub fn create_surfaces(
    registry: &mut Registry,
    device: &mut dyn Device,
    width: u32,
    height: u32,
    rt_format: u32,
    count: usize,
) -> Result<Vec<SurfaceId>> {
    let chroma = chroma_for_rt_format(rt_format)?;
    let caps = device
        .video_surface_query_capabilities(chroma)
        .map_err(device_error(DeviceOp::VideoSurfaceCreate))?;
    if !caps.supported {
        return Err(Error::UnsupportedRtFormat(rt_format));
    }
    if width == 0 || height == 0 || width > caps.max_width || height > caps.max_height {
        return Err(Error::ResolutionNotSupported { width, height });
    }

    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        match create_one(registry, device, width, height, chroma) {
            Ok(id) => created.push(id),
            Err(e) => {
                for id in created {
                    if let Err(e) = destroy_surface(registry, device, id) {
                        warn!("failed to roll back surface {:#010x}: {}", id, e);
                    }
                }
                return Err(e);
            }
        }
    }
    debug!(
        "created {} {}x{} {:?} surfaces",
        count, width, height, chroma
    );
    Ok(created)
}

fn create_one(
    registry: &mut Registry,
    device: &mut dyn Device,
    width: u32,
    height: u32,
    chroma: ChromaType,
) -> Result<SurfaceId> {
    let device_surface = device
        .video_surface_create(chroma, width, height)
        .map_err(device_error(DeviceOp::VideoSurfaceCreate))?;
    let surface = Surface {
        context: None,
        device_surface,
        width,
        height,
        chroma,
        status: SurfaceStatus::Ready,
        mixer: None,
        associations: Vec::new(),
        outputs: Vec::new(),
    };
    registry.surfaces.allocate(surface).map_err(|e| {
        if let Err(e) = device.video_surface_destroy(device_surface) {
            warn!("failed to destroy video surface: {}", e);
        }
        e.into()
    })
}

/// Destroys `ids`. Nothing is destroyed if any of them is invalid, listed twice or still a
/// render target.
pub fn destroy_surfaces(
    registry: &mut Registry,
    device: &mut dyn Device,
    ids: &[SurfaceId],
) -> Result<()> {
    for (i, &id) in ids.iter().enumerate() {
        if registry.surface(id)?.context.is_some() {
            return Err(Error::SurfaceBusy(id));
        }
        if ids[..i].contains(&id) {
            return Err(Error::InvalidParameter("surface listed twice"));
        }
    }
    for &id in ids {
        destroy_surface(registry, device, id)?;
    }
    Ok(())
}

/// Destroys one surface and releases everything it references.
pub fn destroy_surface(
    registry: &mut Registry,
    device: &mut dyn Device,
    id: SurfaceId,
) -> Result<()> {
    association::detach_surface(registry, id)?;
    let surface = registry.surface_mut(id)?;
    let mixer = surface.mixer.take();
    let outputs = std::mem::take(&mut surface.outputs);
    let device_surface = surface.device_surface;

    mixer::forget_source(registry, device_surface);
    if let Some(mixer) = mixer {
        mixer::unref(registry, device, mixer)?;
    }
    for output in outputs {
        output::detach_surface(registry, device, output, id)?;
    }
    registry.surfaces.free(id)?;
    if let Err(e) = device.video_surface_destroy(device_surface) {
        warn!("failed to destroy video surface of {:#010x}: {}", id, e);
    }
    Ok(())
}

/// Current status of `id`, resolving `Displaying` against the presentation queues.
pub fn query_status(
    registry: &mut Registry,
    device: &dyn Device,
    id: SurfaceId,
) -> Result<SurfaceStatus> {
    let status = registry.surface(id)?.status;
    if status != SurfaceStatus::Displaying {
        return Ok(status);
    }
    if output::is_displaying(registry, device, id)? {
        return Ok(SurfaceStatus::Displaying);
    }
    registry.surface_mut(id)?.status = SurfaceStatus::Ready;
    Ok(SurfaceStatus::Ready)
}

/// Waits for pending decoding into `id`.
///
/// Device decoding is ordered with every later use of the surface, so a surface only ever
/// waits on itself being submitted.
pub fn sync(registry: &mut Registry, id: SurfaceId) -> Result<()> {
    let surface = registry.surface_mut(id)?;
    if surface.status == SurfaceStatus::Rendering {
        surface.status = SurfaceStatus::Ready;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use vdp::fake::FakeDevice;
    use vdp::fake::FakeObjectKind;
    use vdp::fake::FakeOp;

    use super::*;

    #[test]
    fn create_is_all_or_nothing() {
        let mut registry = Registry::new(4).unwrap();
        let mut device = FakeDevice::new();
        let ids =
            create_surfaces(&mut registry, &mut device, 720, 576, VA_RT_FORMAT_YUV420, 6).unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(device.count(FakeObjectKind::VideoSurface), 6);

        device.fail_next(FakeOp::VideoSurfaceCreate, vdp::Error::Resources);
        // The first creation of the next batch fails.
        assert!(
            create_surfaces(&mut registry, &mut device, 720, 576, VA_RT_FORMAT_YUV420, 3).is_err()
        );
        assert_eq!(registry.surfaces.len(), 6);
        assert_eq!(device.count(FakeObjectKind::VideoSurface), 6);
    }

    #[test]
    fn unsupported_formats_and_sizes() {
        let mut registry = Registry::new(4).unwrap();
        let mut device = FakeDevice::new();
        assert!(matches!(
            create_surfaces(&mut registry, &mut device, 64, 64, 0x100, 1),
            Err(Error::UnsupportedRtFormat(0x100))
        ));
        assert!(matches!(
            create_surfaces(&mut registry, &mut device, 64, 64, VA_RT_FORMAT_YUV444, 1),
            Err(Error::UnsupportedRtFormat(_))
        ));
        assert!(matches!(
            create_surfaces(&mut registry, &mut device, 8192, 64, VA_RT_FORMAT_YUV420, 1),
            Err(Error::ResolutionNotSupported { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn bound_surfaces_are_busy() {
        let mut registry = Registry::new(4).unwrap();
        let mut device = FakeDevice::new();
        let ids =
            create_surfaces(&mut registry, &mut device, 64, 64, VA_RT_FORMAT_YUV420, 2).unwrap();
        registry.surface_mut(ids[1]).unwrap().context = Some(0x0200_0000);
        assert!(matches!(
            destroy_surfaces(&mut registry, &mut device, &ids),
            Err(Error::SurfaceBusy(id)) if id == ids[1]
        ));
        assert_eq!(registry.surfaces.len(), 2);
        registry.surface_mut(ids[1]).unwrap().context = None;
        destroy_surfaces(&mut registry, &mut device, &ids).unwrap();
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn repeated_ids_destroy_nothing() {
        let mut registry = Registry::new(4).unwrap();
        let mut device = FakeDevice::new();
        let ids =
            create_surfaces(&mut registry, &mut device, 64, 64, VA_RT_FORMAT_YUV420, 2).unwrap();
        assert!(matches!(
            destroy_surfaces(&mut registry, &mut device, &[ids[0], ids[1], ids[0]]),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(registry.surfaces.len(), 2);
        assert_eq!(device.count(FakeObjectKind::VideoSurface), 2);
    }

    #[test]
    fn destroy_releases_shared_mixer() {
        let mut registry = Registry::new(4).unwrap();
        let mut device = FakeDevice::new();
        let ids =
            create_surfaces(&mut registry, &mut device, 64, 64, VA_RT_FORMAT_YUV420, 2).unwrap();
        let a = mixer::ensure_for_surface(&mut registry, &mut device, ids[0], 0).unwrap();
        let b = mixer::ensure_for_surface(&mut registry, &mut device, ids[1], 0).unwrap();
        assert_eq!(a, b);
        destroy_surface(&mut registry, &mut device, ids[0]).unwrap();
        assert_eq!(registry.mixer(a).unwrap().refcount(), 1);
        destroy_surface(&mut registry, &mut device, ids[1]).unwrap();
        assert!(registry.mixers.is_empty());
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn sync_finishes_rendering() {
        let mut registry = Registry::new(4).unwrap();
        let mut device = FakeDevice::new();
        let id = create_surfaces(&mut registry, &mut device, 64, 64, VA_RT_FORMAT_YUV420, 1)
            .unwrap()[0];
        registry.surface_mut(id).unwrap().status = SurfaceStatus::Rendering;
        assert_eq!(
            query_status(&mut registry, &device, id).unwrap(),
            SurfaceStatus::Rendering
        );
        sync(&mut registry, id).unwrap();
        assert_eq!(
            query_status(&mut registry, &device, id).unwrap(),
            SurfaceStatus::Ready
        );
    }
}
