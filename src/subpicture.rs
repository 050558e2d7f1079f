// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Subpictures: RGBA overlays blended onto surfaces when they are presented.
//!
//! The pixels of a subpicture live in an image. They are copied to a device bitmap surface
//! lazily, before the subpicture is blended, whenever the image buffer changed since the last
//! copy.

use log::debug;
use log::warn;
use vdp::Device;
use vdp::RgbaFormat;

use crate::association;
use crate::association::AssociationList;
use crate::error::device_error;
use crate::error::DeviceOp;
use crate::error::Error;
use crate::error::Result;
use crate::image;
use crate::image::DeviceFormat;
use crate::image::IMAGE_FORMATS;
use crate::registry::Registry;
use crate::va::ImageFormat;
use crate::va::ImageId;
use crate::va::SubpictureId;

pub struct Subpicture {
    pub image: ImageId,
    pub bitmap: vdp::BitmapSurface,
    pub format: RgbaFormat,
    pub width: u32,
    pub height: u32,
    pub chromakey_min: u32,
    pub chromakey_max: u32,
    pub chromakey_mask: u32,
    /// Opacity applied to associations with `VA_SUBPICTURE_GLOBAL_ALPHA`, in `0.0..=1.0`.
    pub global_alpha: f32,
    /// Modification stamp of the image buffer at the last upload to `bitmap`.
    pub uploaded_stamp: u64,
    pub associations: AssociationList,
}

/// Image formats usable for subpictures and the association flags they support.
pub fn query_formats(device: &dyn Device, flags: u32) -> Result<Vec<(ImageFormat, u32)>> {
    Ok(image::query_formats(device)?
        .into_iter()
        .filter(|f| matches!(image::device_format(f.fourcc), Ok(DeviceFormat::Rgba(_))))
        .map(|f| (f, flags))
        .collect())
}

fn rgba_format(registry: &Registry, image: ImageId) -> Result<(RgbaFormat, u32, u32)> {
    let image = registry.image(image)?;
    match image::device_format(image.format.fourcc)? {
        DeviceFormat::Rgba(format) => Ok((format, image.width, image.height)),
        DeviceFormat::YCbCr { .. } => Err(Error::InvalidImageFormat(image.format.fourcc)),
    }
}

fn create_bitmap(
    device: &mut dyn Device,
    format: RgbaFormat,
    width: u32,
    height: u32,
) -> Result<vdp::BitmapSurface> {
    device
        .bitmap_surface_create(format, width, height, true)
        .map_err(device_error(DeviceOp::BitmapSurfaceCreate))
}

fn destroy_bitmap(device: &mut dyn Device, bitmap: vdp::BitmapSurface) {
    if let Err(e) = device.bitmap_surface_destroy(bitmap) {
        warn!("failed to destroy bitmap surface: {}", e);
    }
}

/// Creates a subpicture showing `image`, which must be in an RGBA format.
pub fn create(
    registry: &mut Registry,
    device: &mut dyn Device,
    image: ImageId,
) -> Result<SubpictureId> {
    let (format, width, height) = rgba_format(registry, image)?;
    let bitmap = create_bitmap(device, format, width, height)?;
    let subpicture = Subpicture {
        image,
        bitmap,
        format,
        width,
        height,
        chromakey_min: 0,
        chromakey_max: 0,
        chromakey_mask: 0,
        global_alpha: 1.0,
        uploaded_stamp: 0,
        associations: Vec::new(),
    };
    match registry.subpictures.allocate(subpicture) {
        Ok(id) => {
            debug!("subpicture {:#010x}: {}x{} {:?}", id, width, height, format);
            Ok(id)
        }
        Err(e) => {
            destroy_bitmap(device, bitmap);
            Err(e.into())
        }
    }
}

/// Destroys a subpicture after detaching it from every surface.
pub fn destroy(registry: &mut Registry, device: &mut dyn Device, id: SubpictureId) -> Result<()> {
    association::deassociate_all(registry, id)?;
    let subpicture = registry.subpictures.free(id)?;
    destroy_bitmap(device, subpicture.bitmap);
    Ok(())
}

/// Switches a subpicture to another image, reallocating the bitmap if the image differs in size
/// or format.
pub fn set_image(
    registry: &mut Registry,
    device: &mut dyn Device,
    id: SubpictureId,
    image: ImageId,
) -> Result<()> {
    let (format, width, height) = rgba_format(registry, image)?;
    let subpicture = registry.subpicture(id)?;
    let reuse = (subpicture.format, subpicture.width, subpicture.height) == (format, width, height);
    let bitmap = if reuse {
        subpicture.bitmap
    } else {
        create_bitmap(device, format, width, height)?
    };

    let subpicture = registry.subpicture_mut(id)?;
    if !reuse {
        destroy_bitmap(device, subpicture.bitmap);
        subpicture.bitmap = bitmap;
        subpicture.format = format;
        subpicture.width = width;
        subpicture.height = height;
    }
    subpicture.image = image;
    subpicture.uploaded_stamp = 0;
    Ok(())
}

pub fn set_chromakey(
    registry: &mut Registry,
    id: SubpictureId,
    min: u32,
    max: u32,
    mask: u32,
) -> Result<()> {
    let subpicture = registry.subpicture_mut(id)?;
    subpicture.chromakey_min = min;
    subpicture.chromakey_max = max;
    subpicture.chromakey_mask = mask;
    Ok(())
}

pub fn set_global_alpha(registry: &mut Registry, id: SubpictureId, alpha: f32) -> Result<()> {
    let alpha = if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) };
    registry.subpicture_mut(id)?.global_alpha = alpha;
    Ok(())
}

/// Copies the image of a subpicture to its bitmap if the image changed since the last copy.
pub fn upload(registry: &mut Registry, device: &mut dyn Device, id: SubpictureId) -> Result<()> {
    let subpicture = registry.subpicture(id)?;
    let (bitmap, uploaded_stamp) = (subpicture.bitmap, subpicture.uploaded_stamp);
    let image = registry.image(subpicture.image)?;
    let pitch = image.pitches[0];
    let buffer = registry.buffer(image.buffer)?;
    if buffer.mtime <= uploaded_stamp {
        return Ok(());
    }
    let mtime = buffer.mtime;
    let data = image::pixels(&buffer.content, image)?;
    device
        .bitmap_surface_put_bits(bitmap, data, pitch, None)
        .map_err(device_error(DeviceOp::BitmapSurfacePutBits))?;
    registry.subpicture_mut(id)?.uploaded_stamp = mtime;
    Ok(())
}
