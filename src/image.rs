// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Images: host visible pixel buffers that surfaces are read into and written from.

use log::debug;
use vdp::ChromaType;
use vdp::Device;
use vdp::PixelFormat;
use vdp::RgbaFormat;
use vdp::SurfaceKind;
use vdp::YCbCrFormat;

use crate::buffer;
use crate::error::device_error;
use crate::error::DeviceOp;
use crate::error::Error;
use crate::error::Result;
use crate::registry::Registry;
use crate::va::BufferContent;
use crate::va::BufferId;
use crate::va::BufferType;
use crate::va::ImageFormat;
use crate::va::ImageId;
use crate::va::SurfaceId;
use crate::va::VaImage;
use crate::va::VaRect;
use crate::va::VA_FOURCC_BGRA;
use crate::va::VA_FOURCC_I420;
use crate::va::VA_FOURCC_NV12;
use crate::va::VA_FOURCC_RGBA;
use crate::va::VA_FOURCC_UYVY;
use crate::va::VA_FOURCC_YUY2;
use crate::va::VA_FOURCC_YV12;

/// Every image format the driver knows, in order of preference.
pub const IMAGE_FORMATS: [ImageFormat; 7] = [
    ImageFormat::yuv(VA_FOURCC_NV12, 12),
    ImageFormat::yuv(VA_FOURCC_YV12, 12),
    ImageFormat::yuv(VA_FOURCC_I420, 12),
    ImageFormat::yuv(VA_FOURCC_UYVY, 16),
    ImageFormat::yuv(VA_FOURCC_YUY2, 16),
    ImageFormat::rgb(VA_FOURCC_BGRA, 0x00ff_0000, 0x0000_ff00, 0x0000_00ff),
    ImageFormat::rgb(VA_FOURCC_RGBA, 0x0000_00ff, 0x0000_ff00, 0x00ff_0000),
];

/// How an image format maps onto the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFormat {
    /// Video surface format; `swap_uv` when the image stores U before V.
    YCbCr {
        format: YCbCrFormat,
        swap_uv: bool,
    },
    Rgba(RgbaFormat),
}

pub fn device_format(fourcc: u32) -> Result<DeviceFormat> {
    let yuv = |format, swap_uv| DeviceFormat::YCbCr { format, swap_uv };
    Ok(match fourcc {
        VA_FOURCC_NV12 => yuv(YCbCrFormat::Nv12, false),
        VA_FOURCC_YV12 => yuv(YCbCrFormat::Yv12, false),
        VA_FOURCC_I420 => yuv(YCbCrFormat::Yv12, true),
        VA_FOURCC_UYVY => yuv(YCbCrFormat::Uyvy, false),
        VA_FOURCC_YUY2 => yuv(YCbCrFormat::Yuyv, false),
        VA_FOURCC_BGRA => DeviceFormat::Rgba(RgbaFormat::B8G8R8A8),
        VA_FOURCC_RGBA => DeviceFormat::Rgba(RgbaFormat::R8G8B8A8),
        _ => return Err(Error::InvalidImageFormat(fourcc)),
    })
}

/// Image formats the device can transfer.
pub fn query_formats(device: &dyn Device) -> Result<Vec<ImageFormat>> {
    let mut formats = Vec::with_capacity(IMAGE_FORMATS.len());
    for format in IMAGE_FORMATS {
        let (kind, pixel_format) = match device_format(format.fourcc)? {
            DeviceFormat::YCbCr { format, .. } => (
                SurfaceKind::Video(format.chroma_type()),
                PixelFormat::YCbCr(format),
            ),
            DeviceFormat::Rgba(format) => (SurfaceKind::Bitmap, PixelFormat::Rgba(format)),
        };
        let supported = device
            .query_format_support(kind, pixel_format)
            .map_err(device_error(DeviceOp::QueryFormatSupport))?;
        if supported {
            formats.push(format);
        }
    }
    Ok(formats)
}

#[derive(Clone)]
pub struct Image {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Buffer holding the pixels.
    pub buffer: BufferId,
    pub data_size: u32,
    pub num_planes: u32,
    pub pitches: [u32; 3],
    pub offsets: [u32; 3],
}

impl Image {
    fn describe(&self, id: ImageId) -> VaImage {
        VaImage {
            image_id: id,
            format: self.format,
            buf: self.buffer,
            width: self.width as u16,
            height: self.height as u16,
            data_size: self.data_size,
            num_planes: self.num_planes,
            pitches: self.pitches,
            offsets: self.offsets,
        }
    }

    /// Byte ranges of the planes, in storage order.
    fn plane_ranges(&self) -> Vec<(usize, usize)> {
        (0..self.num_planes as usize)
            .map(|i| {
                let end = if i + 1 < self.num_planes as usize {
                    self.offsets[i + 1]
                } else {
                    self.data_size
                };
                (self.offsets[i] as usize, end as usize)
            })
            .collect()
    }
}

/// Computes the plane layout of a `width`x`height` image.
///
/// Fails if the image does not fit in a buffer addressable with 32-bit offsets.
fn layout(format: ImageFormat, width: u32, height: u32) -> Result<Image> {
    let (w, h) = (u64::from(width), u64::from(height));
    let (w2, h2) = ((w + 1) / 2, (h + 1) / 2);
    let luma = w * h;
    let (num_planes, pitches, offsets, data_size) = match format.fourcc {
        VA_FOURCC_NV12 => (2, [w, w2 * 2, 0], [0, luma, 0], luma + w2 * 2 * h2),
        VA_FOURCC_YV12 | VA_FOURCC_I420 => {
            let chroma = w2 * h2;
            (3, [w, w2, w2], [0, luma, luma + chroma], luma + 2 * chroma)
        }
        VA_FOURCC_UYVY | VA_FOURCC_YUY2 => (1, [w2 * 4, 0, 0], [0; 3], w2 * 4 * h),
        _ => (1, [w * 4, 0, 0], [0; 3], w * 4 * h),
    };
    let narrow = |v: u64| u32::try_from(v).map_err(|_| Error::InvalidParameter("image size"));
    Ok(Image {
        format,
        width,
        height,
        buffer: 0,
        data_size: narrow(data_size)?,
        num_planes,
        pitches: [narrow(pitches[0])?, narrow(pitches[1])?, narrow(pitches[2])?],
        offsets: [narrow(offsets[0])?, narrow(offsets[1])?, narrow(offsets[2])?],
    })
}

/// Creates an image and the buffer backing it.
pub fn create(
    registry: &mut Registry,
    format: &ImageFormat,
    width: u32,
    height: u32,
) -> Result<VaImage> {
    let known = IMAGE_FORMATS
        .iter()
        .find(|f| f.fourcc == format.fourcc)
        .ok_or(Error::InvalidImageFormat(format.fourcc))?;
    if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(Error::InvalidParameter("image size"));
    }
    let mut image = layout(*known, width, height)?;
    image.buffer = buffer::create(
        registry,
        None,
        BufferType::Image,
        image.data_size,
        1,
        None,
    )?;
    let buffer_id = image.buffer;
    let data_size = image.data_size;
    match registry.images.allocate(image) {
        Ok(id) => {
            debug!(
                "image {:#010x}: {}x{} fourcc {:#010x}, {} bytes",
                id, width, height, format.fourcc, data_size
            );
            Ok(registry.image(id)?.describe(id))
        }
        Err(e) => {
            registry.buffers.free(buffer_id)?;
            Err(e.into())
        }
    }
}

/// Describes an existing image.
pub fn describe(registry: &Registry, id: ImageId) -> Result<VaImage> {
    Ok(registry.image(id)?.describe(id))
}

/// Destroys an image and its buffer.
pub fn destroy(registry: &mut Registry, id: ImageId) -> Result<()> {
    registry.image(id)?;
    if registry.subpictures.iter().any(|(_, s)| s.image == id) {
        return Err(Error::NotSupported("destroying an image bound to a subpicture"));
    }
    let image = registry.images.free(id)?;
    registry.buffers.free(image.buffer)?;
    Ok(())
}

/// Images backed by the surface memory are not supported.
pub fn derive(registry: &Registry, surface: SurfaceId) -> Result<VaImage> {
    registry.surface(surface)?;
    Err(Error::NotSupported("deriving images from surfaces"))
}

pub fn set_palette(registry: &Registry, id: ImageId, _palette: &[u8]) -> Result<()> {
    registry.image(id)?;
    Err(Error::NotImplemented("image palettes"))
}

/// Pixel data of `image`.
///
/// The host may replace the content of a mapped buffer, so the length is checked against the
/// image layout before the planes are addressed.
pub fn pixels<'a>(content: &'a BufferContent, image: &Image) -> Result<&'a [u8]> {
    match content {
        BufferContent::Bytes(data) => data
            .get(..image.data_size as usize)
            .ok_or(Error::InvalidParameter("image buffer smaller than the image")),
        _ => Err(Error::Inconsistent("image buffer without pixel data")),
    }
}

fn pixels_mut<'a>(content: &'a mut BufferContent, image: &Image) -> Result<&'a mut [u8]> {
    match content {
        BufferContent::Bytes(data) => data
            .get_mut(..image.data_size as usize)
            .ok_or(Error::InvalidParameter("image buffer smaller than the image")),
        _ => Err(Error::Inconsistent("image buffer without pixel data")),
    }
}

/// Looks up a video transfer for `image` on a surface of `chroma`.
fn video_transfer(image: &Image, chroma: ChromaType) -> Result<(YCbCrFormat, bool)> {
    match device_format(image.format.fourcc)? {
        DeviceFormat::YCbCr { format, swap_uv } if format.chroma_type() == chroma => {
            Ok((format, swap_uv))
        }
        _ => Err(Error::InvalidImageFormat(image.format.fourcc)),
    }
}

/// Splits `data` into the planes of `image`, in the order the device expects them.
fn split_planes<'a>(data: &'a mut [u8], image: &Image, swap_uv: bool) -> Vec<&'a mut [u8]> {
    let mut planes = Vec::with_capacity(3);
    let mut rest = data;
    let mut consumed = 0;
    for (start, end) in image.plane_ranges() {
        let tail = std::mem::take(&mut rest);
        let (_, tail) = tail.split_at_mut(start - consumed);
        let (plane, tail) = tail.split_at_mut(end - start);
        planes.push(plane);
        rest = tail;
        consumed = end;
    }
    if swap_uv && planes.len() == 3 {
        planes.swap(1, 2);
    }
    planes
}

fn device_pitches(image: &Image, swap_uv: bool) -> Vec<u32> {
    let mut pitches = image.pitches[..image.num_planes as usize].to_vec();
    if swap_uv && pitches.len() == 3 {
        pitches.swap(1, 2);
    }
    pitches
}

fn check_full_frame(rect: &VaRect, width: u32, height: u32) -> Result<()> {
    if *rect != VaRect::new(0, 0, width, height) {
        return Err(Error::InvalidParameter("only full frame transfers are supported"));
    }
    Ok(())
}

/// Reads the whole of `surface` into `image`.
pub fn get_image(
    registry: &mut Registry,
    device: &mut dyn Device,
    surface: SurfaceId,
    rect: VaRect,
    image_id: ImageId,
) -> Result<()> {
    let s = registry.surface(surface)?;
    let (device_surface, chroma, width, height) = (s.device_surface, s.chroma, s.width, s.height);
    check_full_frame(&rect, width, height)?;
    let image = registry.image(image_id)?.clone();
    if (image.width, image.height) != (width, height) {
        return Err(Error::InvalidParameter("image and surface sizes differ"));
    }
    let (format, swap_uv) = video_transfer(&image, chroma)?;

    let pitches = device_pitches(&image, swap_uv);
    let data = pixels_mut(&mut registry.buffer_mut(image.buffer)?.content, &image)?;
    let mut planes = split_planes(data, &image, swap_uv);
    device
        .video_surface_get_bits(device_surface, format, &mut planes, &pitches)
        .map_err(device_error(DeviceOp::VideoSurfaceGetBits))?;
    let mtime = registry.tick();
    registry.buffer_mut(image.buffer)?.mtime = mtime;
    Ok(())
}

/// Writes the whole of `image` into `surface`.
pub fn put_image(
    registry: &mut Registry,
    device: &mut dyn Device,
    surface: SurfaceId,
    image_id: ImageId,
    src_rect: VaRect,
    dst_rect: VaRect,
) -> Result<()> {
    let s = registry.surface(surface)?;
    let (device_surface, chroma, width, height) = (s.device_surface, s.chroma, s.width, s.height);
    let image = registry.image(image_id)?.clone();
    check_full_frame(&src_rect, image.width, image.height)?;
    check_full_frame(&dst_rect, width, height)?;
    if (image.width, image.height) != (width, height) {
        return Err(Error::InvalidParameter("scaling image uploads is not supported"));
    }
    let (format, swap_uv) = video_transfer(&image, chroma)?;

    let pitches = device_pitches(&image, swap_uv);
    let data = pixels_mut(&mut registry.buffer_mut(image.buffer)?.content, &image)?;
    let planes = split_planes(data, &image, swap_uv);
    let planes: Vec<&[u8]> = planes.into_iter().map(|p| p as &[u8]).collect();
    device
        .video_surface_put_bits(device_surface, format, &planes, &pitches)
        .map_err(device_error(DeviceOp::VideoSurfacePutBits))
}
