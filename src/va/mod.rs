// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Types of the host video acceleration API.
//!
//! Numeric values (status codes, profiles, entrypoints, flags and fourccs) are those of the
//! host framework so that they can be passed through its call table unchanged.

mod params;

use std::fmt;

use enumn::N;

pub use self::params::*;

pub type ConfigId = u32;
pub type ContextId = u32;
pub type SurfaceId = u32;
pub type BufferId = u32;
pub type ImageId = u32;
pub type SubpictureId = u32;

/// Id no object ever has.
pub const VA_INVALID_ID: u32 = 0xffff_ffff;
pub const VA_INVALID_SURFACE: SurfaceId = VA_INVALID_ID;

/// Status returned by every entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, N)]
#[repr(u32)]
pub enum VaStatus {
    Success = 0x0000_0000,
    OperationFailed = 0x0000_0001,
    AllocationFailed = 0x0000_0002,
    InvalidDisplay = 0x0000_0003,
    InvalidConfig = 0x0000_0004,
    InvalidContext = 0x0000_0005,
    InvalidSurface = 0x0000_0006,
    InvalidBuffer = 0x0000_0007,
    InvalidImage = 0x0000_0008,
    InvalidSubpicture = 0x0000_0009,
    AttrNotSupported = 0x0000_000a,
    MaxNumExceeded = 0x0000_000b,
    UnsupportedProfile = 0x0000_000c,
    UnsupportedEntrypoint = 0x0000_000d,
    UnsupportedRtFormat = 0x0000_000e,
    UnsupportedBufferType = 0x0000_000f,
    SurfaceBusy = 0x0000_0010,
    FlagNotSupported = 0x0000_0011,
    InvalidParameter = 0x0000_0012,
    ResolutionNotSupported = 0x0000_0013,
    Unimplemented = 0x0000_0014,
    SurfaceInDisplaying = 0x0000_0015,
    InvalidImageFormat = 0x0000_0016,
    DecodingError = 0x0000_0017,
    InvalidValue = 0x0000_0019,
    Unknown = 0xffff_ffff,
}

impl VaStatus {
    pub fn from_raw(raw: u32) -> VaStatus {
        VaStatus::n(raw).unwrap_or(VaStatus::Unknown)
    }

    pub fn is_success(self) -> bool {
        self == VaStatus::Success
    }
}

impl fmt::Display for VaStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::VaStatus::*;
        let s = match self {
            Success => "success (no error)",
            OperationFailed => "operation failed",
            AllocationFailed => "resource allocation failed",
            InvalidDisplay => "invalid VADisplay",
            InvalidConfig => "invalid VAConfigID",
            InvalidContext => "invalid VAContextID",
            InvalidSurface => "invalid VASurfaceID",
            InvalidBuffer => "invalid VABufferID",
            InvalidImage => "invalid VAImageID",
            InvalidSubpicture => "invalid VASubpictureID",
            AttrNotSupported => "attribute not supported",
            MaxNumExceeded => "list argument exceeds maximum number",
            UnsupportedProfile => "the requested VAProfile is not supported",
            UnsupportedEntrypoint => "the requested VAEntryPoint is not supported",
            UnsupportedRtFormat => "the requested RT Format is not supported",
            UnsupportedBufferType => "the requested VABufferType is not supported",
            SurfaceBusy => "surface is in use",
            FlagNotSupported => "flag not supported",
            InvalidParameter => "invalid parameter",
            ResolutionNotSupported => "resolution not supported",
            Unimplemented => "the requested function is not implemented",
            SurfaceInDisplaying => "surface is in displaying (may by overlay)",
            InvalidImageFormat => "invalid VAImageFormat",
            DecodingError => "internal decoding error",
            InvalidValue => "an invalid/unsupported value was supplied",
            Unknown => "unknown libva error",
        };
        write!(f, "{}", s)
    }
}

/// Result of an entry point: the value produced, or the status reported to the host.
pub type VaResult<T> = std::result::Result<T, VaStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, N)]
#[repr(i32)]
pub enum Profile {
    None = -1,
    Mpeg2Simple = 0,
    Mpeg2Main = 1,
    Mpeg4Simple = 2,
    Mpeg4AdvancedSimple = 3,
    Mpeg4Main = 4,
    H264Baseline = 5,
    H264Main = 6,
    H264High = 7,
    Vc1Simple = 8,
    Vc1Main = 9,
    Vc1Advanced = 10,
    H263Baseline = 11,
    JpegBaseline = 12,
    H264ConstrainedBaseline = 13,
}

/// Coding standard of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Mpeg2,
    Mpeg4,
    H264,
    Vc1,
}

impl Profile {
    /// All profiles, in the order they are reported to the host.
    pub const ALL: [Profile; 14] = [
        Profile::Mpeg2Simple,
        Profile::Mpeg2Main,
        Profile::Mpeg4Simple,
        Profile::Mpeg4AdvancedSimple,
        Profile::Mpeg4Main,
        Profile::H264Baseline,
        Profile::H264ConstrainedBaseline,
        Profile::H264Main,
        Profile::H264High,
        Profile::Vc1Simple,
        Profile::Vc1Main,
        Profile::Vc1Advanced,
        Profile::H263Baseline,
        Profile::JpegBaseline,
    ];

    pub fn codec(self) -> Option<Codec> {
        match self {
            Profile::Mpeg2Simple | Profile::Mpeg2Main => Some(Codec::Mpeg2),
            Profile::Mpeg4Simple | Profile::Mpeg4AdvancedSimple | Profile::Mpeg4Main => {
                Some(Codec::Mpeg4)
            }
            Profile::H264Baseline
            | Profile::H264ConstrainedBaseline
            | Profile::H264Main
            | Profile::H264High => Some(Codec::H264),
            Profile::Vc1Simple | Profile::Vc1Main | Profile::Vc1Advanced => Some(Codec::Vc1),
            Profile::None | Profile::H263Baseline | Profile::JpegBaseline => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, N)]
#[repr(u32)]
pub enum Entrypoint {
    Vld = 1,
    Izz = 2,
    Idct = 3,
    MoComp = 4,
    Deblocking = 5,
    EncSlice = 6,
    EncPicture = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, N)]
#[repr(u32)]
pub enum ConfigAttribType {
    RtFormat = 0,
    SpatialResidual = 1,
    SpatialClipping = 2,
    IntraResidual = 3,
    Encryption = 4,
    RateControl = 5,
}

/// Value reported for attributes the driver does not know about.
pub const VA_ATTRIB_NOT_SUPPORTED: u32 = 0x8000_0000;

pub const VA_RT_FORMAT_YUV420: u32 = 0x0000_0001;
pub const VA_RT_FORMAT_YUV422: u32 = 0x0000_0002;
pub const VA_RT_FORMAT_YUV444: u32 = 0x0000_0004;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigAttrib {
    pub attrib_type: ConfigAttribType,
    pub value: u32,
}

/// Flag of `create_context` requesting progressive pictures only.
pub const VA_PROGRESSIVE: u32 = 0x1;

// Flags of `put_surface`.
pub const VA_FRAME_PICTURE: u32 = 0x0000_0000;
pub const VA_TOP_FIELD: u32 = 0x0000_0001;
pub const VA_BOTTOM_FIELD: u32 = 0x0000_0002;
pub const VA_CLEAR_DRAWABLE: u32 = 0x0000_0008;
pub const VA_SRC_BT601: u32 = 0x0000_0010;
pub const VA_SRC_BT709: u32 = 0x0000_0020;
pub const VA_SRC_SMPTE_240: u32 = 0x0000_0040;

// Flags of subpicture formats and associations.
pub const VA_SUBPICTURE_CHROMA_KEYING: u32 = 0x0001;
pub const VA_SUBPICTURE_GLOBAL_ALPHA: u32 = 0x0002;
pub const VA_SUBPICTURE_DESTINATION_IS_SCREEN_COORD: u32 = 0x0004;

#[derive(Debug, Clone, Copy, PartialEq, Eq, N)]
#[repr(u32)]
pub enum SurfaceStatus {
    Rendering = 1,
    Displaying = 2,
    Ready = 4,
    Skipped = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, N)]
#[repr(u32)]
pub enum BufferType {
    PictureParameter = 0,
    IqMatrix = 1,
    BitPlane = 2,
    SliceGroupMap = 3,
    SliceParameter = 4,
    SliceData = 5,
    MacroblockParameter = 6,
    ResidualData = 7,
    DeblockingParameter = 8,
    Image = 9,
}

/// A rectangle in surface or drawable coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VaRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl VaRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> VaRect {
        VaRect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Overlapping part of two rectangles, or `None` if they do not overlap.
    pub fn intersect(&self, other: &VaRect) -> Option<VaRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 as i64 || y1 <= y0 as i64 {
            return None;
        }
        Some(VaRect {
            x: x0,
            y: y0,
            width: (x1 - x0 as i64) as u32,
            height: (y1 - y0 as i64) as u32,
        })
    }

    /// Converts to a device rectangle. Parts at negative coordinates are cut off.
    pub fn to_device(&self) -> vdp::Rect {
        let clamp = |v: i64| v.clamp(0, u32::MAX as i64) as u32;
        vdp::Rect::new(
            clamp(self.x as i64),
            clamp(self.y as i64),
            clamp(self.right()),
            clamp(self.bottom()),
        )
    }
}

pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24
}

pub const VA_FOURCC_NV12: u32 = fourcc(b"NV12");
pub const VA_FOURCC_YV12: u32 = fourcc(b"YV12");
pub const VA_FOURCC_I420: u32 = fourcc(b"I420");
pub const VA_FOURCC_UYVY: u32 = fourcc(b"UYVY");
pub const VA_FOURCC_YUY2: u32 = fourcc(b"YUY2");
pub const VA_FOURCC_BGRA: u32 = fourcc(b"BGRA");
pub const VA_FOURCC_RGBA: u32 = fourcc(b"RGBA");

pub const VA_LSB_FIRST: u32 = 1;
pub const VA_MSB_FIRST: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageFormat {
    pub fourcc: u32,
    pub byte_order: u32,
    pub bits_per_pixel: u32,
    pub depth: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub alpha_mask: u32,
}

impl ImageFormat {
    pub const fn yuv(fourcc: u32, bits_per_pixel: u32) -> ImageFormat {
        ImageFormat {
            fourcc,
            byte_order: VA_LSB_FIRST,
            bits_per_pixel,
            depth: 0,
            red_mask: 0,
            green_mask: 0,
            blue_mask: 0,
            alpha_mask: 0,
        }
    }

    pub const fn rgb(fourcc: u32, red_mask: u32, green_mask: u32, blue_mask: u32) -> ImageFormat {
        ImageFormat {
            fourcc,
            byte_order: VA_LSB_FIRST,
            bits_per_pixel: 32,
            depth: 32,
            red_mask,
            green_mask,
            blue_mask,
            alpha_mask: 0xff00_0000,
        }
    }
}

/// Description of an image handed back to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VaImage {
    pub image_id: ImageId,
    pub format: ImageFormat,
    /// Buffer holding the pixels.
    pub buf: BufferId,
    pub width: u16,
    pub height: u16,
    pub data_size: u32,
    pub num_planes: u32,
    pub pitches: [u32; 3],
    pub offsets: [u32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, N)]
#[repr(u32)]
pub enum DisplayAttribType {
    Brightness = 0,
    Contrast = 1,
    Hue = 2,
    Saturation = 3,
    BackgroundColor = 4,
    DirectSurface = 5,
}

pub const VA_DISPLAY_ATTRIB_NOT_SUPPORTED: u32 = 0x0000;
pub const VA_DISPLAY_ATTRIB_GETTABLE: u32 = 0x0001;
pub const VA_DISPLAY_ATTRIB_SETTABLE: u32 = 0x0002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAttribute {
    pub attrib_type: DisplayAttribType,
    pub min_value: i32,
    pub max_value: i32,
    pub value: i32,
    pub flags: u32,
}

/// Properties of the driver reported at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub version_major: u32,
    pub version_minor: u32,
    pub vendor: String,
    pub max_profiles: usize,
    pub max_entrypoints: usize,
    pub max_attributes: usize,
    pub max_image_formats: usize,
    pub max_subpicture_formats: usize,
    pub max_display_attributes: usize,
}
