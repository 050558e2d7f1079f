// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use remain::sorted;
use thiserror::Error as ThisError;

use crate::va::BufferId;
use crate::va::BufferType;
use crate::va::Codec;
use crate::va::ConfigId;
use crate::va::ContextId;
use crate::va::DisplayAttribType;
use crate::va::Entrypoint;
use crate::va::ImageId;
use crate::va::Profile;
use crate::va::SubpictureId;
use crate::va::SurfaceId;
use crate::va::VaStatus;

/// Device service call that failed, used to pick the status reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    BitmapSurfaceCreate,
    BitmapSurfacePutBits,
    BlockUntilIdle,
    DecoderCreate,
    DecoderQueryCapabilities,
    DecoderRender,
    DrawableGeometry,
    GenerateCscMatrix,
    GetInformation,
    MixerCreate,
    MixerRender,
    MixerSetAttributes,
    OutputSurfaceCreate,
    PresentationQueueCreate,
    PresentationQueueDisplay,
    PresentationQueueTargetCreate,
    QueryFormatSupport,
    QuerySurfaceStatus,
    RenderBitmapSurface,
    SetBackgroundColor,
    VideoSurfaceCreate,
    VideoSurfaceGetBits,
    VideoSurfacePutBits,
}

#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("display attribute {0:?} is not supported")]
    AttrNotSupported(DisplayAttribType),
    #[error("buffer {0:#010x} is already mapped")]
    BufferMapped(BufferId),
    #[error("device call {op:?} failed: {source}")]
    Device {
        op: DeviceOp,
        #[source]
        source: vdp::Error,
    },
    #[error("flags {0:#x} are not supported")]
    FlagNotSupported(u32),
    #[error("object heap failure: {0}")]
    Heap(#[from] slot_heap::Error),
    #[error("internal state is inconsistent: {0}")]
    Inconsistent(&'static str),
    #[error("invalid buffer {0:#010x}")]
    InvalidBuffer(BufferId),
    #[error("invalid config {0:#010x}")]
    InvalidConfig(ConfigId),
    #[error("invalid context {0:#010x}")]
    InvalidContext(ContextId),
    #[error("invalid image {0:#010x}")]
    InvalidImage(ImageId),
    #[error("invalid image format {0:#010x}")]
    InvalidImageFormat(u32),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("invalid subpicture {0:#010x}")]
    InvalidSubpicture(SubpictureId),
    #[error("invalid surface {0:#010x}")]
    InvalidSurface(SurfaceId),
    #[error("too many elements: {0}")]
    MaxNumExceeded(&'static str),
    #[error("no picture parameter buffer for the current picture")]
    MissingPictureParameter,
    #[error("subpicture {subpicture:#010x} is not associated with surface {surface:#010x}")]
    NotAssociated {
        subpicture: SubpictureId,
        surface: SurfaceId,
    },
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
    #[error("resolution {width}x{height} is not supported")]
    ResolutionNotSupported { width: u32, height: u32 },
    #[error("surface {0:#010x} is in use")]
    SurfaceBusy(SurfaceId),
    #[error("driver was terminated")]
    Terminated,
    #[error("buffer type {buffer_type:?} is not supported for {codec:?}")]
    UnsupportedBufferType {
        buffer_type: BufferType,
        codec: Codec,
    },
    #[error("entrypoint {0:?} is not supported")]
    UnsupportedEntrypoint(Entrypoint),
    #[error("profile {0:?} is not supported")]
    UnsupportedProfile(Profile),
    #[error("render target format {0:#x} is not supported")]
    UnsupportedRtFormat(u32),
}

impl Error {
    /// Status reported to the host for this error.
    pub fn status(&self) -> VaStatus {
        use self::Error::*;
        match self {
            AttrNotSupported(_) => VaStatus::AttrNotSupported,
            BufferMapped(_) => VaStatus::OperationFailed,
            Device { op, source } => device_status(*op, *source),
            FlagNotSupported(_) => VaStatus::FlagNotSupported,
            Heap(slot_heap::Error::OutOfMemory) | Heap(slot_heap::Error::OutOfSpace) => {
                VaStatus::AllocationFailed
            }
            Heap(_) => VaStatus::OperationFailed,
            Inconsistent(_) => VaStatus::OperationFailed,
            InvalidBuffer(_) => VaStatus::InvalidBuffer,
            InvalidConfig(_) => VaStatus::InvalidConfig,
            InvalidContext(_) => VaStatus::InvalidContext,
            InvalidImage(_) => VaStatus::InvalidImage,
            InvalidImageFormat(_) => VaStatus::InvalidImageFormat,
            InvalidParameter(_) => VaStatus::InvalidParameter,
            InvalidSubpicture(_) => VaStatus::InvalidSubpicture,
            InvalidSurface(_) => VaStatus::InvalidSurface,
            MaxNumExceeded(_) => VaStatus::MaxNumExceeded,
            MissingPictureParameter => VaStatus::OperationFailed,
            NotAssociated { .. } => VaStatus::OperationFailed,
            NotImplemented(_) => VaStatus::Unimplemented,
            NotSupported(_) => VaStatus::OperationFailed,
            ResolutionNotSupported { .. } => VaStatus::ResolutionNotSupported,
            SurfaceBusy(_) => VaStatus::SurfaceBusy,
            Terminated => VaStatus::InvalidDisplay,
            UnsupportedBufferType { .. } => VaStatus::UnsupportedBufferType,
            UnsupportedEntrypoint(_) => VaStatus::UnsupportedEntrypoint,
            UnsupportedProfile(_) => VaStatus::UnsupportedProfile,
            UnsupportedRtFormat(_) => VaStatus::UnsupportedRtFormat,
        }
    }
}

fn device_status(op: DeviceOp, error: vdp::Error) -> VaStatus {
    match error {
        vdp::Error::Resources => VaStatus::AllocationFailed,
        vdp::Error::Unsupported => match op {
            DeviceOp::DecoderCreate | DeviceOp::DecoderQueryCapabilities => {
                VaStatus::UnsupportedProfile
            }
            DeviceOp::VideoSurfaceCreate => VaStatus::UnsupportedRtFormat,
            DeviceOp::BitmapSurfaceCreate
            | DeviceOp::BitmapSurfacePutBits
            | DeviceOp::QueryFormatSupport
            | DeviceOp::VideoSurfaceGetBits
            | DeviceOp::VideoSurfacePutBits => VaStatus::InvalidImageFormat,
            _ => VaStatus::Unimplemented,
        },
        vdp::Error::Error | vdp::Error::InvalidHandle | vdp::Error::InvalidValue => {
            VaStatus::OperationFailed
        }
    }
}

/// Wraps a device error with the operation that produced it, for use with `map_err`.
pub fn device_error(op: DeviceOp) -> impl FnOnce(vdp::Error) -> Error {
    move |source| Error::Device { op, source }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_translate_by_operation() {
        let status = |op, source| Error::Device { op, source }.status();
        assert_eq!(
            status(DeviceOp::DecoderCreate, vdp::Error::Unsupported),
            VaStatus::UnsupportedProfile
        );
        assert_eq!(
            status(DeviceOp::VideoSurfaceCreate, vdp::Error::Unsupported),
            VaStatus::UnsupportedRtFormat
        );
        assert_eq!(
            status(DeviceOp::VideoSurfaceGetBits, vdp::Error::Unsupported),
            VaStatus::InvalidImageFormat
        );
        assert_eq!(
            status(DeviceOp::MixerRender, vdp::Error::Unsupported),
            VaStatus::Unimplemented
        );
        assert_eq!(
            status(DeviceOp::OutputSurfaceCreate, vdp::Error::Resources),
            VaStatus::AllocationFailed
        );
        assert_eq!(
            status(DeviceOp::PresentationQueueDisplay, vdp::Error::Error),
            VaStatus::OperationFailed
        );
    }

    #[test]
    fn heap_exhaustion_is_an_allocation_failure() {
        assert_eq!(
            Error::from(slot_heap::Error::OutOfMemory).status(),
            VaStatus::AllocationFailed
        );
        assert_eq!(
            Error::from(slot_heap::Error::DoubleFree(1)).status(),
            VaStatus::OperationFailed
        );
    }
}
