// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

use enumn::N;
use remain::sorted;
use thiserror::Error as ThisError;

/// Raw status code returned by every device service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, N)]
#[repr(u32)]
pub enum Status {
    Ok = 0,
    InvalidHandle = 1,
    InvalidValue = 2,
    Resources = 3,
    Unsupported = 4,
    Error = 5,
}

impl Status {
    /// Decodes a raw status value. Values outside of the known set are reported as `Error`.
    pub fn from_raw(raw: u32) -> Status {
        Status::n(raw).unwrap_or(Status::Error)
    }

    /// Returns `Ok(())` if this status is successful, and an error otherwise.
    pub fn check(self) -> Result<()> {
        match self {
            Status::Ok => Ok(()),
            Status::InvalidHandle => Err(Error::InvalidHandle),
            Status::InvalidValue => Err(Error::InvalidValue),
            Status::Resources => Err(Error::Resources),
            Status::Unsupported => Err(Error::Unsupported),
            Status::Error => Err(Error::Error),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Status::*;
        match self {
            Ok => write!(f, "ok"),
            InvalidHandle => write!(f, "invalid handle"),
            InvalidValue => write!(f, "invalid value"),
            Resources => write!(f, "resources exhausted"),
            Unsupported => write!(f, "unsupported"),
            Error => write!(f, "unknown error"),
        }
    }
}

/// A failed device service call.
#[sorted]
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("device error")]
    Error,
    #[error("invalid device handle")]
    InvalidHandle,
    #[error("invalid value")]
    InvalidValue,
    #[error("device resources exhausted")]
    Resources,
    #[error("unsupported by the device")]
    Unsupported,
}

impl From<Error> for Status {
    fn from(e: Error) -> Status {
        match e {
            Error::Error => Status::Error,
            Error::InvalidHandle => Status::InvalidHandle,
            Error::InvalidValue => Status::InvalidValue,
            Error::Resources => Status::Resources,
            Error::Unsupported => Status::Unsupported,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
