// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A VA-API driver decoding and presenting video through a VDPAU-style device.
//!
//! The host opens a [`Driver`] on top of a [`vdp::Device`] and a [`vdp::DrawableService`], and
//! from then on addresses configs, contexts, surfaces, buffers, images and subpictures by
//! 32-bit handles. Every object lives in the [`registry::Registry`], one slot heap per kind,
//! and the kind of a handle can be told from its top bits.
//!
//! Decoded surfaces are shown through per-drawable outputs that composite with a shared video
//! mixer into a small ring of presentation buffers and queue them on the device.

pub mod association;
pub mod attributes;
pub mod buffer;
pub mod config;
pub mod decode;
mod driver;
pub mod error;
pub mod image;
pub mod mixer;
pub mod output;
pub mod registry;
pub mod subpicture;
pub mod surface;
pub mod syslog;
pub mod va;

pub use config::DriverConfig;
pub use driver::Driver;
pub use driver::VA_VERSION_MAJOR;
pub use driver::VA_VERSION_MINOR;
pub use error::Error;
pub use error::Result;
pub use va::VaResult;
pub use va::VaStatus;
