// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Display attributes (procamp and background colour).
//!
//! Every attribute carries the stamp of its last change. Mixers remember the newest stamp they
//! have applied and only update device state for attributes changed since.

use std::f32::consts::PI;

use vdp::Color;
use vdp::Procamp;

use crate::error::Error;
use crate::error::Result;
use crate::va::DisplayAttribType;
use crate::va::DisplayAttribute;
use crate::va::VA_DISPLAY_ATTRIB_GETTABLE;
use crate::va::VA_DISPLAY_ATTRIB_SETTABLE;

#[derive(Debug, Clone, Copy)]
struct Entry {
    attribute: DisplayAttribute,
    mtime: u64,
}

pub struct DisplayAttributes {
    entries: Vec<Entry>,
}

const PROCAMP: [DisplayAttribType; 4] = [
    DisplayAttribType::Brightness,
    DisplayAttribType::Contrast,
    DisplayAttribType::Saturation,
    DisplayAttribType::Hue,
];

fn attribute(attrib_type: DisplayAttribType, min: i32, max: i32, value: i32) -> Entry {
    Entry {
        attribute: DisplayAttribute {
            attrib_type,
            min_value: min,
            max_value: max,
            value,
            flags: VA_DISPLAY_ATTRIB_GETTABLE | VA_DISPLAY_ATTRIB_SETTABLE,
        },
        mtime: 0,
    }
}

impl Default for DisplayAttributes {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayAttributes {
    pub fn new() -> DisplayAttributes {
        DisplayAttributes {
            entries: vec![
                attribute(DisplayAttribType::Brightness, -100, 100, 0),
                attribute(DisplayAttribType::Contrast, 0, 100, 50),
                attribute(DisplayAttribType::Hue, -180, 180, 0),
                attribute(DisplayAttribType::Saturation, 0, 100, 50),
                attribute(
                    DisplayAttribType::BackgroundColor,
                    0,
                    0x00ff_ffff,
                    0xff00_0000u32 as i32,
                ),
            ],
        }
    }

    /// Descriptions of all supported attributes.
    pub fn query(&self) -> Vec<DisplayAttribute> {
        self.entries.iter().map(|e| e.attribute).collect()
    }

    fn entry(&self, attrib_type: DisplayAttribType) -> Result<&Entry> {
        self.entries
            .iter()
            .find(|e| e.attribute.attrib_type == attrib_type)
            .ok_or(Error::AttrNotSupported(attrib_type))
    }

    pub fn get(&self, attrib_type: DisplayAttribType) -> Result<i32> {
        Ok(self.entry(attrib_type)?.attribute.value)
    }

    /// Sets an attribute, clamped to its range, and stamps it with `mtime`.
    pub fn set(&mut self, attrib_type: DisplayAttribType, value: i32, mtime: u64) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.attribute.attrib_type == attrib_type)
            .ok_or(Error::AttrNotSupported(attrib_type))?;
        let value = if attrib_type == DisplayAttribType::BackgroundColor {
            // 0x00RRGGBB, kept opaque.
            ((value as u32 & 0x00ff_ffff) | 0xff00_0000) as i32
        } else {
            value.clamp(entry.attribute.min_value, entry.attribute.max_value)
        };
        entry.attribute.value = value;
        entry.mtime = mtime;
        Ok(())
    }

    fn mtime(&self, attrib_type: DisplayAttribType) -> u64 {
        self.entry(attrib_type).map(|e| e.mtime).unwrap_or(0)
    }

    fn value(&self, attrib_type: DisplayAttribType) -> i32 {
        self.entry(attrib_type).map(|e| e.attribute.value).unwrap_or(0)
    }

    /// Newest change among the procamp attributes.
    pub fn procamp_mtime(&self) -> u64 {
        PROCAMP.iter().map(|&t| self.mtime(t)).max().unwrap_or(0)
    }

    pub fn background_mtime(&self) -> u64 {
        self.mtime(DisplayAttribType::BackgroundColor)
    }

    /// Procamp values for the device, mapped from the attribute ranges.
    pub fn procamp(&self) -> Procamp {
        Procamp {
            brightness: self.value(DisplayAttribType::Brightness) as f32 / 100.0,
            contrast: self.value(DisplayAttribType::Contrast) as f32 / 50.0,
            saturation: self.value(DisplayAttribType::Saturation) as f32 / 50.0,
            hue: self.value(DisplayAttribType::Hue) as f32 * PI / 180.0,
        }
    }

    pub fn background(&self) -> Color {
        Color::from_argb(self.value(DisplayAttribType::BackgroundColor) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_identity_procamp() {
        let attributes = DisplayAttributes::new();
        assert_eq!(attributes.procamp(), Procamp::default());
        assert_eq!(attributes.procamp_mtime(), 0);
        assert_eq!(attributes.background().alpha, 1.0);
    }

    #[test]
    fn set_clamps_and_stamps() {
        let mut attributes = DisplayAttributes::new();
        attributes
            .set(DisplayAttribType::Contrast, 1000, 7)
            .unwrap();
        assert_eq!(attributes.get(DisplayAttribType::Contrast).unwrap(), 100);
        assert_eq!(attributes.procamp_mtime(), 7);
        assert_eq!(attributes.background_mtime(), 0);
        attributes
            .set(DisplayAttribType::BackgroundColor, 0x0000_ff00, 9)
            .unwrap();
        assert_eq!(attributes.background().green, 1.0);
        assert_eq!(attributes.background_mtime(), 9);
        assert_eq!(attributes.procamp_mtime(), 7);
    }

    #[test]
    fn unsupported_attribute() {
        let mut attributes = DisplayAttributes::new();
        assert!(matches!(
            attributes.set(DisplayAttribType::DirectSurface, 1, 1),
            Err(Error::AttrNotSupported(DisplayAttribType::DirectSurface))
        ));
        assert!(attributes.get(DisplayAttribType::DirectSurface).is_err());
    }
}
