// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Object heaps for every kind of driver object.
//!
//! Each kind has its own [`Heap`] with a distinct id offset, so the top byte of a handle tells
//! which kind of object it names and the low bits locate the slot.

use log::warn;
use slot_heap::Heap;
use slot_heap::OFFSET_MASK;

use crate::buffer::Buffer;
use crate::decode::Config;
use crate::decode::Context;
use crate::error::Error;
use crate::error::Result;
use crate::image::Image;
use crate::mixer::Mixer;
use crate::output::Output;
use crate::subpicture::Subpicture;
use crate::surface::Surface;
use crate::va::BufferId;
use crate::va::ConfigId;
use crate::va::ContextId;
use crate::va::ImageId;
use crate::va::SubpictureId;
use crate::va::SurfaceId;

pub type OutputId = u32;
pub type MixerId = u32;

pub const CONFIG_ID_OFFSET: u32 = 0x0100_0000;
pub const CONTEXT_ID_OFFSET: u32 = 0x0200_0000;
pub const SURFACE_ID_OFFSET: u32 = 0x0400_0000;
pub const BUFFER_ID_OFFSET: u32 = 0x0800_0000;
pub const OUTPUT_ID_OFFSET: u32 = 0x1000_0000;
pub const IMAGE_ID_OFFSET: u32 = 0x2000_0000;
pub const SUBPICTURE_ID_OFFSET: u32 = 0x4000_0000;
pub const MIXER_ID_OFFSET: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Config,
    Context,
    Surface,
    Buffer,
    Output,
    Image,
    Subpicture,
    Mixer,
}

impl ObjectKind {
    pub fn id_offset(self) -> u32 {
        match self {
            ObjectKind::Config => CONFIG_ID_OFFSET,
            ObjectKind::Context => CONTEXT_ID_OFFSET,
            ObjectKind::Surface => SURFACE_ID_OFFSET,
            ObjectKind::Buffer => BUFFER_ID_OFFSET,
            ObjectKind::Output => OUTPUT_ID_OFFSET,
            ObjectKind::Image => IMAGE_ID_OFFSET,
            ObjectKind::Subpicture => SUBPICTURE_ID_OFFSET,
            ObjectKind::Mixer => MIXER_ID_OFFSET,
        }
    }
}

pub struct Registry {
    pub configs: Heap<Config>,
    pub contexts: Heap<Context>,
    pub surfaces: Heap<Surface>,
    pub buffers: Heap<Buffer>,
    pub outputs: Heap<Output>,
    pub images: Heap<Image>,
    pub subpictures: Heap<Subpicture>,
    pub mixers: Heap<Mixer>,
    /// Source of modification stamps.
    clock: u64,
}

impl Registry {
    /// Creates empty heaps growing by `increment` slots at a time.
    pub fn new(increment: usize) -> Result<Registry> {
        Ok(Registry {
            configs: Heap::new(CONFIG_ID_OFFSET, increment)?,
            contexts: Heap::new(CONTEXT_ID_OFFSET, increment)?,
            surfaces: Heap::new(SURFACE_ID_OFFSET, increment)?,
            buffers: Heap::new(BUFFER_ID_OFFSET, increment)?,
            outputs: Heap::new(OUTPUT_ID_OFFSET, increment)?,
            images: Heap::new(IMAGE_ID_OFFSET, increment)?,
            subpictures: Heap::new(SUBPICTURE_ID_OFFSET, increment)?,
            mixers: Heap::new(MIXER_ID_OFFSET, increment)?,
            clock: 0,
        })
    }

    /// Kind of object `id` names, from its offset bits alone.
    pub fn kind_of(id: u32) -> Option<ObjectKind> {
        match id & OFFSET_MASK {
            CONFIG_ID_OFFSET => Some(ObjectKind::Config),
            CONTEXT_ID_OFFSET => Some(ObjectKind::Context),
            SURFACE_ID_OFFSET => Some(ObjectKind::Surface),
            BUFFER_ID_OFFSET => Some(ObjectKind::Buffer),
            OUTPUT_ID_OFFSET => Some(ObjectKind::Output),
            IMAGE_ID_OFFSET => Some(ObjectKind::Image),
            SUBPICTURE_ID_OFFSET => Some(ObjectKind::Subpicture),
            MIXER_ID_OFFSET => Some(ObjectKind::Mixer),
            _ => None,
        }
    }

    /// Returns a new modification stamp, greater than all previous ones.
    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn config(&self, id: ConfigId) -> Result<&Config> {
        self.configs.get(id).ok_or(Error::InvalidConfig(id))
    }

    pub fn context(&self, id: ContextId) -> Result<&Context> {
        self.contexts.get(id).ok_or(Error::InvalidContext(id))
    }

    pub fn context_mut(&mut self, id: ContextId) -> Result<&mut Context> {
        self.contexts.get_mut(id).ok_or(Error::InvalidContext(id))
    }

    pub fn surface(&self, id: SurfaceId) -> Result<&Surface> {
        self.surfaces.get(id).ok_or(Error::InvalidSurface(id))
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut Surface> {
        self.surfaces.get_mut(id).ok_or(Error::InvalidSurface(id))
    }

    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers.get(id).ok_or(Error::InvalidBuffer(id))
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Buffer> {
        self.buffers.get_mut(id).ok_or(Error::InvalidBuffer(id))
    }

    pub fn image(&self, id: ImageId) -> Result<&Image> {
        self.images.get(id).ok_or(Error::InvalidImage(id))
    }

    pub fn subpicture(&self, id: SubpictureId) -> Result<&Subpicture> {
        self.subpictures.get(id).ok_or(Error::InvalidSubpicture(id))
    }

    pub fn subpicture_mut(&mut self, id: SubpictureId) -> Result<&mut Subpicture> {
        self.subpictures
            .get_mut(id)
            .ok_or(Error::InvalidSubpicture(id))
    }

    pub fn mixer(&self, id: MixerId) -> Result<&Mixer> {
        self.mixers
            .get(id)
            .ok_or(Error::Inconsistent("dangling mixer reference"))
    }

    pub fn mixer_mut(&mut self, id: MixerId) -> Result<&mut Mixer> {
        self.mixers
            .get_mut(id)
            .ok_or(Error::Inconsistent("dangling mixer reference"))
    }

    pub fn output_mut(&mut self, id: OutputId) -> Result<&mut Output> {
        self.outputs
            .get_mut(id)
            .ok_or(Error::Inconsistent("dangling output reference"))
    }

    /// Total number of live objects of every kind.
    pub fn len(&self) -> usize {
        self.configs.len()
            + self.contexts.len()
            + self.surfaces.len()
            + self.buffers.len()
            + self.outputs.len()
            + self.images.len()
            + self.subpictures.len()
            + self.mixers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every heap and returns the number of objects that were still allocated.
    pub fn destroy(self) -> usize {
        let leaked = self.configs.destroy()
            + self.contexts.destroy()
            + self.surfaces.destroy()
            + self.buffers.destroy()
            + self.outputs.destroy()
            + self.images.destroy()
            + self.subpictures.destroy()
            + self.mixers.destroy();
        if leaked != 0 {
            warn!("{} objects leaked at registry teardown", leaked);
        }
        leaked
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use vdp::ChromaType;
    use vdp::RgbaFormat;

    use super::*;
    use crate::va::SurfaceStatus;

    /// Adds a surface without a device object behind it.
    pub(crate) fn add_surface(registry: &mut Registry, width: u32, height: u32) -> SurfaceId {
        registry
            .surfaces
            .allocate(Surface {
                context: None,
                device_surface: vdp::INVALID_HANDLE,
                width,
                height,
                chroma: ChromaType::Yuv420,
                status: SurfaceStatus::Ready,
                mixer: None,
                associations: Vec::new(),
                outputs: Vec::new(),
            })
            .unwrap()
    }

    /// Adds a subpicture without a device object or image behind it.
    pub(crate) fn add_subpicture(registry: &mut Registry) -> SubpictureId {
        registry
            .subpictures
            .allocate(Subpicture {
                image: crate::va::VA_INVALID_ID,
                bitmap: vdp::INVALID_HANDLE,
                format: RgbaFormat::B8G8R8A8,
                width: 16,
                height: 16,
                chromakey_min: 0,
                chromakey_max: 0,
                chromakey_mask: 0,
                global_alpha: 1.0,
                uploaded_stamp: 0,
                associations: Vec::new(),
            })
            .unwrap()
    }

    #[test]
    fn kinds_do_not_overlap() {
        let kinds = [
            ObjectKind::Config,
            ObjectKind::Context,
            ObjectKind::Surface,
            ObjectKind::Buffer,
            ObjectKind::Output,
            ObjectKind::Image,
            ObjectKind::Subpicture,
            ObjectKind::Mixer,
        ];
        for kind in kinds {
            assert_eq!(Registry::kind_of(kind.id_offset() | 0x1234), Some(kind));
        }
        assert_eq!(Registry::kind_of(0x0300_0000), None);
        assert_eq!(Registry::kind_of(0), None);
    }

    #[test]
    fn handles_name_their_kind() {
        let mut registry = Registry::new(4).unwrap();
        let surface = add_surface(&mut registry, 16, 16);
        let subpicture = add_subpicture(&mut registry);
        assert_eq!(surface, SURFACE_ID_OFFSET);
        assert_eq!(subpicture, SUBPICTURE_ID_OFFSET);
        assert!(matches!(
            registry.subpicture(surface),
            Err(Error::InvalidSubpicture(_))
        ));
        assert!(registry.surface(surface).is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stamps_increase() {
        let mut registry = Registry::new(4).unwrap();
        let a = registry.tick();
        let b = registry.tick();
        assert!(b > a);
    }

    #[test]
    fn destroy_reports_leaks() {
        let mut registry = Registry::new(4).unwrap();
        add_surface(&mut registry, 16, 16);
        assert_eq!(registry.destroy(), 1);
    }
}
