// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parameter and data buffers.
//!
//! Decode buffers belong to a context and are queued for the picture being assembled by
//! `render_picture`. A buffer destroyed while queued stays alive until the picture is submitted.
//! Image buffers back the pixels of an image and belong to no context.

use log::debug;

use crate::error::Error;
use crate::error::Result;
use crate::registry::Registry;
use crate::va::BufferContent;
use crate::va::BufferId;
use crate::va::BufferType;
use crate::va::ContextId;

pub struct Buffer {
    pub buffer_type: BufferType,
    pub context: Option<ContextId>,
    /// Size of one element in bytes, as given at creation.
    pub element_size: u32,
    pub num_elements: u32,
    /// Number of elements allocated at creation.
    max_elements: u32,
    pub content: BufferContent,
    mapped: bool,
    /// Stamp of the last unmap, i.e. of the last possible change of the content.
    pub mtime: u64,
    /// Destroyed while queued for a picture; freed once the picture is submitted.
    pub delayed_destroy: bool,
}

impl Buffer {
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

/// Creates a buffer of `num_elements` elements of `element_size` bytes.
///
/// Byte buffers are zero-filled and `data`, if any, is copied to their start. Typed buffers take
/// their content from `data`.
pub fn create(
    registry: &mut Registry,
    context: Option<ContextId>,
    buffer_type: BufferType,
    element_size: u32,
    num_elements: u32,
    data: Option<BufferContent>,
) -> Result<BufferId> {
    if num_elements == 0 {
        return Err(Error::InvalidParameter("buffer without elements"));
    }
    let content = match data {
        Some(BufferContent::Bytes(bytes)) => {
            let size = element_size as usize * num_elements as usize;
            if bytes.len() > size {
                return Err(Error::InvalidParameter("buffer data larger than the buffer"));
            }
            let mut content = bytes;
            content.resize(size, 0);
            BufferContent::Bytes(content)
        }
        Some(content) => content,
        None => BufferContent::Bytes(vec![0; element_size as usize * num_elements as usize]),
    };
    if !content.fits(buffer_type) {
        return Err(Error::InvalidParameter("buffer content does not match its type"));
    }
    let mtime = registry.tick();
    let id = registry.buffers.allocate(Buffer {
        buffer_type,
        context,
        element_size,
        num_elements,
        max_elements: num_elements,
        content,
        mapped: false,
        mtime,
        delayed_destroy: false,
    })?;
    Ok(id)
}

/// Returns the type, element size and element count of a buffer.
pub fn info(registry: &Registry, id: BufferId) -> Result<(BufferType, u32, u32)> {
    let buffer = registry.buffer(id)?;
    Ok((buffer.buffer_type, buffer.element_size, buffer.num_elements))
}

/// Changes the number of valid elements, up to the number allocated.
pub fn set_num_elements(registry: &mut Registry, id: BufferId, num_elements: u32) -> Result<()> {
    let buffer = registry.buffer_mut(id)?;
    if num_elements == 0 || num_elements > buffer.max_elements {
        return Err(Error::InvalidParameter("element count out of range"));
    }
    match &mut buffer.content {
        BufferContent::SliceParameter(slices) => {
            if num_elements as usize > slices.len() {
                return Err(Error::InvalidParameter("element count out of range"));
            }
            slices.truncate(num_elements as usize);
        }
        BufferContent::Bytes(bytes) => {
            bytes.resize(buffer.element_size as usize * num_elements as usize, 0);
        }
        _ => {}
    }
    buffer.num_elements = num_elements;
    Ok(())
}

/// Gives access to the content of a buffer until `unmap`.
pub fn map(registry: &mut Registry, id: BufferId) -> Result<&mut BufferContent> {
    let buffer = registry.buffer_mut(id)?;
    if buffer.mapped {
        return Err(Error::BufferMapped(id));
    }
    buffer.mapped = true;
    Ok(&mut buffer.content)
}

pub fn unmap(registry: &mut Registry, id: BufferId) -> Result<()> {
    let mtime = registry.tick();
    let buffer = registry.buffer_mut(id)?;
    if !buffer.mapped {
        return Err(Error::InvalidParameter("buffer is not mapped"));
    }
    buffer.mapped = false;
    buffer.mtime = mtime;
    Ok(())
}

/// Destroys a buffer, or marks it for destruction if its context still has it queued.
pub fn destroy(registry: &mut Registry, id: BufferId) -> Result<()> {
    let context = registry.buffer(id)?.context;
    let queued = context
        .and_then(|c| registry.contexts.get(c))
        .map(|c| c.pending_buffers.contains(&id))
        .unwrap_or(false);
    if queued {
        debug!("buffer {:#010x} is queued, destroying it after submission", id);
        registry.buffer_mut(id)?.delayed_destroy = true;
        return Ok(());
    }
    registry.buffers.free(id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::va::PictureParameter;
    use crate::va::PictureParameterMpeg2;

    #[test]
    fn byte_buffers_are_padded() {
        let mut registry = Registry::new(4).unwrap();
        let id = create(
            &mut registry,
            None,
            BufferType::SliceData,
            4,
            2,
            Some(BufferContent::Bytes(vec![1, 2, 3])),
        )
        .unwrap();
        assert_eq!(
            registry.buffer(id).unwrap().content,
            BufferContent::Bytes(vec![1, 2, 3, 0, 0, 0, 0, 0])
        );
        assert_eq!(info(&registry, id).unwrap(), (BufferType::SliceData, 4, 2));
    }

    #[test]
    fn content_must_match_type() {
        let mut registry = Registry::new(4).unwrap();
        let params = PictureParameter::Mpeg2(PictureParameterMpeg2::default());
        let content = BufferContent::PictureParameter(params);
        assert!(matches!(
            create(&mut registry, None, BufferType::SliceData, 1, 1, Some(content.clone())),
            Err(Error::InvalidParameter(_))
        ));
        create(&mut registry, None, BufferType::PictureParameter, 1, 1, Some(content)).unwrap();
    }

    #[test]
    fn unmap_bumps_mtime() {
        let mut registry = Registry::new(4).unwrap();
        let id = create(&mut registry, None, BufferType::Image, 16, 1, None).unwrap();
        let before = registry.buffer(id).unwrap().mtime;
        match map(&mut registry, id).unwrap() {
            BufferContent::Bytes(bytes) => bytes[0] = 0xff,
            _ => unreachable!(),
        }
        assert!(matches!(map(&mut registry, id), Err(Error::BufferMapped(_))));
        unmap(&mut registry, id).unwrap();
        assert!(registry.buffer(id).unwrap().mtime > before);
        assert!(unmap(&mut registry, id).is_err());
    }

    #[test]
    fn element_count_is_bounded() {
        let mut registry = Registry::new(4).unwrap();
        let id = create(&mut registry, None, BufferType::SliceData, 8, 4, None).unwrap();
        set_num_elements(&mut registry, id, 2).unwrap();
        assert_eq!(registry.buffer(id).unwrap().num_elements, 2);
        assert!(set_num_elements(&mut registry, id, 5).is_err());
        set_num_elements(&mut registry, id, 4).unwrap();
    }
}
