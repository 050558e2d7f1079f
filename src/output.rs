// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Presentation of decoded surfaces on drawables.
//!
//! Every drawable that surfaces are put on gets an [`Output`]: a device presentation queue and a
//! ring of two or three presentation buffers. A put composites the surface (and the subpictures
//! associated with it) into the current buffer. Interlaced content may arrive one field at a
//! time; the buffer is submitted once both fields are in it. Before a buffer is reused for a new
//! picture the scheduler blocks until the device no longer displays it, which bounds how far
//! composition can run ahead of the display.

use std::rc::Rc;

use log::debug;
use log::warn;
use vdp::BitmapRender;
use vdp::BlendState;
use vdp::Color;
use vdp::ColorStandard;
use vdp::Device;
use vdp::Drawable;
use vdp::DrawableService;
use vdp::FieldStructure;
use vdp::PresentationStatus;
use vdp::RgbaFormat;

use crate::association::Association;
use crate::attributes::DisplayAttributes;
use crate::error::device_error;
use crate::error::DeviceOp;
use crate::error::Result;
use crate::mixer;
use crate::mixer::Composition;
use crate::registry::OutputId;
use crate::registry::Registry;
use crate::subpicture;
use crate::va::SurfaceId;
use crate::va::VaRect;
use crate::va::VA_BOTTOM_FIELD;
use crate::va::VA_SRC_BT709;
use crate::va::VA_SRC_SMPTE_240;
use crate::va::VA_SUBPICTURE_GLOBAL_ALPHA;
use crate::va::VA_TOP_FIELD;

const BOTH_FIELDS: u32 = VA_TOP_FIELD | VA_BOTTOM_FIELD;

/// Presentation buffer format.
const OUTPUT_FORMAT: RgbaFormat = RgbaFormat::B8G8R8A8;

/// Scheduler tunables.
#[derive(Debug, Clone, Copy)]
pub struct OutputParams {
    /// Presentation buffers per output.
    pub buffers: usize,
    /// Presentation buffer sizes are rounded up to a multiple of this.
    pub granularity: u32,
    /// Source history length of the video mixers.
    pub history_len: usize,
}

struct PresentationBuffer {
    surface: vdp::OutputSurface,
    /// Submitted for display and not waited for since.
    queued: bool,
    /// Surface last composited into this buffer.
    source: Option<SurfaceId>,
}

/// Presentation state of one drawable.
pub struct Output {
    pub drawable: Drawable,
    /// Number of surfaces that have been put on this drawable and are still alive.
    refcount: u32,
    queue: vdp::PresentationQueue,
    target: vdp::PresentationQueueTarget,
    buffers: Vec<PresentationBuffer>,
    /// Drawable size the output was last adjusted to.
    width: u32,
    height: u32,
    /// Size of the presentation buffers.
    alloc_width: u32,
    alloc_height: u32,
    current: usize,
    displayed: Option<usize>,
    queued_count: u64,
    /// Fields composited into the current buffer and not submitted yet.
    fields: u32,
    /// Newest background colour change applied to the presentation queue.
    background_mtime: u64,
}

impl Output {
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn displayed_index(&self) -> Option<usize> {
        self.displayed
    }

    /// Number of buffers submitted to the presentation queue so far.
    pub fn queued_count(&self) -> u64 {
        self.queued_count
    }

    /// `VA_TOP_FIELD`/`VA_BOTTOM_FIELD` bits waiting in the current buffer.
    pub fn pending_fields(&self) -> u32 {
        self.fields
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn allocated_size(&self) -> (u32, u32) {
        (self.alloc_width, self.alloc_height)
    }

    pub fn drawable_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn queue(&self) -> vdp::PresentationQueue {
        self.queue
    }

    /// Device surfaces of the presentation buffers, in ring order.
    pub fn buffer_surfaces(&self) -> Vec<vdp::OutputSurface> {
        self.buffers.iter().map(|b| b.surface).collect()
    }

    /// Submits the current buffer and moves on to the next one.
    fn submit(&mut self, device: &mut dyn Device) -> Result<()> {
        let index = self.current;
        device
            .presentation_queue_display(
                self.queue,
                self.buffers[index].surface,
                self.width,
                self.height,
                0,
            )
            .map_err(device_error(DeviceOp::PresentationQueueDisplay))?;
        self.buffers[index].queued = true;
        self.displayed = Some(index);
        self.current = (index + 1) % self.buffers.len();
        self.queued_count += 1;
        self.fields = 0;
        Ok(())
    }

    /// Sets the colour shown around the video if it changed since it was last set.
    fn update_background(
        &mut self,
        device: &mut dyn Device,
        attributes: &DisplayAttributes,
    ) -> Result<()> {
        let mtime = attributes.background_mtime();
        if mtime > self.background_mtime {
            device
                .presentation_queue_set_background_color(self.queue, attributes.background())
                .map_err(device_error(DeviceOp::SetBackgroundColor))?;
            self.background_mtime = mtime;
        }
        Ok(())
    }

    /// Blocks until the current buffer is no longer queued or visible.
    fn wait_current(&mut self, device: &mut dyn Device) -> Result<()> {
        let buffer = &mut self.buffers[self.current];
        if buffer.queued {
            device
                .presentation_queue_block_until_surface_idle(self.queue, buffer.surface)
                .map_err(device_error(DeviceOp::BlockUntilIdle))?;
            buffer.queued = false;
        }
        Ok(())
    }

    /// Returns true if the device still has a buffer showing `surface` queued.
    fn is_displaying(&self, device: &dyn Device, surface: SurfaceId) -> Result<bool> {
        for buffer in &self.buffers {
            if buffer.source != Some(surface) || !buffer.queued {
                continue;
            }
            let status = device
                .presentation_queue_query_surface_status(self.queue, buffer.surface)
                .map_err(device_error(DeviceOp::QuerySurfaceStatus))?;
            if status == PresentationStatus::Queued {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn round_up(value: u32, granularity: u32) -> u32 {
    let mask = granularity.max(1) - 1;
    value.saturating_add(mask) & !mask
}

/// Presentation buffer size for a drawable of `width`x`height`.
fn allocation_size(
    width: u32,
    height: u32,
    display: (u32, u32),
    granularity: u32,
) -> (u32, u32) {
    (
        round_up(width.max(display.0), granularity),
        round_up(height.max(display.1), granularity),
    )
}

fn destroy_buffers(device: &mut dyn Device, buffers: Vec<PresentationBuffer>) {
    for buffer in buffers {
        if let Err(e) = device.output_surface_destroy(buffer.surface) {
            warn!("failed to destroy presentation buffer: {}", e);
        }
    }
}

fn create_buffers(
    device: &mut dyn Device,
    count: usize,
    width: u32,
    height: u32,
) -> Result<Vec<PresentationBuffer>> {
    let mut buffers = Vec::with_capacity(count);
    for _ in 0..count {
        match device.output_surface_create(OUTPUT_FORMAT, width, height) {
            Ok(surface) => buffers.push(PresentationBuffer {
                surface,
                queued: false,
                source: None,
            }),
            Err(e) => {
                destroy_buffers(device, buffers);
                return Err(device_error(DeviceOp::OutputSurfaceCreate)(e));
            }
        }
    }
    Ok(buffers)
}

/// Returns the output of `drawable`, creating it on first use.
pub fn bind(
    registry: &mut Registry,
    device: &mut dyn Device,
    drawables: &dyn DrawableService,
    params: &OutputParams,
    drawable: Drawable,
) -> Result<OutputId> {
    if let Some((id, _)) = registry.outputs.iter().find(|(_, o)| o.drawable == drawable) {
        return Ok(id);
    }

    let (width, height) = drawables
        .geometry(drawable)
        .map_err(device_error(DeviceOp::DrawableGeometry))?;
    let (alloc_width, alloc_height) =
        allocation_size(width, height, drawables.display_size(), params.granularity);

    let target = device
        .presentation_queue_target_create(drawable)
        .map_err(device_error(DeviceOp::PresentationQueueTargetCreate))?;
    let queue = match device.presentation_queue_create(target) {
        Ok(queue) => queue,
        Err(e) => {
            if let Err(e) = device.presentation_queue_target_destroy(target) {
                warn!("failed to destroy presentation queue target: {}", e);
            }
            return Err(device_error(DeviceOp::PresentationQueueCreate)(e));
        }
    };
    let buffers = match create_buffers(device, params.buffers, alloc_width, alloc_height) {
        Ok(buffers) => buffers,
        Err(e) => {
            release_queue(device, queue, target);
            return Err(e);
        }
    };
    let surfaces: Vec<vdp::OutputSurface> = buffers.iter().map(|b| b.surface).collect();
    let output = Output {
        drawable,
        refcount: 0,
        queue,
        target,
        buffers,
        width,
        height,
        alloc_width,
        alloc_height,
        current: 0,
        displayed: None,
        queued_count: 0,
        fields: 0,
        background_mtime: 0,
    };
    match registry.outputs.allocate(output) {
        Ok(id) => {
            debug!(
                "output {:#010x} for drawable {:#x}: {}x{} buffers",
                id, drawable, alloc_width, alloc_height
            );
            Ok(id)
        }
        Err(e) => {
            for surface in surfaces {
                if let Err(e) = device.output_surface_destroy(surface) {
                    warn!("failed to destroy presentation buffer: {}", e);
                }
            }
            release_queue(device, queue, target);
            Err(e.into())
        }
    }
}

fn release_queue(
    device: &mut dyn Device,
    queue: vdp::PresentationQueue,
    target: vdp::PresentationQueueTarget,
) {
    if let Err(e) = device.presentation_queue_destroy(queue) {
        warn!("failed to destroy presentation queue: {}", e);
    }
    if let Err(e) = device.presentation_queue_target_destroy(target) {
        warn!("failed to destroy presentation queue target: {}", e);
    }
}

/// Follows the drawable size, recreating the presentation buffers when it outgrows them.
///
/// Sizes announced by a resize notification still pending in the event stream are left for a
/// later put, so that a window being resized interactively is not followed step by step. Only
/// windows receive such notifications.
fn ensure_size(
    output: &mut Output,
    device: &mut dyn Device,
    drawables: &dyn DrawableService,
    params: &OutputParams,
) -> Result<()> {
    let (width, height) = drawables
        .geometry(output.drawable)
        .map_err(device_error(DeviceOp::DrawableGeometry))?;
    if (width, height) == (output.width, output.height) {
        return Ok(());
    }
    let pending = if drawables.is_window(output.drawable) {
        drawables.pending_resize(output.drawable)
    } else {
        None
    };
    if let Some(size) = pending {
        debug!(
            "drawable {:#x}: resize to {:?} pending, keeping {}x{}",
            output.drawable, size, output.width, output.height
        );
        return Ok(());
    }

    let (alloc_width, alloc_height) =
        allocation_size(width, height, drawables.display_size(), params.granularity);
    if alloc_width > output.alloc_width || alloc_height > output.alloc_height {
        let alloc_width = alloc_width.max(output.alloc_width);
        let alloc_height = alloc_height.max(output.alloc_height);
        let buffers = create_buffers(device, output.buffers.len(), alloc_width, alloc_height)?;
        let old = std::mem::replace(&mut output.buffers, buffers);
        destroy_buffers(device, old);
        output.alloc_width = alloc_width;
        output.alloc_height = alloc_height;
        output.current = 0;
        output.displayed = None;
        output.fields = 0;
        debug!(
            "drawable {:#x}: presentation buffers grown to {}x{}",
            output.drawable, alloc_width, alloc_height
        );
    }
    output.width = width;
    output.height = height;
    Ok(())
}

/// Records that `surface` is shown on `output`, holding a reference on the output.
fn reference(registry: &mut Registry, output: OutputId, surface: SurfaceId) -> Result<()> {
    let outputs = &mut registry.surface_mut(surface)?.outputs;
    if outputs.contains(&output) {
        return Ok(());
    }
    outputs.push(output);
    registry.output_mut(output)?.refcount += 1;
    Ok(())
}

/// Drops a reference on `output`, destroying it with the last one.
pub fn unref(registry: &mut Registry, device: &mut dyn Device, output: OutputId) -> Result<()> {
    let o = registry.output_mut(output)?;
    o.refcount = o.refcount.saturating_sub(1);
    if o.refcount > 0 {
        return Ok(());
    }
    destroy(registry, device, output)
}

/// Forgets `surface`, which is being destroyed, and drops the reference it held on `output`.
pub fn detach_surface(
    registry: &mut Registry,
    device: &mut dyn Device,
    output: OutputId,
    surface: SurfaceId,
) -> Result<()> {
    for buffer in &mut registry.output_mut(output)?.buffers {
        if buffer.source == Some(surface) {
            buffer.source = None;
        }
    }
    unref(registry, device, output)
}

/// Destroys `output` and its device objects regardless of outstanding references.
pub fn destroy(registry: &mut Registry, device: &mut dyn Device, output: OutputId) -> Result<()> {
    let o = registry.outputs.free(output)?;
    destroy_buffers(device, o.buffers);
    release_queue(device, o.queue, o.target);
    debug!("destroyed output {:#010x}", output);
    Ok(())
}

/// Returns true if a buffer showing `surface` is still queued on any of its outputs.
pub fn is_displaying(
    registry: &Registry,
    device: &dyn Device,
    surface: SurfaceId,
) -> Result<bool> {
    for &id in &registry.surface(surface)?.outputs {
        if let Some(output) = registry.outputs.get(id) {
            if output.is_displaying(device, surface)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Arguments of `put_surface`.
#[derive(Debug, Clone, Copy)]
pub struct PutRequest {
    pub surface: SurfaceId,
    /// Part of the surface to show.
    pub src_rect: VaRect,
    /// Where to show it on the drawable.
    pub dst_rect: VaRect,
    pub flags: u32,
}

fn color_standard(flags: u32) -> ColorStandard {
    if flags & VA_SRC_SMPTE_240 != 0 {
        ColorStandard::Smpte240M
    } else if flags & VA_SRC_BT709 != 0 {
        ColorStandard::ItuR709
    } else {
        ColorStandard::ItuR601
    }
}

/// Maps `rect`, given in the coordinate space of `from`, into the space of `to`.
fn map_rect(rect: &VaRect, from: &VaRect, to: &VaRect) -> VaRect {
    let sx = to.width as f64 / from.width.max(1) as f64;
    let sy = to.height as f64 / from.height.max(1) as f64;
    let x0 = to.x as f64 + (rect.x - from.x) as f64 * sx;
    let y0 = to.y as f64 + (rect.y - from.y) as f64 * sy;
    let x1 = x0 + rect.width as f64 * sx;
    let y1 = y0 + rect.height as f64 * sy;
    let (x0, y0, x1, y1) = (x0.round(), y0.round(), x1.round(), y1.round());
    VaRect::new(
        x0 as i32,
        y0 as i32,
        (x1 - x0).max(0.0) as u32,
        (y1 - y0).max(0.0) as u32,
    )
}

/// Blends the subpictures associated with `surface` into `destination`.
///
/// Each overlay is clipped to the visible part of the surface; overlays outside of it are
/// skipped.
fn composite_subpictures(
    registry: &mut Registry,
    device: &mut dyn Device,
    request: &PutRequest,
    destination: vdp::OutputSurface,
) -> Result<()> {
    let associations: Vec<Rc<Association>> =
        registry.surface(request.surface)?.associations.clone();
    for association in associations {
        let clip = match association.dst_rect.intersect(&request.src_rect) {
            Some(clip) => clip,
            None => continue,
        };
        let source_rect = map_rect(&clip, &association.dst_rect, &association.src_rect);
        let destination_rect = map_rect(&clip, &request.src_rect, &request.dst_rect);
        if source_rect.is_empty() || destination_rect.is_empty() {
            continue;
        }

        subpicture::upload(registry, device, association.subpicture)?;
        let subpicture = registry.subpicture(association.subpicture)?;
        let color = if association.flags & VA_SUBPICTURE_GLOBAL_ALPHA != 0 {
            let alpha = subpicture.global_alpha;
            Some(Color {
                red: alpha,
                green: alpha,
                blue: alpha,
                alpha,
            })
        } else {
            None
        };
        device
            .output_surface_render_bitmap_surface(&BitmapRender {
                destination,
                destination_rect: Some(destination_rect.to_device()),
                source: subpicture.bitmap,
                source_rect: Some(source_rect.to_device()),
                color,
                blend: BlendState::source_over(),
            })
            .map_err(device_error(DeviceOp::RenderBitmapSurface))?;
    }
    Ok(())
}

/// Shows `request.surface` on `output`.
///
/// `request.flags` selects the fields to show: only the top or bottom field of an interlaced
/// picture, or the whole frame when neither field bit is set. A field that is already waiting
/// in the current buffer means a new picture started, so the waiting one is submitted first and
/// the new field is shown on its own.
///
/// The scheduler state only moves after successful device calls; a failed put leaves it as it
/// was.
pub fn put_surface(
    registry: &mut Registry,
    device: &mut dyn Device,
    drawables: &dyn DrawableService,
    attributes: &DisplayAttributes,
    params: &OutputParams,
    output: OutputId,
    request: &PutRequest,
) -> Result<()> {
    let fields = match request.flags & BOTH_FIELDS {
        0 => BOTH_FIELDS,
        fields => fields,
    };
    let field = match fields {
        VA_TOP_FIELD => FieldStructure::TopField,
        VA_BOTTOM_FIELD => FieldStructure::BottomField,
        _ => FieldStructure::Frame,
    };
    let source = registry.surface(request.surface)?.device_surface;
    let mixer_id =
        mixer::ensure_for_surface(registry, device, request.surface, params.history_len)?;

    let o = registry.output_mut(output)?;
    ensure_size(o, device, drawables, params)?;
    o.update_background(device, attributes)?;
    let flushed = o.fields & fields != 0;
    if flushed {
        debug!(
            "output {:#010x}: field {:#x} repeated, flushing pending picture",
            output, fields
        );
        o.submit(device)?;
    }
    if o.fields == 0 {
        o.wait_current(device)?;
    }
    let destination = o.buffers[o.current].surface;

    let m = registry.mixer_mut(mixer_id)?;
    m.update_state(device, attributes, color_standard(request.flags))?;
    m.render(
        device,
        &Composition {
            source,
            field,
            source_rect: request.src_rect,
            destination,
            destination_rect: request.dst_rect,
        },
    )?;
    composite_subpictures(registry, device, request, destination)?;

    reference(registry, output, request.surface)?;
    let o = registry.output_mut(output)?;
    let current = o.current;
    o.buffers[current].source = Some(request.surface);
    let accumulated = o.fields | fields;
    if flushed || accumulated == BOTH_FIELDS {
        o.submit(device)?;
    } else {
        o.fields = accumulated;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use vdp::fake::FakeDevice;
    use vdp::fake::FakeDrawables;
    use vdp::fake::FakeObjectKind;
    use vdp::fake::FakeOp;
    use vdp::ChromaType;

    use super::*;
    use crate::va::SurfaceStatus;

    const WINDOW: Drawable = 0x100;

    struct Setup {
        registry: Registry,
        device: FakeDevice,
        drawables: FakeDrawables,
        attributes: DisplayAttributes,
        params: OutputParams,
        surface: SurfaceId,
    }

    impl Setup {
        fn new(buffers: usize) -> Setup {
            let mut registry = Registry::new(16).unwrap();
            let mut device = FakeDevice::new();
            let device_surface = device
                .video_surface_create(ChromaType::Yuv420, 720, 480)
                .unwrap();
            let surface = registry
                .surfaces
                .allocate(crate::surface::Surface {
                    context: None,
                    device_surface,
                    width: 720,
                    height: 480,
                    chroma: ChromaType::Yuv420,
                    status: SurfaceStatus::Ready,
                    mixer: None,
                    associations: Vec::new(),
                    outputs: Vec::new(),
                })
                .unwrap();
            let mut drawables = FakeDrawables::new(1024, 768);
            drawables.add_window(WINDOW, 720, 480);
            Setup {
                registry,
                device,
                drawables,
                attributes: DisplayAttributes::new(),
                params: OutputParams {
                    buffers,
                    granularity: 128,
                    history_len: 3,
                },
                surface,
            }
        }

        fn bind(&mut self) -> OutputId {
            bind(
                &mut self.registry,
                &mut self.device,
                &self.drawables,
                &self.params,
                WINDOW,
            )
            .unwrap()
        }

        fn put(&mut self, output: OutputId, flags: u32) -> Result<()> {
            let request = PutRequest {
                surface: self.surface,
                src_rect: VaRect::new(0, 0, 720, 480),
                dst_rect: VaRect::new(0, 0, 720, 480),
                flags,
            };
            put_surface(
                &mut self.registry,
                &mut self.device,
                &self.drawables,
                &self.attributes,
                &self.params,
                output,
                &request,
            )
        }

        fn output(&self, id: OutputId) -> &Output {
            self.registry.outputs.get(id).unwrap()
        }
    }

    #[test]
    fn allocation_rounds_to_granularity() {
        assert_eq!(round_up(700, 128), 768);
        assert_eq!(round_up(768, 128), 768);
        assert_eq!(allocation_size(100, 100, (1024, 768), 128), (1024, 768));
        assert_eq!(allocation_size(1100, 100, (1024, 768), 128), (1152, 768));
    }

    #[test]
    fn bind_creates_once_per_drawable() {
        let mut s = Setup::new(2);
        let a = s.bind();
        let b = s.bind();
        assert_eq!(a, b);
        assert_eq!(s.output(a).buffer_count(), 2);
        assert_eq!(s.output(a).allocated_size(), (1024, 768));
        assert_eq!(s.device.count(FakeObjectKind::OutputSurface), 2);
        assert_eq!(s.device.count(FakeObjectKind::PresentationQueue), 1);
    }

    #[test]
    fn triple_buffering() {
        let mut s = Setup::new(3);
        let id = s.bind();
        assert_eq!(s.output(id).buffer_count(), 3);
    }

    #[test]
    fn full_frame_submits_once() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, 0).unwrap();
        let o = s.output(id);
        assert_eq!(o.queued_count(), 1);
        assert_eq!(o.pending_fields(), 0);
        assert_eq!(o.displayed_index(), Some(0));
        assert_eq!(o.current_index(), 1);
        assert_eq!(s.device.presentations().len(), 1);
        assert_eq!(s.device.presentations()[0].clip_width, 720);
    }

    #[test]
    fn both_fields_submit_once() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, VA_TOP_FIELD).unwrap();
        assert_eq!(s.output(id).queued_count(), 0);
        assert_eq!(s.output(id).pending_fields(), VA_TOP_FIELD);
        s.put(id, VA_BOTTOM_FIELD).unwrap();
        assert_eq!(s.output(id).queued_count(), 1);
        assert_eq!(s.output(id).pending_fields(), 0);
        assert_eq!(s.device.presentations().len(), 1);

        let renders = s.device.mixer_renders();
        assert_eq!(renders.len(), 2);
        assert_eq!(renders[0].field, FieldStructure::TopField);
        assert_eq!(renders[1].field, FieldStructure::BottomField);
        // Both fields went into the same buffer.
        assert_eq!(renders[0].destination, renders[1].destination);
    }

    #[test]
    fn repeated_field_flushes() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, VA_TOP_FIELD).unwrap();
        s.put(id, VA_TOP_FIELD).unwrap();
        assert_eq!(s.device.presentations().len(), 2);
        assert_eq!(s.output(id).queued_count(), 2);
        let presented: Vec<_> = s.device.presentations().iter().map(|p| p.surface).collect();
        assert_ne!(presented[0], presented[1]);
    }

    #[test]
    fn reused_buffer_waits_for_idle() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, 0).unwrap();
        s.put(id, 0).unwrap();
        assert!(s.device.idle_waits().is_empty());
        // Third frame goes back to the first buffer, which is still queued.
        s.put(id, 0).unwrap();
        let buffers = s.output(id).buffer_surfaces();
        assert_eq!(s.device.idle_waits(), &[(s.output(id).queue(), buffers[0])]);
        assert_eq!(s.output(id).queued_count(), 3);
    }

    #[test]
    fn failed_display_keeps_state() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.device
            .fail_next(FakeOp::PresentationQueueDisplay, vdp::Error::Error);
        assert!(s.put(id, 0).is_err());
        let o = s.output(id);
        assert_eq!(o.queued_count(), 0);
        assert_eq!(o.current_index(), 0);
        assert_eq!(o.displayed_index(), None);
        assert_eq!(o.pending_fields(), 0);
        s.put(id, 0).unwrap();
        assert_eq!(s.output(id).queued_count(), 1);
    }

    #[test]
    fn failed_composite_keeps_fields() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, VA_TOP_FIELD).unwrap();
        s.device.fail_next(FakeOp::VideoMixerRender, vdp::Error::Error);
        assert!(s.put(id, VA_BOTTOM_FIELD).is_err());
        assert_eq!(s.output(id).pending_fields(), VA_TOP_FIELD);
        assert_eq!(s.output(id).queued_count(), 0);
    }

    #[test]
    fn growth_recreates_all_buffers() {
        let mut s = Setup::new(3);
        let id = s.bind();
        s.put(id, 0).unwrap();
        let before = s.output(id).buffer_surfaces();

        // Announced but not yet delivered resizes are not followed.
        s.drawables.resize(WINDOW, 1600, 900);
        s.drawables.set_pending_resize(WINDOW, Some((1600, 900)));
        s.put(id, 0).unwrap();
        assert_eq!(s.output(id).buffer_surfaces(), before);

        s.drawables.set_pending_resize(WINDOW, None);
        s.put(id, 0).unwrap();
        let o = s.output(id);
        assert_eq!(o.allocated_size(), (1664, 1024));
        assert_eq!(o.drawable_size(), (1600, 900));
        assert!(o.buffer_surfaces().iter().all(|b| !before.contains(b)));
        assert_eq!(s.device.count(FakeObjectKind::OutputSurface), 3);
    }

    #[test]
    fn pixmaps_follow_resizes_immediately() {
        let mut s = Setup::new(2);
        const PIXMAP: Drawable = 0x200;
        s.drawables.add_pixmap(PIXMAP, 720, 480);
        let id = bind(
            &mut s.registry,
            &mut s.device,
            &s.drawables,
            &s.params,
            PIXMAP,
        )
        .unwrap();
        s.put(id, 0).unwrap();

        // A stale notification for a pixmap does not hold the resize back.
        s.drawables.resize(PIXMAP, 1600, 900);
        s.drawables.set_pending_resize(PIXMAP, Some((800, 600)));
        s.put(id, 0).unwrap();
        assert_eq!(s.output(id).drawable_size(), (1600, 900));
        assert_eq!(s.output(id).allocated_size(), (1664, 1024));
    }

    #[test]
    fn background_colour_reaches_the_queue() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, 0).unwrap();
        let queue = s.output(id).queue();
        assert_eq!(s.device.queue_background(queue), Some(Color::default()));

        s.attributes
            .set(crate::va::DisplayAttribType::BackgroundColor, 0x0000_ff00, 1)
            .unwrap();
        s.put(id, 0).unwrap();
        assert_eq!(
            s.device.queue_background(queue),
            Some(Color::from_argb(0xff00_ff00))
        );

        // Unchanged attributes are not sent again.
        s.device
            .fail_next(FakeOp::PresentationQueueSetBackground, vdp::Error::Error);
        s.put(id, 0).unwrap();
        assert_eq!(s.output(id).queued_count(), 3);
    }

    #[test]
    fn shrinking_keeps_buffers() {
        let mut s = Setup::new(2);
        let id = s.bind();
        let before = s.output(id).buffer_surfaces();
        s.drawables.resize(WINDOW, 320, 200);
        s.put(id, 0).unwrap();
        assert_eq!(s.output(id).buffer_surfaces(), before);
        assert_eq!(s.output(id).drawable_size(), (320, 200));
    }

    #[test]
    fn surfaces_reference_their_output() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, 0).unwrap();
        s.put(id, 0).unwrap();
        assert_eq!(s.output(id).refcount(), 1);
        unref(&mut s.registry, &mut s.device, id).unwrap();
        assert!(!s.registry.outputs.contains(id));
        assert_eq!(s.device.count(FakeObjectKind::OutputSurface), 0);
        assert_eq!(s.device.count(FakeObjectKind::PresentationQueue), 0);
        assert_eq!(s.device.count(FakeObjectKind::PresentationQueueTarget), 0);
    }

    #[test]
    fn displaying_until_idle() {
        let mut s = Setup::new(2);
        let id = s.bind();
        s.put(id, 0).unwrap();
        // The most recent buffer is visible, not queued.
        assert!(!is_displaying(&s.registry, &s.device, s.surface).unwrap());
        s.put(id, 0).unwrap();
        assert!(is_displaying(&s.registry, &s.device, s.surface).unwrap());
    }

    #[test]
    fn map_rect_scales() {
        let from = VaRect::new(0, 0, 720, 480);
        let to = VaRect::new(0, 0, 1440, 960);
        assert_eq!(
            map_rect(&VaRect::new(10, 20, 100, 50), &from, &to),
            VaRect::new(20, 40, 200, 100)
        );
    }
}
