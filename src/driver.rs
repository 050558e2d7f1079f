// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The driver instance and its entry points.
//!
//! [`Driver`] holds everything one host display connection owns: the object registry, the
//! display attributes and the two external services. Each entry point validates its arguments,
//! runs one operation of the modules below and reports the outcome as a [`VaStatus`].

use std::fmt;

use log::debug;
use log::info;
use log::trace;
use log::warn;
use vdp::Device;
use vdp::Drawable;
use vdp::DrawableService;

use crate::association;
use crate::attributes::DisplayAttributes;
use crate::buffer;
use crate::config::DriverConfig;
use crate::decode;
use crate::error::device_error;
use crate::error::DeviceOp;
use crate::error::Error;
use crate::error::Result;
use crate::image;
use crate::image::DeviceFormat;
use crate::image::IMAGE_FORMATS;
use crate::mixer;
use crate::output;
use crate::output::OutputParams;
use crate::output::PutRequest;
use crate::registry::Registry;
use crate::subpicture;
use crate::surface;
use crate::syslog;
use crate::syslog::TRACE_TARGET;
use crate::va::BufferContent;
use crate::va::BufferId;
use crate::va::BufferType;
use crate::va::ConfigAttrib;
use crate::va::ConfigId;
use crate::va::ContextId;
use crate::va::DisplayAttribute;
use crate::va::DriverInfo;
use crate::va::Entrypoint;
use crate::va::ImageFormat;
use crate::va::ImageId;
use crate::va::Profile;
use crate::va::SubpictureId;
use crate::va::SurfaceId;
use crate::va::SurfaceStatus;
use crate::va::VaImage;
use crate::va::VaRect;
use crate::va::VaResult;
use crate::va::VaStatus;

/// Version of the host API the entry points implement.
pub const VA_VERSION_MAJOR: u32 = 0;
pub const VA_VERSION_MINOR: u32 = 32;

const VENDOR_PREFIX: &str = "VDPAU backend for VA-API";

/// Number of configuration attribute types reported to the host.
const MAX_CONFIG_ATTRIBUTES: usize = 6;

/// Borrows of the driver state handed to one entry point.
struct Parts<'a> {
    registry: &'a mut Registry,
    device: &'a mut dyn Device,
    drawables: &'a dyn DrawableService,
    attributes: &'a mut DisplayAttributes,
    config: &'a DriverConfig,
}

impl<'a> Parts<'a> {
    fn output_params(&self) -> OutputParams {
        OutputParams {
            buffers: self.config.output_buffers,
            granularity: self.config.output_granularity,
            history_len: self.config.deinterlace_history,
        }
    }
}

pub struct Driver<D: Device, W: DrawableService> {
    config: DriverConfig,
    device: D,
    drawables: W,
    /// `None` once terminated.
    registry: Option<Registry>,
    attributes: DisplayAttributes,
    info: DriverInfo,
}

impl<D: Device, W: DrawableService> Driver<D, W> {
    /// Sets up a driver instance on top of `device` and `drawables`.
    pub fn initialize(config: DriverConfig, device: D, drawables: W) -> VaResult<Self> {
        syslog::init(&config);
        if let Err(e) = config.validate() {
            warn!("invalid configuration: {:#}", e);
            return Err(VaStatus::InvalidParameter);
        }
        let result = (|| -> Result<Self> {
            let device_info = device
                .get_information_string()
                .map_err(device_error(DeviceOp::GetInformation))?;
            let api_version = device
                .get_api_version()
                .map_err(device_error(DeviceOp::GetInformation))?;
            info!(
                "device {:?}, API version {}, display {:?}",
                device_info,
                api_version,
                drawables.display_size()
            );
            let registry = Registry::new(config.heap_increment)?;
            let attributes = DisplayAttributes::new();
            let info = DriverInfo {
                version_major: VA_VERSION_MAJOR,
                version_minor: VA_VERSION_MINOR,
                vendor: format!("{} - {}", VENDOR_PREFIX, device_info),
                max_profiles: Profile::ALL.len(),
                max_entrypoints: 1,
                max_attributes: MAX_CONFIG_ATTRIBUTES,
                max_image_formats: IMAGE_FORMATS.len(),
                max_subpicture_formats: IMAGE_FORMATS
                    .iter()
                    .filter(|f| {
                        matches!(
                            image::device_format(f.fourcc),
                            Ok(DeviceFormat::Rgba(_))
                        )
                    })
                    .count(),
                max_display_attributes: attributes.query().len(),
            };
            Ok(Driver {
                config,
                device,
                drawables,
                registry: Some(registry),
                attributes,
                info,
            })
        })();
        result.map_err(|e| {
            warn!("failed to initialize: {}", e);
            e.status()
        })
    }

    /// Properties reported to the host at initialization.
    pub fn info(&self) -> &DriverInfo {
        &self.info
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn drawables_mut(&mut self) -> &mut W {
        &mut self.drawables
    }

    /// Object registry, for inspection. `None` once terminated.
    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.registry.is_none()
    }

    /// Number of live objects of every kind, zero once terminated.
    pub fn live_objects(&self) -> usize {
        self.registry.as_ref().map(Registry::len).unwrap_or(0)
    }

    /// Runs `f` on the driver state and reports the outcome.
    fn call<'s, T>(
        &'s mut self,
        name: &str,
        args: fmt::Arguments,
        f: impl FnOnce(Parts<'s>) -> Result<T>,
    ) -> VaResult<T> {
        trace!(target: TRACE_TARGET, "{}({})", name, args);
        let registry = match self.registry.as_mut() {
            Some(registry) => registry,
            None => return Err(Error::Terminated.status()),
        };
        let parts = Parts {
            registry,
            device: &mut self.device,
            drawables: &self.drawables,
            attributes: &mut self.attributes,
            config: &self.config,
        };
        match f(parts) {
            Ok(value) => {
                trace!(target: TRACE_TARGET, "{} -> success", name);
                Ok(value)
            }
            Err(e) => {
                let status = e.status();
                debug!("{}: {}", name, e);
                trace!(target: TRACE_TARGET, "{} -> {:?}", name, status);
                Err(status)
            }
        }
    }

    /// Destroys every object still alive and releases the registry.
    ///
    /// Calling it again, or dropping the driver afterwards, does nothing.
    pub fn terminate(&mut self) {
        let mut registry = match self.registry.take() {
            Some(registry) => registry,
            None => return,
        };
        let device: &mut dyn Device = &mut self.device;
        let leaked = registry.len();
        if leaked != 0 {
            warn!("terminating with {} live objects", leaked);
        }

        // Dependents go before what they reference.
        for id in registry.subpictures.ids() {
            report(subpicture::destroy(&mut registry, device, id), "subpicture", id);
        }
        for id in registry.images.ids() {
            report(image::destroy(&mut registry, id), "image", id);
        }
        for id in registry.buffers.ids() {
            report(buffer::destroy(&mut registry, id), "buffer", id);
        }
        for id in registry.contexts.ids() {
            report(
                decode::destroy_context(&mut registry, device, id),
                "context",
                id,
            );
        }
        for id in registry.surfaces.ids() {
            report(
                surface::destroy_surface(&mut registry, device, id),
                "surface",
                id,
            );
        }
        for id in registry.outputs.ids() {
            report(output::destroy(&mut registry, device, id), "output", id);
        }
        for id in registry.mixers.ids() {
            report(mixer::destroy(&mut registry, device, id), "mixer", id);
        }
        for id in registry.configs.ids() {
            report(decode::destroy_config(&mut registry, id), "config", id);
        }
        registry.destroy();
        info!("terminated");
    }

    pub fn query_config_profiles(&mut self) -> VaResult<Vec<Profile>> {
        self.call("query_config_profiles", format_args!(""), |p| {
            Ok(decode::query_profiles(p.device))
        })
    }

    pub fn query_config_entrypoints(&mut self, profile: Profile) -> VaResult<Vec<Entrypoint>> {
        self.call(
            "query_config_entrypoints",
            format_args!("{:?}", profile),
            |p| decode::query_entrypoints(p.device, profile),
        )
    }

    pub fn get_config_attributes(
        &mut self,
        profile: Profile,
        entrypoint: Entrypoint,
        attributes: &mut [ConfigAttrib],
    ) -> VaResult<()> {
        self.call(
            "get_config_attributes",
            format_args!("{:?}, {:?}, {} attributes", profile, entrypoint, attributes.len()),
            |p| decode::get_config_attributes(p.device, profile, entrypoint, attributes),
        )
    }

    pub fn create_config(
        &mut self,
        profile: Profile,
        entrypoint: Entrypoint,
        attributes: &[ConfigAttrib],
    ) -> VaResult<ConfigId> {
        self.call(
            "create_config",
            format_args!("{:?}, {:?}, {:?}", profile, entrypoint, attributes),
            |p| decode::create_config(p.registry, p.device, profile, entrypoint, attributes),
        )
    }

    pub fn destroy_config(&mut self, config: ConfigId) -> VaResult<()> {
        self.call("destroy_config", format_args!("{:#010x}", config), |p| {
            decode::destroy_config(p.registry, config)
        })
    }

    /// Returns the profile, entrypoint and attributes `config` was created with.
    pub fn query_config_attributes(
        &mut self,
        config: ConfigId,
    ) -> VaResult<(Profile, Entrypoint, Vec<ConfigAttrib>)> {
        self.call(
            "query_config_attributes",
            format_args!("{:#010x}", config),
            |p| {
                let c = p.registry.config(config)?;
                Ok((c.profile, c.entrypoint, c.attributes.clone()))
            },
        )
    }

    pub fn create_surfaces(
        &mut self,
        width: u32,
        height: u32,
        format: u32,
        count: usize,
    ) -> VaResult<Vec<SurfaceId>> {
        self.call(
            "create_surfaces",
            format_args!("{}x{}, format {:#x}, {}", width, height, format, count),
            |p| surface::create_surfaces(p.registry, p.device, width, height, format, count),
        )
    }

    pub fn destroy_surfaces(&mut self, surfaces: &[SurfaceId]) -> VaResult<()> {
        self.call(
            "destroy_surfaces",
            format_args!("{:#010x?}", surfaces),
            |p| surface::destroy_surfaces(p.registry, p.device, surfaces),
        )
    }

    pub fn create_context(
        &mut self,
        config: ConfigId,
        width: u32,
        height: u32,
        flags: u32,
        render_targets: &[SurfaceId],
    ) -> VaResult<ContextId> {
        self.call(
            "create_context",
            format_args!(
                "{:#010x}, {}x{}, flags {:#x}, targets {:#010x?}",
                config, width, height, flags, render_targets
            ),
            |p| {
                let history_len = p.config.deinterlace_history;
                decode::create_context(
                    p.registry,
                    p.device,
                    config,
                    width,
                    height,
                    flags,
                    render_targets,
                    history_len,
                )
            },
        )
    }

    pub fn destroy_context(&mut self, context: ContextId) -> VaResult<()> {
        self.call("destroy_context", format_args!("{:#010x}", context), |p| {
            decode::destroy_context(p.registry, p.device, context)
        })
    }

    /// Creates a buffer of `num_elements` elements of `size` bytes, initialized from `data`.
    pub fn create_buffer(
        &mut self,
        context: ContextId,
        buffer_type: BufferType,
        size: u32,
        num_elements: u32,
        data: Option<BufferContent>,
    ) -> VaResult<BufferId> {
        self.call(
            "create_buffer",
            format_args!(
                "{:#010x}, {:?}, {} x {}",
                context, buffer_type, num_elements, size
            ),
            |p| {
                p.registry.context(context)?;
                buffer::create(
                    p.registry,
                    Some(context),
                    buffer_type,
                    size,
                    num_elements,
                    data,
                )
            },
        )
    }

    pub fn buffer_set_num_elements(&mut self, buf: BufferId, num_elements: u32) -> VaResult<()> {
        self.call(
            "buffer_set_num_elements",
            format_args!("{:#010x}, {}", buf, num_elements),
            |p| buffer::set_num_elements(p.registry, buf, num_elements),
        )
    }

    /// Returns the type, element size and element count of `buf`.
    pub fn buffer_info(&mut self, buf: BufferId) -> VaResult<(BufferType, u32, u32)> {
        self.call("buffer_info", format_args!("{:#010x}", buf), |p| {
            buffer::info(p.registry, buf)
        })
    }

    pub fn map_buffer(&mut self, buf: BufferId) -> VaResult<&mut BufferContent> {
        self.call("map_buffer", format_args!("{:#010x}", buf), |p| {
            buffer::map(p.registry, buf)
        })
    }

    pub fn unmap_buffer(&mut self, buf: BufferId) -> VaResult<()> {
        self.call("unmap_buffer", format_args!("{:#010x}", buf), |p| {
            buffer::unmap(p.registry, buf)
        })
    }

    pub fn destroy_buffer(&mut self, buf: BufferId) -> VaResult<()> {
        self.call("destroy_buffer", format_args!("{:#010x}", buf), |p| {
            buffer::destroy(p.registry, buf)
        })
    }

    pub fn begin_picture(&mut self, context: ContextId, target: SurfaceId) -> VaResult<()> {
        self.call(
            "begin_picture",
            format_args!("{:#010x}, {:#010x}", context, target),
            |p| decode::begin_picture(p.registry, context, target),
        )
    }

    pub fn render_picture(&mut self, context: ContextId, buffers: &[BufferId]) -> VaResult<()> {
        self.call(
            "render_picture",
            format_args!("{:#010x}, {:#010x?}", context, buffers),
            |p| decode::render_picture(p.registry, context, buffers),
        )
    }

    pub fn end_picture(&mut self, context: ContextId) -> VaResult<()> {
        self.call("end_picture", format_args!("{:#010x}", context), |p| {
            decode::end_picture(p.registry, p.device, context)
        })
    }

    pub fn sync_surface(&mut self, surface: SurfaceId) -> VaResult<()> {
        self.call("sync_surface", format_args!("{:#010x}", surface), |p| {
            surface::sync(p.registry, surface)
        })
    }

    pub fn query_surface_status(&mut self, surface: SurfaceId) -> VaResult<SurfaceStatus> {
        self.call(
            "query_surface_status",
            format_args!("{:#010x}", surface),
            |p| surface::query_status(p.registry, p.device, surface),
        )
    }

    /// Shows `src_rect` of `surface` in `dst_rect` of `drawable`.
    pub fn put_surface(
        &mut self,
        surface: SurfaceId,
        drawable: Drawable,
        src_rect: VaRect,
        dst_rect: VaRect,
        flags: u32,
    ) -> VaResult<()> {
        self.call(
            "put_surface",
            format_args!(
                "{:#010x}, drawable {:#x}, {:?} -> {:?}, flags {:#x}",
                surface, drawable, src_rect, dst_rect, flags
            ),
            |p| {
                p.registry.surface(surface)?;
                if src_rect.is_empty() || dst_rect.is_empty() {
                    return Err(Error::InvalidParameter("empty put rectangle"));
                }
                let params = p.output_params();
                let output = output::bind(p.registry, p.device, p.drawables, &params, drawable)?;
                let request = PutRequest {
                    surface,
                    src_rect,
                    dst_rect,
                    flags,
                };
                output::put_surface(
                    p.registry,
                    p.device,
                    p.drawables,
                    p.attributes,
                    &params,
                    output,
                    &request,
                )?;
                p.registry.surface_mut(surface)?.status = SurfaceStatus::Displaying;
                Ok(())
            },
        )
    }

    pub fn query_image_formats(&mut self) -> VaResult<Vec<ImageFormat>> {
        self.call("query_image_formats", format_args!(""), |p| {
            image::query_formats(p.device)
        })
    }

    pub fn create_image(
        &mut self,
        format: &ImageFormat,
        width: u32,
        height: u32,
    ) -> VaResult<VaImage> {
        self.call(
            "create_image",
            format_args!("{:#010x}, {}x{}", format.fourcc, width, height),
            |p| image::create(p.registry, format, width, height),
        )
    }

    pub fn derive_image(&mut self, surface: SurfaceId) -> VaResult<VaImage> {
        self.call("derive_image", format_args!("{:#010x}", surface), |p| {
            image::derive(p.registry, surface)
        })
    }

    pub fn destroy_image(&mut self, image: ImageId) -> VaResult<()> {
        self.call("destroy_image", format_args!("{:#010x}", image), |p| {
            image::destroy(p.registry, image)
        })
    }

    pub fn set_image_palette(&mut self, image: ImageId, palette: &[u8]) -> VaResult<()> {
        self.call("set_image_palette", format_args!("{:#010x}", image), |p| {
            image::set_palette(p.registry, image, palette)
        })
    }

    /// Reads `rect` of `surface` into `image`.
    pub fn get_image(&mut self, surface: SurfaceId, rect: VaRect, image: ImageId) -> VaResult<()> {
        self.call(
            "get_image",
            format_args!("{:#010x}, {:?}, {:#010x}", surface, rect, image),
            |p| image::get_image(p.registry, p.device, surface, rect, image),
        )
    }

    /// Writes `src_rect` of `image` into `dst_rect` of `surface`.
    pub fn put_image(
        &mut self,
        surface: SurfaceId,
        image: ImageId,
        src_rect: VaRect,
        dst_rect: VaRect,
    ) -> VaResult<()> {
        self.call(
            "put_image",
            format_args!(
                "{:#010x}, {:#010x}, {:?} -> {:?}",
                surface, image, src_rect, dst_rect
            ),
            |p| image::put_image(p.registry, p.device, surface, image, src_rect, dst_rect),
        )
    }

    /// Subpicture formats with the association flags each supports.
    pub fn query_subpicture_formats(&mut self) -> VaResult<Vec<(ImageFormat, u32)>> {
        self.call("query_subpicture_formats", format_args!(""), |p| {
            let flags = association::allowed_flags(p.config.subpicture_global_alpha);
            subpicture::query_formats(p.device, flags)
        })
    }

    pub fn create_subpicture(&mut self, image: ImageId) -> VaResult<SubpictureId> {
        self.call("create_subpicture", format_args!("{:#010x}", image), |p| {
            subpicture::create(p.registry, p.device, image)
        })
    }

    pub fn destroy_subpicture(&mut self, subpicture: SubpictureId) -> VaResult<()> {
        self.call(
            "destroy_subpicture",
            format_args!("{:#010x}", subpicture),
            |p| subpicture::destroy(p.registry, p.device, subpicture),
        )
    }

    pub fn set_subpicture_image(
        &mut self,
        subpicture: SubpictureId,
        image: ImageId,
    ) -> VaResult<()> {
        self.call(
            "set_subpicture_image",
            format_args!("{:#010x}, {:#010x}", subpicture, image),
            |p| subpicture::set_image(p.registry, p.device, subpicture, image),
        )
    }

    pub fn set_subpicture_chromakey(
        &mut self,
        subpicture: SubpictureId,
        min: u32,
        max: u32,
        mask: u32,
    ) -> VaResult<()> {
        self.call(
            "set_subpicture_chromakey",
            format_args!("{:#010x}, {:#x}..{:#x} & {:#x}", subpicture, min, max, mask),
            |p| subpicture::set_chromakey(p.registry, subpicture, min, max, mask),
        )
    }

    pub fn set_subpicture_global_alpha(
        &mut self,
        subpicture: SubpictureId,
        alpha: f32,
    ) -> VaResult<()> {
        self.call(
            "set_subpicture_global_alpha",
            format_args!("{:#010x}, {}", subpicture, alpha),
            |p| subpicture::set_global_alpha(p.registry, subpicture, alpha),
        )
    }

    /// Links `subpicture` to each of `surfaces`.
    ///
    /// Every handle is checked first; on a failure midway the links made by this call are
    /// undone and the links they replaced restored.
    pub fn associate_subpicture(
        &mut self,
        subpicture: SubpictureId,
        surfaces: &[SurfaceId],
        src_rect: VaRect,
        dst_rect: VaRect,
        flags: u32,
    ) -> VaResult<()> {
        self.call(
            "associate_subpicture",
            format_args!(
                "{:#010x}, {:#010x?}, {:?} -> {:?}, flags {:#x}",
                subpicture, surfaces, src_rect, dst_rect, flags
            ),
            |p| {
                p.registry.subpicture(subpicture)?;
                for &s in surfaces {
                    p.registry.surface(s)?;
                }
                let allowed = association::allowed_flags(p.config.subpicture_global_alpha);
                association::associate_all(
                    p.registry, subpicture, surfaces, src_rect, dst_rect, flags, allowed,
                )
            },
        )
    }

    pub fn deassociate_subpicture(
        &mut self,
        subpicture: SubpictureId,
        surfaces: &[SurfaceId],
    ) -> VaResult<()> {
        self.call(
            "deassociate_subpicture",
            format_args!("{:#010x}, {:#010x?}", subpicture, surfaces),
            |p| {
                p.registry.subpicture(subpicture)?;
                for &s in surfaces {
                    p.registry.surface(s)?;
                }
                for &s in surfaces {
                    association::deassociate(p.registry, subpicture, s)?;
                }
                Ok(())
            },
        )
    }

    pub fn query_display_attributes(&mut self) -> VaResult<Vec<DisplayAttribute>> {
        self.call("query_display_attributes", format_args!(""), |p| {
            Ok(p.attributes.query())
        })
    }

    /// Fills in the current value of each attribute of `attributes`.
    pub fn get_display_attributes(&mut self, attributes: &mut [DisplayAttribute]) -> VaResult<()> {
        self.call(
            "get_display_attributes",
            format_args!("{} attributes", attributes.len()),
            |p| {
                for attribute in attributes.iter_mut() {
                    attribute.value = p.attributes.get(attribute.attrib_type)?;
                }
                Ok(())
            },
        )
    }

    pub fn set_display_attributes(&mut self, attributes: &[DisplayAttribute]) -> VaResult<()> {
        self.call(
            "set_display_attributes",
            format_args!("{:?}", attributes),
            |p| {
                for attribute in attributes {
                    p.attributes.get(attribute.attrib_type)?;
                }
                for attribute in attributes {
                    let mtime = p.registry.tick();
                    p.attributes
                        .set(attribute.attrib_type, attribute.value, mtime)?;
                }
                Ok(())
            },
        )
    }
}

impl<D: Device, W: DrawableService> Drop for Driver<D, W> {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn report(result: Result<()>, kind: &str, id: u32) {
    match result {
        Ok(()) => warn!("destroyed leaked {} {:#010x}", kind, id),
        Err(e) => warn!("failed to destroy leaked {} {:#010x}: {}", kind, id, e),
    }
}
