// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Integration tests driving the entry points on top of the fake device.

use vdp::fake::FakeDevice;
use vdp::fake::FakeDrawables;
use vdp::fake::FakeObjectKind;
use vdp::fake::FakeOp;
use vdp::Drawable;
use vdpau_va_driver::va::*;
use vdpau_va_driver::Driver;
use vdpau_va_driver::DriverConfig;

const WINDOW: Drawable = 0x0400_0001;

fn open_with(config: DriverConfig) -> Driver<FakeDevice, FakeDrawables> {
    let mut drawables = FakeDrawables::new(1920, 1080);
    drawables.add_window(WINDOW, 1280, 720);
    Driver::initialize(config, FakeDevice::new(), drawables).expect("failed to initialize driver")
}

fn open() -> Driver<FakeDevice, FakeDrawables> {
    open_with(DriverConfig::default())
}

fn full(width: u32, height: u32) -> VaRect {
    VaRect::new(0, 0, width, height)
}

fn put(d: &mut Driver<FakeDevice, FakeDrawables>, surface: SurfaceId, flags: u32) -> VaResult<()> {
    d.put_surface(surface, WINDOW, full(640, 480), full(1280, 720), flags)
}

fn image_format(d: &mut Driver<FakeDevice, FakeDrawables>, fourcc: u32) -> ImageFormat {
    d.query_image_formats()
        .unwrap()
        .into_iter()
        .find(|f| f.fourcc == fourcc)
        .expect("image format not supported")
}

#[test]
fn surface_handles_reuse_freed_slots() {
    let mut d = open();
    let surfaces = d.create_surfaces(64, 64, VA_RT_FORMAT_YUV420, 3).unwrap();
    assert_eq!(surfaces, vec![0x0400_0000, 0x0400_0001, 0x0400_0002]);

    d.destroy_surfaces(&surfaces[1..2]).unwrap();
    assert_eq!(
        d.query_surface_status(surfaces[1]),
        Err(VaStatus::InvalidSurface)
    );
    let again = d.create_surfaces(64, 64, VA_RT_FORMAT_YUV420, 1).unwrap();
    assert_eq!(again, vec![0x0400_0001]);
}

#[test]
fn handles_of_another_kind_are_rejected() {
    let mut d = open();
    let surfaces = d.create_surfaces(64, 64, VA_RT_FORMAT_YUV420, 1).unwrap();
    assert_eq!(d.destroy_config(surfaces[0]), Err(VaStatus::InvalidConfig));
    assert_eq!(d.destroy_buffer(surfaces[0]), Err(VaStatus::InvalidBuffer));
    assert_eq!(d.destroy_surfaces(&[0xdead_beef]), Err(VaStatus::InvalidSurface));
}

#[test]
fn surfaces_with_equal_parameters_share_a_mixer() {
    let mut d = open();
    let a = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 1).unwrap()[0];
    let b = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 1).unwrap()[0];
    let c = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV422, 1).unwrap()[0];
    put(&mut d, a, 0).unwrap();
    put(&mut d, b, 0).unwrap();
    put(&mut d, c, 0).unwrap();

    let registry = d.registry().unwrap();
    let mixer = registry.surface(a).unwrap().mixer.unwrap();
    assert_eq!(registry.surface(b).unwrap().mixer, Some(mixer));
    assert_eq!(registry.mixer(mixer).unwrap().refcount(), 2);
    let other = registry.surface(c).unwrap().mixer.unwrap();
    assert_ne!(other, mixer);
    assert_eq!(d.device().count(FakeObjectKind::VideoMixer), 2);

    d.destroy_surfaces(&[a]).unwrap();
    assert_eq!(
        d.registry().unwrap().mixer(mixer).unwrap().refcount(),
        1
    );
    d.destroy_surfaces(&[b]).unwrap();
    assert!(d.registry().unwrap().mixer(mixer).is_err());
    assert_eq!(d.device().count(FakeObjectKind::VideoMixer), 1);
}

#[test]
fn destroying_a_subpicture_detaches_its_surfaces() {
    let mut d = open();
    let format = image_format(&mut d, VA_FOURCC_BGRA);
    let image = d.create_image(&format, 32, 32).unwrap();
    let subpicture = d.create_subpicture(image.image_id).unwrap();
    let surfaces = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 2).unwrap();

    d.associate_subpicture(subpicture, &surfaces, full(32, 32), full(32, 32), 0)
        .unwrap();
    for &s in &surfaces {
        assert_eq!(d.registry().unwrap().surface(s).unwrap().associations.len(), 1);
    }

    d.destroy_subpicture(subpicture).unwrap();
    for &s in &surfaces {
        assert!(d.registry().unwrap().surface(s).unwrap().associations.is_empty());
    }
    assert_eq!(
        d.deassociate_subpicture(subpicture, &surfaces),
        Err(VaStatus::InvalidSubpicture)
    );
    d.destroy_image(image.image_id).unwrap();
}

#[test]
fn associate_then_deassociate_restores_counts() {
    let mut d = open();
    let format = image_format(&mut d, VA_FOURCC_RGBA);
    let image = d.create_image(&format, 16, 16).unwrap();
    let subpicture = d.create_subpicture(image.image_id).unwrap();
    let surfaces = d.create_surfaces(64, 64, VA_RT_FORMAT_YUV420, 3).unwrap();

    d.associate_subpicture(subpicture, &surfaces, full(16, 16), full(16, 16), 0)
        .unwrap();
    d.deassociate_subpicture(subpicture, &surfaces[1..]).unwrap();
    let registry = d.registry().unwrap();
    assert_eq!(registry.subpicture(subpicture).unwrap().associations.len(), 1);
    assert_eq!(registry.surface(surfaces[0]).unwrap().associations.len(), 1);
    assert!(registry.surface(surfaces[2]).unwrap().associations.is_empty());

    // Unknown flags are refused without linking anything.
    assert_eq!(
        d.associate_subpicture(subpicture, &surfaces[1..], full(16, 16), full(16, 16), 0x100),
        Err(VaStatus::FlagNotSupported)
    );
    assert!(d
        .registry()
        .unwrap()
        .surface(surfaces[1])
        .unwrap()
        .associations
        .is_empty());
}

#[test]
fn interlaced_fields_are_presented_together() {
    let mut d = open();
    let surface = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 1).unwrap()[0];

    put(&mut d, surface, 0).unwrap();
    assert_eq!(d.device().presentations().len(), 1);

    put(&mut d, surface, VA_TOP_FIELD).unwrap();
    assert_eq!(d.device().presentations().len(), 1);
    put(&mut d, surface, VA_BOTTOM_FIELD).unwrap();
    assert_eq!(d.device().presentations().len(), 2);
}

#[test]
fn repeated_field_flushes_the_pending_picture() {
    let mut d = open();
    let surface = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 1).unwrap()[0];

    put(&mut d, surface, VA_TOP_FIELD).unwrap();
    assert!(d.device().presentations().is_empty());
    put(&mut d, surface, VA_TOP_FIELD).unwrap();
    assert_eq!(d.device().presentations().len(), 2);
}

#[test]
fn failed_presentation_leaves_the_scheduler_untouched() {
    let mut d = open();
    let surface = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 1).unwrap()[0];
    put(&mut d, surface, 0).unwrap();

    d.device_mut()
        .fail_next(FakeOp::PresentationQueueDisplay, vdp::Error::Error);
    assert_eq!(put(&mut d, surface, 0), Err(VaStatus::OperationFailed));
    let registry = d.registry().unwrap();
    let (_, output) = registry.outputs.iter().next().unwrap();
    assert_eq!(output.queued_count(), 1);
    assert_eq!(output.current_index(), 1);

    put(&mut d, surface, 0).unwrap();
    let registry = d.registry().unwrap();
    let (_, output) = registry.outputs.iter().next().unwrap();
    assert_eq!(output.queued_count(), 2);
    assert_eq!(d.device().presentations().len(), 2);
}

#[test]
fn triple_buffering_from_config() {
    let config = DriverConfig {
        output_buffers: 3,
        ..Default::default()
    };
    let mut d = open_with(config);
    let surface = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 1).unwrap()[0];
    put(&mut d, surface, 0).unwrap();
    let registry = d.registry().unwrap();
    let (_, output) = registry.outputs.iter().next().unwrap();
    assert_eq!(output.buffer_count(), 3);
    // The display is larger than the window.
    assert_eq!(output.allocated_size(), (1920, 1152));
}

fn h264_picture(
    d: &mut Driver<FakeDevice, FakeDrawables>,
    context: ContextId,
    data: &[u8],
) -> Vec<BufferId> {
    let picture = d
        .create_buffer(
            context,
            BufferType::PictureParameter,
            1,
            1,
            Some(BufferContent::PictureParameter(PictureParameter::H264(
                Box::default(),
            ))),
        )
        .unwrap();
    let slices = d
        .create_buffer(
            context,
            BufferType::SliceParameter,
            1,
            1,
            Some(BufferContent::SliceParameter(SliceParameters::H264(vec![
                SliceParameterH264 {
                    slice_data_size: data.len() as u32,
                    ..Default::default()
                },
            ]))),
        )
        .unwrap();
    let slice_data = d
        .create_buffer(
            context,
            BufferType::SliceData,
            data.len() as u32,
            1,
            Some(BufferContent::Bytes(data.to_vec())),
        )
        .unwrap();
    vec![picture, slices, slice_data]
}

#[test]
fn decode_and_display() {
    let mut d = open();
    let profiles = d.query_config_profiles().unwrap();
    assert!(profiles.contains(&Profile::H264High));
    assert_eq!(
        d.query_config_entrypoints(Profile::H264High).unwrap(),
        vec![Entrypoint::Vld]
    );
    let config = d
        .create_config(Profile::H264High, Entrypoint::Vld, &[])
        .unwrap();
    let (profile, entrypoint, attributes) = d.query_config_attributes(config).unwrap();
    assert_eq!((profile, entrypoint), (Profile::H264High, Entrypoint::Vld));
    assert_eq!(attributes[0].value, VA_RT_FORMAT_YUV420);

    let surfaces = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 4).unwrap();
    let context = d.create_context(config, 640, 480, VA_PROGRESSIVE, &surfaces).unwrap();

    let buffers = h264_picture(&mut d, context, &[0x65, 0x88]);
    d.begin_picture(context, surfaces[0]).unwrap();
    assert_eq!(
        d.query_surface_status(surfaces[0]).unwrap(),
        SurfaceStatus::Rendering
    );
    d.render_picture(context, &buffers).unwrap();
    d.end_picture(context).unwrap();
    d.sync_surface(surfaces[0]).unwrap();
    assert_eq!(
        d.query_surface_status(surfaces[0]).unwrap(),
        SurfaceStatus::Ready
    );
    assert_eq!(d.device().decodes()[0].bitstream, vec![0, 0, 1, 0x65, 0x88]);

    // The newest presented buffer is on screen, older ones are still queued.
    put(&mut d, surfaces[0], 0).unwrap();
    assert_eq!(
        d.query_surface_status(surfaces[0]).unwrap(),
        SurfaceStatus::Ready
    );
    put(&mut d, surfaces[1], 0).unwrap();
    assert_eq!(
        d.query_surface_status(surfaces[0]).unwrap(),
        SurfaceStatus::Displaying
    );
    // Reusing the first buffer waits for it to leave the queue.
    put(&mut d, surfaces[2], 0).unwrap();
    assert_eq!(d.device().idle_waits().len(), 1);
    assert_eq!(
        d.query_surface_status(surfaces[0]).unwrap(),
        SurfaceStatus::Ready
    );

    assert_eq!(d.destroy_surfaces(&surfaces), Err(VaStatus::SurfaceBusy));
    d.destroy_context(context).unwrap();
    d.destroy_surfaces(&surfaces).unwrap();
    d.destroy_config(config).unwrap();
    assert_eq!(d.live_objects(), 0);
    assert_eq!(d.device().live_objects(), 0);
}

#[test]
fn buffers_destroyed_mid_picture_survive_until_submission() {
    let mut d = open();
    let config = d
        .create_config(Profile::H264Main, Entrypoint::Vld, &[])
        .unwrap();
    let surfaces = d.create_surfaces(320, 240, VA_RT_FORMAT_YUV420, 2).unwrap();
    let context = d.create_context(config, 320, 240, 0, &surfaces).unwrap();
    let buffers = h264_picture(&mut d, context, &[0x41]);

    d.begin_picture(context, surfaces[1]).unwrap();
    d.render_picture(context, &buffers).unwrap();
    for &b in &buffers {
        d.destroy_buffer(b).unwrap();
        assert!(d.buffer_info(b).is_ok());
    }
    d.end_picture(context).unwrap();
    for &b in &buffers {
        assert_eq!(d.buffer_info(b), Err(VaStatus::InvalidBuffer));
    }
}

#[test]
fn unsupported_requests() {
    let mut d = open();
    assert_eq!(
        d.create_config(Profile::JpegBaseline, Entrypoint::Vld, &[]),
        Err(VaStatus::UnsupportedProfile)
    );
    assert_eq!(
        d.create_config(Profile::Mpeg2Main, Entrypoint::EncSlice, &[]),
        Err(VaStatus::UnsupportedEntrypoint)
    );
    assert_eq!(
        d.create_surfaces(640, 480, VA_RT_FORMAT_YUV444, 1),
        Err(VaStatus::UnsupportedRtFormat)
    );
    let config = d
        .create_config(Profile::Mpeg2Main, Entrypoint::Vld, &[])
        .unwrap();
    let surfaces = d.create_surfaces(64, 64, VA_RT_FORMAT_YUV420, 1).unwrap();
    assert_eq!(
        d.create_context(config, 8192, 8192, 0, &surfaces),
        Err(VaStatus::ResolutionNotSupported)
    );
    assert_eq!(d.derive_image(surfaces[0]), Err(VaStatus::OperationFailed));
}

#[test]
fn image_round_trip_through_a_surface() {
    let mut d = open();
    let surface = d.create_surfaces(64, 32, VA_RT_FORMAT_YUV420, 1).unwrap()[0];
    let format = image_format(&mut d, VA_FOURCC_NV12);
    let upload = d.create_image(&format, 64, 32).unwrap();
    let download = d.create_image(&format, 64, 32).unwrap();
    assert_eq!(upload.num_planes, 2);
    assert_eq!(upload.data_size, 64 * 32 * 3 / 2);

    match d.map_buffer(upload.buf).unwrap() {
        BufferContent::Bytes(data) => {
            for (i, byte) in data.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
        other => panic!("unexpected image buffer content {:?}", other),
    }
    d.unmap_buffer(upload.buf).unwrap();

    d.put_image(surface, upload.image_id, full(64, 32), full(64, 32))
        .unwrap();
    d.get_image(surface, full(64, 32), download.image_id).unwrap();

    let expected: Vec<u8> = (0..upload.data_size).map(|i| i as u8).collect();
    match d.map_buffer(download.buf).unwrap() {
        BufferContent::Bytes(data) => assert_eq!(data, &expected),
        other => panic!("unexpected image buffer content {:?}", other),
    }
    d.unmap_buffer(download.buf).unwrap();

    assert_eq!(
        d.get_image(surface, VaRect::new(0, 0, 16, 16), download.image_id),
        Err(VaStatus::InvalidParameter)
    );
}

#[test]
fn terminate_destroys_leaked_objects() {
    let mut d = open();
    let config = d
        .create_config(Profile::Vc1Advanced, Entrypoint::Vld, &[])
        .unwrap();
    let surfaces = d.create_surfaces(640, 480, VA_RT_FORMAT_YUV420, 2).unwrap();
    let context = d.create_context(config, 640, 480, 0, &surfaces).unwrap();
    d.create_buffer(context, BufferType::SliceData, 16, 1, None)
        .unwrap();
    let format = image_format(&mut d, VA_FOURCC_BGRA);
    let image = d.create_image(&format, 32, 32).unwrap();
    let subpicture = d.create_subpicture(image.image_id).unwrap();
    d.associate_subpicture(
        subpicture,
        &surfaces,
        full(32, 32),
        VaRect::new(16, 16, 32, 32),
        VA_SUBPICTURE_GLOBAL_ALPHA,
    )
    .unwrap();
    d.set_subpicture_global_alpha(subpicture, 0.5).unwrap();
    put(&mut d, surfaces[0], 0).unwrap();
    assert_eq!(d.device().bitmap_renders().len(), 1);
    assert!(d.device().live_objects() > 0);

    d.terminate();
    assert_eq!(d.live_objects(), 0);
    assert_eq!(d.device().live_objects(), 0);
    assert_eq!(d.query_config_profiles(), Err(VaStatus::InvalidDisplay));
}

#[test]
fn oversized_images_are_refused() {
    let mut d = open();
    let format = image_format(&mut d, VA_FOURCC_BGRA);
    assert_eq!(
        d.create_image(&format, 32768, 32768).err(),
        Some(VaStatus::InvalidParameter)
    );
    assert_eq!(d.live_objects(), 0);
}

#[test]
fn configurations_without_output_buffers_are_refused() {
    let mut config = DriverConfig::default();
    config.output_buffers = 0;
    let mut drawables = FakeDrawables::new(1920, 1080);
    drawables.add_window(WINDOW, 1280, 720);
    assert_eq!(
        Driver::initialize(config, FakeDevice::new(), drawables).err(),
        Some(VaStatus::InvalidParameter)
    );
}

#[test]
fn repeated_surfaces_are_not_destroyed() {
    let mut d = open();
    let surfaces = d.create_surfaces(64, 64, VA_RT_FORMAT_YUV420, 2).unwrap();
    assert_eq!(
        d.destroy_surfaces(&[surfaces[1], surfaces[1]]),
        Err(VaStatus::InvalidParameter)
    );
    assert!(d.query_surface_status(surfaces[1]).is_ok());
    d.destroy_surfaces(&surfaces).unwrap();
}
