// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use vdp::PictureInfoMpeg4Part2;

use crate::va::IqMatrixMpeg4;
use crate::va::PictureParameterMpeg4;

pub fn update_picture(
    info: &mut PictureInfoMpeg4Part2,
    param: &PictureParameterMpeg4,
    forward: vdp::VideoSurface,
    backward: vdp::VideoSurface,
) {
    let vol = &param.vol_fields;
    let vop = &param.vop_fields;
    info.forward_reference = forward;
    info.backward_reference = backward;
    // Only frame distances are known; the field distances stay zero.
    info.trd = [param.trd as i32, 0];
    info.trb = [param.trb as i32, 0];
    info.vop_time_increment_resolution = param.vop_time_increment_resolution;
    info.vop_coding_type = vop.vop_coding_type;
    info.vop_fcode_forward = param.vop_fcode_forward;
    info.vop_fcode_backward = param.vop_fcode_backward;
    info.resync_marker_disable = vol.resync_marker_disable as u8;
    info.interlaced = vol.interlaced as u8;
    info.quant_type = vol.quant_type as u8;
    info.quarter_sample = vol.quarter_sample as u8;
    info.short_video_header = vol.short_video_header as u8;
    info.rounding_control = vop.vop_rounding_type as u8;
    info.alternate_vertical_scan_flag = vop.alternate_vertical_scan_flag as u8;
    info.top_field_first = vop.top_field_first as u8;
}

pub fn update_iq_matrix(info: &mut PictureInfoMpeg4Part2, iq: &IqMatrixMpeg4) {
    if iq.load_intra_quant_mat {
        info.intra_quantizer_matrix = iq.intra_quant_mat;
    }
    if iq.load_non_intra_quant_mat {
        info.non_intra_quantizer_matrix = iq.non_intra_quant_mat;
    }
}
