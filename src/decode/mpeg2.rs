// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use vdp::PictureInfoMpeg12;

use crate::va::IqMatrixMpeg2;
use crate::va::PictureParameterMpeg2;

/// Default intra quantiser matrix of ISO/IEC 13818-2.
const DEFAULT_INTRA_MATRIX: [u8; 64] = [
    8, 16, 19, 22, 26, 27, 29, 34, //
    16, 16, 22, 24, 27, 29, 34, 37, //
    19, 22, 26, 27, 29, 34, 34, 38, //
    22, 22, 26, 27, 29, 34, 37, 40, //
    22, 26, 27, 29, 32, 35, 40, 48, //
    26, 27, 29, 32, 35, 40, 48, 58, //
    26, 27, 29, 34, 38, 46, 56, 69, //
    27, 29, 35, 38, 46, 56, 69, 83, //
];

/// Picture state before any quantiser matrix was loaded.
pub fn initial_picture_info() -> PictureInfoMpeg12 {
    PictureInfoMpeg12 {
        intra_quantizer_matrix: DEFAULT_INTRA_MATRIX,
        non_intra_quantizer_matrix: [16; 64],
        ..Default::default()
    }
}

pub fn update_picture(
    info: &mut PictureInfoMpeg12,
    param: &PictureParameterMpeg2,
    forward: vdp::VideoSurface,
    backward: vdp::VideoSurface,
) {
    let ext = &param.picture_coding_extension;
    info.forward_reference = forward;
    info.backward_reference = backward;
    info.picture_structure = ext.picture_structure;
    info.picture_coding_type = param.picture_coding_type;
    info.intra_dc_precision = ext.intra_dc_precision;
    info.frame_pred_frame_dct = ext.frame_pred_frame_dct as u8;
    info.concealment_motion_vectors = ext.concealment_motion_vectors as u8;
    info.intra_vlc_format = ext.intra_vlc_format as u8;
    info.alternate_scan = ext.alternate_scan as u8;
    info.q_scale_type = ext.q_scale_type as u8;
    info.top_field_first = ext.top_field_first as u8;
    // MPEG-1 only.
    info.full_pel_forward_vector = 0;
    info.full_pel_backward_vector = 0;
    let nibble = |shift: u16| ((param.f_code >> shift) & 0xf) as u8;
    info.f_code = [[nibble(12), nibble(8)], [nibble(4), nibble(0)]];
}

/// Replaces the matrices the host asked to load.
pub fn update_iq_matrix(info: &mut PictureInfoMpeg12, iq: &IqMatrixMpeg2) {
    if iq.load_intra_quantiser_matrix {
        info.intra_quantizer_matrix = iq.intra_quantiser_matrix;
    }
    if iq.load_non_intra_quantiser_matrix {
        info.non_intra_quantizer_matrix = iq.non_intra_quantiser_matrix;
    }
}
