// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use vdp::PictureInfoH264;
use vdp::ReferenceFrameH264;

use crate::va::IqMatrixH264;
use crate::va::PictureH264;
use crate::va::PictureParameterH264;
use crate::va::SliceParameterH264;
use crate::va::SurfaceId;
use crate::va::VA_PICTURE_H264_BOTTOM_FIELD;
use crate::va::VA_PICTURE_H264_INVALID;
use crate::va::VA_PICTURE_H264_LONG_TERM_REFERENCE;
use crate::va::VA_PICTURE_H264_TOP_FIELD;

/// Start code inserted in front of every slice; the host passes slices without one.
pub const START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Translates one entry of the decoded picture buffer.
///
/// `lookup` resolves a surface id to its device surface, or `None` if the id names no surface.
/// Entries marked invalid or naming no surface become empty entries.
fn reference_frame<F>(picture: &PictureH264, lookup: &F) -> ReferenceFrameH264
where
    F: Fn(SurfaceId) -> Option<vdp::VideoSurface>,
{
    if picture.flags & VA_PICTURE_H264_INVALID != 0 {
        return ReferenceFrameH264::default();
    }
    let surface = match lookup(picture.picture_id) {
        Some(surface) => surface,
        None => return ReferenceFrameH264::default(),
    };
    let mut top = picture.flags & VA_PICTURE_H264_TOP_FIELD != 0;
    let mut bottom = picture.flags & VA_PICTURE_H264_BOTTOM_FIELD != 0;
    if !top && !bottom {
        // A frame: both fields are references.
        top = true;
        bottom = true;
    }
    ReferenceFrameH264 {
        surface,
        is_long_term: picture.flags & VA_PICTURE_H264_LONG_TERM_REFERENCE != 0,
        top_is_reference: top,
        bottom_is_reference: bottom,
        field_order_cnt: [picture.top_field_order_cnt, picture.bottom_field_order_cnt],
        frame_idx: picture.frame_idx as u16,
    }
}

pub fn update_picture<F>(info: &mut PictureInfoH264, param: &PictureParameterH264, lookup: F)
where
    F: Fn(SurfaceId) -> Option<vdp::VideoSurface>,
{
    let seq = &param.seq_fields;
    let pic = &param.pic_fields;
    info.field_order_cnt = [
        param.curr_pic.top_field_order_cnt,
        param.curr_pic.bottom_field_order_cnt,
    ];
    info.is_reference = pic.reference_pic_flag;
    info.frame_num = param.frame_num;
    info.field_pic_flag = pic.field_pic_flag as u8;
    info.bottom_field_flag = (param.curr_pic.flags & VA_PICTURE_H264_BOTTOM_FIELD != 0) as u8;
    info.num_ref_frames = param.num_ref_frames;
    info.mb_adaptive_frame_field_flag = seq.mb_adaptive_frame_field_flag as u8;
    info.constrained_intra_pred_flag = pic.constrained_intra_pred_flag as u8;
    info.weighted_pred_flag = pic.weighted_pred_flag as u8;
    info.weighted_bipred_idc = pic.weighted_bipred_idc;
    info.frame_mbs_only_flag = seq.frame_mbs_only_flag as u8;
    info.transform_8x8_mode_flag = pic.transform_8x8_mode_flag as u8;
    info.chroma_qp_index_offset = param.chroma_qp_index_offset;
    info.second_chroma_qp_index_offset = param.second_chroma_qp_index_offset;
    info.pic_init_qp_minus26 = param.pic_init_qp_minus26;
    info.log2_max_frame_num_minus4 = seq.log2_max_frame_num_minus4;
    info.pic_order_cnt_type = seq.pic_order_cnt_type;
    info.log2_max_pic_order_cnt_lsb_minus4 = seq.log2_max_pic_order_cnt_lsb_minus4;
    info.delta_pic_order_always_zero_flag = seq.delta_pic_order_always_zero_flag as u8;
    info.direct_8x8_inference_flag = seq.direct_8x8_inference_flag as u8;
    info.entropy_coding_mode_flag = pic.entropy_coding_mode_flag as u8;
    info.pic_order_present_flag = pic.pic_order_present_flag as u8;
    info.deblocking_filter_control_present_flag =
        pic.deblocking_filter_control_present_flag as u8;
    info.redundant_pic_cnt_present_flag = pic.redundant_pic_cnt_present_flag as u8;
    for (frame, picture) in info
        .reference_frames
        .iter_mut()
        .zip(param.reference_frames.iter())
    {
        *frame = reference_frame(picture, &lookup);
    }
}

pub fn update_iq_matrix(info: &mut PictureInfoH264, iq: &IqMatrixH264) {
    info.scaling_lists_4x4 = iq.scaling_list_4x4;
    info.scaling_lists_8x8 = iq.scaling_list_8x8;
}

/// Takes the active reference counts from the first slice of the picture.
pub fn update_slices(info: &mut PictureInfoH264, slices: &[SliceParameterH264]) {
    if let Some(slice) = slices.first() {
        info.num_ref_idx_l0_active_minus1 = slice.num_ref_idx_l0_active_minus1;
        info.num_ref_idx_l1_active_minus1 = slice.num_ref_idx_l1_active_minus1;
    }
}
