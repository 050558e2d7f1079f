// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use vdp::PictureInfoVc1;

use crate::va::PictureParameterVc1;

/// `sequence_fields.profile` of the advanced profile.
pub const PROFILE_ADVANCED: u8 = 3;

const FRAME_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0x0d];
const SLICE_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0x0b];

/// Picture type codes of the device for the host picture types I, P, B, BI and skipped P.
fn picture_type(va_type: u8) -> u8 {
    match va_type {
        0 => 0,
        1 => 1,
        2 => 3,
        3 => 4,
        // Skipped pictures are decoded as P pictures without data.
        4 => 1,
        _ => 0,
    }
}

pub fn update_picture(
    info: &mut PictureInfoVc1,
    param: &PictureParameterVc1,
    forward: vdp::VideoSurface,
    backward: vdp::VideoSurface,
) {
    let seq = &param.sequence_fields;
    let entry = &param.entrypoint_fields;
    let range = &param.range_mapping_fields;
    info.forward_reference = forward;
    info.backward_reference = backward;
    info.picture_type = picture_type(param.picture_fields.picture_type);
    info.frame_coding_mode = param.picture_fields.frame_coding_mode;
    info.postprocflag = (param.post_processing != 0) as u8;
    info.pulldown = seq.pulldown as u8;
    info.interlace = seq.interlace as u8;
    info.tfcntrflag = seq.tfcntrflag as u8;
    info.finterpflag = seq.finterpflag as u8;
    info.psf = seq.psf as u8;
    info.dquant = param.pic_quantizer_fields.dquant;
    info.panscan_flag = entry.panscan_flag as u8;
    info.refdist_flag = param.reference_distance_flag as u8;
    info.quantizer = param.pic_quantizer_fields.quantizer;
    info.extended_mv = param.mv_fields.extended_mv_flag as u8;
    info.extended_dmv = param.mv_fields.extended_dmv_flag as u8;
    info.overlap = seq.overlap as u8;
    info.vstransform = param.variable_sized_transform_flag as u8;
    info.loopfilter = entry.loopfilter as u8;
    info.fastuvmc = param.fast_uvmc_flag as u8;
    info.range_mapy_flag = range.luma_flag as u8;
    info.range_mapy = range.luma;
    info.range_mapuv_flag = range.chroma_flag as u8;
    info.range_mapuv = range.chroma;
    info.multires = seq.multires as u8;
    info.syncmarker = seq.syncmarker as u8;
    info.rangered = seq.rangered as u8;
    info.maxbframes = seq.max_b_frames;
    info.deblock_enable = (param.post_processing != 0) as u8;
    info.pquant = param.pic_quantizer_fields.pic_quantizer_scale;
}

/// Start code to put in front of slice `index` of an advanced profile picture, if it lacks one.
pub fn start_code(index: usize, slice: &[u8]) -> Option<[u8; 4]> {
    if slice.starts_with(&[0x00, 0x00, 0x01]) {
        return None;
    }
    Some(if index == 0 {
        FRAME_START_CODE
    } else {
        SLICE_START_CODE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::va::Vc1PictureFields;
    use crate::va::Vc1PicQuantizerFields;

    #[test]
    fn picture_types() {
        let mut info = PictureInfoVc1::default();
        for (va, device) in [(0, 0), (1, 1), (2, 3), (3, 4), (4, 1)] {
            let param = PictureParameterVc1 {
                picture_fields: Vc1PictureFields {
                    picture_type: va,
                    ..Default::default()
                },
                ..Default::default()
            };
            update_picture(&mut info, &param, 0, 0);
            assert_eq!(info.picture_type, device);
        }
    }

    #[test]
    fn post_processing_and_quantizer() {
        let mut info = PictureInfoVc1::default();
        let param = PictureParameterVc1 {
            post_processing: 2,
            pic_quantizer_fields: Vc1PicQuantizerFields {
                pic_quantizer_scale: 9,
                ..Default::default()
            },
            ..Default::default()
        };
        update_picture(&mut info, &param, 0, 0);
        assert_eq!(info.deblock_enable, 1);
        assert_eq!(info.postprocflag, 1);
        assert_eq!(info.pquant, 9);
    }

    #[test]
    fn start_codes() {
        assert_eq!(start_code(0, &[0x12]), Some(FRAME_START_CODE));
        assert_eq!(start_code(1, &[0x12]), Some(SLICE_START_CODE));
        assert_eq!(start_code(0, &[0, 0, 1, 0x0d, 0x12]), None);
    }
}
