// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Picture descriptions consumed by the device decoder.

use crate::VideoSurface;
use crate::INVALID_HANDLE;

/// Decoder profiles the device may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecoderProfile {
    Mpeg1,
    Mpeg2Simple,
    Mpeg2Main,
    H264Baseline,
    H264Main,
    H264High,
    Vc1Simple,
    Vc1Main,
    Vc1Advanced,
    Mpeg4PartSp,
    Mpeg4PartAsp,
}

/// Result of `Device::decoder_query_capabilities`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderCaps {
    pub supported: bool,
    pub max_level: u32,
    pub max_references: u32,
    pub max_width: u32,
    pub max_height: u32,
}

/// Result of `Device::video_surface_query_capabilities`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoSurfaceCaps {
    pub supported: bool,
    pub max_width: u32,
    pub max_height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PictureInfoMpeg12 {
    pub forward_reference: VideoSurface,
    pub backward_reference: VideoSurface,
    pub picture_structure: u8,
    pub picture_coding_type: u8,
    pub intra_dc_precision: u8,
    pub frame_pred_frame_dct: u8,
    pub concealment_motion_vectors: u8,
    pub intra_vlc_format: u8,
    pub alternate_scan: u8,
    pub q_scale_type: u8,
    pub top_field_first: u8,
    pub full_pel_forward_vector: u8,
    pub full_pel_backward_vector: u8,
    pub f_code: [[u8; 2]; 2],
    pub intra_quantizer_matrix: [u8; 64],
    pub non_intra_quantizer_matrix: [u8; 64],
    pub slice_count: u32,
}

impl Default for PictureInfoMpeg12 {
    fn default() -> Self {
        PictureInfoMpeg12 {
            forward_reference: INVALID_HANDLE,
            backward_reference: INVALID_HANDLE,
            picture_structure: 0,
            picture_coding_type: 0,
            intra_dc_precision: 0,
            frame_pred_frame_dct: 0,
            concealment_motion_vectors: 0,
            intra_vlc_format: 0,
            alternate_scan: 0,
            q_scale_type: 0,
            top_field_first: 0,
            full_pel_forward_vector: 0,
            full_pel_backward_vector: 0,
            f_code: [[0; 2]; 2],
            intra_quantizer_matrix: [0; 64],
            non_intra_quantizer_matrix: [0; 64],
            slice_count: 0,
        }
    }
}

/// One entry of the H.264 decoded picture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFrameH264 {
    pub surface: VideoSurface,
    pub is_long_term: bool,
    pub top_is_reference: bool,
    pub bottom_is_reference: bool,
    pub field_order_cnt: [i32; 2],
    pub frame_idx: u16,
}

impl Default for ReferenceFrameH264 {
    fn default() -> Self {
        ReferenceFrameH264 {
            surface: INVALID_HANDLE,
            is_long_term: false,
            top_is_reference: false,
            bottom_is_reference: false,
            field_order_cnt: [0; 2],
            frame_idx: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PictureInfoH264 {
    pub slice_count: u32,
    pub field_order_cnt: [i32; 2],
    pub is_reference: bool,
    pub frame_num: u16,
    pub field_pic_flag: u8,
    pub bottom_field_flag: u8,
    pub num_ref_frames: u8,
    pub mb_adaptive_frame_field_flag: u8,
    pub constrained_intra_pred_flag: u8,
    pub weighted_pred_flag: u8,
    pub weighted_bipred_idc: u8,
    pub frame_mbs_only_flag: u8,
    pub transform_8x8_mode_flag: u8,
    pub chroma_qp_index_offset: i8,
    pub second_chroma_qp_index_offset: i8,
    pub pic_init_qp_minus26: i8,
    pub num_ref_idx_l0_active_minus1: u8,
    pub num_ref_idx_l1_active_minus1: u8,
    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero_flag: u8,
    pub direct_8x8_inference_flag: u8,
    pub entropy_coding_mode_flag: u8,
    pub pic_order_present_flag: u8,
    pub deblocking_filter_control_present_flag: u8,
    pub redundant_pic_cnt_present_flag: u8,
    pub scaling_lists_4x4: [[u8; 16]; 6],
    pub scaling_lists_8x8: [[u8; 64]; 2],
    pub reference_frames: [ReferenceFrameH264; 16],
}

impl Default for PictureInfoH264 {
    fn default() -> Self {
        PictureInfoH264 {
            slice_count: 0,
            field_order_cnt: [0; 2],
            is_reference: false,
            frame_num: 0,
            field_pic_flag: 0,
            bottom_field_flag: 0,
            num_ref_frames: 0,
            mb_adaptive_frame_field_flag: 0,
            constrained_intra_pred_flag: 0,
            weighted_pred_flag: 0,
            weighted_bipred_idc: 0,
            frame_mbs_only_flag: 0,
            transform_8x8_mode_flag: 0,
            chroma_qp_index_offset: 0,
            second_chroma_qp_index_offset: 0,
            pic_init_qp_minus26: 0,
            num_ref_idx_l0_active_minus1: 0,
            num_ref_idx_l1_active_minus1: 0,
            log2_max_frame_num_minus4: 0,
            pic_order_cnt_type: 0,
            log2_max_pic_order_cnt_lsb_minus4: 0,
            delta_pic_order_always_zero_flag: 0,
            direct_8x8_inference_flag: 0,
            entropy_coding_mode_flag: 0,
            pic_order_present_flag: 0,
            deblocking_filter_control_present_flag: 0,
            redundant_pic_cnt_present_flag: 0,
            scaling_lists_4x4: [[16; 16]; 6],
            scaling_lists_8x8: [[16; 64]; 2],
            reference_frames: [ReferenceFrameH264::default(); 16],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureInfoVc1 {
    pub forward_reference: VideoSurface,
    pub backward_reference: VideoSurface,
    pub slice_count: u32,
    pub picture_type: u8,
    pub frame_coding_mode: u8,
    pub postprocflag: u8,
    pub pulldown: u8,
    pub interlace: u8,
    pub tfcntrflag: u8,
    pub finterpflag: u8,
    pub psf: u8,
    pub dquant: u8,
    pub panscan_flag: u8,
    pub refdist_flag: u8,
    pub quantizer: u8,
    pub extended_mv: u8,
    pub extended_dmv: u8,
    pub overlap: u8,
    pub vstransform: u8,
    pub loopfilter: u8,
    pub fastuvmc: u8,
    pub range_mapy_flag: u8,
    pub range_mapy: u8,
    pub range_mapuv_flag: u8,
    pub range_mapuv: u8,
    pub multires: u8,
    pub syncmarker: u8,
    pub rangered: u8,
    pub maxbframes: u8,
    pub deblock_enable: u8,
    pub pquant: u8,
}

impl Default for PictureInfoVc1 {
    fn default() -> Self {
        PictureInfoVc1 {
            forward_reference: INVALID_HANDLE,
            backward_reference: INVALID_HANDLE,
            slice_count: 0,
            picture_type: 0,
            frame_coding_mode: 0,
            postprocflag: 0,
            pulldown: 0,
            interlace: 0,
            tfcntrflag: 0,
            finterpflag: 0,
            psf: 0,
            dquant: 0,
            panscan_flag: 0,
            refdist_flag: 0,
            quantizer: 0,
            extended_mv: 0,
            extended_dmv: 0,
            overlap: 0,
            vstransform: 0,
            loopfilter: 0,
            fastuvmc: 0,
            range_mapy_flag: 0,
            range_mapy: 0,
            range_mapuv_flag: 0,
            range_mapuv: 0,
            multires: 0,
            syncmarker: 0,
            rangered: 0,
            maxbframes: 0,
            deblock_enable: 0,
            pquant: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureInfoMpeg4Part2 {
    pub forward_reference: VideoSurface,
    pub backward_reference: VideoSurface,
    pub trd: [i32; 2],
    pub trb: [i32; 2],
    pub vop_time_increment_resolution: u16,
    pub vop_coding_type: u8,
    pub vop_fcode_forward: u8,
    pub vop_fcode_backward: u8,
    pub resync_marker_disable: u8,
    pub interlaced: u8,
    pub quant_type: u8,
    pub quarter_sample: u8,
    pub short_video_header: u8,
    pub rounding_control: u8,
    pub alternate_vertical_scan_flag: u8,
    pub top_field_first: u8,
    pub intra_quantizer_matrix: [u8; 64],
    pub non_intra_quantizer_matrix: [u8; 64],
}

impl Default for PictureInfoMpeg4Part2 {
    fn default() -> Self {
        PictureInfoMpeg4Part2 {
            forward_reference: INVALID_HANDLE,
            backward_reference: INVALID_HANDLE,
            trd: [0; 2],
            trb: [0; 2],
            vop_time_increment_resolution: 0,
            vop_coding_type: 0,
            vop_fcode_forward: 0,
            vop_fcode_backward: 0,
            resync_marker_disable: 0,
            interlaced: 0,
            quant_type: 0,
            quarter_sample: 0,
            short_video_header: 0,
            rounding_control: 0,
            alternate_vertical_scan_flag: 0,
            top_field_first: 0,
            intra_quantizer_matrix: [0; 64],
            non_intra_quantizer_matrix: [0; 64],
        }
    }
}

/// Codec specific description of the picture passed to `Device::decoder_render`.
#[derive(Debug, Clone, PartialEq)]
pub enum PictureInfo {
    Mpeg12(PictureInfoMpeg12),
    H264(Box<PictureInfoH264>),
    Vc1(PictureInfoVc1),
    Mpeg4Part2(PictureInfoMpeg4Part2),
}
