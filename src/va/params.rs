// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Codec parameter buffers.
//!
//! The host fills buffers of the parameter types with one of the structures below; data,
//! bitplane and image buffers carry raw bytes.

use crate::va::BufferType;
use crate::va::SurfaceId;
use crate::va::VA_INVALID_SURFACE;

/// The whole slice is in this buffer.
pub const VA_SLICE_DATA_FLAG_ALL: u32 = 0x00;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mpeg2PictureCodingExtension {
    pub intra_dc_precision: u8,
    pub picture_structure: u8,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub progressive_frame: bool,
    pub is_first_field: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureParameterMpeg2 {
    pub horizontal_size: u16,
    pub vertical_size: u16,
    pub forward_reference_picture: SurfaceId,
    pub backward_reference_picture: SurfaceId,
    pub picture_coding_type: u8,
    /// The four f_code values packed as 4-bit nibbles, `f_code[0][0]` in bits 12..16.
    pub f_code: u16,
    pub picture_coding_extension: Mpeg2PictureCodingExtension,
}

impl Default for PictureParameterMpeg2 {
    fn default() -> Self {
        PictureParameterMpeg2 {
            horizontal_size: 0,
            vertical_size: 0,
            forward_reference_picture: VA_INVALID_SURFACE,
            backward_reference_picture: VA_INVALID_SURFACE,
            picture_coding_type: 0,
            f_code: 0,
            picture_coding_extension: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqMatrixMpeg2 {
    pub load_intra_quantiser_matrix: bool,
    pub load_non_intra_quantiser_matrix: bool,
    pub intra_quantiser_matrix: [u8; 64],
    pub non_intra_quantiser_matrix: [u8; 64],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceParameterMpeg2 {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    pub slice_data_flag: u32,
    pub macroblock_offset: u32,
    pub slice_horizontal_position: u32,
    pub slice_vertical_position: u32,
    pub quantiser_scale_code: i32,
    pub intra_slice_flag: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mpeg4VolFields {
    pub short_video_header: bool,
    pub chroma_format: u8,
    pub interlaced: bool,
    pub obmc_disable: bool,
    pub sprite_enable: u8,
    pub sprite_warping_accuracy: u8,
    pub quant_type: bool,
    pub quarter_sample: bool,
    pub data_partitioned: bool,
    pub reversible_vlc: bool,
    pub resync_marker_disable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mpeg4VopFields {
    pub vop_coding_type: u8,
    pub backward_reference_vop_coding_type: u8,
    pub vop_rounding_type: bool,
    pub intra_dc_vlc_thr: u8,
    pub top_field_first: bool,
    pub alternate_vertical_scan_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureParameterMpeg4 {
    pub vop_width: u16,
    pub vop_height: u16,
    pub forward_reference_picture: SurfaceId,
    pub backward_reference_picture: SurfaceId,
    pub vol_fields: Mpeg4VolFields,
    pub quant_precision: u8,
    pub vop_fields: Mpeg4VopFields,
    pub vop_fcode_forward: u8,
    pub vop_fcode_backward: u8,
    pub vop_time_increment_resolution: u16,
    pub num_gobs_in_vop: u8,
    pub num_macroblocks_in_gob: u8,
    pub trb: i16,
    pub trd: i16,
}

impl Default for PictureParameterMpeg4 {
    fn default() -> Self {
        PictureParameterMpeg4 {
            vop_width: 0,
            vop_height: 0,
            forward_reference_picture: VA_INVALID_SURFACE,
            backward_reference_picture: VA_INVALID_SURFACE,
            vol_fields: Default::default(),
            quant_precision: 5,
            vop_fields: Default::default(),
            vop_fcode_forward: 0,
            vop_fcode_backward: 0,
            vop_time_increment_resolution: 0,
            num_gobs_in_vop: 0,
            num_macroblocks_in_gob: 0,
            trb: 0,
            trd: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqMatrixMpeg4 {
    pub load_intra_quant_mat: bool,
    pub load_non_intra_quant_mat: bool,
    pub intra_quant_mat: [u8; 64],
    pub non_intra_quant_mat: [u8; 64],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceParameterMpeg4 {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    pub slice_data_flag: u32,
    pub macroblock_offset: u32,
    pub macroblock_number: u32,
    pub quant_scale: i32,
}

pub const VA_PICTURE_H264_INVALID: u32 = 0x0000_0001;
pub const VA_PICTURE_H264_TOP_FIELD: u32 = 0x0000_0002;
pub const VA_PICTURE_H264_BOTTOM_FIELD: u32 = 0x0000_0004;
pub const VA_PICTURE_H264_SHORT_TERM_REFERENCE: u32 = 0x0000_0008;
pub const VA_PICTURE_H264_LONG_TERM_REFERENCE: u32 = 0x0000_0010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureH264 {
    pub picture_id: SurfaceId,
    pub frame_idx: u32,
    pub flags: u32,
    pub top_field_order_cnt: i32,
    pub bottom_field_order_cnt: i32,
}

impl Default for PictureH264 {
    fn default() -> Self {
        PictureH264 {
            picture_id: VA_INVALID_SURFACE,
            frame_idx: 0,
            flags: VA_PICTURE_H264_INVALID,
            top_field_order_cnt: 0,
            bottom_field_order_cnt: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct H264SeqFields {
    pub chroma_format_idc: u8,
    pub residual_colour_transform_flag: bool,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub min_luma_bi_pred_size8x8: bool,
    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero_flag: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct H264PicFields {
    pub entropy_coding_mode_flag: bool,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u8,
    pub transform_8x8_mode_flag: bool,
    pub field_pic_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub pic_order_present_flag: bool,
    pub deblocking_filter_control_present_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
    pub reference_pic_flag: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureParameterH264 {
    pub curr_pic: PictureH264,
    pub reference_frames: [PictureH264; 16],
    pub picture_width_in_mbs_minus1: u16,
    pub picture_height_in_mbs_minus1: u16,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub num_ref_frames: u8,
    pub seq_fields: H264SeqFields,
    pub pic_init_qp_minus26: i8,
    pub pic_init_qs_minus26: i8,
    pub chroma_qp_index_offset: i8,
    pub second_chroma_qp_index_offset: i8,
    pub pic_fields: H264PicFields,
    pub frame_num: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqMatrixH264 {
    pub scaling_list_4x4: [[u8; 16]; 6],
    pub scaling_list_8x8: [[u8; 64]; 2],
}

impl Default for IqMatrixH264 {
    fn default() -> Self {
        IqMatrixH264 {
            scaling_list_4x4: [[16; 16]; 6],
            scaling_list_8x8: [[16; 64]; 2],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceParameterH264 {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    pub slice_data_flag: u32,
    pub slice_data_bit_offset: u16,
    pub first_mb_in_slice: u16,
    pub slice_type: u8,
    pub direct_spatial_mv_pred_flag: bool,
    pub num_ref_idx_l0_active_minus1: u8,
    pub num_ref_idx_l1_active_minus1: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vc1SequenceFields {
    pub pulldown: bool,
    pub interlace: bool,
    pub tfcntrflag: bool,
    pub finterpflag: bool,
    pub psf: bool,
    pub multires: bool,
    pub overlap: bool,
    pub syncmarker: bool,
    pub rangered: bool,
    pub max_b_frames: u8,
    /// 0 simple, 1 main, 3 advanced.
    pub profile: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vc1EntrypointFields {
    pub broken_link: bool,
    pub closed_entry: bool,
    pub panscan_flag: bool,
    pub loopfilter: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vc1RangeMappingFields {
    pub luma_flag: bool,
    pub luma: u8,
    pub chroma_flag: bool,
    pub chroma: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vc1PictureFields {
    /// 0 I, 1 P, 2 B, 3 BI, 4 skipped P.
    pub picture_type: u8,
    pub frame_coding_mode: u8,
    pub top_field_first: bool,
    pub is_first_field: bool,
    pub intensity_compensation: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vc1MvFields {
    pub mv_mode: u8,
    pub extended_mv_flag: bool,
    pub extended_mv_range: u8,
    pub extended_dmv_flag: bool,
    pub extended_dmv_range: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vc1PicQuantizerFields {
    pub dquant: u8,
    pub quantizer: u8,
    pub half_qp: bool,
    pub pic_quantizer_scale: u8,
    pub pic_quantizer_type: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureParameterVc1 {
    pub forward_reference_picture: SurfaceId,
    pub backward_reference_picture: SurfaceId,
    pub inloop_decoded_picture: SurfaceId,
    pub sequence_fields: Vc1SequenceFields,
    pub coded_width: u16,
    pub coded_height: u16,
    pub entrypoint_fields: Vc1EntrypointFields,
    pub conditional_overlap_flag: u8,
    pub fast_uvmc_flag: bool,
    pub range_mapping_fields: Vc1RangeMappingFields,
    pub rounding_control: bool,
    pub post_processing: u8,
    pub picture_fields: Vc1PictureFields,
    pub reference_distance_flag: bool,
    pub mv_fields: Vc1MvFields,
    pub pic_quantizer_fields: Vc1PicQuantizerFields,
    pub variable_sized_transform_flag: bool,
}

impl Default for PictureParameterVc1 {
    fn default() -> Self {
        PictureParameterVc1 {
            forward_reference_picture: VA_INVALID_SURFACE,
            backward_reference_picture: VA_INVALID_SURFACE,
            inloop_decoded_picture: VA_INVALID_SURFACE,
            sequence_fields: Default::default(),
            coded_width: 0,
            coded_height: 0,
            entrypoint_fields: Default::default(),
            conditional_overlap_flag: 0,
            fast_uvmc_flag: false,
            range_mapping_fields: Default::default(),
            rounding_control: false,
            post_processing: 0,
            picture_fields: Default::default(),
            reference_distance_flag: false,
            mv_fields: Default::default(),
            pic_quantizer_fields: Default::default(),
            variable_sized_transform_flag: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceParameterVc1 {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    pub slice_data_flag: u32,
    pub macroblock_offset: u32,
    pub slice_vertical_position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PictureParameter {
    Mpeg2(PictureParameterMpeg2),
    Mpeg4(PictureParameterMpeg4),
    H264(Box<PictureParameterH264>),
    Vc1(PictureParameterVc1),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IqMatrix {
    Mpeg2(IqMatrixMpeg2),
    Mpeg4(IqMatrixMpeg4),
    H264(Box<IqMatrixH264>),
}

/// Slice parameter buffer; one element per slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceParameters {
    Mpeg2(Vec<SliceParameterMpeg2>),
    Mpeg4(Vec<SliceParameterMpeg4>),
    H264(Vec<SliceParameterH264>),
    Vc1(Vec<SliceParameterVc1>),
}

impl SliceParameters {
    pub fn len(&self) -> usize {
        match self {
            SliceParameters::Mpeg2(s) => s.len(),
            SliceParameters::Mpeg4(s) => s.len(),
            SliceParameters::H264(s) => s.len(),
            SliceParameters::Vc1(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn truncate(&mut self, len: usize) {
        match self {
            SliceParameters::Mpeg2(s) => s.truncate(len),
            SliceParameters::Mpeg4(s) => s.truncate(len),
            SliceParameters::H264(s) => s.truncate(len),
            SliceParameters::Vc1(s) => s.truncate(len),
        }
    }

    /// `(offset, size)` of every slice in the following slice data buffer.
    pub fn data_ranges(&self) -> Vec<(u32, u32)> {
        match self {
            SliceParameters::Mpeg2(s) => s
                .iter()
                .map(|s| (s.slice_data_offset, s.slice_data_size))
                .collect(),
            SliceParameters::Mpeg4(s) => s
                .iter()
                .map(|s| (s.slice_data_offset, s.slice_data_size))
                .collect(),
            SliceParameters::H264(s) => s
                .iter()
                .map(|s| (s.slice_data_offset, s.slice_data_size))
                .collect(),
            SliceParameters::Vc1(s) => s
                .iter()
                .map(|s| (s.slice_data_offset, s.slice_data_size))
                .collect(),
        }
    }
}

/// Content of a buffer object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferContent {
    Bytes(Vec<u8>),
    PictureParameter(PictureParameter),
    IqMatrix(IqMatrix),
    SliceParameter(SliceParameters),
}

impl BufferContent {
    /// Returns true if this content can be stored in a buffer of `buffer_type`.
    pub fn fits(&self, buffer_type: BufferType) -> bool {
        match self {
            BufferContent::Bytes(_) => matches!(
                buffer_type,
                BufferType::BitPlane
                    | BufferType::SliceGroupMap
                    | BufferType::SliceData
                    | BufferType::MacroblockParameter
                    | BufferType::ResidualData
                    | BufferType::DeblockingParameter
                    | BufferType::Image
            ),
            BufferContent::PictureParameter(_) => buffer_type == BufferType::PictureParameter,
            BufferContent::IqMatrix(_) => buffer_type == BufferType::IqMatrix,
            BufferContent::SliceParameter(_) => buffer_type == BufferType::SliceParameter,
        }
    }
}
