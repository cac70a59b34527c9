// 该文件是 Bloco （积木编程） 项目的一部分。
// src/frame.rs - 检测器原始输出帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

/// YOLOv8 在 640x640 输入下的锚点数量
pub const DEFAULT_NUM_ANCHORS: usize = 8400;
/// 每个锚点的边框字段数 (cx, cy, w, h)
pub const BOX_FIELDS: usize = 4;

/// 张量布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  /// `[num_anchors][4 + num_classes]`
  #[default]
  AnchorMajor,
  /// `[4 + num_classes][num_anchors]`，导出模型的原生布局
  ChannelMajor,
}

impl TensorLayout {
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "anchor" | "anchor-major" => Some(TensorLayout::AnchorMajor),
      "channel" | "channel-major" => Some(TensorLayout::ChannelMajor),
      _ => None,
    }
  }
}

/// 检测器的一次原始输出
///
/// 数据长度不做校验，长度不符时解码器返回空结果。
#[derive(Debug, Clone)]
pub struct RawTensor {
  data: Box<[f32]>,
  num_anchors: usize,
  layout: TensorLayout,
}

impl RawTensor {
  pub fn new(data: Vec<f32>, num_anchors: usize, layout: TensorLayout) -> Self {
    Self {
      data: data.into_boxed_slice(),
      num_anchors,
      layout,
    }
  }

  /// 按行主序的锚点布局构建，锚点数由调用方给出
  pub fn anchor_major(data: Vec<f32>, num_anchors: usize) -> Self {
    Self::new(data, num_anchors, TensorLayout::AnchorMajor)
  }

  pub fn empty() -> Self {
    Self::new(Vec::new(), 0, TensorLayout::AnchorMajor)
  }

  pub fn num_anchors(&self) -> usize {
    self.num_anchors
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// 长度是否与 `num_classes` 类的张量相符
  pub fn matches_classes(&self, num_classes: usize) -> bool {
    self.num_anchors > 0 && self.data.len() == self.num_anchors * (BOX_FIELDS + num_classes)
  }

  /// 读取第 `anchor` 个锚点的第 `field` 个字段
  ///
  /// 调用前需确认 [`RawTensor::matches_classes`]。
  pub fn field(&self, anchor: usize, field: usize, num_classes: usize) -> f32 {
    let index = match self.layout {
      TensorLayout::AnchorMajor => anchor * (BOX_FIELDS + num_classes) + field,
      TensorLayout::ChannelMajor => field * self.num_anchors + anchor,
    };
    self.data[index]
  }
}

impl AsRef<[f32]> for RawTensor {
  fn as_ref(&self) -> &[f32] {
    self.data()
  }
}
