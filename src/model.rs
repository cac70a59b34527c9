// 该文件是 Bloco （积木编程） 项目的一部分。
// src/model.rs - 检测结果与后处理模型
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

use std::convert::Infallible;

use serde::Serialize;
use tracing::debug;

use crate::{
  frame::RawTensor,
  vocab::{ClassVocabulary, Token},
};

/// 拍照确认时使用的置信度阈值
pub const CAPTURE_SCORE_THRESHOLD: f32 = 0.4;
/// 实时预览使用的置信度阈值
///
/// 预览与拍照两处的阈值不一致，两者都保留为可选配置。
pub const PREVIEW_SCORE_THRESHOLD: f32 = 0.25;
/// NMS IoU 阈值
pub const NMS_IOU_THRESHOLD: f32 = 0.45;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个积木的检测结果，坐标为检测器输入空间下的中心点与宽高
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
  pub score: f32,
  pub class_id: u32,
  #[serde(rename = "label")]
  pub token: Token,
}

impl Detection {
  pub fn label(&self) -> &'static str {
    self.token.label()
  }

  /// [x_min, y_min, x_max, y_max]
  pub fn bbox(&self) -> [f32; 4] {
    let half_w = self.width / 2.0;
    let half_h = self.height / 2.0;
    [
      self.center_x - half_w,
      self.center_y - half_h,
      self.center_x + half_w,
      self.center_y + half_h,
    ]
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
  pub score_threshold: f32,
  pub iou_threshold: f32,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    DetectorConfig {
      score_threshold: CAPTURE_SCORE_THRESHOLD,
      iou_threshold: NMS_IOU_THRESHOLD,
    }
  }
}

/// 积木检测后处理：解码 + NMS
///
/// 神经网络本身在外部运行，这里只消费它的原始输出张量。
#[derive(Debug, Clone)]
pub struct BlockDetector {
  vocabulary: ClassVocabulary,
  config: DetectorConfig,
}

impl BlockDetector {
  pub fn new(vocabulary: ClassVocabulary) -> Self {
    BlockDetector {
      vocabulary,
      config: DetectorConfig::default(),
    }
  }

  pub fn with_config(mut self, config: DetectorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn score_threshold(mut self, threshold: f32) -> Self {
    self.config.score_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.config.iou_threshold = threshold;
    self
  }

  pub fn vocabulary(&self) -> &ClassVocabulary {
    &self.vocabulary
  }

  pub fn config(&self) -> DetectorConfig {
    self.config
  }
}

impl Default for BlockDetector {
  fn default() -> Self {
    BlockDetector::new(ClassVocabulary::standard().clone())
  }
}

impl Model for BlockDetector {
  type Input = RawTensor;
  type Output = DetectResult;
  type Error = Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let candidates = decode(input, &self.vocabulary, self.config.score_threshold);
    debug!("解码得到 {} 个候选框", candidates.len());
    let items = suppress(candidates, self.config.iou_threshold);
    debug!("NMS 后剩余 {} 个积木", items.len());
    Ok(DetectResult::from(items))
  }
}

mod decode;
mod nms;
pub use self::decode::decode;
pub use self::nms::{iou, suppress};
