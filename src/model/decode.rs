// 该文件是 Bloco （积木编程） 项目的一部分。
// src/model/decode.rs - 检测张量解码
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

use tracing::{debug, warn};

use crate::{
  frame::{BOX_FIELDS, RawTensor},
  model::Detection,
  vocab::ClassVocabulary,
};

/// 将原始张量解码为候选检测框
///
/// 每个锚点取类别分数的最大值，严格大于 `score_threshold` 才保留。
/// 输出保持锚点顺序。张量长度与词表不符时返回空列表。
pub fn decode(
  tensor: &RawTensor,
  vocabulary: &ClassVocabulary,
  score_threshold: f32,
) -> Vec<Detection> {
  let num_classes = vocabulary.num_classes();
  if !tensor.matches_classes(num_classes) {
    if !tensor.is_empty() {
      warn!(
        "张量大小不匹配: 长度 {}, 锚点 {}, 期望每锚点 {} 个字段",
        tensor.len(),
        tensor.num_anchors(),
        BOX_FIELDS + num_classes
      );
    }
    return Vec::new();
  }

  let mut items = Vec::new();
  for anchor in 0..tensor.num_anchors() {
    let (score, class_id) = {
      let mut max_score = f32::MIN;
      let mut cls_idx = 0usize;
      for c in 0..num_classes {
        let score = tensor.field(anchor, BOX_FIELDS + c, num_classes);
        if score > max_score {
          max_score = score;
          cls_idx = c;
        }
      }
      (max_score, cls_idx as u32)
    };

    if score <= score_threshold {
      continue;
    }

    let Some(token) = vocabulary.token(class_id) else {
      warn!("锚点 {} 的类别 {} 不在词表中", anchor, class_id);
      continue;
    };

    items.push(Detection {
      center_x: tensor.field(anchor, 0, num_classes),
      center_y: tensor.field(anchor, 1, num_classes),
      width: tensor.field(anchor, 2, num_classes),
      height: tensor.field(anchor, 3, num_classes),
      score,
      class_id,
      token,
    });
  }

  debug!("{} 个锚点中 {} 个超过阈值", tensor.num_anchors(), items.len());
  items
}
