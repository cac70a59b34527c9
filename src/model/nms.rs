// 该文件是 Bloco （积木编程） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use crate::model::Detection;

/// 非极大值抑制
///
/// 按置信度降序（同分保持原顺序）贪心保留，与已保留框 IoU 超过
/// `iou_threshold` 的框被丢弃。不区分类别：同一位置不同类别的框同样会被抑制。
pub fn suppress(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  detections.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut result: Vec<Detection> = Vec::with_capacity(detections.len());
  for det in detections {
    if result.iter().all(|best| iou(best, &det) <= iou_threshold) {
      result.push(det);
    }
  }

  result
}

/// 计算两个检测框的 IoU
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let [ax1, ay1, ax2, ay2] = a.bbox();
  let [bx1, by1, bx2, by2] = b.bbox();

  let x1 = ax1.max(bx1);
  let y1 = ay1.max(by1);
  let x2 = ax2.min(bx2);
  let y2 = ay2.min(by2);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vocab::Token;

  fn det(cx: f32, cy: f32, size: f32, score: f32, token: Token) -> Detection {
    Detection {
      center_x: cx,
      center_y: cy,
      width: size,
      height: size,
      score,
      class_id: 0,
      token,
    }
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = det(10.0, 10.0, 10.0, 0.9, Token::Walk);
    let b = det(100.0, 100.0, 10.0, 0.9, Token::Walk);
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = det(10.0, 10.0, 10.0, 0.9, Token::Walk);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn suppression_ignores_class() {
    // 宽 100 的框水平平移 5，IoU = 95 / 105 ≈ 0.905
    let walk = det(100.0, 100.0, 100.0, 0.7, Token::Walk);
    let jump = Detection {
      center_x: 105.0,
      ..det(100.0, 100.0, 100.0, 0.8, Token::Jump)
    };
    assert!(iou(&walk, &jump) > 0.9);

    let kept = suppress(vec![walk, jump], 0.45);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].token, Token::Jump);
  }

  #[test]
  fn output_is_sorted_by_score_with_stable_ties() {
    let a = det(0.0, 0.0, 10.0, 0.5, Token::Walk);
    let b = det(100.0, 0.0, 10.0, 0.9, Token::Jump);
    let c = det(200.0, 0.0, 10.0, 0.5, Token::PickUp);
    let kept = suppress(vec![a, b, c], 0.45);
    let tokens: Vec<Token> = kept.iter().map(|d| d.token).collect();
    assert_eq!(tokens, vec![Token::Jump, Token::Walk, Token::PickUp]);
  }

  #[test]
  fn suppression_is_idempotent() {
    let dets = vec![
      det(100.0, 100.0, 50.0, 0.9, Token::Walk),
      det(110.0, 100.0, 50.0, 0.8, Token::Walk),
      det(130.0, 100.0, 50.0, 0.6, Token::Jump),
      det(400.0, 100.0, 50.0, 0.7, Token::Digit(3)),
      det(100.0, 300.0, 50.0, 0.7, Token::Loop),
    ];
    let once = suppress(dets, 0.45);
    let twice = suppress(once.clone(), 0.45);
    assert_eq!(once, twice);
  }
}
