// 该文件是 Bloco （积木编程） 项目的一部分。
// src/compiler/group.rs - 按行分组
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

use crate::{compiler::Line, model::Detection};

/// 按纵坐标把积木分成行，每行再按横坐标排序
///
/// 与当前行首个积木的纵坐标差值达到 `tolerance` 时另起一行。
pub fn group_lines(detections: &[Detection], tolerance: f32) -> Vec<Line> {
  let mut sorted = detections.to_vec();
  sorted.sort_by(|a, b| a.center_y.total_cmp(&b.center_y));

  let mut lines: Vec<Line> = Vec::new();
  let mut current: Vec<Detection> = Vec::new();
  for det in sorted {
    let same_line = current
      .first()
      .is_some_and(|head| (det.center_y - head.center_y).abs() < tolerance);
    if !same_line && !current.is_empty() {
      lines.push(Line {
        items: std::mem::take(&mut current),
      });
    }
    current.push(det);
  }
  if !current.is_empty() {
    lines.push(Line { items: current });
  }

  for line in lines.iter_mut() {
    line.items.sort_by(|a, b| a.center_x.total_cmp(&b.center_x));
  }
  lines
}
