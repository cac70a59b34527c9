// 该文件是 Bloco （积木编程） 项目的一部分。
// src/snapshot.rs - 当前检测快照
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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::model::DetectResult;

/// 冻结后的一次检测结果
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
  pub result: DetectResult,
  pub frame_index: usize,
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Slot {
  result: DetectResult,
  frame_index: usize,
  updated_at: Option<DateTime<Utc>>,
  stopped: bool,
}

/// 单槽快照
///
/// 检测循环是唯一的写入方，拍照是唯一的读取方。拍照先把槽位置为停止，
/// 此后的写入全部被拒绝，读到的结果不会再变化。
#[derive(Debug, Clone, Default)]
pub struct SnapshotCell {
  slot: Arc<Mutex<Slot>>,
}

impl SnapshotCell {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Slot> {
    self.slot.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 写入最新结果，槽位已停止时返回 `false`
  pub fn publish(&self, frame_index: usize, result: DetectResult) -> bool {
    let mut slot = self.lock();
    if slot.stopped {
      debug!("快照已停止，丢弃第 {} 帧结果", frame_index);
      return false;
    }
    slot.result = result;
    slot.frame_index = frame_index;
    slot.updated_at = Some(Utc::now());
    true
  }

  pub fn stop(&self) {
    self.lock().stopped = true;
  }

  pub fn is_stopped(&self) -> bool {
    self.lock().stopped
  }

  /// 停止写入并取出最后一次结果
  pub fn capture(&self) -> Snapshot {
    let mut slot = self.lock();
    slot.stopped = true;
    Snapshot {
      result: slot.result.clone(),
      frame_index: slot.frame_index,
      updated_at: slot.updated_at,
    }
  }

  /// 重新打开摄像头时清空槽位
  pub fn reset(&self) {
    *self.lock() = Slot::default();
  }
}
