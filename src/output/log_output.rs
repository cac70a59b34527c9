// 该文件是 Bloco （积木编程） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  compiler::{Program, ProgramNode},
  frame::RawTensor,
  interpreter::ExecutionReport,
  model::DetectResult,
  output::{OutputError, Render},
};

/// 通过 tracing 打印检测结果与执行结果
///
/// `log://?verbose` 会逐个打印积木和动作轨迹。
#[derive(Debug, Clone, Default)]
pub struct LogOutput {
  verbose: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    let verbose = uri.query_pairs().any(|(k, _)| k == "verbose");
    Ok(LogOutput { verbose })
  }
}

impl LogOutput {
  pub fn verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }
}

impl Render<RawTensor, DetectResult> for LogOutput {
  type Error = Infallible;

  fn render_result(&self, frame: &RawTensor, result: &DetectResult) -> Result<(), Self::Error> {
    if result.is_empty() {
      info!("没有检测到积木 ({} 个锚点)", frame.num_anchors());
      return Ok(());
    }

    info!("检测到 {} 个积木", result.len());
    if self.verbose {
      for det in result.items.iter() {
        info!(
          "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
          det.label(),
          det.score * 100.0,
          det.center_x,
          det.center_y,
          det.width,
          det.height
        );
      }
    }
    Ok(())
  }
}

impl Render<Program, ExecutionReport> for LogOutput {
  type Error = Infallible;

  fn render_result(&self, frame: &Program, result: &ExecutionReport) -> Result<(), Self::Error> {
    info!("程序共 {} 个节点:", frame.len());
    for (idx, node) in frame.nodes.iter().enumerate() {
      match node {
        ProgramNode::Command(cmd) => info!(
          "  {:>2}. {:?} {:?} x{}",
          idx + 1,
          cmd.action,
          cmd.direction,
          cmd.count
        ),
        ProgramNode::Loop(block) => {
          info!("  {:>2}. 循环 x{}", idx + 1, block.repeat_count);
          for cmd in block.body.iter() {
            info!("        {:?} {:?} x{}", cmd.action, cmd.direction, cmd.count);
          }
        }
      }
    }

    info!(
      "执行 {} 条命令, 拾取 {} 次, 前进受阻 {} 次, 跳跃作废 {} 次",
      result.commands_executed, result.pickups, result.blocked_walks, result.voided_jumps
    );
    if result.rejected_motions > 0 {
      warn!("{} 个动作因机器人忙碌被忽略", result.rejected_motions);
    }
    if result.cancelled {
      warn!("程序被中途取消");
    }
    if let Some(state) = result.final_state {
      info!(
        "最终位置 ({}, {}), 朝向 {:?}",
        state.grid_x, state.grid_y, state.heading
      );
    }
    if self.verbose {
      for motion in result.motions.iter() {
        debug!(
          "  {:?} {:?} -> {:?}: {:?}",
          motion.kind, motion.from, motion.to, motion.outcome
        );
      }
    }
    Ok(())
  }
}
