// 该文件是 Bloco （积木编程） 项目的一部分。
// src/compiler.rs - 积木程序编译
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

use serde::Serialize;
use tracing::debug;

use crate::{agent::Heading, model::Detection, vocab::Token};

/// 同一行积木中心点纵坐标的最大差值（检测器坐标）
pub const LINE_TOLERANCE: f32 = 40.0;
/// 循环块未指定次数时的重复次数
pub const DEFAULT_LOOP_REPEAT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Walk,
  Jump,
  Pickup,
  None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParsedCommand {
  pub action: Action,
  pub direction: Option<Heading>,
  pub count: u32,
}

impl ParsedCommand {
  pub fn new(action: Action) -> Self {
    ParsedCommand {
      action,
      direction: None,
      count: 1,
    }
  }

  pub fn facing(mut self, direction: Heading) -> Self {
    self.direction = Some(direction);
    self
  }

  pub fn times(mut self, count: u32) -> Self {
    self.count = count.max(1);
    self
  }
}

/// 循环块，循环体内不再嵌套循环
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopBlock {
  pub repeat_count: u32,
  pub body: Vec<ParsedCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProgramNode {
  Command(ParsedCommand),
  Loop(LoopBlock),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Program {
  pub nodes: Vec<ProgramNode>,
}

impl Program {
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// 展开循环后实际执行的命令数
  pub fn command_count(&self) -> usize {
    self
      .nodes
      .iter()
      .map(|node| match node {
        ProgramNode::Command(_) => 1,
        ProgramNode::Loop(block) => block.body.len() * block.repeat_count as usize,
      })
      .sum()
  }
}

/// 同一物理行的积木，已按从左到右排序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
  pub items: Vec<Detection>,
}

impl Line {
  pub fn tokens(&self) -> Vec<Token> {
    self.items.iter().map(|d| d.token).collect()
  }

  pub fn labels(&self) -> Vec<&'static str> {
    self.items.iter().map(Detection::label).collect()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct CompilerConfig {
  pub line_tolerance: f32,
  pub loop_repeat_count: u32,
}

impl Default for CompilerConfig {
  fn default() -> Self {
    CompilerConfig {
      line_tolerance: LINE_TOLERANCE,
      loop_repeat_count: DEFAULT_LOOP_REPEAT,
    }
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
  config: CompilerConfig,
}

impl Compiler {
  pub fn new(config: CompilerConfig) -> Self {
    Compiler { config }
  }

  pub fn line_tolerance(mut self, tolerance: f32) -> Self {
    self.config.line_tolerance = tolerance;
    self
  }

  pub fn loop_repeat_count(mut self, count: u32) -> Self {
    self.config.loop_repeat_count = count.max(1);
    self
  }

  pub fn config(&self) -> CompilerConfig {
    self.config
  }

  /// 将一次拍照的检测结果编译为程序
  pub fn compile(&self, detections: &[Detection]) -> Program {
    let lines = group_lines(detections, self.config.line_tolerance);
    debug!("{} 个积木分为 {} 行", detections.len(), lines.len());
    for (idx, line) in lines.iter().enumerate() {
      debug!("第 {} 行: {:?}", idx + 1, line.labels());
    }
    let token_lines: Vec<Vec<Token>> = lines.iter().map(Line::tokens).collect();
    self.compile_tokens(&token_lines)
  }

  /// 将已分好行的符号序列编译为程序
  pub fn compile_tokens<L: AsRef<[Token]>>(&self, lines: &[L]) -> Program {
    let statements: Vec<Statement> = lines.iter().map(|l| parse_line(l.as_ref())).collect();
    let program = fold_loops(statements, self.config.loop_repeat_count);
    debug!(
      "编译完成: {} 个节点, 展开后 {} 条命令",
      program.len(),
      program.command_count()
    );
    program
  }
}

mod group;
mod parse;
pub use self::group::group_lines;
pub use self::parse::{Statement, fold_loops, parse_line};
