// 该文件是 Bloco （积木编程） 项目的一部分。
// src/compiler/parse.rs - 行解析与循环折叠
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
  agent::Heading,
  compiler::{Action, LoopBlock, ParsedCommand, Program, ProgramNode},
  vocab::Token,
};

/// 单行的解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
  Command(ParsedCommand),
  /// looping，附带该行的倍数积木
  LoopStart {
    repeat: Option<u32>,
    direction: Option<Heading>,
  },
  /// inicio：开头时为起始标记，循环中为循环结束
  Start,
}

/// 解析一行积木
///
/// 动作（含控制积木）、方向、倍数各取该行最后出现的一个，装饰积木忽略。
pub fn parse_line(tokens: &[Token]) -> Statement {
  let mut opcode: Option<Token> = None;
  let mut direction = None;
  let mut multiplier: Option<u32> = None;

  for token in tokens {
    match token {
      Token::Walk | Token::Jump | Token::PickUp | Token::Start | Token::Loop => {
        opcode = Some(*token)
      }
      Token::Arrow(heading) => direction = Some(*heading),
      Token::Digit(n) => multiplier = Some(u32::from(*n)),
      Token::Circle | Token::Triangle | Token::Sleep => {}
    }
  }

  let action = match opcode {
    Some(Token::Start) => return Statement::Start,
    Some(Token::Loop) => {
      return Statement::LoopStart {
        repeat: multiplier,
        direction,
      };
    }
    Some(Token::Walk) => Action::Walk,
    Some(Token::Jump) => Action::Jump,
    Some(Token::PickUp) => Action::Pickup,
    _ => Action::None,
  };

  Statement::Command(ParsedCommand {
    action,
    direction,
    count: multiplier.unwrap_or(1),
  })
}

/// 将逐行语句折叠为程序
///
/// looping 之后的行收入循环体，直到遇到 inicio 或输入结束。循环体外的
/// inicio（开头的起始标记或多余的标记）一律跳过。
pub fn fold_loops(statements: Vec<Statement>, default_repeat: u32) -> Program {
  let mut nodes = Vec::new();
  let mut open: Option<LoopBlock> = None;

  for (idx, statement) in statements.into_iter().enumerate() {
    match statement {
      Statement::Start => match open.take() {
        Some(block) => {
          debug!("第 {} 行结束循环, 循环体 {} 条命令", idx + 1, block.body.len());
          nodes.push(ProgramNode::Loop(block));
        }
        None if idx == 0 => debug!("跳过起始标记"),
        None => debug!("第 {} 行的 inicio 不在循环中，忽略", idx + 1),
      },
      Statement::LoopStart { repeat, direction } => match open.as_mut() {
        Some(block) => {
          warn!("第 {} 行的 looping 出现在循环中，循环不能嵌套，按空命令处理", idx + 1);
          block.body.push(ParsedCommand {
            action: Action::None,
            direction,
            count: repeat.unwrap_or(1),
          });
        }
        None => {
          open = Some(LoopBlock {
            repeat_count: repeat.unwrap_or(default_repeat).max(1),
            body: Vec::new(),
          });
        }
      },
      Statement::Command(command) => match open.as_mut() {
        Some(block) => block.body.push(command),
        None => nodes.push(ProgramNode::Command(command)),
      },
    }
  }

  if let Some(block) = open {
    debug!("循环未闭合，在输入结束处隐式结束");
    nodes.push(ProgramNode::Loop(block));
  }

  Program { nodes }
}
