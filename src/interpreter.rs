// 该文件是 Bloco （积木编程） 项目的一部分。
// src/interpreter.rs - 积木程序解释器
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

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  agent::{Agent, AgentState, Motion, MotionKind, MotionOutcome, World},
  compiler::{Action, ParsedCommand, Program, ProgramNode},
};

/// 拾取动作后的等待
pub const PICKUP_DELAY: Duration = Duration::from_millis(300);
/// 两条命令之间的间隔
pub const COMMAND_DELAY: Duration = Duration::from_millis(150);

/// 协作式取消标记，克隆后共享同一状态
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }
}

/// 节奏控制
///
/// 动作完成与命令间隔都通过它等待，交互场景下真实休眠，测试中可为零。
pub trait Pacer {
  fn wait(&mut self, duration: Duration);
}

/// 真实休眠
#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimePacer;

impl Pacer for RealtimePacer {
  fn wait(&mut self, duration: Duration) {
    if !duration.is_zero() {
      thread::sleep(duration);
    }
  }
}

/// 不等待
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
  fn wait(&mut self, _duration: Duration) {}
}

#[derive(Debug, Clone, Copy)]
pub struct InterpreterConfig {
  pub pickup_delay: Duration,
  pub command_delay: Duration,
}

impl Default for InterpreterConfig {
  fn default() -> Self {
    InterpreterConfig {
      pickup_delay: PICKUP_DELAY,
      command_delay: COMMAND_DELAY,
    }
  }
}

/// 执行报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
  pub commands_executed: usize,
  pub blocked_walks: usize,
  pub voided_jumps: usize,
  pub rejected_motions: usize,
  pub pickups: usize,
  pub cancelled: bool,
  pub motions: Vec<Motion>,
  pub final_state: Option<AgentState>,
}

pub struct Interpreter<P> {
  config: InterpreterConfig,
  pacer: P,
  cancel: CancelToken,
}

impl<P: Pacer> Interpreter<P> {
  pub fn new(pacer: P) -> Self {
    Interpreter {
      config: InterpreterConfig::default(),
      pacer,
      cancel: CancelToken::new(),
    }
  }

  pub fn with_config(mut self, config: InterpreterConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  pub fn pacer(&self) -> &P {
    &self.pacer
  }

  /// 顺序执行程序
  ///
  /// 受阻的前进和作废的跳跃只影响当前命令，程序继续执行。取消标记在每个
  /// 节点和每次循环迭代开始前检查。
  pub fn run<W: World>(
    &mut self,
    program: &Program,
    agent: &mut Agent,
    world: &mut W,
  ) -> ExecutionReport {
    info!("开始执行程序，共 {} 个节点", program.len());
    let mut report = ExecutionReport::default();

    'nodes: for (idx, node) in program.nodes.iter().enumerate() {
      if self.cancel.is_cancelled() {
        warn!("程序在第 {} 个节点前被取消", idx + 1);
        report.cancelled = true;
        break;
      }

      match node {
        ProgramNode::Command(cmd) => self.execute(cmd, agent, world, &mut report),
        ProgramNode::Loop(block) => {
          for round in 0..block.repeat_count {
            if self.cancel.is_cancelled() {
              warn!("循环在第 {}/{} 次迭代前被取消", round + 1, block.repeat_count);
              report.cancelled = true;
              break 'nodes;
            }
            debug!("循环迭代 {}/{}", round + 1, block.repeat_count);
            for cmd in block.body.iter() {
              self.execute(cmd, agent, world, &mut report);
            }
          }
        }
      }
    }

    report.final_state = Some(agent.state());
    info!(
      "执行结束: {} 条命令, 位置 {:?}, 朝向 {:?}",
      report.commands_executed,
      agent.position(),
      agent.heading()
    );
    report
  }

  fn execute<W: World>(
    &mut self,
    cmd: &ParsedCommand,
    agent: &mut Agent,
    world: &mut W,
    report: &mut ExecutionReport,
  ) {
    debug!("执行命令: {:?}", cmd);

    if let Some(direction) = cmd.direction {
      let motion = agent.face(direction);
      self.settle(motion, agent, report);
    }

    match cmd.action {
      Action::Walk => {
        let motion = agent.move_forward(cmd.count, world);
        self.settle(motion, agent, report);
      }
      Action::Jump => {
        let motion = agent.jump(cmd.count, world);
        self.settle(motion, agent, report);
      }
      Action::Pickup => {
        let (x, y) = agent.position();
        world.collect_at(x, y);
        report.pickups += 1;
        self.pacer.wait(self.config.pickup_delay);
      }
      Action::None => {}
    }

    self.pacer.wait(self.config.command_delay);
    report.commands_executed += 1;
  }

  /// 等待动作完成并确认
  fn settle(&mut self, motion: Motion, agent: &mut Agent, report: &mut ExecutionReport) {
    match (motion.kind, motion.outcome) {
      (_, MotionOutcome::Rejected) => {
        report.rejected_motions += 1;
      }
      (MotionKind::Walk, MotionOutcome::Partial { entered }) => {
        warn!(
          "前进受阻: 从 {:?} 只走了 {} 格到 {:?}",
          motion.from, entered, motion.to
        );
        report.blocked_walks += 1;
      }
      (MotionKind::Jump, MotionOutcome::Voided) => {
        warn!("跳跃落点不可通行，停留在 {:?}", motion.from);
        report.voided_jumps += 1;
      }
      _ => {}
    }

    if !motion.is_rejected() {
      self.pacer.wait(motion.duration);
    }
    agent.complete(&motion);
    report.motions.push(motion);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{agent::Heading, compiler::LoopBlock};

  struct OpenWorld {
    collected: Vec<(i32, i32)>,
  }

  impl World for OpenWorld {
    fn check_collision(&self, _x: i32, _y: i32) -> bool {
      true
    }

    fn collect_at(&mut self, x: i32, y: i32) {
      self.collected.push((x, y));
    }
  }

  #[derive(Default)]
  struct RecordingPacer {
    waits: Vec<Duration>,
  }

  impl Pacer for RecordingPacer {
    fn wait(&mut self, duration: Duration) {
      self.waits.push(duration);
    }
  }

  fn command(action: Action) -> ProgramNode {
    ProgramNode::Command(ParsedCommand::new(action))
  }

  #[test]
  fn pickup_collects_at_agent_position() {
    let mut world = OpenWorld { collected: vec![] };
    let mut agent = Agent::new(2, 3, Heading::Up);
    let program = Program {
      nodes: vec![command(Action::Pickup)],
    };
    let report = Interpreter::new(NoPacing).run(&program, &mut agent, &mut world);
    assert_eq!(world.collected, vec![(2, 3)]);
    assert_eq!(report.pickups, 1);
    assert_eq!(report.commands_executed, 1);
  }

  #[test]
  fn none_action_only_waits_between_commands() {
    let mut world = OpenWorld { collected: vec![] };
    let mut agent = Agent::new(0, 0, Heading::Up);
    let program = Program {
      nodes: vec![command(Action::None)],
    };
    let mut interpreter = Interpreter::new(RecordingPacer::default());
    let report = interpreter.run(&program, &mut agent, &mut world);
    assert_eq!(interpreter.pacer().waits, vec![COMMAND_DELAY]);
    assert!(report.motions.is_empty());
    assert_eq!(agent.state().heading, Heading::Up);
  }

  #[test]
  fn cancelled_token_stops_before_next_node() {
    let mut world = OpenWorld { collected: vec![] };
    let mut agent = Agent::new(0, 0, Heading::Right);
    let program = Program {
      nodes: vec![command(Action::Walk), command(Action::Walk)],
    };
    let mut interpreter = Interpreter::new(NoPacing);
    interpreter.cancel_token().cancel();
    let report = interpreter.run(&program, &mut agent, &mut world);
    assert!(report.cancelled);
    assert_eq!(report.commands_executed, 0);
    assert_eq!(agent.position(), (0, 0));
  }

  #[test]
  fn walk_waits_for_motion_then_delay() {
    let mut world = OpenWorld { collected: vec![] };
    let mut agent = Agent::new(0, 0, Heading::Right);
    let program = Program {
      nodes: vec![ProgramNode::Command(
        ParsedCommand::new(Action::Walk).facing(Heading::Down).times(2),
      )],
    };
    let mut interpreter = Interpreter::new(RecordingPacer::default());
    interpreter.run(&program, &mut agent, &mut world);
    assert_eq!(agent.position(), (0, 2));
    assert!(!agent.is_busy());
    assert_eq!(
      interpreter.pacer().waits,
      vec![
        crate::agent::TURN_DURATION,
        crate::agent::STEP_DURATION * 2,
        COMMAND_DELAY
      ]
    );
  }

  /// 第一次进入格子时触发取消
  struct CancellingWorld {
    cancel: CancelToken,
    entered: usize,
  }

  impl World for CancellingWorld {
    fn check_collision(&self, _x: i32, _y: i32) -> bool {
      true
    }

    fn collect_at(&mut self, _x: i32, _y: i32) {
      self.entered += 1;
      self.cancel.cancel();
    }
  }

  #[test]
  fn cancel_during_loop_stops_before_next_iteration() {
    let mut interpreter = Interpreter::new(NoPacing);
    let mut world = CancellingWorld {
      cancel: interpreter.cancel_token(),
      entered: 0,
    };
    let mut agent = Agent::new(0, 0, Heading::Right);
    let program = Program {
      nodes: vec![
        ProgramNode::Loop(LoopBlock {
          repeat_count: 3,
          body: vec![ParsedCommand::new(Action::Walk)],
        }),
        command(Action::Walk),
      ],
    };

    let report = interpreter.run(&program, &mut agent, &mut world);

    assert!(report.cancelled);
    assert_eq!(report.commands_executed, 1);
    assert_eq!(world.entered, 1);
    assert_eq!(agent.position(), (1, 0));
    assert!(!agent.is_busy());
  }

  #[test]
  fn pickup_waits_before_command_delay() {
    let mut world = OpenWorld { collected: vec![] };
    let mut agent = Agent::new(1, 1, Heading::Up);
    let program = Program {
      nodes: vec![command(Action::Pickup)],
    };
    let mut interpreter = Interpreter::new(RecordingPacer::default());
    interpreter.run(&program, &mut agent, &mut world);
    assert_eq!(interpreter.pacer().waits, vec![PICKUP_DELAY, COMMAND_DELAY]);
  }
}
