// 该文件是 Bloco （积木编程） 项目的一部分。
// src/agent.rs - 网格机器人状态机
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

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

/// 单格移动动画时长
pub const STEP_DURATION: Duration = Duration::from_millis(500);
/// 转向等待时长
pub const TURN_DURATION: Duration = Duration::from_millis(250);

/// 朝向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Heading {
  Up,
  Right,
  Down,
  Left,
}

impl Heading {
  /// 网格坐标增量，y 轴向下
  pub fn delta(self) -> (i32, i32) {
    match self {
      Heading::Up => (0, -1),
      Heading::Right => (1, 0),
      Heading::Down => (0, 1),
      Heading::Left => (-1, 0),
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "up" | "north" => Some(Heading::Up),
      "right" | "east" => Some(Heading::Right),
      "down" | "south" => Some(Heading::Down),
      "left" | "west" => Some(Heading::Left),
      _ => None,
    }
  }
}

/// 宿主世界
///
/// 碰撞判定与收集回调都由宿主实现。`check_collision` 返回 `true` 表示可通行，
/// 且不得有副作用。
pub trait World {
  fn check_collision(&self, x: i32, y: i32) -> bool;
  fn collect_at(&mut self, x: i32, y: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentState {
  pub grid_x: i32,
  pub grid_y: i32,
  pub heading: Heading,
  pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotionKind {
  Turn,
  Walk,
  Jump,
}

/// 动作结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotionOutcome {
  /// 全部完成
  Completed,
  /// 中途受阻，保留已走过的格子
  Partial { entered: u32 },
  /// 落点不可通行，跳跃作废
  Voided,
  /// 机器人正忙，命令被忽略
  Rejected,
}

/// 一次动作的完成记录
///
/// 网格状态在动作开始时即已更新；`duration` 只供表现层决定等待多久。
/// 被接受的移动和跳跃会让机器人保持忙碌，直到调用 [`Agent::complete`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[must_use]
pub struct Motion {
  pub kind: MotionKind,
  pub from: (i32, i32),
  pub to: (i32, i32),
  pub outcome: MotionOutcome,
  #[serde(serialize_with = "serialize_millis")]
  pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_u64(d.as_millis() as u64)
}

impl Motion {
  fn rejected(kind: MotionKind, at: (i32, i32)) -> Self {
    Motion {
      kind,
      from: at,
      to: at,
      outcome: MotionOutcome::Rejected,
      duration: Duration::ZERO,
    }
  }

  pub fn is_rejected(&self) -> bool {
    self.outcome == MotionOutcome::Rejected
  }
}

/// 动作时长配置
#[derive(Debug, Clone, Copy)]
pub struct MotionTiming {
  pub step: Duration,
  pub turn: Duration,
}

impl Default for MotionTiming {
  fn default() -> Self {
    MotionTiming {
      step: STEP_DURATION,
      turn: TURN_DURATION,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Agent {
  state: AgentState,
  timing: MotionTiming,
}

impl Agent {
  pub fn new(grid_x: i32, grid_y: i32, heading: Heading) -> Self {
    Agent {
      state: AgentState {
        grid_x,
        grid_y,
        heading,
        busy: false,
      },
      timing: MotionTiming::default(),
    }
  }

  pub fn with_timing(mut self, timing: MotionTiming) -> Self {
    self.timing = timing;
    self
  }

  pub fn state(&self) -> AgentState {
    self.state
  }

  pub fn position(&self) -> (i32, i32) {
    (self.state.grid_x, self.state.grid_y)
  }

  pub fn heading(&self) -> Heading {
    self.state.heading
  }

  pub fn is_busy(&self) -> bool {
    self.state.busy
  }

  pub fn face(&mut self, heading: Heading) -> Motion {
    let at = self.position();
    if self.state.busy {
      warn!("机器人忙碌中，忽略转向 {:?}", heading);
      return Motion::rejected(MotionKind::Turn, at);
    }

    debug!("转向 {:?} -> {:?}", self.state.heading, heading);
    self.state.heading = heading;
    Motion {
      kind: MotionKind::Turn,
      from: at,
      to: at,
      outcome: MotionOutcome::Completed,
      duration: self.timing.turn,
    }
  }

  /// 沿当前朝向逐格前进
  ///
  /// 遇到不可通行的格子立即停下，已经走过的格子不回滚。每进入一格调用一次
  /// `collect_at`。
  pub fn move_forward<W: World>(&mut self, steps: u32, world: &mut W) -> Motion {
    let from = self.position();
    if self.state.busy {
      warn!("机器人忙碌中，忽略前进 {} 步", steps);
      return Motion::rejected(MotionKind::Walk, from);
    }

    self.state.busy = true;
    let (dx, dy) = self.state.heading.delta();
    let mut entered = 0u32;
    for _ in 0..steps {
      let (Some(next_x), Some(next_y)) = (
        self.state.grid_x.checked_add(dx),
        self.state.grid_y.checked_add(dy),
      ) else {
        debug!("坐标越界，停止前进");
        break;
      };
      if !world.check_collision(next_x, next_y) {
        debug!("前方 ({}, {}) 不可通行，停止前进", next_x, next_y);
        break;
      }
      self.state.grid_x = next_x;
      self.state.grid_y = next_y;
      world.collect_at(next_x, next_y);
      entered += 1;
    }

    let outcome = if entered == steps {
      MotionOutcome::Completed
    } else {
      MotionOutcome::Partial { entered }
    };
    Motion {
      kind: MotionKind::Walk,
      from,
      to: self.position(),
      outcome,
      duration: self.timing.step.saturating_mul(entered),
    }
  }

  /// 跳跃，落点比请求步数多一格，中间格子不做碰撞检测
  pub fn jump<W: World>(&mut self, steps: u32, world: &mut W) -> Motion {
    let from = self.position();
    if self.state.busy {
      warn!("机器人忙碌中，忽略跳跃 {} 步", steps);
      return Motion::rejected(MotionKind::Jump, from);
    }

    let voided = Motion {
      kind: MotionKind::Jump,
      from,
      to: from,
      outcome: MotionOutcome::Voided,
      duration: Duration::ZERO,
    };
    let Some((distance, landing)) = self.landing(from, steps) else {
      debug!("跳跃 {} 步超出坐标范围，跳跃作废", steps);
      return voided;
    };
    if !world.check_collision(landing.0, landing.1) {
      debug!("落点 ({}, {}) 不可通行，跳跃作废", landing.0, landing.1);
      return voided;
    }

    self.state.busy = true;
    self.state.grid_x = landing.0;
    self.state.grid_y = landing.1;
    world.collect_at(landing.0, landing.1);
    Motion {
      kind: MotionKind::Jump,
      from,
      to: landing,
      outcome: MotionOutcome::Completed,
      duration: self.timing.step.saturating_mul(distance),
    }
  }

  /// 跳跃距离与落点，坐标溢出时为 `None`
  fn landing(&self, from: (i32, i32), steps: u32) -> Option<(u32, (i32, i32))> {
    let distance = steps.checked_add(1)?;
    let reach = i32::try_from(distance).ok()?;
    let (dx, dy) = self.state.heading.delta();
    let x = from.0.checked_add(dx.checked_mul(reach)?)?;
    let y = from.1.checked_add(dy.checked_mul(reach)?)?;
    Some((distance, (x, y)))
  }

  /// 确认动作完成，解除忙碌
  pub fn complete(&mut self, motion: &Motion) {
    if motion.is_rejected() {
      return;
    }
    self.state.busy = false;
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[derive(Default)]
  struct TestWorld {
    blocked: HashSet<(i32, i32)>,
    collected: Vec<(i32, i32)>,
  }

  impl World for TestWorld {
    fn check_collision(&self, x: i32, y: i32) -> bool {
      !self.blocked.contains(&(x, y))
    }

    fn collect_at(&mut self, x: i32, y: i32) {
      self.collected.push((x, y));
    }
  }

  #[test]
  fn walk_collects_every_entered_cell() {
    let mut world = TestWorld::default();
    let mut agent = Agent::new(0, 0, Heading::Down);
    let motion = agent.move_forward(3, &mut world);
    assert_eq!(motion.outcome, MotionOutcome::Completed);
    assert_eq!(agent.position(), (0, 3));
    assert_eq!(world.collected, vec![(0, 1), (0, 2), (0, 3)]);
    assert!(agent.is_busy());
    agent.complete(&motion);
    assert!(!agent.is_busy());
  }

  #[test]
  fn walk_keeps_partial_progress() {
    let mut world = TestWorld::default();
    world.blocked.insert((3, 0));
    let mut agent = Agent::new(0, 0, Heading::Right);
    let motion = agent.move_forward(5, &mut world);
    assert_eq!(motion.outcome, MotionOutcome::Partial { entered: 2 });
    assert_eq!(agent.position(), (2, 0));
    assert_eq!(motion.duration, STEP_DURATION * 2);
  }

  #[test]
  fn busy_agent_rejects_new_motion() {
    let mut world = TestWorld::default();
    let mut agent = Agent::new(0, 0, Heading::Right);
    let first = agent.move_forward(1, &mut world);
    let second = agent.jump(1, &mut world);
    assert!(second.is_rejected());
    assert_eq!(agent.position(), (1, 0));

    agent.complete(&second);
    assert!(agent.is_busy());
    agent.complete(&first);
    assert!(!agent.is_busy());
  }

  #[test]
  fn jump_skips_intermediate_obstacles() {
    let mut world = TestWorld::default();
    world.blocked.insert((0, -1));
    let mut agent = Agent::new(0, 0, Heading::Up);
    let motion = agent.jump(1, &mut world);
    assert_eq!(motion.outcome, MotionOutcome::Completed);
    assert_eq!(agent.position(), (0, -2));
    assert_eq!(world.collected, vec![(0, -2)]);
  }

  #[test]
  fn face_changes_heading_only() {
    let mut agent = Agent::new(4, 4, Heading::Up);
    let motion = agent.face(Heading::Left);
    assert_eq!(agent.heading(), Heading::Left);
    assert_eq!(agent.position(), (4, 4));
    assert!(!agent.is_busy());
    assert_eq!(motion.duration, TURN_DURATION);
  }

  #[test]
  fn heading_names() {
    assert_eq!(Heading::from_name("Right"), Some(Heading::Right));
    assert_eq!(Heading::from_name("south"), Some(Heading::Down));
    assert_eq!(Heading::from_name("diagonal"), None);
  }

  #[test]
  fn oversized_jump_is_voided() {
    let mut world = TestWorld::default();
    let mut agent = Agent::new(0, 0, Heading::Right);
    let motion = agent.jump(u32::MAX, &mut world);
    assert_eq!(motion.outcome, MotionOutcome::Voided);
    assert_eq!(agent.position(), (0, 0));
    assert!(!agent.is_busy());
    assert!(world.collected.is_empty());

    let mut agent = Agent::new(i32::MAX - 1, 0, Heading::Right);
    let motion = agent.jump(1, &mut world);
    assert_eq!(motion.outcome, MotionOutcome::Voided);
    assert_eq!(agent.position(), (i32::MAX - 1, 0));
  }

  #[test]
  fn walk_stops_at_coordinate_limit() {
    let mut world = TestWorld::default();
    let mut agent = Agent::new(i32::MAX - 1, 0, Heading::Right);
    let motion = agent.move_forward(3, &mut world);
    assert_eq!(motion.outcome, MotionOutcome::Partial { entered: 1 });
    assert_eq!(agent.position(), (i32::MAX, 0));
    agent.complete(&motion);
    assert!(!agent.is_busy());
  }
}
