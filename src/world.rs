// 该文件是 Bloco （积木编程） 项目的一部分。
// src/world.rs - 网格关卡世界
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

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::agent::{AgentState, World};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CellParseError {
  #[error("格子坐标格式错误: {0}，应为 x,y")]
  Malformed(String),
}

/// 解析 `x,y` 形式的格子坐标
pub fn parse_cell(text: &str) -> Result<(i32, i32), CellParseError> {
  let malformed = || CellParseError::Malformed(text.to_string());
  let (x, y) = text.split_once(',').ok_or_else(malformed)?;
  let x = x.trim().parse().map_err(|_| malformed())?;
  let y = y.trim().parse().map_err(|_| malformed())?;
  Ok((x, y))
}

/// 关卡网格：边界、障碍、可收集物与终点
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
  width: i32,
  height: i32,
  blocked: HashSet<(i32, i32)>,
  collectibles: HashSet<(i32, i32)>,
  collected: Vec<(i32, i32)>,
  goal: Option<(i32, i32)>,
}

/// 执行结束后的关卡结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelOutcome {
  pub collected: Vec<(i32, i32)>,
  pub remaining: usize,
  pub goal_reached: bool,
}

impl GridWorld {
  pub fn new(width: i32, height: i32) -> Self {
    GridWorld {
      width,
      height,
      ..Default::default()
    }
  }

  pub fn with_blocked<I: IntoIterator<Item = (i32, i32)>>(mut self, cells: I) -> Self {
    self.blocked.extend(cells);
    self
  }

  pub fn with_collectibles<I: IntoIterator<Item = (i32, i32)>>(mut self, cells: I) -> Self {
    self.collectibles.extend(cells);
    self
  }

  pub fn with_goal(mut self, goal: (i32, i32)) -> Self {
    self.goal = Some(goal);
    self
  }

  pub fn in_bounds(&self, x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && x < self.width && y < self.height
  }

  pub fn collected(&self) -> &[(i32, i32)] {
    &self.collected
  }

  pub fn outcome(&self, agent: &AgentState) -> LevelOutcome {
    let goal_reached = self
      .goal
      .is_some_and(|goal| goal == (agent.grid_x, agent.grid_y));
    LevelOutcome {
      collected: self.collected.clone(),
      remaining: self.collectibles.len(),
      goal_reached,
    }
  }
}

impl World for GridWorld {
  fn check_collision(&self, x: i32, y: i32) -> bool {
    self.in_bounds(x, y) && !self.blocked.contains(&(x, y))
  }

  fn collect_at(&mut self, x: i32, y: i32) {
    if self.collectibles.remove(&(x, y)) {
      info!("在 ({}, {}) 收集到物品，剩余 {}", x, y, self.collectibles.len());
      self.collected.push((x, y));
    } else {
      debug!("({}, {}) 没有可收集物", x, y);
    }
  }
}
