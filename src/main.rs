// 该文件是 Bloco （积木编程） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use bloco::{
  FromUrl,
  agent::Agent,
  compiler::Compiler,
  input::InputWrapper,
  interpreter::{CancelToken, Interpreter, NoPacing, Pacer, RealtimePacer},
  model::{BlockDetector, CAPTURE_SCORE_THRESHOLD, PREVIEW_SCORE_THRESHOLD},
  output::OutputWrapper,
  snapshot::SnapshotCell,
  task::{ContinuousTask, ProgramTask, Task, install_interrupt_handler},
  vocab::ClassVocabulary,
  world::GridWorld,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let vocabulary = if args.labels.is_empty() {
    ClassVocabulary::standard().clone()
  } else {
    ClassVocabulary::from_labels(args.labels.as_slice())?
  };
  let num_classes = vocabulary.num_classes();
  info!("词表类别数: {}", num_classes);

  let default_threshold = if args.preview {
    PREVIEW_SCORE_THRESHOLD
  } else {
    CAPTURE_SCORE_THRESHOLD
  };
  let score_threshold = args.score_threshold.unwrap_or(default_threshold);
  info!("置信度阈值: {}", score_threshold);
  info!("NMS 阈值: {}", args.iou_threshold);

  let detector = BlockDetector::new(vocabulary)
    .score_threshold(score_threshold)
    .iou_threshold(args.iou_threshold);
  let input = InputWrapper::from_url(&args.input)?.with_classes(num_classes)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let snapshot = SnapshotCell::new();
  let cancel = CancelToken::new();
  install_interrupt_handler(snapshot.clone(), cancel.clone())?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_tick(args.tick_ms.map(Duration::from_millis))
    .with_snapshot(snapshot.clone())
    .with_cancel_token(cancel.clone())
    .run_task(input.into_frames(), detector, &output)?;

  if cancel.is_cancelled() {
    warn!("任务已取消，不执行程序");
    return Ok(());
  }

  let compiler = Compiler::default()
    .line_tolerance(args.line_tolerance)
    .loop_repeat_count(args.loop_repeat);
  let mut world = GridWorld::new(args.width, args.height)
    .with_blocked(args.blocked.iter().copied())
    .with_collectibles(args.collectible.iter().copied());
  if let Some(goal) = args.goal {
    world = world.with_goal(goal);
  }
  let agent = Agent::new(args.start.0, args.start.1, args.heading);

  if args.realtime {
    run_program(RealtimePacer, cancel, compiler, agent, world, &snapshot, &output)
  } else {
    run_program(NoPacing, cancel, compiler, agent, world, &snapshot, &output)
  }
}

fn run_program<P: Pacer>(
  pacer: P,
  cancel: CancelToken,
  compiler: Compiler,
  agent: Agent,
  world: GridWorld,
  snapshot: &SnapshotCell,
  output: &OutputWrapper,
) -> Result<()> {
  let interpreter = Interpreter::new(pacer).with_cancel_token(cancel);
  let mut task = ProgramTask::new(compiler, interpreter, agent, world);
  let (program, report) = task.capture_and_run(snapshot, output)?;

  let (agent, world) = task.into_parts();
  let outcome = world.outcome(&agent.state());
  info!(
    "程序 {} 条命令执行完毕，收集 {} 个物品，剩余 {} 个",
    program.command_count(),
    outcome.collected.len(),
    outcome.remaining
  );
  if outcome.goal_reached {
    info!("到达终点!");
  } else if report.cancelled {
    warn!("程序被取消");
  }

  Ok(())
}
