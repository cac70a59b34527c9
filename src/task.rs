// 该文件是 Bloco （积木编程） 项目的一部分。
// src/task.rs - 任务执行
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

use std::{thread, time::Duration};
use tracing::{info, warn};

use crate::{
  agent::{Agent, World},
  compiler::{Compiler, Program},
  interpreter::{CancelToken, ExecutionReport, Interpreter, Pacer},
  model::{DetectResult, Model},
  output::Render,
  snapshot::SnapshotCell,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 第一个 `Ctrl-C` 拍照并停止检测循环，之后的 `Ctrl-C` 取消正在执行的程序
pub fn install_interrupt_handler(
  snapshot: SnapshotCell,
  cancel: CancelToken,
) -> Result<(), ctrlc::Error> {
  ctrlc::set_handler(move || {
    if !snapshot.is_stopped() {
      info!("收到中断信号，停止检测循环...");
      snapshot.stop();
      return;
    }
    warn!("收到中断信号，取消程序执行...");
    cancel.cancel();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始解码...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("解码完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 检测循环
///
/// 每一帧解码、抑制后写入快照。快照被停止、取消标记被置位、输入耗尽或达到
/// 帧数上限时退出。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  tick: Option<Duration>,
  snapshot: SnapshotCell,
  cancel: CancelToken,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_tick(mut self, tick: Option<Duration>) -> Self {
    self.tick = tick;
    self
  }

  pub fn with_snapshot(mut self, snapshot: SnapshotCell) -> Self {
    self.snapshot = snapshot;
    self
  }

  pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn snapshot(&self) -> SnapshotCell {
    self.snapshot.clone()
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = DetectResult, Error = ME>,
  O: Render<F, DetectResult, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始检测循环...");
    let mut frame_index = 0;
    let mut now = std::time::Instant::now();
    for frame in input {
      if self.cancel.is_cancelled() {
        warn!("取消信号接收，退出检测循环");
        break;
      }
      if self.snapshot.is_stopped() {
        info!("快照已冻结，退出检测循环");
        break;
      }

      frame_index += 1;
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      info!(
        "第 {} 帧: {} 个积木，耗时: {:.2?} / {:.2?}",
        frame_index,
        result.len(),
        elapsed_a,
        elapsed_b
      );
      if !self.snapshot.publish(frame_index, result) {
        info!("快照已冻结，丢弃第 {} 帧并退出检测循环", frame_index);
        break;
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出检测循环", frame_index);
        break;
      }
      if let Some(tick) = self.tick {
        thread::sleep(tick);
      }
      now = std::time::Instant::now();
    }

    info!("检测循环结束");
    Ok(())
  }
}

/// 拍照后编译并执行程序
pub struct ProgramTask<P, W> {
  compiler: Compiler,
  interpreter: Interpreter<P>,
  agent: Agent,
  world: W,
}

impl<P: Pacer, W: World> ProgramTask<P, W> {
  pub fn new(compiler: Compiler, interpreter: Interpreter<P>, agent: Agent, world: W) -> Self {
    ProgramTask {
      compiler,
      interpreter,
      agent,
      world,
    }
  }

  pub fn agent(&self) -> &Agent {
    &self.agent
  }

  pub fn world(&self) -> &W {
    &self.world
  }

  pub fn into_parts(self) -> (Agent, W) {
    (self.agent, self.world)
  }

  /// 冻结快照并执行其中的程序
  pub fn capture_and_run<O, RE>(
    &mut self,
    snapshot: &SnapshotCell,
    output: &O,
  ) -> Result<(Program, ExecutionReport), anyhow::Error>
  where
    O: Render<Program, ExecutionReport, Error = RE>,
    RE: std::error::Error + Sync + Send + 'static,
  {
    let captured = snapshot.capture();
    info!(
      "拍照: 第 {} 帧，{} 个积木",
      captured.frame_index,
      captured.result.len()
    );

    let program = self.compiler.compile(&captured.result.items);
    if program.is_empty() {
      warn!("快照中没有可执行的程序");
    }
    let report = self
      .interpreter
      .run(&program, &mut self.agent, &mut self.world);
    output.render_result(&program, &report)?;

    Ok((program, report))
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible};

  use super::*;
  use crate::{
    agent::Heading,
    frame::RawTensor,
    interpreter::NoPacing,
    model::{BlockDetector, Detection},
    vocab::Token,
    world::GridWorld,
  };

  #[derive(Default)]
  struct CountingOutput {
    frames: RefCell<usize>,
    programs: RefCell<Vec<Program>>,
  }

  impl Render<RawTensor, DetectResult> for CountingOutput {
    type Error = Infallible;

    fn render_result(&self, _frame: &RawTensor, _result: &DetectResult) -> Result<(), Infallible> {
      *self.frames.borrow_mut() += 1;
      Ok(())
    }
  }

  impl Render<Program, ExecutionReport> for CountingOutput {
    type Error = Infallible;

    fn render_result(&self, frame: &Program, _result: &ExecutionReport) -> Result<(), Infallible> {
      self.programs.borrow_mut().push(frame.clone());
      Ok(())
    }
  }

  fn walk_frame() -> RawTensor {
    let mut data = vec![0.0; 24];
    data[..4].copy_from_slice(&[100.0, 100.0, 20.0, 20.0]);
    // andar
    data[4] = 0.9;
    RawTensor::anchor_major(data, 1)
  }

  #[test]
  fn continuous_task_respects_frame_number() {
    let output = CountingOutput::default();
    let snapshot = SnapshotCell::new();
    let frames = std::iter::repeat_with(walk_frame).take(10);

    ContinuousTask::default()
      .with_frame_number(Some(3))
      .with_snapshot(snapshot.clone())
      .run_task(frames, BlockDetector::default(), &output)
      .unwrap();

    assert_eq!(*output.frames.borrow(), 3);
    let captured = snapshot.capture();
    assert_eq!(captured.frame_index, 3);
    assert_eq!(captured.result.len(), 1);
  }

  #[test]
  fn stopped_snapshot_ends_loop_before_first_frame() {
    let output = CountingOutput::default();
    let snapshot = SnapshotCell::new();
    snapshot.stop();

    ContinuousTask::default()
      .with_snapshot(snapshot)
      .run_task(std::iter::repeat_with(walk_frame), BlockDetector::default(), &output)
      .unwrap();

    assert_eq!(*output.frames.borrow(), 0);
  }

  #[test]
  fn cancelled_loop_does_not_publish() {
    let output = CountingOutput::default();
    let snapshot = SnapshotCell::new();
    let cancel = CancelToken::new();
    cancel.cancel();

    ContinuousTask::default()
      .with_snapshot(snapshot.clone())
      .with_cancel_token(cancel)
      .run_task(std::iter::repeat_with(walk_frame), BlockDetector::default(), &output)
      .unwrap();

    assert!(snapshot.capture().result.is_empty());
  }

  #[test]
  fn one_shot_requires_a_frame() {
    let output = CountingOutput::default();
    let result = OneShotTask.run_task(
      std::iter::empty::<RawTensor>(),
      BlockDetector::default(),
      &output,
    );
    assert!(result.is_err());
  }

  #[test]
  fn capture_runs_frozen_program() {
    let snapshot = SnapshotCell::new();
    let walk = Detection {
      center_x: 100.0,
      center_y: 100.0,
      width: 20.0,
      height: 20.0,
      score: 0.9,
      class_id: 0,
      token: Token::Walk,
    };
    snapshot.publish(1, DetectResult::from(vec![walk]));

    let output = CountingOutput::default();
    let mut task = ProgramTask::new(
      Compiler::default(),
      Interpreter::new(NoPacing),
      Agent::new(0, 1, Heading::Up),
      GridWorld::new(3, 3),
    );
    let (program, report) = task.capture_and_run(&snapshot, &output).unwrap();

    assert_eq!(program.command_count(), 1);
    assert_eq!(report.commands_executed, 1);
    assert_eq!(task.agent().position(), (0, 0));
    assert!(snapshot.is_stopped());
    assert_eq!(output.programs.borrow().len(), 1);
  }
}
