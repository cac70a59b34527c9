// 该文件是 Bloco （积木编程） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续检测与拍照编译
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use bloco::{
  FromUrl,
  compiler::Compiler,
  interpreter::CancelToken,
  model::BlockDetector,
  snapshot::SnapshotCell,
  task::{ContinuousTask, Task, install_interrupt_handler},
};
use tracing::info;

/// 连续检测，结束后拍照并打印编译出的程序
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let model = BlockDetector::default();
  let input = bloco::input::InputWrapper::from_url(&args.input)?
    .with_classes(model.vocabulary().num_classes())?;
  let output = bloco::output::OutputWrapper::from_url(&args.output)?;
  let snapshot = SnapshotCell::new();
  install_interrupt_handler(snapshot.clone(), CancelToken::new())?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_snapshot(snapshot.clone())
    .run_task(input.into_frames(), model, output)?;

  let captured = snapshot.capture();
  let program = Compiler::default().compile(&captured.result.items);
  info!(
    "第 {} 帧拍照，程序:\n{}",
    captured.frame_index,
    serde_json::to_string_pretty(&program)?
  );

  Ok(())
}
