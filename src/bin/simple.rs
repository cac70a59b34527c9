// 该文件是 Bloco （积木编程） 项目的一部分。
// src/bin/simple.rs - 单帧解码测试代码
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
  model::{BlockDetector, PREVIEW_SCORE_THRESHOLD},
  task::{OneShotTask, Task},
};
use tracing::info;

/// 对单帧检测器输出做解码与 NMS
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "log://?verbose")]
  pub output: Url,
  /// 使用实时预览阈值
  #[arg(long)]
  pub preview: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut model = BlockDetector::default();
  let input = bloco::input::InputWrapper::from_url(&args.input)?
    .with_classes(model.vocabulary().num_classes())?;
  let output = bloco::output::OutputWrapper::from_url(&args.output)?;
  if args.preview {
    model = model.score_threshold(PREVIEW_SCORE_THRESHOLD);
  }

  OneShotTask.run_task(input.into_frames(), model, output)?;

  Ok(())
}
