use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "evaluation")]
#[command(about = "评估三维肝脏分割模型并渲染预测动画的工具集.")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 子命令。
    #[command(subcommand)]
    pub(crate) command: Commands,
}

impl Cli {
    pub fn run_program(&mut self) -> anyhow::Result<()> {
        match self.command {
            Commands::Evaluate(ref mut v) => v.run(),
            Commands::Nii2gif(ref mut v) => v.run(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// 加载模型权重，评估扫描与标注对，输出Dice、召回率、精确率与GIF动画。
    Evaluate(crate::subcmd_impls::evaluate::Evaluate),
    /// 把单个nii文件按评估时的预处理流程渲染为GIF。
    Nii2gif(crate::subcmd_impls::nii2gif::Nii2gif),
}
