use clap::Parser;
use evaluation::Cli;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut cmd: Cli = Cli::parse();
    cmd.run_program()
}
