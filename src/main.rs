use clap::Parser;

use ferrite_seg::cli::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run_train(TrainArgs::parse())
}
