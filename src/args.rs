use clap::{Parser, ValueEnum};

use trackcast::estimator::EstimationMode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera device id (index)
    #[arg(short, long, default_value = "0")]
    pub device: String,

    /// Which models to run per frame
    #[arg(short, long, value_enum, default_value_t = ModeArg::Hand)]
    pub mode: ModeArg,

    /// Override the streaming room from config
    #[arg(long)]
    pub room: Option<String>,

    /// Disable the streaming publisher
    #[arg(long, default_value_t = false)]
    pub no_stream: bool,

    /// List available cameras
    #[arg(long)]
    pub list: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Hand,
    Pose,
    Face,
    FullBody,
}

impl From<ModeArg> for EstimationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hand => EstimationMode::Hand,
            ModeArg::Pose => EstimationMode::Pose,
            ModeArg::Face => EstimationMode::Face,
            ModeArg::FullBody => EstimationMode::FullBody,
        }
    }
}
