use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vitalcare", version, about = "AI-assisted medical image analysis server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Run(RunArgs),
}

/// Overrides applied on top of the environment configuration.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    #[arg(long)]
    pub port: Option<u16>,

    /// Analyses allowed per session within one window
    #[arg(long)]
    pub quota: Option<u32>,

    /// Length of the rate-limit window in seconds
    #[arg(long)]
    pub window_secs: Option<u64>,

    /// Gemini model name
    #[arg(long)]
    pub model: Option<String>,
}

impl Cli {
    pub fn run_args(self) -> RunArgs {
        match self.command {
            Some(Command::Run(args)) => args,
            None => RunArgs::default(),
        }
    }
}
