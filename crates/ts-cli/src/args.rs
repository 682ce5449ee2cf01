//! Command-line surface (§6.1): `ts-cli <script> [--heap-size N]
//! [--surgescript-gc-interval MS] [--arg KEY=VALUE ...] [-v/-q]`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ts-cli", about = "Run a treescript source file", version)]
pub struct Args {
    /// Script file to compile and run.
    pub script: PathBuf,

    /// Heap ceiling per object, in slots.
    #[arg(long)]
    pub heap_size: Option<usize>,

    /// Full-collection interval, clamped to [0, 20000] ms.
    #[arg(long)]
    pub surgescript_gc_interval: Option<u64>,

    /// Extra argument forwarded to `System.args` / `Application.args()`;
    /// repeatable.
    #[arg(long = "arg")]
    pub extra_args: Vec<String>,

    /// Increase log verbosity (stackable: `-v`, `-vv`).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all logging below `error`.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
