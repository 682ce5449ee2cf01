//! `ts-cli`: compile a script, launch the VM, and tick it to completion
//! (§6.1).

mod args;
mod config;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use args::Args;
use config::FileConfig;
use ts_core::VmConfig;
use ts_runtime::Vm;

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    match run(args) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).without_time().init();
}

fn run(args: Args) -> anyhow::Result<()> {
    let script_dir = args.script.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_config = FileConfig::load(script_dir).context("loading ts.toml")?;

    let heap_ceiling = args.heap_size.or(file_config.heap_size).unwrap_or_else(|| VmConfig::default().heap_ceiling);
    let gc_interval_ms = args.surgescript_gc_interval.or(file_config.surgescript_gc_interval).unwrap_or(1000);
    let config = VmConfig { heap_ceiling, ..VmConfig::default() }.with_gc_interval_ms_clamped(gc_interval_ms);

    let mut argv = file_config.args;
    argv.extend(args.extra_args);

    let mut vm = Vm::new(config);
    vm.compile_file(&args.script).with_context(|| format!("compiling {}", args.script.display()))?;
    vm.launch(&argv).context("launching the VM")?;
    info!(script = %args.script.display(), "launched");

    let tick = Duration::from_millis(16);
    loop {
        let keep_running = vm.update(tick, |_, _| {}, |_, _| {}).context("running a VM tick")?;
        if !keep_running {
            break;
        }
        std::thread::sleep(tick);
    }

    info!("exited cleanly");
    Ok(())
}
