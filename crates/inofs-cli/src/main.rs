mod cli;
mod mount;
mod shell;

use std::io::{self, IsTerminal};

use clap::Parser;
use inofs_rs::{BlockDevice, VolumeFs};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, ShellConfig};
use crate::shell::Shell;

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so command output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.shell_config(io::stdin().is_terminal());

    if cli.memory {
        run_shell(mount::open_memory(cli.geometry())?, config)
    } else {
        run_shell(mount::open_image(&cli.image, cli.geometry())?, config)
    }
}

fn run_shell<D: BlockDevice>(fs: VolumeFs<D>, config: ShellConfig) -> anyhow::Result<()> {
    let mut shell = Shell::new(fs, config);
    shell.run(io::stdin().lock(), &mut io::stdout().lock(), &mut io::stderr().lock())
}
