//! Build script for the `stratus` manual pages.
//!
//! Renders `stratus.1`, which carries the configuration summary, plus one
//! page per subcommand (`stratus-provision.1`, `stratus-teardown.1`) into the
//! build output directory for packaging.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(
    out_dir: &Path,
    file_name: &str,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    fs::write(out_dir.join(file_name), buffer)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR was not set")?);

    let command = Cli::command();
    for subcommand in command.get_subcommands() {
        let page = format!("stratus-{}", subcommand.get_name());
        render(&out_dir, &format!("{page}.1"), subcommand.clone().name(page))?;
    }
    render(&out_dir, "stratus.1", command)
}
