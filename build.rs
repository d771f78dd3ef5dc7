//! Build script that renders the `snapctl(1)` manual page into `OUT_DIR`.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

const MANUAL_NAME: &str = "snapctl.1";

fn render_manual(target: &Path) -> io::Result<()> {
    let command = cli::Cli::command().version(env!("CARGO_PKG_VERSION"));
    let mut page = Vec::new();
    Man::new(command)
        .title("SNAPCTL")
        .section("1")
        .manual("snapctl manual")
        .render(&mut page)?;
    fs::write(target, page)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout();
    for watched in ["build.rs", "src/cli/mod.rs"] {
        writeln!(stdout, "cargo:rerun-if-changed={watched}")?;
    }

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR is not set"))?;
    render_manual(&out_dir.join(MANUAL_NAME))?;
    Ok(())
}
