//! Small helpers shared across CLI tests.
//!
//! The tests write pipe, rainfall, and diameter tables into a temporary
//! directory and drive the commands against them.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use tempfile::TempDir;

use super::{Cli, CliError, run_cli};

const HEADER: &str = "id,x1,y1,x2,y2,length,elev_start,elev_end,area,runoff,ks,min_slope,section,residence_time,avg_slope";

pub(super) fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

pub(super) fn create_file(dir: &TempDir, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.path().join(name);
    let mut file = File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(path)
}

/// Pipes 1 → 2 → 3 along the x axis, each 100 m long and draining one
/// hectare; `extra` columns are appended to the header and every row.
pub(super) fn three_pipe_table(extra_header: &str, extra: [&str; 3]) -> String {
    let mut table = format!("{HEADER}{extra_header}\n");
    for (offset, suffix) in extra.into_iter().enumerate() {
        let id = offset + 1;
        let x = 100 * offset;
        let ground = 50 - offset;
        table.push_str(&format!(
            "{id},{x},0,{},0,100,{ground},{},1,0.5,75,0.005,circular,5,0.01{suffix}\n",
            x + 100,
            ground - 1,
        ));
    }
    table
}

/// Table with declared drain targets and 0.6 m pipes.
pub(super) fn declared_table() -> String {
    three_pipe_table(",drain_to,diameter", [",2,0.6", ",3,0.6", ",0,0.6"])
}

/// Table without drain targets or sizes.
pub(super) fn bare_table() -> String {
    three_pipe_table("", ["", "", ""])
}

pub(super) const CATALOG: &str = "0.2 0.3 0.4 0.5 0.6\n0.8 1.0 1.2 1.5\n";

pub(super) const RAIN: &str = "\
time,zone
2024-05-01T10:05:00Z,1.2
2024-05-01T10:10:00Z,2.0
2024-05-01T10:15:00Z,0.4
2024-05-01T10:20:00Z,0.0
";

pub(super) fn parse(args: &[&str]) -> Cli {
    match <Cli as clap::Parser>::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => panic!("arguments must parse: {err}"),
    }
}

pub(super) fn run_cli_expecting_error(cli: Cli, panic_msg: &str) -> CliError {
    match run_cli(cli) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}
