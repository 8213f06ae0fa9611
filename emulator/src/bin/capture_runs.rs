use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../scenario.rs"]
mod scenario;
#[allow(dead_code)]
#[path = "../world.rs"]
mod world;

use scenario::{RunOptions, Scenario};

fn main() -> io::Result<()> {
    for scenario in Scenario::ALL {
        capture(scenario)?;
    }
    Ok(())
}

fn log_path(scenario: Scenario) -> PathBuf {
    PathBuf::from("runs").join(format!("{}.log", scenario.tag()))
}

fn capture(scenario: Scenario) -> io::Result<()> {
    let path = log_path(scenario);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "# {}", scenario.description())?;
    writeln!(writer, "# Time column counts from boot, or from fall detection while falling")?;

    let (report, mut writer) = scenario::run(scenario, &RunOptions::default(), writer)?;
    writeln!(writer)?;
    report.write_summary(&mut writer)?;
    writer.flush()?;

    println!(
        "{scenario}: {} lines, {} -> {}",
        report.lines,
        report.halt,
        path.display()
    );
    Ok(())
}
