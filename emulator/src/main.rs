mod scenario;
mod world;

use std::env;
use std::io::{self, Write};
use std::process;

use flight_core::telemetry::Delivery;
use flight_core::time::Millis;

use scenario::{RunOptions, Scenario};

const USAGE: &str = "Usage: flight-emulator [--scenario <nominal|skip-start|forecast-failure>] \
                     [--cached] [--post-fall-watchdog <ms>] [--absolute-watchdog <ms>]";

#[derive(Debug)]
struct Args {
    scenario: Scenario,
    options: RunOptions,
}

fn main() -> io::Result<()> {
    let args = parse_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdout = io::stdout();
    let (report, mut writer) = scenario::run(args.scenario, &args.options, stdout.lock())?;
    writeln!(writer)?;
    report.write_summary(&mut writer)?;
    writer.flush()?;

    for (warning, count) in report.warning_tally() {
        eprintln!("warning: {warning} (x{count})");
    }
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut scenario = Scenario::Nominal;
    let mut options = RunOptions::default();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        match flag.as_str() {
            "--scenario" => scenario = Scenario::from_tag(&value(&flag, inline, &mut args)?)?,
            "--cached" => options.delivery = Delivery::CacheUntilClose,
            "--post-fall-watchdog" => {
                options.config.watchdog_post_fall = millis(&flag, inline, &mut args)?;
            }
            "--absolute-watchdog" => {
                options.config.watchdog_absolute = millis(&flag, inline, &mut args)?;
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            other if !other.starts_with('-') => scenario = Scenario::from_tag(other)?,
            other => return Err(format!("Unexpected argument `{other}`")),
        }
    }

    options
        .config
        .validate()
        .map_err(|err| format!("Invalid configuration: {err}"))?;
    Ok(Args { scenario, options })
}

fn value(
    flag: &str,
    inline: Option<String>,
    args: &mut impl Iterator<Item = String>,
) -> Result<String, String> {
    inline
        .or_else(|| args.next())
        .ok_or_else(|| format!("Expected value after {flag}"))
}

fn millis(
    flag: &str,
    inline: Option<String>,
    args: &mut impl Iterator<Item = String>,
) -> Result<Millis, String> {
    let raw = value(flag, inline, args)?;
    raw.parse::<u32>()
        .map(Millis::new)
        .map_err(|err| format!("Invalid value `{raw}` for {flag}: {err}"))
}
