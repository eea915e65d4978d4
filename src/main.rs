mod app;
mod buffer;
mod capture;
mod error;
mod fft;
mod loudness;
mod spectrum;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    cursor::{Hide, Show},
    terminal, ExecutableCommand,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use app::{Monitor, Outcome};
use capture::Capture;
use error::Error;

const EXIT_OK: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_BAD_CONFIG: u8 = 2;
/// Conventional status for "terminated by Ctrl+C".
const EXIT_INTERRUPTED: u8 = 130;

/// Live spectrum and loudness monitor for an audio input device
#[derive(Parser, Debug)]
#[command(name = "specmon", version, about, long_about = None)]
struct Args {
    /// Capture device name (defaults to the system input device)
    #[arg(long, value_name = "NAME")]
    device_name: Option<String>,

    /// Sample rate requested from the device
    #[arg(long, value_name = "HZ", default_value_t = 44100)]
    sample_rate: u32,

    /// Samples per frame, must be a power of two
    #[arg(long, value_name = "SAMPLES", default_value_t = 512)]
    window: usize,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,
}

/// Capture settings the monitor runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    device_name: Option<String>,
    sample_rate: u32,
    window: usize,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            device_name: args.device_name.clone(),
            sample_rate: args.sample_rate,
            window: args.window,
        }
    }
}

impl Config {
    /// Rejects a window the transform cannot take, before any device is opened.
    fn validate(self) -> error::Result<Self> {
        if !self.window.is_power_of_two() {
            return Err(Error::Configuration(self.window));
        }
        Ok(self)
    }
}

fn exit_status(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Cancelled => EXIT_INTERRUPTED,
    }
}

fn failure_status(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<Error>() {
        Some(Error::Configuration(_)) => EXIT_BAD_CONFIG,
        _ => EXIT_FAILURE,
    }
}

fn main() -> ExitCode {
    // Logs go to stderr so they never interleave with the bar on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            debug!("fatal: {:?}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(failure_status(&e))
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    if args.list_devices {
        capture::list_input_devices()?;
        return Ok(EXIT_OK);
    }

    let config = Config::from(args).validate()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl+C handler")?;

    let outcome = monitor_device(&config, &shutdown)?;
    info!("interrupted, shutting down");
    Ok(exit_status(outcome))
}

fn monitor_device(config: &Config, shutdown: &AtomicBool) -> Result<Outcome> {
    let mut source = Capture::open(
        config.device_name.as_deref(),
        config.sample_rate,
        config.window,
    )?;
    let mut monitor = Monitor::new(config.window);

    let mut stdout = io::stdout();
    // The first frame moves up one line, so give it a line of its own.
    stdout.write_all(b"\n")?;

    with_hidden_cursor(&mut stdout, |out| {
        app::run(&mut source, out, &mut monitor, shutdown, terminal::size)
    })
}

/// Runs `body` with the cursor hidden. A failure to show it again is only
/// logged so it never masks the error `body` returned.
fn with_hidden_cursor<W, T, F>(out: &mut W, body: F) -> Result<T>
where
    W: Write,
    F: FnOnce(&mut W) -> error::Result<T>,
{
    out.execute(Hide)?;
    let result = body(out);
    if let Err(e) = out.execute(Show) {
        warn!("failed to restore the cursor: {}", e);
    }
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("specmon").chain(argv.iter().copied())).unwrap()
    }

    /// Accepts writes until `broken` is set, then fails every call.
    #[derive(Default)]
    struct BreakableWriter {
        broken: bool,
        bytes: Vec<u8>,
    }

    impl Write for BreakableWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"));
            }
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert!(!args.list_devices);
        let config = Config::from(&args).validate().unwrap();
        assert_eq!(
            config,
            Config {
                device_name: None,
                sample_rate: 44100,
                window: 512,
            }
        );
    }

    #[test]
    fn test_flags_parse() {
        let args = parse(&[
            "--device-name",
            "USB Mic",
            "--sample-rate",
            "48000",
            "--window",
            "1024",
            "--list-devices",
        ]);
        assert!(args.list_devices);
        let config = Config::from(&args);
        assert_eq!(config.device_name.as_deref(), Some("USB Mic"));
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.window, 1024);
    }

    #[test]
    fn test_window_must_be_power_of_two() {
        for window in [1usize, 2, 64, 4096] {
            let value = window.to_string();
            let config = Config::from(&parse(&["--window", value.as_str()]));
            assert!(config.validate().is_ok(), "window {window}");
        }
        for window in [0usize, 3, 500, 1000] {
            let value = window.to_string();
            let config = Config::from(&parse(&["--window", value.as_str()]));
            assert!(
                matches!(config.validate(), Err(Error::Configuration(w)) if w == window),
                "window {window}"
            );
        }
    }

    #[test]
    fn test_bad_window_exits_with_config_status() {
        let err = Config::from(&parse(&["--window", "300"]))
            .validate()
            .map_err(anyhow::Error::from)
            .unwrap_err();
        assert_eq!(failure_status(&err), 2);
    }

    #[test]
    fn test_other_failures_exit_with_one() {
        let errors: Vec<anyhow::Error> = vec![
            Error::Capture("device disconnected".to_string()).into(),
            Error::Mismatch {
                expected: 257,
                actual: 129,
            }
            .into(),
            Error::Length(6).into(),
            anyhow::anyhow!("no default input device available"),
            anyhow::Error::from(Error::Capture("stream died".to_string()))
                .context("failed to open input stream"),
        ];
        for err in &errors {
            assert_eq!(failure_status(err), 1, "{err:#}");
        }
    }

    #[test]
    fn test_cancellation_exits_with_130() {
        assert_eq!(exit_status(Outcome::Cancelled), 130);
    }

    #[test]
    fn test_cursor_is_hidden_then_restored() {
        let mut out = BreakableWriter::default();
        let value = with_hidden_cursor(&mut out, |_| Ok(7)).unwrap();
        assert_eq!(value, 7);

        let text = String::from_utf8(out.bytes).unwrap();
        assert_eq!(text, "\x1b[?25l\x1b[?25h");
    }

    #[test]
    fn test_loop_error_survives_failed_cursor_restore() {
        let mut out = BreakableWriter::default();
        let result: Result<Outcome> = with_hidden_cursor(&mut out, |out| {
            out.broken = true;
            Err(Error::Capture("device disconnected".to_string()))
        });

        let err = result.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<Error>(),
                Some(Error::Capture(m)) if m == "device disconnected"
            ),
            "{err:#}"
        );
        assert_eq!(failure_status(&err), 1);
    }
}
