//! Interactive AT command terminal.
//!
//! Connects to a modem UART exposed over TCP, forwards each stdin line as a
//! command, and prints response lines until the peripheral goes quiet.
//! Out-of-band prefixes registered with `--oob` are reported as they fire.

use std::error::Error;
use std::io::{self, BufRead};
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use athost_parser::{AtError, AtParser, ParserConfig};
use athost_transport::TcpPort;

#[derive(Parser, Debug)]
#[command(name = "athost", about = "Interactive AT command terminal for TCP-attached modems")]
struct Args {
    /// TCP endpoint of the modem UART, e.g. 127.0.0.1:5000
    addr: String,

    /// Per-byte receive timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Terminate commands with a bare carriage return instead of CRLF
    #[arg(long)]
    cr_only: bool,

    /// Echo the parser's wire traces (AT>, AT?, AT=, AT<, AT!)
    #[arg(short, long)]
    debug: bool,

    /// Out-of-band line to report when it arrives (repeatable),
    /// e.g. --oob "+RING"
    #[arg(long = "oob")]
    oobs: Vec<String>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("athost: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = TcpPort::connect(&args.addr)?;
    info!("connected to {}", args.addr);

    let config = ParserConfig {
        output_delimiter: if args.cr_only { "\r" } else { "\r\n" }.to_string(),
        timeout: Duration::from_millis(args.timeout_ms),
        debug: args.debug,
        ..ParserConfig::default()
    };
    let mut at = AtParser::new(port, config)?;

    for prefix in &args.oobs {
        let label = prefix.clone();
        at.add_oob(format!("{prefix}\r\n"), move |_ctx| {
            println!("<< [oob] {label}");
        });
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = line.trim_end();
        if command.is_empty() {
            // A bare return drains queued notifications.
            while at.process_oob() {}
            continue;
        }

        at.send(command)?;
        drain_responses(&mut at)?;
    }

    Ok(())
}

/// Print response lines until a final status or the per-byte timeout.
fn drain_responses(at: &mut AtParser<TcpPort>) -> Result<(), Box<dyn Error>> {
    loop {
        match at.recv("%[^\r\n]\r\n") {
            Ok(caps) => {
                let text = caps.text(0).unwrap_or_default().to_string();
                println!("<< {text}");
                if text == "OK" || text == "ERROR" || text.starts_with("+CME ERROR") {
                    return Ok(());
                }
            }
            // Quiet line: the peripheral is done talking.
            Err(AtError::Timeout) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}
