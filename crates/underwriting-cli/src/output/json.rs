use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print JSON to stdout. Decimals are serialised as strings, so the
/// output can be fed back through `--input` without precision loss.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|_| writeln!(out));
    match written {
        Ok(()) => {}
        // Downstream closed early (e.g. `| head`)
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Err(e) => eprintln!("JSON output error: {e}"),
    }
}
