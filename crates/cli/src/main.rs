///! # CLI - binbuf Interactive Shell
///!
///! A REPL-style command-line interface for the `bytebuf` accumulator.
///! Reads messages from stdin, applies them to a single [`ByteBuffer`], and
///! prints replies to stdout. Designed for both interactive use and scripted
///! testing (pipe commands via stdin).
///!
///! ## Messages
///!
///! ```text
///! bang (or empty line)  Consume and print the next byte
///! <n>                   Append the single byte value n
///! <n> <n> ...           Append a burst of byte values
///! read <path>           Load a binary file into the buffer
///! write <path>          Save the written region to a binary file
///! add <values...>       Append a burst of byte values
///! set <values...>       Clear, then append
///! clear                 Reset both cursors (capacity retained)
///! rewind                Reset the read cursor only
///! info                  Print buflength / readoffset / writeoffset
///! exit / quit           Shut down
///! ```
///!
///! ## Startup arguments
///!
///! The argument list is scanned twice, independently: the first argument
///! that is not a number is taken as a file path and loaded immediately; the
///! first numeric argument (wherever it appears) is the initial buffer
///! capacity in bytes. A non-positive capacity means the default.
///!
///! ## Example
///!
///! ```text
///! $ cargo run -p cli
///! binbuf started (capacity=65536)
///! > add 1 2 3
///! > write dump.bin
///! wrote 3 bytes to dump.bin
///! > bang
///! 1
///! > info
///! buflength 65536
///! readoffset 1
///! writeoffset 3
///! > exit
///! bye
///! ```

use anyhow::{Context, Result};
use bytebuf::{ByteBuffer, NextByte};
use std::io::{self, BufRead, Write};

/// Startup configuration scanned from the process argument list.
#[derive(Debug, Default, PartialEq)]
struct Startup {
    /// First non-numeric argument; loaded into the buffer at startup.
    path: Option<String>,
    /// First numeric argument, truncated to an integer. Non-positive values
    /// are dropped so the buffer default applies.
    capacity: Option<usize>,
}

/// Scans `args` twice, independently: path first if present, capacity from
/// the first numeric argument regardless of position.
fn scan_args<I>(args: I) -> Startup
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let path = args.iter().find(|a| a.parse::<f64>().is_err()).cloned();
    let capacity = args
        .iter()
        .find_map(|a| a.parse::<f64>().ok())
        .and_then(|v| if v >= 1.0 { Some(v as usize) } else { None });
    Startup { path, capacity }
}

/// Reply to one dispatched input line.
#[derive(Debug, Default, PartialEq)]
struct Reply {
    lines: Vec<String>,
    quit: bool,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Reply {
            lines: vec![text.into()],
            quit: false,
        }
    }

    fn silent() -> Self {
        Reply::default()
    }
}

/// Parses every token as a byte-value number, or reports the offender.
fn parse_values(tokens: &[&str]) -> std::result::Result<Vec<f64>, String> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| format!("ERR '{t}' is not a number"))
        })
        .collect()
}

/// Maps one input line onto a buffer operation and formats the reply.
///
/// Errors never escape: every failure becomes an `ERR ...` line and the
/// buffer stays in its last valid state.
fn dispatch(buf: &mut ByteBuffer, line: &str) -> Reply {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let Some(&cmd) = tokens.first() else {
        // empty line acts as a bang
        return next_reply(buf);
    };

    match cmd {
        "bang" => next_reply(buf),
        "read" => match tokens.get(1) {
            Some(path) => match buf.load(path) {
                Ok(n) => Reply::say(format!("read {n} bytes from {path}")),
                Err(e) => Reply::say(format!("ERR read failed: {e}")),
            },
            None => Reply::say("ERR usage: read <path>"),
        },
        "write" => match tokens.get(1) {
            Some(path) => match buf.save(path) {
                Ok(n) => Reply::say(format!("wrote {n} bytes to {path}")),
                Err(e) => Reply::say(format!("ERR write failed: {e}")),
            },
            None => Reply::say("ERR usage: write <path>"),
        },
        "add" => match parse_values(&tokens[1..]) {
            Ok(values) => match buf.append(&values) {
                Ok(_) => Reply::silent(),
                Err(e) => Reply::say(format!("ERR add failed: {e}")),
            },
            Err(msg) => Reply::say(msg),
        },
        "set" => match parse_values(&tokens[1..]) {
            Ok(values) => match buf.set(&values) {
                Ok(_) => Reply::silent(),
                Err(e) => Reply::say(format!("ERR set failed: {e}")),
            },
            Err(msg) => Reply::say(msg),
        },
        "clear" => {
            buf.clear();
            Reply::say("OK")
        }
        "rewind" => {
            buf.rewind();
            Reply::say("OK")
        }
        "info" => {
            let info = buf.info();
            Reply {
                lines: vec![
                    format!("buflength {}", info.buf_length),
                    format!("readoffset {}", info.read_offset),
                    format!("writeoffset {}", info.write_offset),
                ],
                quit: false,
            }
        }
        "exit" | "quit" => Reply {
            lines: vec!["bye".to_string()],
            quit: true,
        },
        other if other.parse::<f64>().is_ok() => match parse_values(&tokens) {
            Ok(values) => {
                let result = if let [value] = values[..] {
                    buf.push(value).map(|_| 1)
                } else {
                    buf.append(&values)
                };
                match result {
                    Ok(_) => Reply::silent(),
                    Err(e) => Reply::say(format!("ERR add failed: {e}")),
                }
            }
            Err(msg) => Reply::say(msg),
        },
        other => Reply::say(format!("unknown command: {other}")),
    }
}

/// Formats a [`ByteBuffer::next_byte`] result.
///
/// The two no-byte outcomes stay distinct: `bang (end of data)` accompanies
/// the final byte in the same reply, while `bang (empty)` stands alone when
/// nothing is left to read.
fn next_reply(buf: &mut ByteBuffer) -> Reply {
    match buf.next_byte() {
        NextByte::Byte { value, end_of_data } => {
            let mut lines = vec![value.to_string()];
            if end_of_data {
                lines.push("bang (end of data)".to_string());
            }
            Reply { lines, quit: false }
        }
        NextByte::Empty => Reply::say("bang (empty)"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let startup = scan_args(std::env::args().skip(1));

    let mut buf = match startup.capacity {
        Some(cap) => ByteBuffer::with_capacity(cap),
        None => ByteBuffer::new(),
    }
    .context("unable to allocate byte buffer")?;

    // implicit load from a startup path is a diagnostic, never fatal
    if let Some(path) = &startup.path {
        match buf.load(path) {
            Ok(n) => println!("read {n} bytes from {path}"),
            Err(e) => println!("ERR read failed: {e}"),
        }
    }

    println!("binbuf started (capacity={})", buf.capacity());
    println!("Commands: bang | read <path> | write <path> | add <values...>");
    println!("          set <values...> | clear | rewind | info | exit");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let reply = dispatch(&mut buf, &line);
        for out in &reply.lines {
            println!("{out}");
        }
        if reply.quit {
            break;
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn buffer() -> ByteBuffer {
        ByteBuffer::with_capacity(64).unwrap()
    }

    // -------------------- Startup scanning --------------------

    #[test]
    fn scan_args_picks_path_and_capacity_independently() {
        let s = scan_args(["data.bin".to_string(), "1024".to_string()]);
        assert_eq!(s.path.as_deref(), Some("data.bin"));
        assert_eq!(s.capacity, Some(1024));

        // order does not matter
        let s = scan_args(["1024".to_string(), "data.bin".to_string()]);
        assert_eq!(s.path.as_deref(), Some("data.bin"));
        assert_eq!(s.capacity, Some(1024));
    }

    #[test]
    fn scan_args_nonpositive_capacity_means_default() {
        let s = scan_args(["0".to_string()]);
        assert_eq!(s.capacity, None);
        let s = scan_args(["-5".to_string()]);
        assert_eq!(s.capacity, None);
    }

    #[test]
    fn scan_args_empty() {
        assert_eq!(scan_args([]), Startup::default());
    }

    // -------------------- Dispatch --------------------

    #[test]
    fn add_then_bang_walks_bytes() {
        let mut buf = buffer();
        assert_eq!(dispatch(&mut buf, "add 10 20"), Reply::silent());

        let r = dispatch(&mut buf, "bang");
        assert_eq!(r.lines, vec!["10"]);
        let r = dispatch(&mut buf, "bang");
        assert_eq!(r.lines, vec!["20", "bang (end of data)"]);
        let r = dispatch(&mut buf, "bang");
        assert_eq!(r.lines, vec!["bang (empty)"]);
    }

    #[test]
    fn empty_line_acts_as_bang() {
        let mut buf = buffer();
        dispatch(&mut buf, "5");
        let r = dispatch(&mut buf, "   ");
        assert_eq!(r.lines, vec!["5", "bang (end of data)"]);
    }

    #[test]
    fn bare_numbers_append() {
        let mut buf = buffer();
        dispatch(&mut buf, "65");
        dispatch(&mut buf, "66 67");
        assert_eq!(buf.written(), b"ABC");
    }

    #[test]
    fn out_of_range_add_reports_err_and_keeps_prefix() {
        let mut buf = buffer();
        let r = dispatch(&mut buf, "add 1 2 999");
        assert!(r.lines[0].starts_with("ERR add failed:"));
        assert_eq!(buf.written(), &[1, 2]);
    }

    #[test]
    fn non_numeric_add_token_reports_err() {
        let mut buf = buffer();
        let r = dispatch(&mut buf, "add 1 x 3");
        assert_eq!(r.lines, vec!["ERR 'x' is not a number"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn set_replaces_contents() {
        let mut buf = buffer();
        dispatch(&mut buf, "add 1 2 3");
        dispatch(&mut buf, "set 9");
        assert_eq!(buf.written(), &[9]);
    }

    #[test]
    fn clear_and_rewind_reply_ok() {
        let mut buf = buffer();
        dispatch(&mut buf, "add 1 2");
        dispatch(&mut buf, "bang");

        assert_eq!(dispatch(&mut buf, "rewind"), Reply::say("OK"));
        assert_eq!(buf.read_offset(), 0);

        assert_eq!(dispatch(&mut buf, "clear"), Reply::say("OK"));
        assert!(buf.is_empty());
    }

    #[test]
    fn info_prints_three_labeled_lines_in_order() {
        let mut buf = buffer();
        dispatch(&mut buf, "add 1 2 3");
        dispatch(&mut buf, "bang");

        let r = dispatch(&mut buf, "info");
        assert_eq!(
            r.lines,
            vec!["buflength 64", "readoffset 1", "writeoffset 3"]
        );
    }

    #[test]
    fn read_write_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.bin");
        let path_str = path.to_str().unwrap();

        let mut buf = buffer();
        dispatch(&mut buf, "add 1 2 3");
        let r = dispatch(&mut buf, &format!("write {path_str}"));
        assert_eq!(r.lines, vec![format!("wrote 3 bytes to {path_str}")]);
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);

        let mut fresh = buffer();
        let r = dispatch(&mut fresh, &format!("read {path_str}"));
        assert_eq!(r.lines, vec![format!("read 3 bytes from {path_str}")]);
        assert_eq!(fresh.written(), &[1, 2, 3]);
    }

    #[test]
    fn read_missing_file_reports_err() {
        let mut buf = buffer();
        let r = dispatch(&mut buf, "read /no/such/file.bin");
        assert!(r.lines[0].starts_with("ERR read failed:"));
    }

    #[test]
    fn usage_errors() {
        let mut buf = buffer();
        assert_eq!(dispatch(&mut buf, "read"), Reply::say("ERR usage: read <path>"));
        assert_eq!(
            dispatch(&mut buf, "write"),
            Reply::say("ERR usage: write <path>")
        );
    }

    #[test]
    fn unknown_command() {
        let mut buf = buffer();
        let r = dispatch(&mut buf, "frobnicate");
        assert_eq!(r.lines, vec!["unknown command: frobnicate"]);
    }

    #[test]
    fn exit_and_quit_set_quit_flag() {
        let mut buf = buffer();
        assert!(dispatch(&mut buf, "exit").quit);
        assert!(dispatch(&mut buf, "quit").quit);
        assert!(!dispatch(&mut buf, "info").quit);
    }
}
