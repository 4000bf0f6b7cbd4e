//! Recursive-descent walker over the nested BEGIN/END block grammar of
//! legacy vMessage (VMG) container files.
//!
//! Grammar, with marker recognition in this priority order:
//!
//! ```text
//! container := "BEGIN:VMSG" NL (envelope | card | skipped line)* "END:VMSG" NL
//! envelope  := "BEGIN:VENV" NL (envelope | card | body) "END:VENV" NL
//! card      := "BEGIN:VCARD" NL discarded lines "END:VCARD" NL
//! body      := "BEGIN:VBODY" NL headers blank-line raw-body "END:VBODY" NL
//! ```
//!
//! All comparisons are exact, case-sensitive literal matches. Any failure
//! is fatal for the whole input file; nothing is retried or skipped past.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::buffer::SourceBuffer;
use crate::error::{Result, VmgError};
use crate::message::{self, AddressMatcher};

const BEGIN_VMSG: &str = "BEGIN:VMSG";
const END_VMSG: &str = "END:VMSG";
const BEGIN_VENV: &str = "BEGIN:VENV";
const END_VENV: &str = "END:VENV";
const BEGIN_VCARD: &str = "BEGIN:VCARD";
const END_VCARD: &str = "END:VCARD";
const BEGIN_VBODY: &str = "BEGIN:VBODY";
const END_VBODY: &str = "END:VBODY";

/// Convert one `.vmg` file, writing each contained message as an `.eml`
/// file next to the input. Returns the emitted paths in grammar order.
pub fn convert_file(path: &Path) -> Result<Vec<PathBuf>> {
    let out_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file = File::open(path)?;
    convert_stream(BufReader::new(file), &out_dir)
}

/// Convert every VMSG container in `reader`, writing `.eml` files into
/// `out_dir`. The reader is consumed exactly once, front to back.
pub fn convert_stream<R: Read>(reader: R, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut buffer = SourceBuffer::new(reader);
    let matcher = AddressMatcher::new();
    let mut emitted = Vec::new();
    while !buffer.is_exhausted()? {
        parse_container(&mut buffer, &matcher, out_dir, &mut emitted)?;
    }
    Ok(emitted)
}

/// Parse one top-level VMSG container. Unrecognized lines at this level are
/// tolerated and discarded.
fn parse_container<R: Read>(
    buffer: &mut SourceBuffer<R>,
    matcher: &AddressMatcher,
    out_dir: &Path,
    emitted: &mut Vec<PathBuf>,
) -> Result<()> {
    expect_marker(buffer, BEGIN_VMSG)?;
    while !buffer.is_exhausted()? {
        if buffer.starts_with(END_VMSG, 0)? {
            break;
        } else if buffer.starts_with(BEGIN_VENV, 0)? {
            parse_envelope(buffer, matcher, out_dir, emitted)?;
        } else if buffer.starts_with(BEGIN_VCARD, 0)? {
            parse_card(buffer)?;
        } else {
            let line = buffer.read_line()?;
            debug!("skipped: {:?}", String::from_utf8_lossy(&line));
        }
    }
    expect_marker(buffer, END_VMSG)?;
    Ok(())
}

/// Parse one VENV block, which must hold exactly one child block.
fn parse_envelope<R: Read>(
    buffer: &mut SourceBuffer<R>,
    matcher: &AddressMatcher,
    out_dir: &Path,
    emitted: &mut Vec<PathBuf>,
) -> Result<()> {
    expect_marker(buffer, BEGIN_VENV)?;
    if buffer.starts_with(BEGIN_VENV, 0)? {
        parse_envelope(buffer, matcher, out_dir, emitted)?;
    } else if buffer.starts_with(BEGIN_VCARD, 0)? {
        parse_card(buffer)?;
    } else if buffer.starts_with(BEGIN_VBODY, 0)? {
        parse_body(buffer, matcher, out_dir, emitted)?;
    } else {
        let pos = buffer.position();
        let line = buffer.read_line()?;
        return Err(VmgError::UnexpectedContent {
            line: String::from_utf8_lossy(&line).into_owned(),
            pos,
        });
    }
    expect_marker(buffer, END_VENV)?;
    Ok(())
}

/// Parse one VCARD block, discarding its content line by line until the
/// closing marker is at the current position.
fn parse_card<R: Read>(buffer: &mut SourceBuffer<R>) -> Result<()> {
    expect_marker(buffer, BEGIN_VCARD)?;
    while !buffer.is_exhausted()? {
        if buffer.starts_with(END_VCARD, 0)? {
            break;
        }
        let line = buffer.read_line()?;
        debug!("skipped card content: {:?}", String::from_utf8_lossy(&line));
    }
    expect_marker(buffer, END_VCARD)?;
    Ok(())
}

/// Parse one VBODY block, delegating header extraction and emission to
/// [`message::synthesize`]. The closing marker stays unconsumed until
/// emission has finished.
fn parse_body<R: Read>(
    buffer: &mut SourceBuffer<R>,
    matcher: &AddressMatcher,
    out_dir: &Path,
    emitted: &mut Vec<PathBuf>,
) -> Result<()> {
    expect_marker(buffer, BEGIN_VBODY)?;
    let path = message::synthesize(buffer, matcher, END_VBODY, out_dir)?;
    emitted.push(path);
    expect_marker(buffer, END_VBODY)?;
    Ok(())
}

/// Require `marker` at the current position; consume it and exactly one
/// line terminator.
fn expect_marker<R: Read>(buffer: &mut SourceBuffer<R>, marker: &str) -> Result<()> {
    if !buffer.starts_with(marker, 0)? {
        return Err(VmgError::Structural {
            expected: marker.to_string(),
            pos: buffer.position(),
        });
    }
    buffer.discard(marker.len())?;
    buffer.discard_newline()?;
    Ok(())
}
