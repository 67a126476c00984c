//! JSON feeds
//!
//! A `.json` feed is a single array document; an NDJSON feed is a sequence of
//! JSON values. Both are decoded one record at a time, so memory stays flat
//! however large the file is, and a broken record only fails the feed at its
//! own position.
//!
//! Array documents are streamed through [`ArrayElements`], which checks the
//! outer `[ ... , ... ]` framing and hands the decoder the elements as a plain
//! value stream. Framing bytes are replaced by spaces, so line and column
//! numbers in decoder errors still point into the original file.

use crate::domain::{IngestionError, ReloadError, Result};
use serde_json::Value;
use std::io::{self, BufRead, BufReader, Read};

/// Decode the elements of a JSON array document lazily
///
/// The stream stops after the first malformed element or framing error.
pub fn stream_array<R>(reader: R) -> impl Iterator<Item = Result<Value>> + Send
where
    R: BufRead + Send,
{
    stream_values(BufReader::new(ArrayElements::new(reader)))
}

/// Decode a stream of JSON values lazily
///
/// The stream stops after the first malformed value.
pub fn stream_values<R>(reader: R) -> impl Iterator<Item = Result<Value>> + Send
where
    R: Read + Send,
{
    let mut failed = false;
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<Value>()
        .map_while(move |item| {
            if failed {
                return None;
            }
            failed = item.is_err();
            Some(item.map_err(malformed))
        })
}

fn malformed(err: serde_json::Error) -> ReloadError {
    let reason = if err.is_io() {
        format!("Malformed JSON: {}", err)
    } else {
        format!(
            "Malformed JSON at line {} column {}: {}",
            err.line(),
            err.column(),
            err
        )
    };
    ReloadError::Ingestion(IngestionError::new(reason))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Before the opening bracket
    Start,
    /// After `[`, where `]` may close an empty array
    First,
    /// After a separating comma
    Next,
    InValue,
    AfterValue,
    /// After the closing bracket
    Done,
    Failed,
}

/// Reader adapter that unwraps a top-level JSON array
///
/// Reading yields the array's elements separated by whitespace. Framing
/// errors (no array, a missing or doubled comma, an unclosed array, data after
/// the closing bracket) surface as `InvalidData` I/O errors once every byte
/// before the offending one has been handed out.
pub struct ArrayElements<R> {
    inner: R,
    state: Scan,
    depth: usize,
    in_string: bool,
    escaped: bool,
    line: u64,
    column: u64,
    pending: Option<io::Error>,
}

impl<R: BufRead> ArrayElements<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: Scan::Start,
            depth: 0,
            in_string: false,
            escaped: false,
            line: 1,
            column: 0,
            pending: None,
        }
    }

    fn error(&mut self, message: &str) -> io::Error {
        self.state = Scan::Failed;
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} at line {} column {}", message, self.line, self.column),
        )
    }

    fn scan(&mut self, byte: u8) -> io::Result<u8> {
        if byte == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }

        match self.state {
            Scan::Start => match byte {
                b'[' => {
                    self.state = Scan::First;
                    Ok(b' ')
                }
                _ if is_whitespace(byte) => Ok(byte),
                _ => Err(self.error("Expected a JSON array of records")),
            },
            Scan::First => match byte {
                b']' => {
                    self.state = Scan::Done;
                    Ok(b' ')
                }
                _ if is_whitespace(byte) => Ok(byte),
                _ => Ok(self.value_byte(byte)),
            },
            Scan::Next => match byte {
                b',' | b']' => Err(self.error("Expected a record")),
                _ if is_whitespace(byte) => Ok(byte),
                _ => Ok(self.value_byte(byte)),
            },
            Scan::InValue => Ok(self.value_byte(byte)),
            Scan::AfterValue => match byte {
                b',' => {
                    self.state = Scan::Next;
                    Ok(b' ')
                }
                b']' => {
                    self.state = Scan::Done;
                    Ok(b' ')
                }
                _ if is_whitespace(byte) => Ok(byte),
                _ => Err(self.error("Expected ',' or ']' after a record")),
            },
            Scan::Done => match byte {
                _ if is_whitespace(byte) => Ok(byte),
                _ => Err(self.error("Unexpected data after the JSON array")),
            },
            Scan::Failed => Err(self.error("JSON array is malformed")),
        }
    }

    // Brackets inside an element are only counted; the decoder checks that
    // they pair up.
    fn value_byte(&mut self, byte: u8) -> u8 {
        self.state = Scan::InValue;
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
                if self.depth == 0 {
                    self.state = Scan::AfterValue;
                }
            }
            return byte;
        }

        match byte {
            b'"' => self.in_string = true,
            b'{' | b'[' => self.depth += 1,
            b'}' | b']' if self.depth > 0 => {
                self.depth -= 1;
                if self.depth == 0 {
                    self.state = Scan::AfterValue;
                }
            }
            b']' => {
                self.state = Scan::Done;
                return b' ';
            }
            b',' if self.depth == 0 => {
                self.state = Scan::Next;
                return b' ';
            }
            _ if self.depth == 0 && is_whitespace(byte) => self.state = Scan::AfterValue,
            _ => {}
        }
        byte
    }

    fn at_eof(&mut self) -> io::Result<()> {
        match self.state {
            Scan::Done => Ok(()),
            // The decoder reports a value cut off in the middle itself
            Scan::InValue if self.depth > 0 || self.in_string => Ok(()),
            Scan::Start => Err(self.error("Expected a JSON array of records, found end of input")),
            _ => Err(self.error("JSON array is not closed")),
        }
    }
}

impl<R: BufRead> Read for ArrayElements<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }

        let mut written = 0;
        while written < out.len() {
            let chunk = match self.inner.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if written > 0 => {
                    self.pending = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            };

            if chunk.is_empty() {
                if written == 0 {
                    self.at_eof()?;
                }
                break;
            }

            let take = chunk.len().min(out.len() - written);
            out[written..written + take].copy_from_slice(&chunk[..take]);
            self.inner.consume(take);

            for i in written..written + take {
                match self.scan(out[i]) {
                    Ok(byte) => out[i] = byte,
                    Err(e) if i > 0 => {
                        self.pending = Some(e);
                        return Ok(i);
                    }
                    Err(e) => return Err(e),
                }
            }
            written += take;
        }
        Ok(written)
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
