//! Access trace: one access per line, a binary address followed by the access
//! kind (`I` for instruction fetch, `D` for data). Whitespace anywhere in a
//! line is ignored, so `0000 0100 I` and `00000100I` are the same access.

use std::fmt;

use nom::{bytes::complete::is_a, combinator::all_consuming, IResult};
use num_enum::TryFromPrimitive;
use serde::Serialize;
use thiserror::Error;

use crate::{bits::significant_bits, config::AddressWidth};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum AccessKind {
    /// `I`
    Instruction = 0x49,
    /// `D`
    Data = 0x44,
}

impl AccessKind {
    pub fn from_char(c: char) -> Option<Self> {
        u8::try_from(c).ok().and_then(|b| Self::try_from(b).ok())
    }
    pub fn as_char(self) -> char {
        self as u8 as char
    }
    pub fn cache_name(self) -> &'static str {
        match self {
            AccessKind::Instruction => "instruction cache",
            AccessKind::Data => "data cache",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Instruction => write!(f, "instruction"),
            AccessKind::Data => write!(f, "data"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Access {
    pub address: u32,
    pub kind: AccessKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("malformed binary address `{0}`")]
    MalformedAddress(String),
    #[error("address `{digits}` exceeds {width} bits")]
    AddressTooWide { digits: String, width: u32 },
    #[error("invalid access type `{0}`")]
    InvalidAccessKind(char),
}

impl LineError {
    /// recoverable lines are skipped; anything else aborts the trace.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LineError::InvalidAccessKind(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line_no}: {source}")]
pub struct TraceError {
    pub line_no: usize,
    pub source: LineError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based
    pub line_no: usize,
    pub reason: LineError,
}

pub fn strip_whitespace(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

fn binary_digits(input: &str) -> IResult<&str, &str> {
    all_consuming(is_a("01"))(input)
}

/// parses a string of `0`/`1` into an address no wider than `width`.
pub fn parse_binary(digits: &str, width: AddressWidth) -> Result<u32, LineError> {
    let (_, digits) =
        binary_digits(digits).map_err(|_| LineError::MalformedAddress(digits.to_string()))?;
    if significant_bits(digits) > width.bits() as usize {
        return Err(LineError::AddressTooWide {
            digits: digits.to_string(),
            width: width.bits(),
        });
    }
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    u32::from_str_radix(significant, 2).map_err(|_| LineError::MalformedAddress(digits.to_string()))
}

/// parses a single trace line. blank lines yield `Ok(None)`.
pub fn parse_line(line: &str, width: AddressWidth) -> Result<Option<Access>, LineError> {
    let line = strip_whitespace(line);
    let mut chars = line.chars();
    let Some(kind) = chars.next_back() else {
        return Ok(None);
    };
    let address = parse_binary(chars.as_str(), width)?;
    let kind = AccessKind::from_char(kind).ok_or(LineError::InvalidAccessKind(kind))?;
    Ok(Some(Access { address, kind }))
}

#[derive(Debug, Default)]
pub struct Trace {
    accesses: Vec<Access>,
    skipped: Vec<SkippedLine>,
}

impl Trace {
    /// parses a whole trace, skipping (and logging) recoverable lines.
    /// the first unrecoverable line aborts parsing.
    pub fn parse(src: &str, width: AddressWidth) -> Result<Self, TraceError> {
        let mut trace = Trace::default();
        for (i, line) in src.lines().enumerate() {
            let line_no = i + 1;
            match parse_line(line, width) {
                Ok(Some(access)) => trace.accesses.push(access),
                Ok(None) => {}
                Err(e) if e.is_recoverable() => {
                    log::warn!("skipping trace line {line_no}: {e}");
                    trace.skipped.push(SkippedLine { line_no, reason: e });
                }
                Err(e) => return Err(TraceError { line_no, source: e }),
            }
        }
        log::info!(
            "finished parsing trace. {} accesses, {} lines skipped",
            trace.accesses.len(),
            trace.skipped.len()
        );
        Ok(trace)
    }
    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }
    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }
    /// accesses of `kind`, in trace order.
    pub fn stream(&self, kind: AccessKind) -> impl Iterator<Item = &Access> + '_ {
        self.accesses.iter().filter(move |a| a.kind == kind)
    }
    pub fn len(&self) -> usize {
        self.accesses.len()
    }
    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }
}

impl FromIterator<Access> for Trace {
    fn from_iter<T: IntoIterator<Item = Access>>(iter: T) -> Self {
        Self {
            accesses: iter.into_iter().collect(),
            skipped: Vec::new(),
        }
    }
}
