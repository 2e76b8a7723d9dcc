use std::io::{stderr, stdin, BufRead, Stderr, StdinLock, Write};

use anyhow::{bail, Result};

/// Asks questions on `output` and reads the answers line by line from `input`.
pub(crate) struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stderr> {
    /// stdin for answers; questions go to stderr so stdout stays the report.
    pub(crate) fn stdio() -> Self {
        Self::new(stdin().lock(), stderr())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// repeats `question` until `parse` accepts the answer.
    pub(crate) fn ask<T>(
        &mut self,
        question: &str,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Result<T> {
        let mut buf = String::new();
        loop {
            write!(self.output, "{question}: ")?;
            self.output.flush()?;
            buf.clear();
            if self.input.read_line(&mut buf)? == 0 {
                bail!("input closed while waiting for: {question}");
            }
            match parse(buf.trim()) {
                Ok(v) => break Ok(v),
                Err(e) => writeln!(self.output, "{e}. try again.")?,
            }
        }
    }
}
