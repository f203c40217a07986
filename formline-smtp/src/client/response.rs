//! SMTP reply parsing.

use super::error::{ClientError, Result};

/// One line of a (possibly multi-line) SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub code: u16,
    /// `false` when the code is followed by `-`, i.e. more lines follow.
    pub is_last: bool,
    pub text: String,
}

impl ResponseLine {
    /// Parse a single reply line without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the line does not start with a
    /// three digit code followed by a space, a dash or nothing.
    pub fn parse(line: &str) -> Result<Self> {
        let code = line
            .get(..3)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| ClientError::ParseError(format!("Invalid reply line: '{line}'")))?;

        let is_last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(other) => {
                return Err(ClientError::ParseError(format!(
                    "Invalid separator '{}' in reply line",
                    char::from(*other)
                )));
            }
        };

        Ok(Self {
            code,
            is_last,
            text: line.get(4..).unwrap_or_default().to_string(),
        })
    }
}

/// A complete SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// All reply lines joined with spaces, for logs and error details.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 3xx, e.g. `354` after DATA or `334` during AUTH.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// 4xx or 5xx
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.code >= 400 && self.code < 600
    }

    /// Try to take one complete reply off the front of `buffer`.
    ///
    /// Returns the reply and the number of bytes it occupied, or `None` when
    /// the buffer does not yet hold a final line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if a line is malformed or the lines
    /// of a multi-line reply disagree on the code.
    pub fn parse(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut consumed = 0;
        let mut code = None;
        let mut lines = Vec::new();

        while let Some(end) = buffer[consumed..].iter().position(|&b| b == b'\n') {
            let raw = &buffer[consumed..consumed + end];
            consumed += end + 1;

            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.is_empty() {
                continue;
            }

            let line = ResponseLine::parse(std::str::from_utf8(raw)?)?;
            match code {
                None => code = Some(line.code),
                Some(expected) if expected != line.code => {
                    return Err(ClientError::ParseError(format!(
                        "Multi-line reply changed code from {expected} to {}",
                        line.code
                    )));
                }
                Some(_) => {}
            }

            let (reply_code, is_last) = (line.code, line.is_last);
            lines.push(line.text);

            if is_last {
                return Ok(Some((Self::new(reply_code, lines), consumed)));
            }
        }

        Ok(None)
    }
}
