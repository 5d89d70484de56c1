//! Reader for babeltrace text dumps.
//!
//! Each line looks like
//!
//! ```text
//! [1556046234.000001000] (+0.000000200) bench HPX:chunk_start: { cpu_id = 2 }, { start_ofs = 0, stop_ofs = 1000, stage = 1 }
//! ```
//!
//! The timestamp may also be a raw integer (`--clock-cycles`) or a wall
//! clock time, optionally dated (`--clock-date`). The last brace group is
//! the payload; any earlier groups are context.

use crate::parser::event::{Event, FieldValue};
use crate::utils::error::TraceError;
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Load a text dump from disk
///
/// **Public** - entry point for regular file inputs
pub fn load_text(path: &Path) -> Result<Vec<Event>, TraceError> {
    let content = fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let events = parse_text_trace(&content)?;
    info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

/// Parse a whole dump, skipping blank lines
pub fn parse_text_trace(content: &str) -> Result<Vec<Event>, TraceError> {
    let mut events = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if let Some(event) = parse_line(line, index + 1)? {
            events.push(event);
        }
    }
    events.sort_by_key(|e| e.timestamp);
    debug!("Parsed {} text events", events.len());
    Ok(events)
}

/// Parse a single line; `Ok(None)` for blank lines
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Event>, TraceError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let err = |message: String| TraceError::TextFormat {
        line: line_no,
        message,
    };

    let rest = line
        .strip_prefix('[')
        .ok_or_else(|| err("line does not start with a timestamp".to_string()))?;
    let close = rest
        .find(']')
        .ok_or_else(|| err("unterminated timestamp".to_string()))?;
    let timestamp = parse_timestamp(rest[..close].trim()).map_err(err)?;
    let mut rest = rest[close + 1..].trim_start();

    // Delta to the previous event, e.g. "(+0.000000200)" or "(+?.?????????)"
    if rest.starts_with("(+") {
        let close = rest
            .find(')')
            .ok_or_else(|| err("unterminated delta".to_string()))?;
        rest = rest[close + 1..].trim_start();
    }

    let head_end = rest.find('{').unwrap_or(rest.len());
    let name = rest[..head_end]
        .split_whitespace()
        .last()
        .and_then(|word| word.strip_suffix(':'))
        .ok_or_else(|| err("missing event name".to_string()))?;

    let mut parser = FieldParser::new(&rest[head_end..]);
    let mut groups = Vec::new();
    parser.skip_ws();
    while !parser.at_end() {
        groups.push(parser.parse_struct().map_err(err)?);
        parser.skip_ws();
        if parser.eat(b',') {
            parser.skip_ws();
        } else if !parser.at_end() {
            return Err(err(format!(
                "unexpected '{}' after field group",
                parser.peek_char()
            )));
        }
    }

    let mut event = Event::new(name, timestamp);
    if let Some(payload) = groups.pop() {
        event.fields = payload;
    }
    for group in groups {
        event.context.extend(group);
    }
    Ok(Some(event))
}

/// Timestamp in nanoseconds from any of babeltrace's clock formats
fn parse_timestamp(text: &str) -> Result<i64, String> {
    if text.contains(':') {
        let date_time = if text.contains('-') && text.contains(' ') {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| format!("invalid date '{}': {}", text, e))?
                .and_utc()
                .timestamp_nanos_opt()
        } else {
            let time = NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .map_err(|e| format!("invalid time '{}': {}", text, e))?;
            Some(
                i64::from(time.num_seconds_from_midnight()) * NANOS_PER_SECOND
                    + i64::from(time.nanosecond()),
            )
        };
        return date_time.ok_or_else(|| format!("timestamp '{}' out of range", text));
    }

    if let Some((secs, frac)) = text.split_once('.') {
        let secs: i64 = secs
            .parse()
            .map_err(|_| format!("invalid seconds in '{}'", text))?;
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid fraction in '{}'", text));
        }
        let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
        let nanos: i64 = digits
            .parse()
            .map_err(|_| format!("invalid fraction in '{}'", text))?;
        return secs
            .checked_mul(NANOS_PER_SECOND)
            .and_then(|s| s.checked_add(nanos))
            .ok_or_else(|| format!("timestamp '{}' out of range", text));
    }

    text.parse()
        .map_err(|_| format!("invalid timestamp '{}'", text))
}

/// Cursor over the `{ name = value, ... }` part of a line
struct FieldParser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> FieldParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_char(&self) -> char {
        self.peek().map(char::from).unwrap_or(' ')
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), String> {
        self.skip_ws();
        if self.eat(b) {
            Ok(())
        } else {
            Err(format!(
                "expected '{}' at column {} but found '{}'",
                char::from(b),
                self.pos,
                self.peek_char()
            ))
        }
    }

    /// Identifier-like word: letters, digits, `_`, `.`, `:`, `-`, `+`
    fn word(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b"_.:-+".contains(&b))
        {
            self.pos += 1;
        }
        std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default()
    }

    /// `{ name = value, ... }` with field names stripped of one leading underscore
    fn parse_struct(&mut self) -> Result<BTreeMap<String, FieldValue>, String> {
        Ok(self.parse_members()?.into_iter().collect())
    }

    fn parse_members(&mut self) -> Result<Vec<(String, FieldValue)>, String> {
        self.expect(b'{')?;
        let mut members = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(b'}') {
                break;
            }
            let name = self.word();
            if name.is_empty() {
                return Err(format!("expected field name at column {}", self.pos));
            }
            let name = name.strip_prefix('_').unwrap_or(name).to_string();
            self.expect(b'=')?;
            let value = self.parse_value()?;
            members.push((name, value));

            self.skip_ws();
            if !self.eat(b',') {
                self.expect(b'}')?;
                break;
            }
        }
        Ok(members)
    }

    fn parse_value(&mut self) -> Result<FieldValue, String> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => Ok(FieldValue::Struct(self.parse_members()?)),
            Some(b'[') => self.parse_array(),
            Some(b'(') => self.parse_enum(),
            Some(b'"') => Ok(FieldValue::String(self.parse_string()?)),
            Some(_) => {
                let word = self.word();
                if word.is_empty() {
                    return Err(format!(
                        "unexpected '{}' at column {}",
                        self.peek_char(),
                        self.pos
                    ));
                }
                Ok(parse_scalar(word))
            }
            None => Err("unexpected end of line".to_string()),
        }
    }

    /// `[ [0] = a, [1] = b ]` or `[ a, b ]`
    fn parse_array(&mut self) -> Result<FieldValue, String> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(b']') {
                break;
            }
            if self.peek() == Some(b'[') {
                self.pos += 1;
                self.word();
                self.expect(b']')?;
                self.expect(b'=')?;
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            if !self.eat(b',') {
                self.expect(b']')?;
                break;
            }
        }
        Ok(FieldValue::Array(items))
    }

    /// `( "label" : container = 3 )`, also with `{ "a", "b" }` or `<unknown>` labels
    fn parse_enum(&mut self) -> Result<FieldValue, String> {
        self.expect(b'(')?;
        let mut label = None;
        while let Some(b) = self.peek() {
            match b {
                b'"' => {
                    let text = self.parse_string()?;
                    label.get_or_insert(text);
                }
                b':' => break,
                _ => self.pos += 1,
            }
        }
        self.expect(b':')?;
        self.skip_ws();
        let keyword = self.word();
        if keyword != "container" {
            return Err(format!("expected 'container' but found '{}'", keyword));
        }
        self.expect(b'=')?;
        let value = self
            .parse_value()?
            .as_i64()
            .ok_or_else(|| "enum container is not an integer".to_string())?;
        self.expect(b')')?;
        Ok(FieldValue::Enum { label, value })
    }

    fn parse_string(&mut self) -> Result<String, String> {
        self.expect(b'"')?;
        let mut bytes = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'"' => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
                b'\\' => {
                    let escaped = self.peek().ok_or("unterminated escape")?;
                    self.pos += 1;
                    bytes.push(match escaped {
                        b'n' => b'\n',
                        b't' => b'\t',
                        other => other,
                    });
                }
                other => bytes.push(other),
            }
        }
        Err("unterminated string".to_string())
    }
}

/// Integer, float, or anything else kept as text
fn parse_scalar(word: &str) -> FieldValue {
    let (negative, digits) = match word.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, word.strip_prefix('+').unwrap_or(word)),
    };

    let unsigned = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()
    } else {
        digits.parse::<u64>().ok()
    };

    match (unsigned, negative) {
        (Some(v), false) => FieldValue::Unsigned(v),
        (Some(v), true) => match 0i64.checked_sub_unsigned(v) {
            Some(v) => FieldValue::Signed(v),
            None => FieldValue::String(word.to_string()),
        },
        (None, _) => match word.parse::<f64>() {
            Ok(v) => FieldValue::Float(v),
            Err(_) => FieldValue::String(word.to_string()),
        },
    }
}
