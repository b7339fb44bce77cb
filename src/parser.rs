//! Master file token source.
//!
//! [`ZoneReader`] pulls lines from a reader on demand and yields one
//! [`Token`] per resource record, in file order. It understands the
//! RFC 1035 master file conventions the zone files in practice rely on:
//!
//! - `$ORIGIN` and `$TTL` directives (`$INCLUDE` is rejected)
//! - `@` and names relative to the origin
//! - owner inheritance for lines starting with whitespace
//! - optional TTL (with `s`/`m`/`h`/`d`/`w` units) and class, in either order
//! - parentheses spanning multiple lines
//! - `;` comments and quoted strings
//!
//! Blank lines, comment lines and directives are not dropped: they are
//! attached to the next token as leading lines, or returned by
//! [`ZoneReader::into_trailing`] at end of input. Every line keeps its
//! terminator (`\n`, `\r\n`, or none at end of input) so a file can be
//! written back byte for byte.
//!
//! The first error ends the stream.

use std::io::BufRead;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

use crate::config::ParseConfig;
use crate::error::{Result, ZoneError};
use crate::record::{Class, RData, Record, Soa, Token};

/// Lazy, pull-based reader of resource record tokens.
#[derive(Debug)]
pub struct ZoneReader<R> {
    reader: R,
    path: PathBuf,
    origin: Option<String>,
    default_ttl: u32,
    /// Value of the last `$TTL` directive.
    ttl_directive: Option<u32>,
    /// Last explicit TTL, used when no `$TTL` has been seen.
    last_ttl: Option<u32>,
    last_owner: Option<String>,
    last_class: Class,
    line_number: usize,
    pending: Vec<String>,
    done: bool,
}

impl<R: BufRead> ZoneReader<R> {
    /// Creates a reader. `path` is used for error reporting only.
    #[must_use]
    pub fn new(reader: R, path: impl Into<PathBuf>, config: &ParseConfig) -> Self {
        Self {
            reader,
            path: path.into(),
            origin: config.origin.clone(),
            default_ttl: config.default_ttl,
            ttl_directive: None,
            last_ttl: None,
            last_owner: None,
            last_class: Class::In,
            line_number: 0,
            pending: Vec::new(),
            done: false,
        }
    }

    /// Lines after the last record (blank lines, comments, directives).
    #[must_use]
    pub fn into_trailing(self) -> Vec<String> {
        self.pending
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ZoneError {
        ZoneError::Parse {
            path: self.path.clone(),
            line,
            message: message.into(),
        }
    }

    /// Next raw line, terminator included.
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                self.line_number += 1;
                Ok(Some(line))
            }
            Err(e) => Err(self.error(self.line_number + 1, format!("read failed: {e}"))),
        }
    }

    fn read_token(&mut self) -> Result<Option<Token>> {
        loop {
            let Some(line) = self.next_line()? else {
                return Ok(None);
            };
            let start = self.line_number;
            let (content, comment) = split_comment(trim_newline(&line));

            if content.trim().is_empty() {
                self.pending.push(line);
                continue;
            }
            if content.starts_with('$') {
                self.directive(content, start)?;
                self.pending.push(line);
                continue;
            }

            let inherit_owner = content.starts_with([' ', '\t']);
            let mut text = content.to_string();
            let mut comments = Vec::new();
            if !comment.is_empty() {
                comments.push(comment.to_string());
            }
            let mut depth = paren_delta(content);
            let mut source = line.clone();
            // Where each physical line starts, in `text` and in `source`.
            let mut starts = vec![(0, 0)];

            while depth > 0 {
                let Some(next) = self.next_line()? else {
                    return Err(self.error(start, "unterminated '('"));
                };
                let (content, comment) = split_comment(trim_newline(&next));
                depth += paren_delta(content);
                text.push(' ');
                starts.push((text.len(), source.len()));
                text.push_str(content);
                if !comment.is_empty() {
                    comments.push(comment.to_string());
                }
                source.push_str(&next);
            }
            if depth < 0 {
                return Err(self.error(start, "unbalanced ')'"));
            }

            let located = located_fields(&text).map_err(|m| self.error(start, m))?;
            let fields: Vec<String> = located.iter().map(|(_, f)| f.clone()).collect();
            let record = self.parse_record(inherit_owner, &fields, start)?;

            // SOA rdata is the last seven fields; the serial is the third.
            let serial = if record.is_soa() {
                located.len().checked_sub(5).and_then(|i| located.get(i))
            } else {
                None
            };
            let mut token = Token::new(record, comments.join(" "), start, source)
                .with_leading(mem::take(&mut self.pending));
            if let Some((at, digits)) = serial {
                let (text_start, source_start) = starts
                    .iter()
                    .rev()
                    .find(|(t, _)| t <= at)
                    .copied()
                    .unwrap_or_default();
                let offset = source_start + (at - text_start);
                token = token.with_serial_span(offset..offset + digits.len());
            }
            return Ok(Some(token));
        }
    }

    fn directive(&mut self, content: &str, line: usize) -> Result<()> {
        let fields = fields(content).map_err(|m| self.error(line, m))?;
        let Some((directive, args)) = fields.split_first() else {
            return Ok(());
        };

        match directive.to_ascii_uppercase().as_str() {
            "$ORIGIN" => {
                let name = args
                    .first()
                    .ok_or_else(|| self.error(line, "$ORIGIN requires a domain name"))?;
                let origin = self.absolute(name, line)?;
                self.origin = Some(origin);
            }
            "$TTL" => {
                let value = args
                    .first()
                    .ok_or_else(|| self.error(line, "$TTL requires a value"))?;
                let ttl = parse_ttl(value)
                    .ok_or_else(|| self.error(line, format!("invalid TTL {value:?}")))?;
                self.ttl_directive = Some(ttl);
            }
            "$INCLUDE" => return Err(self.error(line, "$INCLUDE is not supported")),
            other => return Err(self.error(line, format!("unknown directive {other}"))),
        }
        Ok(())
    }

    fn parse_record(
        &mut self,
        inherit_owner: bool,
        fields: &[String],
        line: usize,
    ) -> Result<Record> {
        let mut rest = fields;
        let name = if inherit_owner {
            self.last_owner
                .clone()
                .ok_or_else(|| self.error(line, "no previous owner name to inherit"))?
        } else {
            let (owner, tail) = rest
                .split_first()
                .ok_or_else(|| self.error(line, "empty record"))?;
            rest = tail;
            self.absolute(owner, line)?
        };

        let mut ttl = None;
        let mut class = None;
        while let Some((field, tail)) = rest.split_first() {
            if ttl.is_none() && field.starts_with(|c: char| c.is_ascii_digit()) {
                let value = parse_ttl(field)
                    .ok_or_else(|| self.error(line, format!("invalid TTL {field:?}")))?;
                ttl = Some(value);
            } else if class.is_none() {
                match Class::from_mnemonic(field) {
                    Some(c) => class = Some(c),
                    None => break,
                }
            } else {
                break;
            }
            rest = tail;
        }

        let (rtype, rdata) = rest
            .split_first()
            .ok_or_else(|| self.error(line, "missing record type"))?;
        if !is_type_mnemonic(rtype) {
            return Err(self.error(line, format!("invalid record type {rtype:?}")));
        }
        let rtype = rtype.to_ascii_uppercase();

        let class = class.unwrap_or_else(|| self.last_class.clone());
        let ttl = match ttl {
            Some(ttl) => {
                self.last_ttl = Some(ttl);
                ttl
            }
            None => self
                .ttl_directive
                .or(self.last_ttl)
                .unwrap_or(self.default_ttl),
        };
        let data = self.parse_rdata(&rtype, &class, rdata, &name, line)?;

        self.last_owner = Some(name.clone());
        self.last_class = class.clone();
        Ok(Record {
            name,
            ttl,
            class,
            data,
        })
    }

    fn parse_rdata(
        &self,
        rtype: &str,
        class: &Class,
        rdata: &[String],
        name: &str,
        line: usize,
    ) -> Result<RData> {
        match (rtype, class) {
            ("SOA", _) => self.parse_soa(rdata, name, line).map(RData::Soa),
            ("A", Class::In) => match rdata {
                [addr] => addr
                    .parse::<Ipv4Addr>()
                    .map(RData::A)
                    .map_err(|_| self.error(line, format!("invalid IPv4 address {addr:?}"))),
                _ => Err(self.error(line, "A record needs exactly one address")),
            },
            ("AAAA", Class::In) => match rdata {
                [addr] => addr
                    .parse::<Ipv6Addr>()
                    .map(RData::Aaaa)
                    .map_err(|_| self.error(line, format!("invalid IPv6 address {addr:?}"))),
                _ => Err(self.error(line, "AAAA record needs exactly one address")),
            },
            _ => Ok(RData::Other {
                rtype: rtype.to_string(),
                text: rdata.join(" "),
            }),
        }
    }

    fn parse_soa(&self, rdata: &[String], name: &str, line: usize) -> Result<Soa> {
        let mismatch = |why: String| ZoneError::TypeMismatch {
            context: format!(
                "{}:{line}: SOA record {name} does not decode as SOA: {why}",
                self.path.display()
            ),
        };

        let [mname, rname, serial, refresh, retry, expire, minimum] = rdata else {
            return Err(mismatch(format!("expected 7 fields, found {}", rdata.len())));
        };
        let serial = serial
            .parse::<u32>()
            .map_err(|_| mismatch(format!("invalid serial {serial:?}")))?;
        let timer = |field: &String| {
            parse_ttl(field).ok_or_else(|| mismatch(format!("invalid interval {field:?}")))
        };

        Ok(Soa {
            mname: self.absolute(mname, line)?,
            rname: self.absolute(rname, line)?,
            serial,
            refresh: timer(refresh)?,
            retry: timer(retry)?,
            expire: timer(expire)?,
            minimum: timer(minimum)?,
        })
    }

    fn absolute(&self, name: &str, line: usize) -> Result<String> {
        if name == "@" {
            return self
                .origin
                .clone()
                .ok_or_else(|| self.error(line, "'@' used without an origin"));
        }
        if name.ends_with('.') && !name.ends_with("\\.") {
            return Ok(name.to_string());
        }
        match self.origin.as_deref() {
            Some(".") => Ok(format!("{name}.")),
            Some(origin) => Ok(format!("{name}.{origin}")),
            None => Err(self.error(line, format!("relative name {name:?} without an origin"))),
        }
    }
}

impl<R: BufRead> Iterator for ZoneReader<R> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

/// Strips the line terminator (`\n` or `\r\n`).
fn trim_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Splits a line at the first `;` outside a quoted string.
fn split_comment(line: &str) -> (&str, &str) {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => return (&line[..i], line[i..].trim_end()),
            _ => {}
        }
    }
    (line, "")
}

/// Net parenthesis depth change of a comment-free line.
fn paren_delta(content: &str) -> i32 {
    let mut quoted = false;
    let mut escaped = false;
    let mut delta = 0;
    for c in content.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            '(' if !quoted => delta += 1,
            ')' if !quoted => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Splits comment-free text into fields. Parentheses act as whitespace;
/// quoted strings are kept whole, quotes included.
fn fields(text: &str) -> std::result::Result<Vec<String>, String> {
    Ok(located_fields(text)?.into_iter().map(|(_, f)| f).collect())
}

/// Like [`fields`], paired with the byte offset each field starts at.
fn located_fields(text: &str) -> std::result::Result<Vec<(usize, String)>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut at = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if current.is_empty() {
            at = i;
        }
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                quoted = !quoted;
            }
            c if quoted => current.push(c),
            c if c.is_whitespace() || c == '(' || c == ')' => {
                if !current.is_empty() {
                    fields.push((at, mem::take(&mut current)));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted string".to_string());
    }
    if !current.is_empty() {
        fields.push((at, current));
    }
    Ok(fields)
}

fn is_type_mnemonic(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_alphabetic())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Parses a TTL such as `3600`, `1h` or `1h30m`.
fn parse_ttl(s: &str) -> Option<u32> {
    let mut total: u32 = 0;
    let mut current: Option<u32> = None;

    for c in s.chars() {
        if let Some(digit) = c.to_digit(10) {
            current = Some(current.unwrap_or(0).checked_mul(10)?.checked_add(digit)?);
            continue;
        }
        let unit = match c.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86_400,
            'w' => 604_800,
            _ => return None,
        };
        total = total.checked_add(current.take()?.checked_mul(unit)?)?;
    }

    match current {
        Some(n) => total.checked_add(n),
        None if !s.is_empty() => Some(total),
        None => None,
    }
}
