//! Resource record tokens and their textual rendering.
//!
//! A [`Token`] is one parsed record together with everything needed to put
//! it back on disk: the inline comment, the original source text, and the
//! blank/comment/directive lines that preceded it. Untouched tokens are
//! re-emitted exactly as read, line endings included. A serial bump edits
//! the serial digits in place; a rebound address is rendered from the
//! structured [`Record`].

use std::fmt;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Range;

/// DNS class of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Class {
    /// Internet (`IN`).
    In,
    /// Chaos (`CH`).
    Ch,
    /// Hesiod (`HS`).
    Hs,
    /// Anything else, kept as written (e.g. `CLASS255`).
    Other(String),
}

impl Class {
    /// Recognizes a class mnemonic, case-insensitively.
    #[must_use]
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IN" => Some(Self::In),
            "CH" | "CHAOS" => Some(Self::Ch),
            "HS" | "HESIOD" => Some(Self::Hs),
            "NONE" | "ANY" => Some(Self::Other(s.to_ascii_uppercase())),
            _ if upper.len() > 5
                && upper.starts_with("CLASS")
                && upper[5..].bytes().all(|b| b.is_ascii_digit()) =>
            {
                Some(Self::Other(s.to_ascii_uppercase()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("IN"),
            Self::Ch => f.write_str("CH"),
            Self::Hs => f.write_str("HS"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Start-of-authority data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soa {
    /// Primary nameserver.
    pub mname: String,
    /// Responsible mailbox.
    pub rname: String,
    /// Zone serial number.
    pub serial: u32,
    /// Refresh interval, seconds.
    pub refresh: u32,
    /// Retry interval, seconds.
    pub retry: u32,
    /// Expire limit, seconds.
    pub expire: u32,
    /// Negative caching TTL, seconds.
    pub minimum: u32,
}

/// Record payload. Only the kinds the database acts on are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    /// `SOA`
    Soa(Soa),
    /// `A`
    A(Ipv4Addr),
    /// `AAAA`
    Aaaa(Ipv6Addr),
    /// Any other type; rdata fields are kept as written, single-space joined.
    Other {
        /// Type mnemonic as written, upper-cased.
        rtype: String,
        /// Rdata text.
        text: String,
    },
}

impl RData {
    /// Type mnemonic.
    #[must_use]
    pub fn rtype(&self) -> &str {
        match self {
            Self::Soa(_) => "SOA",
            Self::A(_) => "A",
            Self::Aaaa(_) => "AAAA",
            Self::Other { rtype, .. } => rtype,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soa(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname, soa.rname, soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum
            ),
            Self::A(addr) => write!(f, "{addr}"),
            Self::Aaaa(addr) => write!(f, "{addr}"),
            Self::Other { text, .. } => f.write_str(text),
        }
    }
}

/// One resource record with an absolute owner name and resolved TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Absolute owner name.
    pub name: String,
    /// Time to live, seconds.
    pub ttl: u32,
    /// Record class.
    pub class: Class,
    /// Typed payload.
    pub data: RData,
}

impl Record {
    /// Returns `true` for an SOA record.
    #[must_use]
    pub const fn is_soa(&self) -> bool {
        matches!(self.data, RData::Soa(_))
    }
}

/// Renders `<name> <ttl> <class> <type> <rdata>`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name,
            self.ttl,
            self.class,
            self.data.rtype(),
            self.data
        )
    }
}

/// Owner name and current address of a token.
///
/// Always computed from the token's payload at the time of the call; never
/// store one across a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    /// Owner name as written (absolute).
    pub name: String,
    /// Address for Internet-class `A`/`AAAA` records, `None` otherwise.
    pub address: Option<IpAddr>,
}

impl RecordSummary {
    /// Key under which this record is found in name indexes.
    #[must_use]
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Key under which this record is found in address indexes.
    #[must_use]
    pub fn address_key(&self) -> Option<String> {
        self.address.map(|a| a.to_string())
    }
}

/// Normalizes an owner name for index lookups (names compare
/// case-insensitively).
#[must_use]
pub fn name_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// A parsed record plus its surrounding text.
#[derive(Debug, Clone)]
pub struct Token {
    record: Record,
    comment: String,
    line: usize,
    source: String,
    /// Byte range of the SOA serial within `source`.
    serial_span: Option<Range<usize>>,
    leading: Vec<String>,
    modified: bool,
}

impl Token {
    /// Creates a token.
    ///
    /// `source` is the record's original text, possibly several lines, with
    /// line terminators kept as read. `comment` is its inline comment
    /// including the leading `;`.
    #[must_use]
    pub fn new(
        record: Record,
        comment: impl Into<String>,
        line: usize,
        source: impl Into<String>,
    ) -> Self {
        Self {
            record,
            comment: comment.into(),
            line,
            source: source.into(),
            serial_span: None,
            leading: Vec::new(),
            modified: false,
        }
    }

    /// Attaches text to emit verbatim before this record, one line per
    /// entry with its terminator.
    #[must_use]
    pub fn with_leading(mut self, leading: Vec<String>) -> Self {
        self.leading = leading;
        self
    }

    /// Marks where the SOA serial sits in the source text, so a bump only
    /// rewrites those bytes. Ignored unless the range lies within the source.
    #[must_use]
    pub fn with_serial_span(mut self, span: Range<usize>) -> Self {
        if self.source.get(span.clone()).is_some() {
            self.serial_span = Some(span);
        }
        self
    }

    /// The structured record.
    #[must_use]
    pub const fn record(&self) -> &Record {
        &self.record
    }

    /// Inline comment, empty when there is none.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Line the record starts on.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Whether the record is rendered from its structured form on write
    /// instead of from its source text.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Computes the current [`RecordSummary`].
    #[must_use]
    pub fn summary(&self) -> RecordSummary {
        let address = match (&self.record.class, &self.record.data) {
            (Class::In, RData::A(a)) => Some(IpAddr::V4(*a)),
            (Class::In, RData::Aaaa(a)) => Some(IpAddr::V6(*a)),
            _ => None,
        };
        RecordSummary {
            name: self.record.name.clone(),
            address,
        }
    }

    /// Rebinds an `A`/`AAAA` payload. Returns `false`, leaving the token
    /// untouched, for other types or an address of the wrong family.
    pub fn set_address(&mut self, address: IpAddr) -> bool {
        match (&mut self.record.data, address) {
            (RData::A(current), IpAddr::V4(v4)) => *current = v4,
            (RData::Aaaa(current), IpAddr::V6(v6)) => *current = v6,
            _ => return false,
        }
        self.modified = true;
        true
    }

    /// Advances the SOA serial by one using serial-number arithmetic.
    /// Returns the new serial, or `None` if this is not an SOA record.
    ///
    /// When the serial's place in the source text is known only those
    /// digits are replaced, so layout, comments and every other field are
    /// written back as read.
    pub fn bump_serial(&mut self) -> Option<u32> {
        let RData::Soa(soa) = &mut self.record.data else {
            return None;
        };
        soa.serial = soa.serial.wrapping_add(1);
        let serial = soa.serial;

        match self.serial_span.take() {
            Some(span) if !self.modified => {
                let digits = serial.to_string();
                let start = span.start;
                self.source.replace_range(span, &digits);
                self.serial_span = Some(start..start + digits.len());
            }
            _ => self.modified = true,
        }
        Some(serial)
    }

    /// Terminator of the record's last source line, empty at end of input.
    fn line_ending(&self) -> &str {
        if self.source.ends_with("\r\n") {
            "\r\n"
        } else if self.source.ends_with('\n') {
            "\n"
        } else {
            ""
        }
    }

    /// Writes the leading lines and the record.
    ///
    /// A re-rendered record ends the way its source did.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in &self.leading {
            out.write_all(line.as_bytes())?;
        }
        if !self.modified {
            return out.write_all(self.source.as_bytes());
        }
        if self.comment.is_empty() {
            write!(out, "{}{}", self.record, self.line_ending())
        } else {
            write!(out, "{} {}{}", self.record, self.comment, self.line_ending())
        }
    }

    /// Consumes the token, returning its text as verbatim lines, terminators
    /// included.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        let mut lines = self.leading;
        lines.extend(self.source.split_inclusive('\n').map(str::to_string));
        lines
    }

    pub(crate) fn prepend_leading(&mut self, mut lines: Vec<String>) {
        lines.append(&mut self.leading);
        self.leading = lines;
    }
}
