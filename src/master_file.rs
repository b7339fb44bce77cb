//! A zone master file: the authorities it contains and their write-back.

use std::io::{BufRead, Write};
use std::mem;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::authority::{Authority, Rebound};
use crate::error::{Result, ZoneError};
use crate::index::Index;
use crate::parser::ZoneReader;
use crate::record::{Class, RecordSummary, name_key};
use crate::util::replace_file;

/// One zone file on disk, split into SOA-delimited authorities.
#[derive(Debug)]
pub struct MasterFile {
    path: PathBuf,
    authorities: Vec<Authority>,
    /// Lines after the last record, or lines no authority could own.
    trailer: Vec<String>,
    by_ip: Index,
    by_name: Index,
}

impl MasterFile {
    /// Creates an empty master file bound to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            authorities: Vec::new(),
            trailer: Vec::new(),
            by_ip: Index::new(),
            by_name: Index::new(),
        }
    }

    /// Path the file was read from and will be written to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Authorities in file order.
    #[must_use]
    pub fn authorities(&self) -> &[Authority] {
        &self.authorities
    }

    /// Authorities holding a record owned by `name`.
    pub fn authorities_for_name(&self, name: &str) -> impl Iterator<Item = &Authority> {
        self.by_name
            .distinct(&name_key(name))
            .into_iter()
            .map(move |i| &self.authorities[i])
    }

    /// Authorities holding a record bound to `address`.
    pub fn authorities_for_ip(&self, address: IpAddr) -> impl Iterator<Item = &Authority> {
        self.by_ip
            .distinct(&address.to_string())
            .into_iter()
            .map(move |i| &self.authorities[i])
    }

    /// Returns `true` if any authority is dirty.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.authorities.iter().any(Authority::is_dirty)
    }

    /// Consumes a token stream, opening a new authority at every `IN` SOA.
    ///
    /// Records of other classes are kept verbatim but never open an
    /// authority; before the first SOA they are carried as plain text.
    /// Returns the summary of every indexed record so the database can
    /// file them.
    ///
    /// # Errors
    ///
    /// Returns the first error from `tokens`, or
    /// [`ZoneError::MissingSoa`] for an `IN` record preceding any SOA.
    pub fn process<R: BufRead>(
        &mut self,
        mut tokens: ZoneReader<R>,
    ) -> Result<Vec<RecordSummary>> {
        let mut summaries = Vec::new();
        let mut pending = Vec::new();

        for token in tokens.by_ref() {
            let mut token = token?;
            if !pending.is_empty() {
                token.prepend_leading(mem::take(&mut pending));
            }

            let record = token.record();
            if record.class == Class::In && record.is_soa() {
                self.authorities.push(Authority::new(record.name.clone()));
            }
            let Some(id) = self.authorities.len().checked_sub(1) else {
                if record.class == Class::In {
                    return Err(ZoneError::MissingSoa {
                        path: self.path.clone(),
                        line: token.line(),
                    });
                }
                pending = token.into_lines();
                continue;
            };

            let summary = self.authorities[id].add(token);
            self.index(id, &summary);
            summaries.push(summary);
        }

        pending.extend(tokens.into_trailing());
        self.trailer = pending;

        tracing::info!(
            path = %self.path.display(),
            authorities = self.authorities.len(),
            records = summaries.len(),
            "Parsed master file"
        );
        Ok(summaries)
    }

    /// Rebinds `name` to `address` in every authority that owns it.
    pub fn update_ip(&mut self, name: &str, address: IpAddr) -> Vec<Rebound> {
        let mut rebound = Vec::new();
        for id in self.by_name.distinct(&name_key(name)) {
            for change in self.authorities[id].update_ip(name, address) {
                self.unindex(id, &change.old);
                self.index(id, &change.new);
                rebound.push(change);
            }
        }
        rebound
    }

    /// Serializes every authority, then the trailing lines, to `out`.
    ///
    /// Dirty authorities get their serial bumped on the way.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Authority::write`].
    pub fn render(&mut self, out: &mut dyn Write) -> Result<()> {
        for authority in &mut self.authorities {
            authority.write(out)?;
        }
        for line in &self.trailer {
            out.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    /// Atomically replaces the file on disk with the rendered contents.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::Write`] if the temporary file cannot be
    /// created, written or renamed, in which case the original file is
    /// untouched.
    pub fn write(&mut self) -> Result<()> {
        let path = self.path.clone();
        replace_file(&path, |out| self.render(out))?;
        tracing::info!(path = %path.display(), "Wrote master file");
        Ok(())
    }

    fn index(&mut self, id: usize, summary: &RecordSummary) {
        if let Some(key) = summary.address_key() {
            self.by_ip.insert(&key, id);
        }
        self.by_name.insert(&summary.name_key(), id);
    }

    fn unindex(&mut self, id: usize, summary: &RecordSummary) {
        if let Some(key) = summary.address_key() {
            self.by_ip.remove_one(&key, id);
        }
        self.by_name.remove_one(&summary.name_key(), id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;

    const ZONE: &str = "\
$TTL 300
; first authority
example.com. IN SOA ns.example.com. admin.example.com. 5 3600 900 604800 300
host.example.com. IN A 10.0.0.1 ; comment
host.example.com. IN A 10.0.0.5

example.org. IN SOA ns.example.org. admin.example.org. 9 3600 900 604800 300
host.example.org. IN A 10.0.0.1
; end
";

    fn parse(text: &str) -> Result<MasterFile> {
        let mut mf = MasterFile::new("test.zone");
        mf.process(ZoneReader::new(text.as_bytes(), "test.zone", &ParseConfig::new()))?;
        Ok(mf)
    }

    fn render(mf: &mut MasterFile) -> String {
        let mut out = Vec::new();
        mf.render(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn splits_on_soa() {
        let mf = parse(ZONE).unwrap();
        let domains: Vec<_> = mf.authorities().iter().map(Authority::domain).collect();
        assert_eq!(domains, vec!["example.com.", "example.org."]);
        assert_eq!(mf.authorities()[0].records().len(), 3);
        assert_eq!(mf.authorities()[1].records().len(), 2);
        assert_eq!(mf.authorities_for_ip(ip("10.0.0.1")).count(), 2);
    }

    #[test]
    fn round_trips_untouched() {
        let mut mf = parse(ZONE).unwrap();
        assert_eq!(render(&mut mf), ZONE);
    }

    #[test]
    fn name_index_keeps_per_record_fan_out() {
        let mf = parse(ZONE).unwrap();
        assert_eq!(mf.by_name.get("host.example.com."), &[0, 0]);
        assert_eq!(mf.authorities_for_name("host.example.com.").count(), 1);
    }

    #[test]
    fn update_touches_only_owning_authority() {
        let mut mf = parse(ZONE).unwrap();
        let rebound = mf.update_ip("host.example.org.", ip("10.0.0.9"));
        assert_eq!(rebound.len(), 1);
        assert!(!mf.authorities()[0].is_dirty());
        assert!(mf.authorities()[1].is_dirty());

        let com: Vec<_> = mf
            .authorities_for_ip(ip("10.0.0.1"))
            .map(Authority::domain)
            .collect();
        assert_eq!(com, vec!["example.com."]);
        assert_eq!(mf.authorities_for_ip(ip("10.0.0.9")).count(), 1);

        let out = render(&mut mf);
        assert!(out.contains("admin.example.com. 5 "));
        assert!(out.contains(
            "\nexample.org. IN SOA ns.example.org. admin.example.org. 10 3600 900 604800 300\n"
        ));
        assert!(out.contains("host.example.org. 300 IN A 10.0.0.9\n"));
    }

    #[test]
    fn crlf_file_keeps_its_line_endings() {
        let text = ZONE.replace('\n', "\r\n");
        let mut mf = parse(&text).unwrap();
        assert_eq!(render(&mut mf), text);

        mf.update_ip("host.example.org.", ip("10.0.0.9"));
        let expected = text
            .replace("admin.example.org. 9 ", "admin.example.org. 10 ")
            .replace("host.example.org. IN A 10.0.0.1", "host.example.org. 300 IN A 10.0.0.9");
        assert_eq!(render(&mut mf), expected);
    }

    #[test]
    fn missing_final_newline_is_not_added() {
        let text = "example.com. 1 IN SOA ns. h. 1 1 1 1 1\nhost.example.com. 1 IN A 10.0.0.1";
        let mut mf = parse(text).unwrap();
        assert_eq!(render(&mut mf), text);

        mf.update_ip("host.example.com.", ip("10.0.0.2"));
        assert_eq!(
            render(&mut mf),
            "example.com. 1 IN SOA ns. h. 2 1 1 1 1\nhost.example.com. 1 IN A 10.0.0.2"
        );

        let text = "example.com. 1 IN SOA ns. h. 1 1 1 1 1\n; end";
        assert_eq!(render(&mut parse(text).unwrap()), text);
    }

    #[test]
    fn record_before_soa_is_missing_soa() {
        let err = parse("host.example.com. 300 IN A 10.0.0.1\n").unwrap_err();
        assert!(err.is_missing_soa(), "{err}");
    }

    #[test]
    fn non_internet_records_are_preserved() {
        let text = "\
version.bind. 0 CH TXT \"1.0\"
example.com. 300 IN SOA ns.example.com. admin.example.com. 1 1 1 1 1
id.server. 0 CH TXT \"ns1\"
host.example.com. 300 IN A 10.0.0.1
";
        let mut mf = parse(text).unwrap();
        assert_eq!(mf.authorities().len(), 1);
        assert_eq!(mf.authorities()[0].records().len(), 3);
        assert_eq!(render(&mut mf), text);
    }

    #[test]
    fn parse_error_propagates() {
        let err = parse("example.com. 1 IN SOA ns. h. 1 1 1 1 1\nx. 1 IN A nope\n").unwrap_err();
        assert!(matches!(err, ZoneError::Parse { line: 2, .. }), "{err}");
    }
}
