//! One SOA-delimited section of a master file.

use std::io::Write;
use std::net::IpAddr;

use crate::error::{Result, ZoneError};
use crate::index::Index;
use crate::record::{RData, RecordSummary, Token, name_key};

/// A record whose address was changed by [`Authority::update_ip`].
///
/// Parents use the before/after summaries to move their own index entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebound {
    /// Summary before the change.
    pub old: RecordSummary,
    /// Summary after the change.
    pub new: RecordSummary,
}

/// The records governed by one SOA, up to the next SOA.
///
/// `records[0]` is the SOA. Every record is filed in the name index under
/// its owner, and in the address index when it is an `IN` `A`/`AAAA`.
#[derive(Debug)]
pub struct Authority {
    domain: String,
    dirty: bool,
    records: Vec<Token>,
    by_ip: Index,
    by_name: Index,
}

impl Authority {
    /// Opens an authority for `domain`. The first token added must be its
    /// SOA.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            dirty: false,
            records: Vec::new(),
            by_ip: Index::new(),
            by_name: Index::new(),
        }
    }

    /// Owner name of the SOA.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns `true` if a record changed since the serial was last bumped.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current SOA serial, if the first record is an SOA.
    #[must_use]
    pub fn serial(&self) -> Option<u32> {
        match &self.records.first()?.record().data {
            RData::Soa(soa) => Some(soa.serial),
            _ => None,
        }
    }

    /// Records in file order.
    #[must_use]
    pub fn records(&self) -> &[Token] {
        &self.records
    }

    /// Records owned by `name`.
    pub fn records_for_name(&self, name: &str) -> impl Iterator<Item = &Token> {
        self.by_name
            .get(&name_key(name))
            .iter()
            .map(move |&i| &self.records[i])
    }

    /// Records currently bound to `address`.
    pub fn records_for_ip(&self, address: IpAddr) -> impl Iterator<Item = &Token> {
        self.by_ip
            .get(&address.to_string())
            .iter()
            .map(move |&i| &self.records[i])
    }

    /// Appends a token and indexes it. Returns its summary so the owning
    /// file and database can file it too.
    pub fn add(&mut self, token: Token) -> RecordSummary {
        let id = self.records.len();
        let summary = token.summary();
        self.records.push(token);
        self.index(id, &summary);
        summary
    }

    /// Rebinds every `A`/`AAAA` record owned by `name` to `address`.
    ///
    /// Records already holding `address`, records without an address, and
    /// records of the other address family are left alone. Any change marks
    /// the authority dirty.
    pub fn update_ip(&mut self, name: &str, address: IpAddr) -> Vec<Rebound> {
        let ids = self.by_name.get(&name_key(name)).to_vec();
        let mut rebound = Vec::new();

        for id in ids {
            let old = self.records[id].summary();
            let Some(current) = old.address else {
                continue;
            };
            if current == address {
                tracing::debug!(name = %old.name, %address, "Address already current, skipping");
                continue;
            }
            if !self.records[id].set_address(address) {
                tracing::debug!(
                    name = %old.name,
                    current = %current,
                    %address,
                    "Address family mismatch, skipping"
                );
                continue;
            }

            self.unindex(id, &old);
            self.dirty = true;
            let new = self.records[id].summary();
            self.index(id, &new);

            tracing::info!(
                domain = %self.domain,
                name = %new.name,
                from = %current,
                to = %address,
                "Rebound address record"
            );
            rebound.push(Rebound { old, new });
        }
        rebound
    }

    /// Writes every record, bumping the SOA serial first if dirty.
    ///
    /// The bump clears the dirty flag, so writing again without further
    /// updates leaves the serial alone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::TypeMismatch`] if a bump is due and the first
    /// record is not an SOA, or [`ZoneError::Io`] if `out` fails.
    pub fn write(&mut self, out: &mut dyn Write) -> Result<()> {
        if self.dirty {
            let serial = self
                .records
                .first_mut()
                .and_then(Token::bump_serial)
                .ok_or_else(|| ZoneError::TypeMismatch {
                    context: format!("first record of authority {} is not SOA", self.domain),
                })?;
            self.dirty = false;
            tracing::info!(domain = %self.domain, serial, "Bumped SOA serial");
        }
        for token in &self.records {
            token.write_to(out)?;
        }
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
    use crate::parser::ZoneReader;

    const ZONE: &str = "\
example.com. 300 IN SOA ns.example.com. admin.example.com. 100 3600 900 604800 300
host.example.com. 300 IN A 10.0.0.1 ; comment
host.example.com. 300 IN AAAA 2001:db8::1
mail.example.com. 300 IN A 10.0.0.1
www.example.com. 300 IN CNAME host.example.com.
";

    fn authority() -> Authority {
        let mut auth = Authority::new("example.com.");
        for token in ZoneReader::new(ZONE.as_bytes(), "t", &ParseConfig::new()) {
            auth.add(token.unwrap());
        }
        auth
    }

    fn render(auth: &mut Authority) -> String {
        let mut out = Vec::new();
        auth.write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn add_indexes_names_and_addresses() {
        let auth = authority();
        assert_eq!(auth.serial(), Some(100));
        assert_eq!(auth.records_for_name("host.example.com.").count(), 2);
        assert_eq!(auth.records_for_name("HOST.Example.com.").count(), 2);
        assert_eq!(auth.records_for_ip(ip("10.0.0.1")).count(), 2);
        assert_eq!(auth.records_for_name("www.example.com.").count(), 1);
        assert!(!auth.is_dirty());
    }

    #[test]
    fn update_moves_index_entries() {
        let mut auth = authority();
        let rebound = auth.update_ip("host.example.com.", ip("10.0.0.2"));

        assert_eq!(rebound.len(), 1);
        assert_eq!(rebound[0].old.address, Some(ip("10.0.0.1")));
        assert_eq!(rebound[0].new.address, Some(ip("10.0.0.2")));
        assert!(auth.is_dirty());

        let old: Vec<_> = auth.records_for_ip(ip("10.0.0.1")).collect();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].record().name, "mail.example.com.");
        assert_eq!(auth.records_for_ip(ip("10.0.0.2")).count(), 1);
        assert_eq!(auth.records_for_name("host.example.com.").count(), 2);
    }

    #[test]
    fn update_is_idempotent() {
        let mut auth = authority();
        assert_eq!(auth.update_ip("host.example.com.", ip("10.0.0.2")).len(), 1);
        assert!(auth.update_ip("host.example.com.", ip("10.0.0.2")).is_empty());

        let out = render(&mut auth);
        assert!(out.contains(" 101 3600 900 604800 300\n"), "{out}");
    }

    #[test]
    fn update_ipv6_touches_only_aaaa() {
        let mut auth = authority();
        let rebound = auth.update_ip("host.example.com.", ip("2001:db8::2"));
        assert_eq!(rebound.len(), 1);
        assert_eq!(auth.records_for_ip(ip("10.0.0.1")).count(), 2);
        assert_eq!(auth.records_for_ip(ip("2001:db8::2")).count(), 1);
    }

    #[test]
    fn update_skips_records_without_address() {
        let mut auth = authority();
        assert!(auth.update_ip("www.example.com.", ip("10.0.0.9")).is_empty());
        assert!(auth.update_ip("nope.example.com.", ip("10.0.0.9")).is_empty());
        assert!(!auth.is_dirty());
    }

    #[test]
    fn clean_write_is_verbatim() {
        let mut auth = authority();
        assert_eq!(render(&mut auth), ZONE);
    }

    #[test]
    fn dirty_write_bumps_serial_once() {
        let mut auth = authority();
        auth.update_ip("host.example.com.", ip("10.0.0.2"));
        auth.update_ip("mail.example.com.", ip("10.0.0.3"));

        let out = render(&mut auth);
        assert!(out.starts_with(
            "example.com. 300 IN SOA ns.example.com. admin.example.com. 101 3600 900 604800 300\n"
        ));
        assert!(out.contains("host.example.com. 300 IN A 10.0.0.2 ; comment\n"));
        assert!(out.contains("mail.example.com. 300 IN A 10.0.0.3\n"));
        assert!(!auth.is_dirty());

        render(&mut auth);
        assert_eq!(auth.serial(), Some(101));
    }

    #[test]
    fn dirty_write_without_soa_is_type_mismatch() {
        let text = "host.example.com. 300 IN A 10.0.0.1\n";
        let mut auth = Authority::new("example.com.");
        for token in ZoneReader::new(text.as_bytes(), "t", &ParseConfig::new()) {
            auth.add(token.unwrap());
        }
        auth.update_ip("host.example.com.", ip("10.0.0.2"));

        let mut out = Vec::new();
        let err = auth.write(&mut out).unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(out.is_empty());
    }
}
