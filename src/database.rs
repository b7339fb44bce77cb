//! The record database: every master file of a run and the top-level
//! indexes over them.

use std::fs::File;
use std::io::{BufReader, Write};
use std::net::IpAddr;
use std::path::Path;

use crate::config::ParseConfig;
use crate::error::{Result, ZoneError};
use crate::index::Index;
use crate::master_file::MasterFile;
use crate::parser::ZoneReader;
use crate::record::{RecordSummary, name_key};

/// Entry point for reading zone files, rebinding addresses and writing the
/// files back.
///
/// # Lifecycle
///
/// 1. [`process`](Self::process) parses and indexes each file.
/// 2. [`update_ip`](Self::update_ip) rebinds a name wherever it occurs.
/// 3. [`write`](Self::write) replaces each file on disk, bumping the SOA
///    serial of every authority that changed.
///
/// # Example
///
/// ```rust,ignore
/// use zone_rebind::Database;
///
/// let mut db = Database::new();
/// db.process(["db.example.com"])?;
/// db.update_ip("host.example.com.", "10.0.0.2");
/// db.write()?;
/// ```
#[derive(Debug, Default)]
pub struct Database {
    config: ParseConfig,
    files: Vec<MasterFile>,
    by_ip: Index,
    by_name: Index,
}

impl Database {
    /// Creates an empty database with the default [`ParseConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty database parsing files with `config`.
    #[must_use]
    pub fn with_config(config: ParseConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Master files in the order they were processed.
    #[must_use]
    pub fn files(&self) -> &[MasterFile] {
        &self.files
    }

    /// Master files holding a record owned by `name`.
    pub fn files_for_name(&self, name: &str) -> impl Iterator<Item = &MasterFile> {
        self.by_name
            .distinct(&name_key(name))
            .into_iter()
            .map(move |i| &self.files[i])
    }

    /// Master files holding a record bound to `address`.
    pub fn files_for_ip(&self, address: IpAddr) -> impl Iterator<Item = &MasterFile> {
        self.by_ip
            .distinct(&address.to_string())
            .into_iter()
            .map(move |i| &self.files[i])
    }

    /// Parses and indexes each file, in order.
    ///
    /// A file that fails to parse is not added; files processed before it
    /// stay loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::Open`] for the first file that cannot be
    /// opened, or the first parse error of a file.
    pub fn process<I>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            let file = File::open(path).map_err(|source| ZoneError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            let tokens = ZoneReader::new(BufReader::new(file), path, &self.config);

            let mut master = MasterFile::new(path);
            let summaries = master.process(tokens)?;

            let id = self.files.len();
            for summary in &summaries {
                self.index(id, summary);
            }
            self.files.push(master);
        }
        Ok(())
    }

    /// Rebinds every `A`/`AAAA` record owned by `name` to `address`, in
    /// every file. Returns the number of records changed.
    ///
    /// Records already at `address` are left alone, so repeating a call is
    /// a no-op. An empty or unparseable `address` changes nothing.
    pub fn update_ip(&mut self, name: &str, address: &str) -> usize {
        let address = address.trim();
        if address.is_empty() {
            tracing::debug!(name = %name, "Empty address, nothing to update");
            return 0;
        }
        let Ok(address) = address.parse::<IpAddr>() else {
            tracing::warn!(name = %name, address = %address, "Not an IP address, ignoring update");
            return 0;
        };

        let mut changed = 0;
        for id in self.by_name.distinct(&name_key(name)) {
            for change in self.files[id].update_ip(name, address) {
                self.unindex(id, &change.old);
                self.index(id, &change.new);
                changed += 1;
            }
        }

        if changed == 0 {
            tracing::debug!(name = %name, %address, "No records changed");
        }
        changed
    }

    /// Writes every master file back, in processing order.
    ///
    /// Stops at the first failure; files already written stay written.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`MasterFile::write`].
    pub fn write(&mut self) -> Result<()> {
        for file in &mut self.files {
            file.write()?;
        }
        Ok(())
    }

    /// Renders every master file to `out`, each preceded by a `;; <path>`
    /// comment line. Serials are bumped as in [`write`](Self::write).
    ///
    /// # Errors
    ///
    /// Returns the first error from [`MasterFile::render`].
    pub fn render(&mut self, out: &mut dyn Write) -> Result<()> {
        for file in &mut self.files {
            writeln!(out, ";; {}", file.path().display())?;
            file.render(out)?;
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

    const ZONE: &str = "\
example.com. 300 IN SOA ns.example.com. admin.example.com. 5 3600 900 604800 300
host.example.com. 300 IN A 10.0.0.1
alias.example.com. 300 IN A 10.0.0.1
";

    fn setup() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.example.com");
        std::fs::write(&path, ZONE).unwrap();
        let mut db = Database::new();
        db.process([&path]).unwrap();
        (dir, db)
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn process_builds_top_level_indexes() {
        let (_dir, db) = setup();
        assert_eq!(db.files().len(), 1);
        assert_eq!(db.files_for_name("host.example.com.").count(), 1);
        assert_eq!(db.files_for_ip(ip("10.0.0.1")).count(), 1);
        assert_eq!(db.by_ip.get("10.0.0.1"), &[0, 0]);
    }

    #[test]
    fn update_reindexes_addresses() {
        let (_dir, mut db) = setup();
        assert_eq!(db.update_ip("host.example.com.", "10.0.0.2"), 1);

        assert_eq!(db.by_ip.get("10.0.0.1"), &[0]);
        assert_eq!(db.files_for_ip(ip("10.0.0.2")).count(), 1);

        db.update_ip("alias.example.com.", "10.0.0.2");
        assert_eq!(db.files_for_ip(ip("10.0.0.1")).count(), 0);
    }

    #[test]
    fn invalid_addresses_are_ignored() {
        let (_dir, mut db) = setup();
        assert_eq!(db.update_ip("host.example.com.", ""), 0);
        assert_eq!(db.update_ip("host.example.com.", "not-an-ip"), 0);
        assert!(!db.files()[0].is_dirty());
    }

    #[test]
    fn render_prefixes_each_file() {
        let (_dir, mut db) = setup();
        db.update_ip("host.example.com.", "10.0.0.2");

        let mut out = Vec::new();
        db.render(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        let header = format!(";; {}\n", db.files()[0].path().display());
        assert!(out.starts_with(&header), "{out}");
        assert!(out.contains("admin.example.com. 6 3600"));
        assert!(out.contains("host.example.com. 300 IN A 10.0.0.2\n"));
    }

    #[test]
    fn missing_file_is_open_error() {
        let mut db = Database::new();
        let err = db.process(["/nonexistent/db.zone"]).unwrap_err();
        assert!(matches!(err, ZoneError::Open { .. }), "{err}");
        assert!(db.files().is_empty());
    }
}
