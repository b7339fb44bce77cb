//! # zone-rebind
//!
//! Rebind address records in hand-maintained DNS zone files.
//!
//! Zone files are parsed into a three-level database: the [`Database`]
//! owns [`MasterFile`]s, each master file owns the [`Authority`] sections
//! opened by its SOA records, and each authority owns its record
//! [`Token`]s. Every level indexes its children by owner name and by
//! address, so an update fans out only to the files and authorities that
//! actually hold the name.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use zone_rebind::Database;
//!
//! let mut db = Database::new();
//! db.process(["db.example.com", "db.example.org"])?;
//!
//! // Rebind every A record owned by the name; AAAA records take IPv6.
//! db.update_ip("www.example.com.", "192.0.2.10");
//!
//! // Replace each file atomically. Authorities that changed get their
//! // SOA serial bumped by one.
//! db.write()?;
//! ```
//!
//! ## Fidelity
//!
//! Comments, blank lines, directives, line endings and untouched records are
//! written back exactly as read. A serial bump replaces only the serial
//! digits of the SOA, wherever they sit in a multi-line record. A rebound
//! record is re-rendered as `<name> <ttl> <class> <type> <rdata>` followed
//! by its original inline comment and line ending.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod authority;
pub mod config;
pub mod database;
pub mod error;
pub mod index;
pub mod master_file;
pub mod parser;
pub mod record;
pub mod util;

pub use authority::{Authority, Rebound};
pub use config::ParseConfig;
pub use database::Database;
pub use error::{Result, ZoneError};
pub use master_file::MasterFile;
pub use parser::ZoneReader;
pub use record::{Class, RData, Record, RecordSummary, Soa, Token};
