//! Filerelay Test Utilities
//!
//! In-memory stand-ins for the two external collaborators of the pipeline:
//!
//! - [`MemoryRemote`]: a remote filesystem with an ordered listing, a call
//!   journal and per-operation failure injection.
//! - [`MemoryRecordStore`]: a record store that answers `equal(FIELD,value)`
//!   predicates with *substring* matching, the way the real store does, and
//!   journals every query and upload.
//!
//! # Usage
//!
//! ```rust,ignore
//! use filerelay_test_utils::{MemoryRecordStore, MemoryRemote};
//!
//! let remote = MemoryRemote::new();
//! remote.add_file("/in/a_1.csv", b"data");
//! let store = MemoryRecordStore::new();
//! store.add_record(ExternalRecord::new("Project", 1).with_field("ID", "1"));
//! ```

pub mod records;
pub mod remote;

pub use records::{MemoryRecordStore, QueryCall, UploadCall};
pub use remote::{MemoryRemote, MemorySession, RemoteCall};
