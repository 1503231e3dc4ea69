//! termstore core library
//!
//! Storage for terms and their taxonomies in a single human-readable TOML
//! file that diffs and merges cleanly under version control.

pub mod change_info;
pub mod codec;
pub mod repository;
pub mod storage;
pub mod tree;
pub mod value;
pub mod vp_id;

pub use change_info::{ChangeAction, ChangeInfo};
pub use codec::{CodecError, Sections};
pub use repository::{TaxonomyRecord, TermTaxonomyStorage, NOT_SAVED_FIELDS};
pub use storage::{RawStorage, SingleFileStorage, StorageError};
pub use tree::{Term, TermTree};
pub use value::{Fields, Value};
pub use vp_id::{VpId, VpIdError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
