//! Core traits for the DNS mirror
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RecordAuthority`]: Read the authoritative record set of a zone
//! - [`MirrorStore`]: Read and write the persisted mirror table

pub mod authority;
pub mod mirror_store;

pub use authority::{PageRequest, RecordAuthority, RecordAuthorityFactory, RecordPage};
pub use mirror_store::{MirrorStore, MirrorStoreFactory};
