//! Persistent storage for the extraction pipeline.
//!
//! - [`DataCache`]: one file per key; memoizes every remote result so runs
//!   are resumable. Stages receive it behind the [`Cache`] trait.
//! - [`IdStore`]: libSQL database of resource URI → page id resolutions,
//!   consulted before any remote id lookup.
//!
//! **Access rules:** a single writer process per cache directory or database;
//! there is no internal locking.

pub mod cache;
pub mod id_store;
mod migrations;

pub use cache::{Cache, DataCache, escape_key, split_list, unescape_key};
pub use id_store::IdStore;
