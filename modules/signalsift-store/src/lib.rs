//! File-backed durable stores for cursors and cluster state.
//!
//! Both stores write through a same-directory temp file and an atomic
//! rename, so a crash mid-write leaves the previous committed state intact.

pub mod cursor_store;
pub mod item_store;

pub use cursor_store::{CursorStore, FileCursorStore};
pub use item_store::FileItemStore;
