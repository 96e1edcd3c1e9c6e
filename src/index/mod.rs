//! Index Module
//!
//! Sparse bookmark indexes kept in a second, smaller volume.
//!
//! ## Flow
//! ```text
//!  Appender<T> ──commit──► data volume
//!       │
//!       └─ observer(record, location)      (only after the page is durable)
//!                 │
//!                 ▼
//!         IndexAppender<K> ──commit──► index volume
//! ```
//!
//! Because bookmarks are produced only for committed pages, an index never
//! points ahead of its data volume. It may lag behind, and it can always be
//! rebuilt from the data with [`rebuild_index`].

mod appender;
mod bookmark;
mod lookup;

pub use appender::{bookmark_channel, BookmarkSender, IndexAppender};
pub use bookmark::{Bookmark, BookmarkCodec, INDEX_KIND};
pub use lookup::{fetch, lookup, rebuild_index, BookmarkIndex, Located};
