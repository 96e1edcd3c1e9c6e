//! Record Module
//!
//! Per-type codecs turning records into entry bytes and back.
//!
//! Each codec declares a `KIND` byte that is stored with every entry it
//! writes; decoding an entry of another kind is an error rather than garbage.
//!
//! | Kind | Codec            | Record type                      |
//! |------|------------------|----------------------------------|
//! | 0    | `RawCodec`       | `Vec<u8>`                        |
//! | 1    | `TextCodec`      | `String`                         |
//! | 2    | `JsonCodec<T>`   | any `Serialize + Deserialize`    |
//! | 3    | `BincodeCodec<T>`| any `Serialize + Deserialize`    |
//! | 4    | `LogMessageCodec`| [`LogMessage`]                   |
//! | 16   | bookmarks        | `index::Bookmark<K>`             |

mod codecs;
mod log_message;

use crate::error::{ArchiveError, Result};
use crate::volume::Entry;

pub use codecs::{BincodeCodec, JsonCodec, RawCodec, TextCodec};
pub use log_message::{LogLevel, LogMessage, LogMessageCodec};

/// Serializer for one record type
pub trait EntryCodec<T> {
    /// Type discriminator written with every entry
    const KIND: u8;

    /// Append the serialized form of `record` to `out`.
    ///
    /// On error `out` may hold partial bytes; callers encode into scratch
    /// space, never straight into a page.
    fn encode(&self, record: &T, out: &mut Vec<u8>) -> Result<()>;

    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Decode an entry after checking its kind
pub fn decode_entry<T, C: EntryCodec<T>>(codec: &C, entry: &Entry) -> Result<T> {
    if entry.kind != C::KIND {
        return Err(ArchiveError::Serialization(format!(
            "entry at page {} offset {} has kind {}, codec expects {}",
            entry.page_id,
            entry.offset,
            entry.kind,
            C::KIND
        )));
    }
    codec.decode(&entry.data)
}
