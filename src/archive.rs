//! Bundle stored outputs into one ZIP archive.
//!
//! Archiving is all-or-nothing: the first entry that fails to write aborts
//! the whole archive and nothing partial is returned. Entries stored in the
//! [`ResultStore`] are never touched, so individual downloads stay valid
//! whatever happens here.

use crate::error::ArchiveError;
use crate::pipeline::assemble::deterministic_options;
use crate::store::ResultStore;
use std::io::{Cursor, Write};
use tracing::{debug, info};
use zip::ZipWriter;

/// Bundle `(filename, bytes)` entries, in iteration order, into deflate ZIP
/// bytes. An empty input is an error.
pub fn bundle<'a, I>(entries: I) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = deterministic_options();
    let mut count = 0usize;

    for (name, bytes) in entries {
        zip.start_file(name, options)
            .map_err(|e| ArchiveError::EntryWrite {
                name: name.to_string(),
                detail: e.to_string(),
            })?;
        zip.write_all(bytes).map_err(|e| ArchiveError::EntryWrite {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        debug!("Archived '{}' ({} bytes)", name, bytes.len());
        count += 1;
    }

    if count == 0 {
        return Err(ArchiveError::Empty);
    }

    let archive = zip.finish().map_err(ArchiveError::Finish)?.into_inner();
    info!("Bundled {} entries → {} bytes", count, archive.len());
    Ok(archive)
}

/// Bundle everything currently in `store`.
pub fn bundle_store(store: &ResultStore) -> Result<Vec<u8>, ArchiveError> {
    bundle(store.iter().map(|(k, v)| (k, v.bytes.as_slice())))
}

/// A combined download only makes sense for more than one output.
pub fn should_offer_archive(store: &ResultStore) -> bool {
    store.len() > 1
}
