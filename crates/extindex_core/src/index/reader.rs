//! Index reader: one resolved root (or several) into one bucket.

use crate::diagnostics::Diagnostics;
use crate::index::codec::read_entries;
use crate::index::model::Bucket;
use crate::scope::locator::Root;
use log::debug;
use std::io::{self, BufRead};

/// Reads every index file of `root` and unions their entries.
///
/// Consumes the root so any archive handle it holds is released when this
/// returns, whether the read succeeded or not.
///
/// # Errors
/// - Returns the first I/O failure. Nothing from a failed root is returned.
pub fn read_root(mut root: Root) -> io::Result<Bucket> {
    let mut bucket = Bucket::new();
    let files = root.visit_files(&mut |name: &str, reader: &mut dyn BufRead| {
        debug!("event=index_read module=reader status=start file={name}");
        read_entries(reader, &mut bucket).map(|_| ())
    })?;
    debug!(
        "event=index_read module=reader status=ok root={} files={} entries={}",
        root.describe(),
        files,
        bucket.len()
    );
    Ok(bucket)
}

/// Reads all `roots` into one bucket.
///
/// A root that fails is reported through `diagnostics` and contributes no
/// entries; the remaining roots are still read.
pub fn read_roots(roots: impl IntoIterator<Item = Root>, diagnostics: &dyn Diagnostics) -> Bucket {
    let mut merged = Bucket::new();
    for root in roots {
        let description = root.describe();
        match read_root(root) {
            Ok(bucket) => merged.extend(bucket),
            Err(err) => diagnostics.report(&format!(
                "cannot read extension index root `{description}`: {err}"
            )),
        }
    }
    merged
}
