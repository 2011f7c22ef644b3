//! Content-type sniffing for small-file uploads that don't carry an explicit
//! MIME type: the upload engine samples the first bytes of a file and we
//! guess from magic numbers, falling back to a generic binary type.

/// How much of a file's head the sniffer looks at. Matches the upload
/// engine's own read-ahead budget for the small/large path decision.
pub const SNIFF_WINDOW: usize = 512;

const FALLBACK: &str = "application/octet-stream";

/// Guesses a MIME type from up to [`SNIFF_WINDOW`] bytes at the start of a
/// file, falling back to `application/octet-stream` when nothing matches.
#[must_use]
pub fn sniff(head: &[u8]) -> String {
    let window = &head[..head.len().min(SNIFF_WINDOW)];
    infer::get(window)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| FALLBACK.to_string())
}
