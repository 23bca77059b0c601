//! Stored filename conventions
//!
//! The encryption marker lives here and nowhere else. A stored name either
//! ends with [`ENCRYPTED_SUFFIX`] (ciphertext) or it does not (plaintext);
//! no other signal is consulted on the read path.

use rand::Rng;
use std::path::Path;

/// Marker appended to the names of ciphertext files
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Suffix of a ciphertext that has not been moved into place yet
pub const PARTIAL_SUFFIX: &str = ".partial";

const FALLBACK_NAME: &str = "file";
const TOKEN_RANDOM_RANGE: u32 = 1_000_000_000;

/// True iff the name carries the encryption marker
pub fn is_encrypted_name(filename: &str) -> bool {
    filename.ends_with(ENCRYPTED_SUFFIX)
}

/// Strip exactly one trailing marker; other names pass through unchanged
pub fn original_name_hint(filename: &str) -> &str {
    filename.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(filename)
}

/// Name under which the ciphertext of `plaintext_name` is stored
pub fn encrypted_name(plaintext_name: &str) -> String {
    format!("{plaintext_name}{ENCRYPTED_SUFFIX}")
}

/// Temporary name used while the ciphertext is being written
pub fn partial_name(encrypted_name: &str) -> String {
    format!("{encrypted_name}{PARTIAL_SUFFIX}")
}

/// True only for `<name>.enc.partial`
///
/// A placed name ends in `<token><ext>` with a single-dot extension, so an
/// upload such as `scan.partial` is stored as `scan-<token>.partial` and never
/// matches.
pub fn is_partial_name(filename: &str) -> bool {
    filename
        .strip_suffix(PARTIAL_SUFFIX)
        .is_some_and(is_encrypted_name)
}

/// Reduce a client-supplied filename to its last path component
///
/// Both `/` and `\` count as separators. Empty, `.` and `..` results
/// become a neutral placeholder.
pub fn sanitize_original_name(original: &str) -> String {
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .replace('\0', "");

    match last.as_str() {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        _ => last,
    }
}

/// Split into base and extension (extension keeps its leading dot)
///
/// `report.final.pdf` -> (`report.final`, `.pdf`); `.bashrc` -> (`.bashrc`, ``)
pub fn split_filename(filename: &str) -> (&str, &str) {
    let path = Path::new(filename);
    match (path.file_stem().and_then(|s| s.to_str()), path.extension()) {
        (Some(stem), Some(_)) => {
            let base_len = stem.len();
            (&filename[..base_len], &filename[base_len..])
        }
        _ => (filename, ""),
    }
}

/// Uniqueness token: `<unix-millis>-<random>`
///
/// Only guards against accidental collisions; never parsed back out.
pub fn uniqueness_token() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random: u32 = rand::thread_rng().gen_range(0..TOKEN_RANDOM_RANGE);
    format!("{millis}-{random}")
}

/// Compose `<base>-<token><ext>` from a client-supplied filename
pub fn unique_filename(original: &str) -> String {
    let sanitized = sanitize_original_name(original);
    let (base, ext) = split_filename(&sanitized);
    format!("{base}-{}{ext}", uniqueness_token())
}
