//! Output naming for scratch files.
//!
//! Every request writes under a unique stem `{platform}_{id}_{secs}_{suffix}`,
//! so two concurrent requests for the same media never share a file and the
//! external tool's output can be found by prefix.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::platform::Platform;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 6;

/// Replaces characters that are unsafe in file names with `_`.
///
/// Covers path separators, Windows reserved characters, control characters
/// and `%`, which the extraction tool reads as an output-template field.
/// Media ids are URL segments, so this also keeps `..` from turning into
/// directory traversal.
#[must_use]
pub fn sanitize_filename(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

/// Six random lowercase alphanumerics.
#[must_use]
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
        .collect()
}

/// Unique per-request stem: `{platform}_{id}_{unix_secs}_{suffix}`.
#[must_use]
pub fn output_stem(platform: Platform, media_id: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{}_{}_{secs}_{}",
        platform.as_str(),
        sanitize_filename(media_id),
        random_suffix()
    )
}

/// Lowercased extension of `path`, without the dot.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
        assert_eq!(sanitize_filename("Cx9_z-1"), "Cx9_z-1");
    }

    #[test]
    fn test_sanitize_dot_only_names() {
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename("a.b"), "a.b");
    }

    #[test]
    fn test_random_suffix_shape() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_output_stems_are_unique() {
        let stems: HashSet<String> = (0..200)
            .map(|_| output_stem(Platform::TikTok, "7001"))
            .collect();
        assert_eq!(stems.len(), 200);
    }

    #[test]
    fn test_output_stem_layout() {
        let stem = output_stem(Platform::Pinterest, "123/456");
        let parts: Vec<&str> = stem.split('_').collect();
        assert_eq!(parts[0], "pinterest");
        assert_eq!(parts[1], "123");
        assert_eq!(parts[2], "456");
        assert_eq!(parts.last().unwrap().len(), 6);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(
            extension_of(&PathBuf::from("/tmp/a.MP4")).as_deref(),
            Some("mp4")
        );
        assert_eq!(extension_of(&PathBuf::from("/tmp/noext")), None);
    }

    #[test]
    fn test_template_fields_in_media_id_are_neutralized() {
        assert_eq!(sanitize_filename("%(title)s"), "_(title)s");
        let stem = output_stem(Platform::Instagram, "%(uploader)s");
        assert!(stem.starts_with("instagram__(uploader)s_"));
        assert!(!stem.contains('%'));
    }
}
