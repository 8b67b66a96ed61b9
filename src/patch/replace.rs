// src/patch/replace.rs

//! Exact-substring replacement

use crate::error::{Error, Result};
use std::path::Path;

/// Count occurrences of `needle` in `haystack`, overlapping ones included
///
/// Works on raw bytes so targets need not be valid UTF-8.
pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() || needle.len() > haystack.len() {
        return 0;
    }
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Replace the single occurrence of `anchor` in `content`
///
/// Matching is byte-exact and whitespace-sensitive. The anchor has to occur
/// exactly once; zero or several matches are errors naming `file`.
pub fn replace_exactly_once(
    file: &Path,
    content: &[u8],
    anchor: &str,
    replacement: &str,
) -> Result<Vec<u8>> {
    let needle = anchor.as_bytes();
    match count_occurrences(content, needle) {
        1 => {
            let start = find(content, needle).ok_or_else(|| Error::PatchAnchorNotFound {
                file: file.to_path_buf(),
                anchor: anchor.to_string(),
            })?;
            let mut out = Vec::with_capacity(content.len() - needle.len() + replacement.len());
            out.extend_from_slice(&content[..start]);
            out.extend_from_slice(replacement.as_bytes());
            out.extend_from_slice(&content[start + needle.len()..]);
            Ok(out)
        }
        0 => Err(Error::PatchAnchorNotFound {
            file: file.to_path_buf(),
            anchor: anchor.to_string(),
        }),
        count => Err(Error::PatchAnchorAmbiguous {
            file: file.to_path_buf(),
            anchor: anchor.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPSTREAM: &str = "project(Disruptor)\ncmake_minimum_required(VERSION 2.6)\n\nadd_subdirectory(Disruptor)\n";
    const ANCHOR: &str = "project(Disruptor)\ncmake_minimum_required(VERSION 2.6)";
    const REORDERED: &str = "cmake_minimum_required(VERSION 2.6)\nproject(Disruptor)";

    #[test]
    fn test_reorders_exact_text() {
        let out = replace_exactly_once(
            Path::new("CMakeLists.txt"),
            UPSTREAM.as_bytes(),
            ANCHOR,
            REORDERED,
        )
        .unwrap();
        assert_eq!(
            out,
            b"cmake_minimum_required(VERSION 2.6)\nproject(Disruptor)\n\nadd_subdirectory(Disruptor)\n"
        );
    }

    #[test]
    fn test_already_reordered_text_fails() {
        let patched = UPSTREAM.replacen(ANCHOR, REORDERED, 1);
        let err = replace_exactly_once(Path::new("CMakeLists.txt"), patched.as_bytes(), ANCHOR, REORDERED)
            .unwrap_err();
        assert!(matches!(err, Error::PatchAnchorNotFound { .. }));
    }

    #[test]
    fn test_whitespace_sensitive() {
        let drifted = UPSTREAM.replace("project(Disruptor)", "project(Disruptor) ");
        assert!(
            replace_exactly_once(Path::new("CMakeLists.txt"), drifted.as_bytes(), ANCHOR, REORDERED)
                .is_err()
        );
    }

    #[test]
    fn test_ambiguous_anchor() {
        let err = replace_exactly_once(Path::new("f"), b"abab", "ab", "x").unwrap_err();
        match err {
            Error::PatchAnchorAmbiguous { count, .. } => assert_eq!(count, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overlapping_occurrences() {
        assert_eq!(count_occurrences(b"aaa", b"aa"), 2);
        assert_eq!(count_occurrences("ééé".as_bytes(), "éé".as_bytes()), 2);
        assert_eq!(count_occurrences(b"abc", b""), 0);
        assert_eq!(count_occurrences(b"abc", b"d"), 0);
        assert_eq!(count_occurrences(b"a", b"abc"), 0);
    }

    #[test]
    fn test_non_utf8_content_kept_verbatim() {
        let content = b"// caf\xe9\nproject(Demo)\n";
        let out = replace_exactly_once(Path::new("a.cpp"), content, "project(Demo)", "project(Demo CXX)")
            .unwrap();
        assert_eq!(out, b"// caf\xe9\nproject(Demo CXX)\n");
    }
}
