#![forbid(unsafe_code)]

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Turns a bare video id (or anything else without a scheme) into a canonical
/// watch URL. Inputs that already carry a scheme pass through untouched.
///
/// No validation happens here; the extractor reports unknown ids itself.
pub fn normalize_video_url(input: &str) -> String {
    if has_url_scheme(input) {
        input.to_string()
    } else {
        format!("{WATCH_URL_PREFIX}{input}")
    }
}

/// RFC 3986 scheme followed by `://`.
fn has_url_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_becomes_watch_url() {
        assert_eq!(
            normalize_video_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn eleven_character_ids_of_any_shape_are_wrapped() {
        for id in ["aaaaaaaaaaa", "-_-_-_-_-_-", "12345678901", "with spaces"] {
            assert_eq!(id.len(), 11);
            assert_eq!(normalize_video_url(id), format!("{WATCH_URL_PREFIX}{id}"));
        }
    }

    #[test]
    fn urls_with_scheme_pass_through() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtu.be/dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=abc&list=xyz",
            "ftp://example.com/file",
            "git+ssh://host/repo",
        ] {
            assert_eq!(normalize_video_url(url), url);
        }
    }

    #[test]
    fn schemeless_urls_are_wrapped_verbatim() {
        assert_eq!(
            normalize_video_url("youtu.be/dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(
            normalize_video_url("short"),
            "https://www.youtube.com/watch?v=short"
        );
    }

    #[test]
    fn malformed_scheme_is_not_a_scheme() {
        assert!(!has_url_scheme("://missing"));
        assert!(!has_url_scheme("1http://digits-first"));
        assert!(!has_url_scheme("we ird://space"));
        assert!(has_url_scheme("https://ok"));
    }
}
