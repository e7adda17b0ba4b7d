//! Request path canonicalization.

/// Clean a request path: make it absolute, collapse repeated slashes and
/// resolve `.` and `..` segments. A trailing slash on the input is kept
/// (unless the result is the root) so the caller can decide whether to
/// redirect it away.
///
/// `..` never climbs above the root.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }

    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    if cleaned.is_empty() || trailing {
        cleaned.push('/');
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_paths() {
        let cases = [
            ("", "/"),
            ("/", "/"),
            ("//", "/"),
            ("abc", "/abc"),
            ("/abc", "/abc"),
            ("/abc/", "/abc/"),
            ("/foo//bar/", "/foo/bar/"),
            ("/foo///bar", "/foo/bar"),
            ("/a/./b", "/a/b"),
            ("/a/b/..", "/a/"),
            ("/a/b/../c", "/a/c"),
            ("/../a", "/a"),
            ("/a/..", "/"),
            ("/a/.", "/a/"),
        ];
        for (input, expected) in cases {
            assert_eq!(clean_path(input), expected, "clean_path({input:?})");
        }
    }

    #[test]
    fn clean_paths_are_unchanged() {
        for path in ["/", "/users", "/users/42/posts"] {
            assert_eq!(clean_path(path), path);
        }
    }
}
