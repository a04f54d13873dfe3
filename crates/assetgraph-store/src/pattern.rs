//! Glob matching for logical file paths (supports * and **)

/// Check whether a `/`-separated logical path matches a glob pattern
///
/// `**` as a whole segment matches zero or more segments; `*` inside a
/// segment matches any run of characters within that segment.
pub fn matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match_segments(&pattern, &path)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment_match(segment, head) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn segment_match(pattern: &str, text: &str) -> bool {
    match pattern.find('*') {
        None => pattern == text,
        Some(star_pos) => {
            let prefix = &pattern[..star_pos];
            let rest = &pattern[star_pos + 1..];

            if !text.starts_with(prefix) {
                return false;
            }

            let remaining = &text[prefix.len()..];
            (0..=remaining.len())
                .filter(|i| remaining.is_char_boundary(*i))
                .any(|i| segment_match(rest, &remaining[i..]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_wildcards() {
        assert!(matches("*", "metadata.json"));
        assert!(matches("*.yaml", "install-config.yaml"));
        assert!(matches("master-*-0.yaml", "master-machines-0.yaml"));
        assert!(!matches("*.yaml", "metadata.json"));
        assert!(!matches("*.yaml", "openshift/master.yaml"));
    }

    #[test]
    fn directory_wildcards() {
        assert!(matches("openshift/*.yaml", "openshift/99_master-0.yaml"));
        assert!(matches("**/*.yaml", "cluster-manifests/nmstateconfig.yaml"));
        assert!(matches("**/*.yaml", "top.yaml"));
        assert!(matches("**", "a/b/c"));
        assert!(!matches("openshift/*.yaml", "cluster-manifests/nmstateconfig.yaml"));
    }

    #[test]
    fn exact_paths() {
        assert!(matches("metadata.json", "metadata.json"));
        assert!(!matches("metadata.json", "metadata.json.bak"));
    }
}
