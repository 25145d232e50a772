//! Flattened path encoding between `bucket/key` object identifiers and
//! path strings usable by a path-oriented backup tool.
//!
//! The encoding is a fixed reserved prefix in front of `bucket/key`. No
//! escaping is performed, so a bucket or key that itself contains the
//! prefix literal is ambiguous on decode. Known limitation.

/// Reserved prefix marking an encoded object path.
pub const PATH_PREFIX: &str = "OBJSTORE:/";

/// Turn a `(bucket, key)` pair into a single backup path.
pub fn encode_object_path(bucket: &str, key: &str) -> String {
    format!("{PATH_PREFIX}{bucket}/{key}")
}

/// Strip the reserved prefix. A path without the prefix is returned
/// unchanged: it is already a local path (filesystem-backed variant).
pub fn decode_object_path(path: &str) -> &str {
    path.strip_prefix(PATH_PREFIX).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let encoded = encode_object_path("b1", "dir/file.txt");
        assert_eq!(encoded, "OBJSTORE:/b1/dir/file.txt");
        assert_eq!(decode_object_path(&encoded), "b1/dir/file.txt");
    }

    #[test]
    fn test_key_with_separators_survives() {
        let encoded = encode_object_path("logs", "2024/05/02/app.log");
        assert_eq!(decode_object_path(&encoded), "logs/2024/05/02/app.log");
    }

    #[test]
    fn test_local_path_passes_through() {
        assert_eq!(decode_object_path("/var/data/file.txt"), "/var/data/file.txt");
        assert_eq!(decode_object_path("relative/file"), "relative/file");
    }

    #[test]
    fn test_only_leading_prefix_is_stripped() {
        let encoded = encode_object_path("b1", "weird/OBJSTORE:/tail");
        assert_eq!(decode_object_path(&encoded), "b1/weird/OBJSTORE:/tail");
    }
}
