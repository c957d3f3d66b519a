pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// `rsync` copies directory contents only when the path ends in `/`.
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Remote destinations look like `host:/path` or `user@host:/path`.
pub fn is_remote_spec(path: &str) -> bool {
    match path.split_once(':') {
        Some((host, _)) => !host.is_empty() && !host.contains('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_names() {
        assert!(is_safe_name("data"));
        assert!(is_safe_name("pg_data-1.2"));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name("a/b"));
        assert!(!is_safe_name(""));
    }

    #[test]
    fn trailing_slash_is_added_once() {
        assert_eq!(with_trailing_slash("/srv/data"), "/srv/data/");
        assert_eq!(with_trailing_slash("/srv/data/"), "/srv/data/");
    }

    #[test]
    fn remote_specs() {
        assert!(is_remote_spec("backup@nas:/srv"));
        assert!(is_remote_spec("nas:backups"));
        assert!(!is_remote_spec("/backups"));
        assert!(!is_remote_spec("/odd/dir:name"));
    }
}
