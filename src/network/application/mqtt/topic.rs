//! Topic filter validation and matching.

use crate::network::application::pubsub::Error;

/// Check that `filter` is a well-formed subscription filter.
///
/// A filter is non-empty, has no NUL character, uses `+` only as a whole
/// level and `#` only as the whole last level.
///
/// # Errors
///
/// * [`Error::MalformedPacket`] - The filter breaks one of these rules
pub fn validate_filter(filter: &str) -> Result<(), Error> {
    if filter.is_empty() || filter.contains('\0') {
        return Err(Error::MalformedPacket);
    }
    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        let is_last = levels.peek().is_none();
        let valid = match level {
            "+" => true,
            "#" => is_last,
            _ => !level.contains(['+', '#']),
        };
        if !valid {
            return Err(Error::MalformedPacket);
        }
    }
    Ok(())
}

/// Whether `filter` contains a wildcard.
pub fn is_wildcard(filter: &str) -> bool {
    filter.contains(['+', '#'])
}

/// Whether the topic name `topic` matches `filter`.
///
/// `+` matches exactly one level, `#` matches any number of trailing levels,
/// the parent level included (`a/#` matches `a`). A wildcard in the first
/// level never matches a topic starting with `$`.
///
/// ```rust
/// use libmqtt::network::application::mqtt::topic::matches;
///
/// assert!(matches("sensors/+/temperature", "sensors/kitchen/temperature"));
/// assert!(matches("sensors/#", "sensors"));
/// assert!(!matches("sensors/+", "sensors/kitchen/temperature"));
/// assert!(!matches("#", "$SYS/broker/uptime"));
/// ```
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && filter.starts_with(['+', '#']) {
        return false;
    }
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches("a/b/c", "a/b/c"));
        assert!(!matches("a/b/c", "a/b"));
        assert!(!matches("a/b", "a/b/c"));
    }

    #[test]
    fn test_single_level_wildcard() {
        assert!(matches("a/+/c", "a/b/c"));
        assert!(matches("+", "a"));
        assert!(matches("a/+", "a/"));
        assert!(!matches("a/+", "a"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(matches("#", "a/b/c"));
        assert!(matches("a/#", "a"));
        assert!(matches("a/#", "a/b/c"));
        assert!(!matches("a/#", "b/c"));
        assert!(!matches("a/#/c", "a/b/c"));
    }

    #[test]
    fn test_system_topics() {
        assert!(!matches("#", "$SYS/broker/load"));
        assert!(!matches("+/broker/load", "$SYS/broker/load"));
        assert!(matches("$SYS/#", "$SYS/broker/load"));
        assert!(matches("$SYS/+/load", "$SYS/broker/load"));
    }

    #[test]
    fn test_validate_filter() {
        for filter in ["a/b", "a/+/c", "+", "#", "a/#", "/", "+/+", "$SYS/#"] {
            assert_eq!(validate_filter(filter), Ok(()), "{filter}");
        }
        for filter in ["", "a/#/c", "a#", "a/b+", "#/a", "a\0b"] {
            assert_eq!(validate_filter(filter), Err(Error::MalformedPacket), "{filter}");
        }
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("a/+"));
        assert!(is_wildcard("#"));
        assert!(!is_wildcard("a/b"));
    }
}
