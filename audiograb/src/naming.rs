use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a fresh artifact base name.
///
/// The name is the current time in milliseconds since the Unix epoch followed
/// by a random fraction in `[0, 1)`, e.g. `17290000000000.5318727344`. The
/// timestamp keeps names roughly ordered by creation; the fraction separates
/// names generated within the same millisecond. Collisions are not checked.
pub fn generate_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let fraction: f64 = rand::random();
    format!("{millis}{fraction}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn timestamp_prefix(name: &str) -> u128 {
        // A millisecond timestamp is 13 digits until the year 2286.
        name[..13].parse().unwrap()
    }

    #[test]
    fn test_names_are_distinct() {
        let names: HashSet<String> = (0..10_000).map(|_| generate_name()).collect();
        assert_eq!(names.len(), 10_000);
    }

    #[test]
    fn test_name_starts_with_current_millis() {
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let name = generate_name();
        let after = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();

        let ts = timestamp_prefix(&name);
        assert!(ts >= before && ts <= after, "{ts} not in [{before}, {after}]");
    }

    #[test]
    fn test_timestamp_prefix_non_decreasing() {
        let mut last = 0;
        for _ in 0..1_000 {
            let ts = timestamp_prefix(&generate_name());
            assert!(ts >= last);
            last = ts;
        }
    }

    #[test]
    fn test_name_is_a_plain_file_name() {
        let name = generate_name();
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert!(name.chars().all(|c| c.is_ascii_digit() || c == '.'));
    }
}
