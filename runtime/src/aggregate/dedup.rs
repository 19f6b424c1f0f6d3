//! Case-insensitive ordered sets of labels.

/// Drop entries equal to an earlier one ignoring ASCII case and surrounding
/// whitespace. The first-seen spelling wins; blank entries are dropped.
pub fn dedup_case_insensitive<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let trimmed = item.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_ascii_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(trimmed.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_casing_wins() {
        let merged = dedup_case_insensitive(["React", "react", "Vue.js", "REACT", "vue.js"]);
        assert_eq!(merged, vec!["React", "Vue.js"]);
    }

    #[test]
    fn test_lowercase_first() {
        let merged = dedup_case_insensitive(["wordpress", "WordPress"]);
        assert_eq!(merged, vec!["wordpress"]);
    }

    #[test]
    fn test_blank_and_padded_entries() {
        let merged = dedup_case_insensitive([" Intercom ", "", "intercom", "  "]);
        assert_eq!(merged, vec!["Intercom"]);
    }

    #[test]
    fn test_empty_input() {
        let merged = dedup_case_insensitive(Vec::<String>::new());
        assert!(merged.is_empty());
    }
}
