use crate::resolver::ResolvedTag;
use std::cmp::Ordering;

/// Newest first; tags created at the same instant are ordered by name.
fn newest_first(a: &ResolvedTag, b: &ResolvedTag) -> Ordering {
    return b
        .created_at
        .cmp(&a.created_at)
        .then_with(|| a.tag.cmp(&b.tag));
}

/// Picks the most recently created tag. When several tags share the newest
/// date the lexicographically smallest name wins, so the answer does not
/// depend on the order results arrived in.
pub fn newest(results: &[ResolvedTag]) -> Option<&ResolvedTag> {
    return results.iter().min_by(|a, b| newest_first(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::parse_timestamp;

    fn resolved(tag: &str, date: &str) -> ResolvedTag {
        return ResolvedTag {
            tag: tag.to_string(),
            created_at: parse_timestamp(date).unwrap(),
        };
    }

    #[test]
    fn it_picks_the_newest_tag() {
        let results = vec![
            resolved("1.0", "2021-01-01T00:00:00Z"),
            resolved("1.1", "2021-06-01T00:00:00Z"),
            resolved("2.0", "2020-12-01T00:00:00Z"),
        ];
        assert_eq!(newest(&results).unwrap().tag, "1.1");
    }

    #[test]
    fn it_breaks_ties_by_name_regardless_of_order() {
        let date = "2022-01-01T00:00:00Z";
        let forward = vec![resolved("v1", date), resolved("v2", date)];
        let backward = vec![resolved("v2", date), resolved("v1", date)];
        assert_eq!(newest(&forward).unwrap().tag, "v1");
        assert_eq!(newest(&backward).unwrap().tag, "v1");
    }

    #[test]
    fn it_only_breaks_ties_among_the_newest() {
        let results = vec![
            resolved("a", "2020-01-01T00:00:00Z"),
            resolved("c", "2022-01-01T00:00:00Z"),
            resolved("b", "2022-01-01T00:00:00Z"),
        ];
        assert_eq!(newest(&results).unwrap().tag, "b");
    }

    #[test]
    fn it_has_no_newest_tag_without_results() {
        assert_eq!(newest(&[]), None);
    }
}
