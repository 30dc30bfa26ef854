//! Team-name matching across data sources (odds feeds, Polymarket titles,
//! warehouse views), which spell the same team differently.

/// Built-in spellings that normalization alone does not unify
const BUILTIN_ALIASES: &[&[&str]] = &[
    &["la lakers", "los angeles lakers", "lakers"],
    &["la clippers", "los angeles clippers", "clippers"],
    &["ny knicks", "new york knicks", "knicks"],
    &["gs warriors", "golden st warriors", "warriors"],
    &["okc thunder", "oklahoma city thunder", "thunder"],
    &["miami heat", "heat"],
    &["orlando magic", "magic"],
    &["utah jazz", "jazz"],
    &["uconn", "connecticut"],
    &["ole miss", "mississippi"],
    &["unc", "north carolina"],
    &["lsu", "louisiana st"],
    &["pitt", "pittsburgh"],
    &["smu", "southern methodist"],
    &["byu", "brigham young"],
    &["ucf", "central florida"],
    &["vcu", "virginia commonwealth"],
];

/// Trailing words that name a place rather than a mascot
const PLACE_WORDS: &[&str] = &["texas", "kansas", "illinois", "arkansas", "st", "u"];

/// Mascot of a multi-word name ("boston celtics" -> "celtics"), when the
/// last word looks like one
fn nickname(normalized: &str) -> Option<&str> {
    let (rest, last) = normalized.rsplit_once(' ')?;
    if rest.is_empty() || last.len() < 4 || !last.ends_with('s') || PLACE_WORDS.contains(&last) {
        return None;
    }
    Some(last)
}

/// Lowercase, drop punctuation, unify `St.`/`State`/`Saint` and `&`.
pub fn normalize_team_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .replace('&', " and ")
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| match word {
            "state" | "saint" => "st",
            "university" | "univ" => "u",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// How two names were found to be the same team
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameMatch {
    Exact,
    Alias,
    Substring,
}

/// Alias-aware team-name comparison
#[derive(Debug, Clone)]
pub struct TeamMatcher {
    groups: Vec<Vec<String>>,
}

impl Default for TeamMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TeamMatcher {
    pub fn new() -> Self {
        let groups = BUILTIN_ALIASES
            .iter()
            .map(|g| g.iter().map(|n| normalize_team_name(n)).collect())
            .collect();
        Self { groups }
    }

    /// Add alias groups (e.g. rows of `ncaab_team_mapping`)
    pub fn with_groups(mut self, groups: Vec<Vec<String>>) -> Self {
        for group in groups {
            let normalized: Vec<String> = group.iter().map(|n| normalize_team_name(n)).collect();
            if normalized.len() > 1 {
                self.groups.push(normalized);
            }
        }
        self
    }

    fn canonical_groups<'a>(&'a self, norm: &'a str) -> impl Iterator<Item = &'a Vec<String>> + 'a {
        self.groups.iter().filter(move |g| g.iter().any(|n| n == norm))
    }

    /// Compare two names: exact after normalization, then alias table,
    /// then substring in either direction.
    pub fn compare(&self, a: &str, b: &str) -> Option<NameMatch> {
        let (a, b) = (normalize_team_name(a), normalize_team_name(b));
        if a.is_empty() || b.is_empty() {
            return None;
        }
        if a == b {
            return Some(NameMatch::Exact);
        }
        if self.canonical_groups(&a).any(|g| g.contains(&b)) {
            return Some(NameMatch::Alias);
        }
        if contains_words(&a, &b) || contains_words(&b, &a) {
            return Some(NameMatch::Substring);
        }
        // alias of one side appearing inside the other ("lakers" in a market title)
        let alias_hit = |x: &str, y: &str| {
            self.canonical_groups(x)
                .any(|g| g.iter().any(|alias| contains_words(y, alias)))
        };
        if alias_hit(&a, &b) || alias_hit(&b, &a) {
            return Some(NameMatch::Alias);
        }
        None
    }

    pub fn same_team(&self, a: &str, b: &str) -> bool {
        self.compare(a, b).is_some()
    }

    /// Best candidate for `name`; exact beats alias beats substring,
    /// ties keep the first candidate.
    pub fn best_match<'a>(&self, name: &str, candidates: &'a [String]) -> Option<&'a String> {
        candidates
            .iter()
            .filter_map(|c| self.compare(name, c).map(|m| (m, c)))
            .min_by_key(|(m, _)| *m)
            .map(|(_, c)| c)
    }

    /// Whether a free-text title mentions the team
    pub fn mentions(&self, text: &str, team: &str) -> bool {
        let text = normalize_team_name(text);
        let team = normalize_team_name(team);
        if team.is_empty() {
            return false;
        }
        contains_words(&text, &team)
            || nickname(&team).is_some_and(|nick| contains_words(&text, nick))
            || self
                .canonical_groups(&team)
                .any(|g| g.iter().any(|alias| contains_words(&text, alias)))
    }
}

/// Substring test on word boundaries so "kansas" does not hit "arkansas"
fn contains_words(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let padded_hay = format!(" {} ", haystack);
    let padded_needle = format!(" {} ", needle);
    padded_hay.contains(&padded_needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_team_name("Ohio State"), "ohio st");
        assert_eq!(normalize_team_name("Ohio St."), "ohio st");
        assert_eq!(normalize_team_name("Saint Mary's"), "st mary s");
        assert_eq!(normalize_team_name("Texas A&M"), "texas a and m");
    }

    #[test]
    fn test_compare_levels() {
        let m = TeamMatcher::new();
        assert_eq!(m.compare("Ohio State", "ohio st."), Some(NameMatch::Exact));
        assert_eq!(m.compare("UConn", "Connecticut"), Some(NameMatch::Alias));
        assert_eq!(
            m.compare("Boston Celtics", "Celtics"),
            Some(NameMatch::Substring)
        );
        assert_eq!(m.compare("Kansas", "Arkansas"), None);
        assert_eq!(m.compare("", "Celtics"), None);
    }

    #[test]
    fn test_extra_groups() {
        let m = TeamMatcher::new().with_groups(vec![vec![
            "Miami (FL)".to_string(),
            "Miami Hurricanes".to_string(),
        ]]);
        assert!(m.same_team("Miami Hurricanes", "miami fl"));
    }

    #[test]
    fn test_best_match_prefers_exact() {
        let m = TeamMatcher::new();
        let candidates = vec!["Kansas State".to_string(), "Kansas".to_string()];
        assert_eq!(m.best_match("Kansas", &candidates), Some(&candidates[1]));
    }

    #[test]
    fn test_mentions_with_alias() {
        let m = TeamMatcher::new();
        assert!(m.mentions("Lakers vs. Celtics", "Los Angeles Lakers"));
        assert!(m.mentions("Will Kansas St. win?", "Kansas State"));
        assert!(!m.mentions("Arkansas vs. Texas", "Kansas"));
        assert!(m.mentions("Lakers vs. Celtics", "Boston Celtics"));
        assert!(!m.mentions("Texas vs. Baylor", "North Texas"));
    }
}
