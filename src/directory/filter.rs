use crate::identity::Identity;

/// Case-insensitive substring search on display name or email.
/// Read-only: returns references in roster order, never reorders the source.
pub fn filter_roster<'a>(roster: &'a [Identity], query: &str) -> Vec<&'a Identity> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return roster.iter().collect();
    }
    roster.iter().filter(|u| u.matches_lowercase(&needle)).collect()
}
