// src/matching/partition.rs - Grouping records into comparison buckets
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::models::record::Record;

const KEY_SEPARATOR: &str = "|||";

static PLAUSIBLE_CONTACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\d{6,}$").unwrap());

/// Records sharing a partition key, in input order.
pub type ComparisonGroup<'a> = Vec<&'a Record>;

/// Group records by `key_fn`. Keys are kept sorted so runs are reproducible.
pub fn partition<'a, F>(records: &[&'a Record], key_fn: F) -> BTreeMap<String, ComparisonGroup<'a>>
where
    F: Fn(&Record) -> String,
{
    let mut groups: BTreeMap<String, ComparisonGroup<'a>> = BTreeMap::new();
    for &record in records {
        groups.entry(key_fn(record)).or_default().push(record);
    }
    groups
}

/// Drop groups that cannot produce a pair.
pub fn comparable_groups<'a>(
    groups: BTreeMap<String, ComparisonGroup<'a>>,
) -> BTreeMap<String, ComparisonGroup<'a>> {
    groups.into_iter().filter(|(_, group)| group.len() >= 2).collect()
}

/// Number of unordered pairs the groups can produce.
pub fn pair_count(groups: &BTreeMap<String, ComparisonGroup<'_>>) -> usize {
    groups.values().map(|g| g.len() * g.len().saturating_sub(1) / 2).sum()
}

/// Category + sub-category, optionally refined by city.
pub fn primary_key(record: &Record, include_city: bool) -> String {
    let mut key = format!("{}{}{}", record.category(), KEY_SEPARATOR, record.sub_category());
    if include_city {
        key.push_str(KEY_SEPARATOR);
        key.push_str(&record.city.as_deref().unwrap_or("").trim().to_lowercase());
    }
    key
}

/// Category + sub-category + normalized contact. Only meaningful for records
/// where `normalize_contact` returns `Some`.
pub fn contact_key(record: &Record) -> String {
    let contact = record
        .contact
        .as_deref()
        .and_then(normalize_contact)
        .unwrap_or_default();
    format!(
        "{}{}{}{}{}",
        record.category(),
        KEY_SEPARATOR,
        record.sub_category(),
        KEY_SEPARATOR,
        contact
    )
}

/// Strip spaces, dashes, dots and parentheses, then accept only `+` followed by
/// six or more digits, or six or more digits.
pub fn normalize_contact(raw: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    if PLAUSIBLE_CONTACT.is_match(&compact) {
        Some(compact)
    } else {
        None
    }
}
