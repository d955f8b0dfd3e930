//! CF-safe names and deterministic clash resolution.

use std::collections::HashSet;

/// Make a name usable as a CF/DAP identifier.
///
/// A leading `/` is dropped, a leading digit gets a `_` prefix, and every
/// character that is not ASCII alphanumeric or `_` becomes `_`. The mapping is
/// idempotent.
pub fn to_cf_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    let mut out = String::with_capacity(trimmed.len() + 1);
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        out.push('_');
    }
    out.extend(trimmed.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' {
            c
        } else {
            '_'
        }
    }));
    out
}

/// Resolve clashes in `names` against `existing`, in place.
///
/// Every name is first inserted into `existing`; the ones already present
/// (including repeats within `names`) are collected in order and then renamed
/// to `name_1`, `name_2`, ... using the first free suffix. Names that did not
/// clash are left untouched.
pub fn handle_name_clashing(names: &mut [String], existing: &mut HashSet<String>) {
    let clashing: Vec<usize> = names
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| (!existing.insert(name.clone())).then_some(idx))
        .collect();

    for idx in clashing {
        names[idx] = unique_name(&names[idx], existing);
    }
}

/// Clash resolution against a fresh name set.
pub fn dedupe(names: &mut [String]) {
    let mut existing = HashSet::new();
    handle_name_clashing(names, &mut existing);
}

/// First `base_N` (N >= 1) not yet in `existing`; the winner is inserted.
pub fn unique_name(base: &str, existing: &mut HashSet<String>) -> String {
    let mut suffix = 1usize;
    loop {
        let candidate = format!("{base}_{suffix}");
        if existing.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}
