use beqwatch_core::types::Edition;

// Checked in order; the first substring hit wins.
static EDITION_TABLE: &[(&str, Edition)] = &[
    ("extended", Edition::Extended),
    ("unrated", Edition::Unrated),
    ("ultimate", Edition::Ultimate),
    ("director", Edition::Director),
    ("criterion", Edition::Criterion),
    ("special", Edition::Special),
    ("theatrical", Edition::Theatrical),
];

fn lookup(s: &str) -> Option<Edition> {
    let lower = s.to_lowercase();
    EDITION_TABLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, edition)| *edition)
}

/// Resolve an edition from the media server's edition field, then the file name.
pub fn resolve(edition_field: &str, file_name: &str) -> Edition {
    lookup(edition_field)
        .or_else(|| lookup(file_name))
        .unwrap_or(Edition::None)
}
