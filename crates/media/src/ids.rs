use regex::Regex;
use std::sync::LazyLock;

// Provider GUID as sent by Plex: tmdb://603, imdb://tt0133093, tvdb://81189
static RE_PROVIDER_GUID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)://([^/?#\s]+)").unwrap());

// Legacy agent GUID: com.plexapp.agents.themoviedb://603?lang=en
static RE_LEGACY_TMDB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"themoviedb://(\d+)").unwrap());

/// Split a provider GUID into `(provider, id)`, provider lowercased.
pub fn parse_provider_guid(guid: &str) -> Option<(String, String)> {
    RE_PROVIDER_GUID
        .captures(guid.trim())
        .map(|c| (c[1].to_lowercase(), c[2].to_string()))
}

/// First TMDB id among a list of provider GUIDs.
pub fn extract_tmdb_id<'a, I>(guids: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    guids.into_iter().find_map(|guid| {
        if let Some(caps) = RE_LEGACY_TMDB.captures(guid) {
            return Some(caps[1].to_string());
        }
        match parse_provider_guid(guid) {
            Some((provider, id)) if provider == "tmdb" => Some(id),
            _ => None,
        }
    })
}
