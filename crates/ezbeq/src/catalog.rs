use beqwatch_core::types::{CatalogEntry, CodecName, Edition, SearchRequest};
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::{EzBeqClient, EzBeqError};

/// A catalog hit together with the concrete codec hypothesis that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    pub entry: CatalogEntry,
    pub codec: CodecName,
}

/// An empty catalog edition accepts any request; otherwise the catalog edition
/// must contain the requested one, e.g. "Extended Cut" for `Extended`.
pub fn edition_matches(catalog_edition: &str, requested: Edition) -> bool {
    if catalog_edition.is_empty() {
        return true;
    }
    catalog_edition
        .to_lowercase()
        .contains(&requested.as_str().to_lowercase())
}

fn entry_matches(entry: &CatalogEntry, req: &SearchRequest, codec: CodecName) -> bool {
    entry.tmdb_id == req.tmdb
        && entry.year == req.year
        && entry
            .audio_types
            .first()
            .is_some_and(|a| a.eq_ignore_ascii_case(codec.as_str()))
        && edition_matches(&entry.edition, req.edition)
}

/// Pick the entry to load from a search result, keeping server order.
///
/// When preferred authors are given, the first match by the highest-priority
/// author wins; otherwise the first match overall.
pub fn select_entry<'a>(
    entries: &'a [CatalogEntry],
    req: &SearchRequest,
    codec: CodecName,
) -> Option<&'a CatalogEntry> {
    let matches: Vec<&CatalogEntry> = entries
        .iter()
        .filter(|e| entry_matches(e, req, codec))
        .collect();

    req.preferred_authors
        .iter()
        .find_map(|author| {
            matches
                .iter()
                .find(|e| e.author.eq_ignore_ascii_case(author))
                .copied()
        })
        .or_else(|| matches.first().copied())
}

/// Query parameters for one search call. Authors repeat; `none` means no filter.
pub fn search_query(req: &SearchRequest, codec: CodecName) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("audiotypes", codec.as_str().to_string()),
        ("years", req.year.to_string()),
    ];
    for author in &req.preferred_authors {
        let author = author.trim();
        if author.is_empty() || author.eq_ignore_ascii_case("none") {
            continue;
        }
        query.push(("authors", author.to_string()));
    }
    query
}

impl EzBeqClient {
    /// Search the catalog, trying each codec hypothesis in order.
    ///
    /// Only a catalog miss moves on to the next hypothesis; any other error ends the search.
    pub async fn search_catalog(&self, req: &SearchRequest) -> Result<CatalogMatch, EzBeqError> {
        let hypotheses = req.codec.search_hypotheses();
        if hypotheses.is_empty() {
            return Err(EzBeqError::Validation("codec is empty".into()));
        }

        for codec in hypotheses {
            match self.search_once(req, codec).await {
                Ok(entry) => {
                    info!(
                        title = %entry.title,
                        author = %entry.author,
                        entry_id = %entry.id,
                        codec = %codec,
                        "found catalog match"
                    );
                    return Ok(CatalogMatch { entry, codec });
                }
                Err(EzBeqError::NotFoundInCatalog) => {
                    debug!(tmdb = %req.tmdb, codec = %codec, "no catalog match for hypothesis");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(tmdb = %req.tmdb, year = req.year, codec = %req.codec, edition = %req.edition, "profile not found in catalog");
        Err(EzBeqError::NotFoundInCatalog)
    }

    async fn search_once(
        &self,
        req: &SearchRequest,
        codec: CodecName,
    ) -> Result<CatalogEntry, EzBeqError> {
        let query = search_query(req, codec);
        let body = self
            .send_with_retry(Method::GET, "/api/1/search", &query, None)
            .await?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&body)
            .map_err(|e| EzBeqError::Decode(format!("catalog search: {e}")))?;
        debug!(candidates = entries.len(), codec = %codec, "catalog search returned");

        select_entry(&entries, req, codec)
            .cloned()
            .ok_or(EzBeqError::NotFoundInCatalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, author: &str, edition: &str, audio: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            title: "Dune".into(),
            year: 2021,
            audio_types: vec![audio.into()],
            mv_adjust: -1.5,
            edition: edition.into(),
            tmdb_id: "438631".into(),
            author: author.into(),
            ..Default::default()
        }
    }

    fn request() -> SearchRequest {
        SearchRequest {
            tmdb: "438631".into(),
            year: 2021,
            codec: CodecName::Atmos,
            ..Default::default()
        }
    }

    #[test]
    fn empty_catalog_edition_matches_anything() {
        assert!(edition_matches("", Edition::Extended));
        assert!(edition_matches("", Edition::None));
    }

    #[test]
    fn catalog_edition_must_contain_request() {
        assert!(edition_matches("Extended Cut", Edition::Extended));
        assert!(edition_matches("DIRECTOR'S CUT", Edition::Director));
        assert!(!edition_matches("Theatrical", Edition::Extended));
        assert!(!edition_matches("Extended Cut", Edition::None));
    }

    #[test]
    fn first_match_in_server_order_without_author() {
        let entries = vec![
            entry("a", "mobe1969", "", "Atmos"),
            entry("b", "aron7awol", "", "Atmos"),
        ];
        let hit = select_entry(&entries, &request(), CodecName::Atmos).unwrap();
        assert_eq!(hit.id, "a");
    }

    #[test]
    fn preferred_author_wins_regardless_of_order() {
        let entries = vec![
            entry("a", "mobe1969", "", "Atmos"),
            entry("b", "aron7awol", "", "Atmos"),
        ];
        let mut req = request();
        req.preferred_authors = vec!["aron7awol".into(), "mobe1969".into()];
        let hit = select_entry(&entries, &req, CodecName::Atmos).unwrap();
        assert_eq!(hit.id, "b");
    }

    #[test]
    fn codec_and_year_must_match() {
        let mut wrong_year = entry("a", "x", "", "Atmos");
        wrong_year.year = 1984;
        let entries = vec![wrong_year, entry("b", "x", "", "TrueHD 7.1")];
        assert!(select_entry(&entries, &request(), CodecName::Atmos).is_none());
        let hit = select_entry(&entries, &request(), CodecName::TrueHd71).unwrap();
        assert_eq!(hit.id, "b");
    }

    #[test]
    fn query_repeats_authors_and_skips_none() {
        let mut req = request();
        req.preferred_authors = vec!["aron7awol".into(), "none".into(), "mobe1969".into()];
        let q = search_query(&req, CodecName::DdPlusAtmos);
        assert_eq!(
            q,
            vec![
                ("audiotypes", "DD+ Atmos".to_string()),
                ("years", "2021".to_string()),
                ("authors", "aron7awol".to_string()),
                ("authors", "mobe1969".to_string()),
            ]
        );
    }
}
