//! Genre normalization and the arm vocabulary
//!
//! Every candidate is bucketed into one of twelve arms: six movie genres and
//! six song genres, each domain ending in an explicit "other" bucket. Genre
//! implicitly identifies the content domain; movie arms and song arms never
//! overlap. The mapping is configuration data: deterministic, total, and
//! independent of model state.

use serde::{Deserialize, Serialize};

/// Content domain of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Song,
    Movie,
}

/// A candidate item produced by the upstream recommenders
///
/// `genre` holds raw metadata as received: a single label for songs, a
/// possibly pipe-delimited list ("Action|Adventure") for movies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "type")]
    pub domain: Domain,
    pub id: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl Candidate {
    pub fn new(domain: Domain, id: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            domain,
            id: id.into(),
            genre: genre.into(),
            similarity_score: 0.0,
            title: None,
            year: None,
        }
    }

    pub fn with_similarity(mut self, score: f64) -> Self {
        self.similarity_score = score;
        self
    }

    /// The arm this candidate belongs to
    pub fn arm(&self) -> &'static str {
        arm_for(self.domain, &self.genre)
    }
}

/// Movie arms, "other" bucket last
pub const MOVIE_ARMS: [&str; 6] = [
    "drama",
    "comedy",
    "action",
    "romance",
    "thriller",
    "other_movie",
];

/// Song arms, "other" bucket last
pub const SONG_ARMS: [&str; 6] = ["pop", "rock", "hiphop", "rnb", "country", "other_song"];

/// The full arm vocabulary shared by every model
pub fn all_arms() -> Vec<String> {
    MOVIE_ARMS
        .iter()
        .chain(SONG_ARMS.iter())
        .map(|s| s.to_string())
        .collect()
}

/// Map a candidate's domain and raw genre metadata to an arm
pub fn arm_for(domain: Domain, raw_genre: &str) -> &'static str {
    match domain {
        Domain::Movie => normalize_movie_genre(raw_genre),
        Domain::Song => normalize_song_genre(raw_genre),
    }
}

/// Normalize a raw movie genre to one of six buckets
///
/// Takes the first token of a pipe-delimited list, lowercased and trimmed.
pub fn normalize_movie_genre(raw: &str) -> &'static str {
    let first = first_token(raw);
    match first.as_str() {
        "drama" | "war" | "history" => "drama",
        "comedy" | "animation" | "family" | "musical" => "comedy",
        "action" | "adventure" | "sci-fi" | "science fiction" | "fantasy" | "western" => "action",
        "romance" => "romance",
        "thriller" | "horror" | "crime" | "mystery" => "thriller",
        _ => "other_movie",
    }
}

/// Normalize a raw song genre to one of six buckets
pub fn normalize_song_genre(raw: &str) -> &'static str {
    let first = first_token(raw);
    match first.as_str() {
        "pop" | "electronic" | "dance" | "edm" | "latin" => "pop",
        "rock" | "alternative" | "indie" | "metal" | "punk" => "rock",
        "hip hop" | "hip-hop" | "rap" => "hiphop",
        "r&b" | "rnb" | "soul" | "blues" => "rnb",
        "country" | "folk" => "country",
        _ => "other_song",
    }
}

fn first_token(raw: &str) -> String {
    raw.split('|')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_genre_mapping() {
        assert_eq!(normalize_movie_genre("Drama"), "drama");
        assert_eq!(normalize_movie_genre("Adventure"), "action");
        assert_eq!(normalize_movie_genre("Horror"), "thriller");
        assert_eq!(normalize_movie_genre("Documentary"), "other_movie");
        assert_eq!(normalize_movie_genre("Musical"), "comedy");
    }

    #[test]
    fn test_movie_genre_takes_first_pipe_token() {
        assert_eq!(normalize_movie_genre("Action|Adventure|Sci-Fi"), "action");
        assert_eq!(normalize_movie_genre("  Romance |Drama"), "romance");
    }

    #[test]
    fn test_song_genre_mapping() {
        assert_eq!(normalize_song_genre("Hip Hop"), "hiphop");
        assert_eq!(normalize_song_genre("hip-hop"), "hiphop");
        assert_eq!(normalize_song_genre("R&B"), "rnb");
        assert_eq!(normalize_song_genre("folk"), "country");
        assert_eq!(normalize_song_genre("jazz"), "other_song");
        assert_eq!(normalize_song_genre("classical"), "other_song");
    }

    #[test]
    fn test_empty_and_unknown_map_to_other() {
        assert_eq!(normalize_movie_genre(""), "other_movie");
        assert_eq!(normalize_song_genre(""), "other_song");
        assert_eq!(normalize_movie_genre("definitely-not-a-genre"), "other_movie");
    }

    #[test]
    fn test_arms_are_disjoint_across_domains() {
        for movie_arm in MOVIE_ARMS {
            assert!(!SONG_ARMS.contains(&movie_arm));
        }
        assert_eq!(all_arms().len(), 12);
    }

    #[test]
    fn test_candidate_arm() {
        let c = Candidate::new(Domain::Movie, "m1", "Crime|Drama");
        assert_eq!(c.arm(), "thriller");
        let c = Candidate::new(Domain::Song, "s1", "Soul");
        assert_eq!(c.arm(), "rnb");
    }
}
