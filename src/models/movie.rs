use chrono::{Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::filters::Filters;
use super::validator::{Validator, unique};

/// Runtime in minutes, carried on the wire as `"<n> mins"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_runtime(&raw)
            .map(Runtime)
            .ok_or_else(|| serde::de::Error::custom("invalid runtime format"))
    }
}

fn parse_runtime(raw: &str) -> Option<i32> {
    let (minutes, unit) = raw.split_once(' ')?;
    if unit != "mins" {
        return None;
    }
    minutes.parse().ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct Movie {
    #[serde(serialize_with = "super::id::serialize")]
    pub id: i32,
    #[serde(skip_serializing)]
    pub created_at: String,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

/// Request body for create and partial update. Absent fields are `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl MovieInput {
    /// Builds a new, unsaved movie. Missing fields become empty values so that
    /// validation reports them.
    #[must_use]
    pub fn into_new_movie(self) -> Movie {
        Movie {
            id: 0,
            created_at: String::new(),
            title: self.title.unwrap_or_default(),
            year: self.year.unwrap_or_default(),
            runtime: self.runtime.unwrap_or_default(),
            genres: self.genres.unwrap_or_default(),
            version: 0,
        }
    }

    /// Overwrites only the fields present in the patch.
    pub fn apply_to(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}

#[derive(Debug, Clone)]
pub struct MovieQuery {
    pub title: String,
    pub genres: Vec<String>,
    pub filters: Filters,
}

pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= 500,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(
        movie.year <= Utc::now().year(),
        "year",
        "must not be in the future",
    );

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        movie.genres.len() <= 5,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(
        unique(&movie.genres),
        "genres",
        "must not contain duplicate values",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> Movie {
        MovieInput {
            title: Some("Moana".to_string()),
            year: Some(2016),
            runtime: Some(Runtime(107)),
            genres: Some(vec!["animation".to_string(), "adventure".to_string()]),
        }
        .into_new_movie()
    }

    #[test]
    fn test_runtime_wire_format() {
        assert_eq!(serde_json::to_string(&Runtime(102)).unwrap(), "\"102 mins\"");
        let parsed: Runtime = serde_json::from_str("\"95 mins\"").unwrap();
        assert_eq!(parsed, Runtime(95));
        assert!(serde_json::from_str::<Runtime>("\"95 minutes\"").is_err());
        assert!(serde_json::from_str::<Runtime>("95").is_err());
    }

    #[test]
    fn test_input_rejects_unknown_fields() {
        let err = serde_json::from_str::<MovieInput>(r#"{"title":"x","rating":5}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_movie() {
        let mut v = Validator::new();
        validate_movie(&mut v, &movie());
        assert!(v.valid());

        let mut bad = movie();
        bad.year = 1500;
        bad.genres = vec!["a".into(), "a".into()];
        bad.runtime = Runtime(-1);
        let mut v = Validator::new();
        validate_movie(&mut v, &bad);
        let errors = v.finish().unwrap_err();
        assert_eq!(errors["year"], "must be greater than 1888");
        assert_eq!(errors["genres"], "must not contain duplicate values");
        assert_eq!(errors["runtime"], "must be a positive integer");
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let mut v = Validator::new();
        validate_movie(&mut v, &MovieInput::default().into_new_movie());
        let errors = v.finish().unwrap_err();
        assert_eq!(errors["title"], "must be provided");
        assert_eq!(errors["year"], "must be provided");
        assert_eq!(errors["runtime"], "must be provided");
        assert_eq!(errors["genres"], "must contain at least 1 genre");
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut m = movie();
        MovieInput {
            year: Some(2017),
            ..MovieInput::default()
        }
        .apply_to(&mut m);
        assert_eq!(m.year, 2017);
        assert_eq!(m.title, "Moana");
    }
}
