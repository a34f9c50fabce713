//! Game results ingestion.
//!
//! The upstream API returns a `{ "games": [...] }` envelope with nested
//! competition, team and club objects. Only the fields this crate consumes
//! are typed; everything else is captured by flattened maps so a re-serialize
//! loses nothing the server sent.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::info;

use crate::{
    assets::ImageRef,
    error::{CourtsideError, CourtsideResult},
    model::{GameRecord, TeamSide},
};

/// Date range plus the fixed organization (club) the results belong to.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GamesQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub organization_id: u64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ApiResponse {
    pub games: Vec<ApiGame>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGame {
    pub id: String,
    pub date: DateTime<Utc>,
    pub competition: ApiCompetition,
    pub local_team: ApiTeam,
    pub visitor_team: ApiTeam,
    pub local_score: Option<i32>,
    pub visitor_score: Option<i32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ApiCompetition {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ApiTeam {
    pub club: ApiClub,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClub {
    pub name: String,
    #[serde(default)]
    pub shield_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl From<ApiGame> for GameRecord {
    fn from(game: ApiGame) -> Self {
        let side = |team: ApiTeam| TeamSide {
            name: team.club.name,
            shield: team
                .club
                .shield_url
                .map(ImageRef::new)
                .unwrap_or_else(ImageRef::empty),
        };
        GameRecord {
            id: game.id,
            date: game.date,
            competition_name: game.competition.name,
            local: side(game.local_team),
            visitor: side(game.visitor_team),
            local_score: game.local_score,
            visitor_score: game.visitor_score,
        }
    }
}

/// Source of game records. A failed fetch must not clear data the caller
/// already holds; implementations return an error and touch nothing.
pub trait GameProvider {
    fn fetch_games(&self, query: &GamesQuery) -> CourtsideResult<Vec<GameRecord>>;
}

/// Reads a saved API response from disk. The network client lives outside
/// this crate; a captured response file is the exchange format.
#[derive(Clone, Debug)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl GameProvider for JsonFileProvider {
    fn fetch_games(&self, query: &GamesQuery) -> CourtsideResult<Vec<GameRecord>> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("reading games file {}", self.path.display()))
            .map_err(|err| CourtsideError::fetch(format!("{err:#}")))?;
        let response = parse_response(&bytes)?;

        let games: Vec<GameRecord> = response
            .games
            .into_iter()
            .map(GameRecord::from)
            .filter(|g| {
                let day = g.date.date_naive();
                day >= query.from && day <= query.to
            })
            .collect();
        info!(
            count = games.len(),
            from = %query.from,
            to = %query.to,
            "loaded games from file"
        );
        Ok(games)
    }
}

pub fn parse_response(bytes: &[u8]) -> CourtsideResult<ApiResponse> {
    serde_json::from_slice(bytes)
        .map_err(|err| CourtsideError::fetch(format!("malformed games response: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "games": [
            {
                "id": "g-1",
                "date": "2025-01-11T19:30:00Z",
                "competition": { "name": "Liga EBA", "group": "C-B" },
                "localTeam": {
                    "club": { "name": "CB Norte", "shieldUrl": "https://img.example.com/n.png" },
                    "category": "senior"
                },
                "visitorTeam": {
                    "club": { "name": "CB Sur" }
                },
                "localScore": null,
                "visitorScore": 0,
                "venue": "Pabellon Central"
            }
        ],
        "page": 1
    }"#;

    #[test]
    fn envelope_parses_and_preserves_unknown_fields() {
        let response = parse_response(SAMPLE.as_bytes()).unwrap();
        assert_eq!(response.extra.get("page"), Some(&Value::from(1)));
        let game = &response.games[0];
        assert_eq!(game.extra.get("venue"), Some(&Value::from("Pabellon Central")));
        assert_eq!(game.competition.extra.get("group"), Some(&Value::from("C-B")));

        let back = serde_json::to_value(&response).unwrap();
        assert_eq!(back.get("page"), Some(&Value::from(1)));
    }

    #[test]
    fn conversion_uses_club_name_and_shield() {
        let response = parse_response(SAMPLE.as_bytes()).unwrap();
        let record = GameRecord::from(response.games[0].clone());
        assert_eq!(record.local.name, "CB Norte");
        assert_eq!(record.local.shield.raw(), "https://img.example.com/n.png");
        assert!(record.visitor.shield.raw().is_empty());
        assert_eq!(record.local_score, None);
        assert_eq!(record.visitor_score, Some(0));
    }

    #[test]
    fn file_provider_filters_by_date_range() {
        let dir = std::env::temp_dir().join("courtside-fetch-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("games.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let provider = JsonFileProvider::new(&path);
        let in_range = provider
            .fetch_games(&GamesQuery {
                from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                organization_id: 991,
            })
            .unwrap();
        assert_eq!(in_range.len(), 1);

        let out_of_range = provider
            .fetch_games(&GamesQuery {
                from: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
                organization_id: 991,
            })
            .unwrap();
        assert!(out_of_range.is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let provider = JsonFileProvider::new("/nonexistent/games.json");
        let err = provider
            .fetch_games(&GamesQuery {
                from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                organization_id: 991,
            })
            .unwrap_err();
        assert!(matches!(err, CourtsideError::Fetch(_)));
    }
}
