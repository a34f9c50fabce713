use chrono::{DateTime, Datelike, Timelike, Utc};
use kurbo::Vec2;

use crate::{
    assets::ImageRef,
    core::{HALF_CANVAS, clamp_to_canvas},
    error::{CourtsideError, CourtsideResult},
};

/// Maximum number of match rows composed onto a single card.
pub const GAMES_PER_CARD: usize = 6;

/// One fetched fixture/result. Immutable once fetched.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub competition_name: String,
    pub local: TeamSide,
    pub visitor: TeamSide,
    pub local_score: Option<i32>,
    pub visitor_score: Option<i32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TeamSide {
    pub name: String,
    pub shield: ImageRef,
}

/// A batch of up to [`GAMES_PER_CARD`] games composed into one exportable
/// square image.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Card {
    pub games: Vec<GameRecord>,
}

impl Card {
    pub fn new(games: Vec<GameRecord>) -> CourtsideResult<Self> {
        if games.len() > GAMES_PER_CARD {
            return Err(CourtsideError::validation(format!(
                "card holds at most {GAMES_PER_CARD} games, got {}",
                games.len()
            )));
        }
        Ok(Self { games })
    }
}

/// Partition fetched games into display cards.
///
/// Batching is pagination only: fixed-size chunks in original order, no record
/// duplicated or dropped.
pub fn generate_cards(games: &[GameRecord]) -> Vec<Card> {
    games
        .chunks(GAMES_PER_CARD)
        .map(|chunk| Card {
            games: chunk.to_vec(),
        })
        .collect()
}

/// Render a score value for display. `None` is an unplayed fixture and shows a
/// dash; a real zero stays "0".
pub fn score_text(score: Option<i32>) -> String {
    match score {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoSection {
    Top,
    Bottom,
}

impl LogoSection {
    /// Vertical travel bounds relative to the section anchor, in virtual units.
    ///
    /// Top logos may travel further downward than upward and bottom logos the
    /// inverse, so neither can drift into the opposite band.
    pub fn vertical_bounds(self) -> (f64, f64) {
        match self {
            LogoSection::Top => (-60.0, 300.0),
            LogoSection::Bottom => (-300.0, 60.0),
        }
    }

    /// Clamp a section-relative offset to this section's travel bounds.
    pub fn clamp_offset(self, offset: Vec2) -> Vec2 {
        let (min_y, max_y) = self.vertical_bounds();
        Vec2::new(
            offset.x.clamp(-HALF_CANVAS, HALF_CANVAS),
            offset.y.clamp(min_y, max_y),
        )
    }
}

/// A corner logo slot. The image may be empty until the user uploads one.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Logo {
    pub id: String,
    pub name: String,
    pub image: ImageRef,
    pub position: Vec2,
    pub section: LogoSection,
}

impl Logo {
    pub fn empty(id: impl Into<String>, name: impl Into<String>, section: LogoSection) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: ImageRef::empty(),
            position: Vec2::ZERO,
            section,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

impl FontWeight {
    pub fn css_value(self) -> u16 {
        match self {
            FontWeight::Normal => 400,
            FontWeight::Bold => 700,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Italic,
}

/// Free-floating annotation painted above the match rows.
///
/// `position` is measured from the canvas center and always stays within
/// `±540` units on both axes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextElement {
    pub id: String,
    pub text: String,
    pub position: Vec2,
    pub font_size: f64,
    pub font_family: String,
    pub color: crate::style::HexColor,
    pub rotation: f64,
    pub text_align: TextAlign,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
}

impl TextElement {
    /// New element with the default placement at canvas center.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: "Text".to_string(),
            position: Vec2::ZERO,
            font_size: 24.0,
            font_family: "Montserrat".to_string(),
            color: crate::style::HexColor::BLACK,
            rotation: 0.0,
            text_align: TextAlign::Left,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
        }
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.position = clamp_to_canvas(pos);
    }
}

/// A selectable card background. `opacity` applies to the painted image only.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Background {
    pub id: String,
    pub image: ImageRef,
    pub name: String,
    pub opacity: f64,
}

impl Background {
    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }
}

const WEEKDAYS_ES: [&str; 7] = [
    "lunes",
    "martes",
    "miércoles",
    "jueves",
    "viernes",
    "sábado",
    "domingo",
];

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Long-form Spanish date plus 24h time, as shown on the card's date line.
pub fn format_game_date(date: DateTime<Utc>) -> (String, String) {
    let weekday = WEEKDAYS_ES[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS_ES[date.month0() as usize];
    let full = format!("{weekday}, {} de {month}", date.day());
    let time = format!("{:02}:{:02}", date.hour(), date.minute());
    (full, time)
}

/// Fixed fixture used across unit tests.
#[cfg(test)]
pub(crate) fn sample_game(n: usize) -> GameRecord {
    use chrono::TimeZone;

    GameRecord {
        id: format!("g{n}"),
        date: Utc.with_ymd_and_hms(2025, 1, 11, 19, 30, 0).unwrap(),
        competition_name: "Liga EBA".to_string(),
        local: TeamSide {
            name: "CB Norte".to_string(),
            shield: ImageRef::new("https://img.example.com/norte.png"),
        },
        visitor: TeamSide {
            name: "CB Sur".to_string(),
            shield: ImageRef::new("https://img.example.com/sur.png"),
        },
        local_score: Some(72),
        visitor_score: Some(68),
    }
}
