use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MeetlyError;

/// The kind of activity a meeting is about. Stored by its
/// SCREAMING_SNAKE name.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    BarGames,
    Alcohol,
    BoardGames,
    Outdoors,
    Party,
    Movies,
    Event,
    OutdoorGames,
    Swim,
    VideoGames,
}

const ALL: [Category; 10] = [
    Category::BarGames,
    Category::Alcohol,
    Category::BoardGames,
    Category::Outdoors,
    Category::Party,
    Category::Movies,
    Category::Event,
    Category::OutdoorGames,
    Category::Swim,
    Category::VideoGames,
];

impl Category {
    pub fn all() -> &'static [Category] {
        &ALL
    }

    /// The stored name, e.g. `OUTDOOR_GAMES`.
    pub fn name(self) -> &'static str {
        use Category::*;

        match self {
            BarGames => "BAR_GAMES",
            Alcohol => "ALCOHOL",
            BoardGames => "BOARD_GAMES",
            Outdoors => "OUTDOORS",
            Party => "PARTY",
            Movies => "MOVIES",
            Event => "EVENT",
            OutdoorGames => "OUTDOOR_GAMES",
            Swim => "SWIM",
            VideoGames => "VIDEO_GAMES",
        }
    }

    /// Human-readable label.
    pub fn text(self) -> &'static str {
        use Category::*;

        match self {
            BarGames => "Bar games",
            Alcohol => "Bars & pubs",
            BoardGames => "Board games",
            Outdoors => "Camping & hiking",
            Party => "Dance & party",
            Movies => "Movies and series",
            Event => "Organized events",
            OutdoorGames => "Outdoor games",
            Swim => "Pool & beach",
            VideoGames => "Video games",
        }
    }

    pub fn adult_only(self) -> bool {
        matches!(self, Category::Alcohol)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = MeetlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL.iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MeetlyError::invalid(format!("unknown category {:?}", s)))
    }
}

/// Serialized form of a category, as listed to clients.
#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    name: &'static str,
    text: &'static str,
    adult_only: bool,
}

impl From<Category> for CategoryInfo {
    fn from(category: Category) -> Self {
        CategoryInfo {
            name: category.name(),
            text: category.text(),
            adult_only: category.adult_only(),
        }
    }
}
