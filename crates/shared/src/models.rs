//! Data model carried by live feed payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Teams & Games ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Live,
    Final,
    Upcoming,
    Postponed,
    Scheduled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Live => "LIVE",
            GameStatus::Final => "FINAL",
            GameStatus::Upcoming => "UPCOMING",
            GameStatus::Postponed => "POSTPONED",
            GameStatus::Scheduled => "SCHEDULED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub home_team: Team,
    pub away_team: Team,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Team id of the side with the ball
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_zone: Option<bool>,
}

impl Game {
    pub fn is_live(&self) -> bool {
        self.status == GameStatus::Live
    }

    /// Name of the team holding possession, if any.
    pub fn possession_team(&self) -> Option<&Team> {
        let id = self.possession.as_deref()?;
        if id == self.home_team.id {
            Some(&self.home_team)
        } else if id == self.away_team.id {
            Some(&self.away_team)
        } else {
            None
        }
    }
}

// --- Deltas ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub game_id: String,
    pub home_score: u32,
    pub away_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub game_id: String,
    /// Free-form status text, e.g. "LIVE", "Q3" or "FINAL"
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PassingLine {
    pub attempts: u32,
    pub completions: u32,
    pub yards: u32,
    pub touchdowns: u32,
    pub interceptions: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RushingLine {
    pub attempts: u32,
    pub yards: u32,
    pub touchdowns: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReceivingLine {
    pub receptions: u32,
    pub yards: u32,
    pub touchdowns: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct TeamStats {
    pub passing: PassingLine,
    pub rushing: RushingLine,
    pub receiving: ReceivingLine,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatLine {
    pub id: String,
    #[serde(default)]
    pub stats: TeamStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatUpdate {
    pub game_id: String,
    pub home_team: TeamStatLine,
    pub away_team: TeamStatLine,
}

// --- News ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NewsKind {
    Injury,
    Highlight,
    Milestone,
    General,
    Scoring,
    Possession,
    Kickoff,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NewsKind>,
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl NewsItem {
    /// Create a news item stamped now with a fresh id.
    pub fn new(kind: NewsKind, headline: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: format!("news-{}", uuid::Uuid::new_v4()),
            kind: Some(kind),
            headline: headline.into(),
            summary: summary.into(),
            timestamp: Utc::now(),
            game_id: None,
            team_id: None,
        }
    }

    pub fn for_game(mut self, game_id: impl Into<String>) -> Self {
        self.game_id = Some(game_id.into());
        self
    }

    pub fn for_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }
}
