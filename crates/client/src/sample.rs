//! Sample league used by the simulated feed.
//!
//! Holds a handful of games and mutates them the way a live broadcast would:
//! scores change, the clock runs, possession flips and scheduled games kick
//! off. Each tick returns the feed events describing exactly what changed.

use gridiron_shared::{
    FeedEvent, Game, GameStatus, NewsItem, NewsKind, PassingLine, ReceivingLine, RushingLine,
    ScoreUpdate, StatUpdate, StatusUpdate, Team, TeamStatLine, TeamStats,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SCORE_CHANCE: f64 = 0.2;
const TOUCHDOWN_CHANCE: f64 = 0.3;
const POSSESSION_CHANCE: f64 = 0.1;
const RED_ZONE_CHANCE: f64 = 0.3;
const KICKOFF_CHANCE: f64 = 0.05;

const QUARTER_SECONDS: u32 = 15 * 60;

pub struct SampleLeague {
    games: Vec<Game>,
    rng: StdRng,
}

fn team(id: &str, name: &str, city: &str) -> Team {
    Team {
        id: id.to_string(),
        name: name.to_string(),
        abbreviation: id.to_string(),
        city: Some(city.to_string()),
    }
}

fn default_games() -> Vec<Game> {
    let chiefs = team("KC", "Chiefs", "Kansas City");
    let niners = team("SF", "49ers", "San Francisco");
    let bills = team("BUF", "Bills", "Buffalo");
    let dolphins = team("MIA", "Dolphins", "Miami");
    let eagles = team("PHI", "Eagles", "Philadelphia");

    vec![
        Game {
            id: "1".to_string(),
            home_team: chiefs.clone(),
            away_team: niners.clone(),
            home_score: 25,
            away_score: 22,
            status: GameStatus::Live,
            quarter: Some("Q4".to_string()),
            time_remaining: Some("2:00".to_string()),
            start_time: None,
            venue: Some("Arrowhead Stadium".to_string()),
            possession: Some("KC".to_string()),
            red_zone: Some(false),
        },
        Game {
            id: "2".to_string(),
            home_team: bills.clone(),
            away_team: dolphins,
            home_score: 31,
            away_score: 28,
            status: GameStatus::Final,
            quarter: None,
            time_remaining: None,
            start_time: None,
            venue: Some("Highmark Stadium".to_string()),
            possession: None,
            red_zone: None,
        },
        Game {
            id: "3".to_string(),
            home_team: niners,
            away_team: chiefs,
            home_score: 0,
            away_score: 0,
            status: GameStatus::Scheduled,
            quarter: None,
            time_remaining: None,
            start_time: Some("8:20 PM ET".to_string()),
            venue: Some("Levi's Stadium".to_string()),
            possession: None,
            red_zone: None,
        },
        Game {
            id: "4".to_string(),
            home_team: eagles,
            away_team: bills,
            home_score: 17,
            away_score: 14,
            status: GameStatus::Live,
            quarter: Some("Q3".to_string()),
            time_remaining: Some("8:45".to_string()),
            start_time: None,
            venue: Some("Lincoln Financial Field".to_string()),
            possession: Some("PHI".to_string()),
            red_zone: Some(false),
        },
    ]
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Parse "Q3" and "8:45" into a quarter number and seconds left in it.
fn parse_clock(quarter: Option<&str>, time: Option<&str>) -> (u32, u32) {
    let quarter = quarter
        .and_then(|q| q.strip_prefix('Q'))
        .and_then(|q| q.parse::<u32>().ok())
        .filter(|q| (1..=4).contains(q))
        .unwrap_or(1);
    let remaining = time
        .and_then(|t| t.split_once(':'))
        .and_then(|(m, s)| Some(m.parse::<u32>().ok()? * 60 + s.parse::<u32>().ok()?))
        .map_or(QUARTER_SECONDS, |secs| secs.min(QUARTER_SECONDS));
    (quarter, remaining)
}

fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

impl SampleLeague {
    /// The default sample slate. `seed` makes every tick reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_games(default_games(), seed)
    }

    pub fn with_games(games: Vec<Game>, seed: Option<u64>) -> Self {
        Self {
            games,
            rng: rng_for(seed),
        }
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    /// Full game list, as sent in the initial snapshot.
    pub fn snapshot(&self) -> Vec<Game> {
        self.games.clone()
    }

    /// Advance one randomly chosen game by a single play.
    pub fn play_tick(&mut self) -> Vec<FeedEvent> {
        if self.games.is_empty() {
            return Vec::new();
        }
        let index = self.rng.gen_range(0..self.games.len());
        match self.games[index].status {
            GameStatus::Live => self.advance_live(index),
            GameStatus::Scheduled | GameStatus::Upcoming => self.maybe_kick_off(index),
            GameStatus::Final | GameStatus::Postponed => Vec::new(),
        }
    }

    fn scoring_roll(&mut self) -> u32 {
        if !self.rng.gen_bool(SCORE_CHANCE) {
            0
        } else if self.rng.gen_bool(TOUCHDOWN_CHANCE) {
            7
        } else {
            3
        }
    }

    fn advance_live(&mut self, index: usize) -> Vec<FeedEvent> {
        let mut events = Vec::new();

        let home_points = self.scoring_roll();
        let away_points = self.scoring_roll();
        if home_points > 0 || away_points > 0 {
            let game = &mut self.games[index];
            game.home_score += home_points;
            game.away_score += away_points;
            events.push(FeedEvent::Score(ScoreUpdate {
                game_id: game.id.clone(),
                home_score: game.home_score,
                away_score: game.away_score,
            }));
            for (points, scorer, opponent) in [
                (home_points, &game.home_team, &game.away_team),
                (away_points, &game.away_team, &game.home_team),
            ] {
                if points == 0 {
                    continue;
                }
                let play = if points == 7 { "touchdown" } else { "field goal" };
                events.push(FeedEvent::News(
                    NewsItem::new(
                        NewsKind::Scoring,
                        format!("{} scores {}!", scorer.name, play),
                        format!("{} {} against {}", scorer.name, play, opponent.name),
                    )
                    .for_game(&game.id)
                    .for_team(&scorer.id),
                ));
            }
        }

        let elapsed = self.rng.gen_range(15..=90);
        events.push(self.run_clock(index, elapsed));

        if self.games[index].is_live() && self.rng.gen_bool(POSSESSION_CHANCE) {
            let red_zone = self.rng.gen_bool(RED_ZONE_CHANCE);
            let game = &mut self.games[index];
            let next = if game.possession.as_deref() == Some(game.home_team.id.as_str()) {
                &game.away_team
            } else {
                &game.home_team
            };
            let summary = if red_zone {
                format!("Turnover gives the {} the ball in the red zone", next.name)
            } else {
                format!("Turnover gives the {} the ball", next.name)
            };
            let item = NewsItem::new(
                NewsKind::Possession,
                format!("{} take possession", next.name),
                summary,
            )
            .for_game(&game.id)
            .for_team(&next.id);
            game.possession = Some(next.id.clone());
            game.red_zone = Some(red_zone);
            events.push(FeedEvent::News(item));
        }

        events
    }

    /// Run the game clock forward, rolling into the next quarter or ending the game.
    fn run_clock(&mut self, index: usize, elapsed: u32) -> FeedEvent {
        let game = &mut self.games[index];
        let (mut quarter, remaining) =
            parse_clock(game.quarter.as_deref(), game.time_remaining.as_deref());

        let mut remaining = remaining.saturating_sub(elapsed);
        if remaining == 0 && quarter < 4 {
            quarter += 1;
            remaining = QUARTER_SECONDS;
        }

        let clock = format_clock(remaining);
        let status = if remaining == 0 {
            game.status = GameStatus::Final;
            game.possession = None;
            game.red_zone = None;
            GameStatus::Final.as_str().to_string()
        } else {
            format!("Q{quarter}")
        };
        game.quarter = Some(status.clone());
        game.time_remaining = Some(clock.clone());

        FeedEvent::Status(StatusUpdate {
            game_id: game.id.clone(),
            status,
            time: Some(clock),
        })
    }

    fn maybe_kick_off(&mut self, index: usize) -> Vec<FeedEvent> {
        if !self.rng.gen_bool(KICKOFF_CHANCE) {
            return Vec::new();
        }
        let home_receives = self.rng.gen_bool(0.5);

        let game = &mut self.games[index];
        game.status = GameStatus::Live;
        game.quarter = Some("Q1".to_string());
        game.time_remaining = Some(format_clock(QUARTER_SECONDS));
        game.possession = Some(if home_receives {
            game.home_team.id.clone()
        } else {
            game.away_team.id.clone()
        });
        game.red_zone = Some(false);

        tracing::debug!("Sample game {} kicked off", game.id);
        vec![
            FeedEvent::Status(StatusUpdate {
                game_id: game.id.clone(),
                status: GameStatus::Live.as_str().to_string(),
                time: Some("Q1 15:00".to_string()),
            }),
            FeedEvent::News(
                NewsItem::new(
                    NewsKind::Kickoff,
                    format!("{} vs {} is now live!", game.home_team.name, game.away_team.name),
                    format!(
                        "Game between {} and {} has started",
                        game.home_team.name, game.away_team.name
                    ),
                )
                .for_game(&game.id),
            ),
        ]
    }

    fn random_stats(&mut self) -> TeamStats {
        let rng = &mut self.rng;
        TeamStats {
            passing: PassingLine {
                attempts: rng.gen_range(10..50),
                completions: rng.gen_range(5..35),
                yards: rng.gen_range(50..350),
                touchdowns: rng.gen_range(0..4),
                interceptions: rng.gen_range(0..3),
            },
            rushing: RushingLine {
                attempts: rng.gen_range(5..30),
                yards: rng.gen_range(20..170),
                touchdowns: rng.gen_range(0..3),
            },
            receiving: ReceivingLine {
                receptions: rng.gen_range(5..25),
                yards: rng.gen_range(30..280),
                touchdowns: rng.gen_range(0..3),
            },
        }
    }

    /// Box-score refresh for a random game, if that game is live.
    pub fn stat_tick(&mut self) -> Option<FeedEvent> {
        if self.games.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.games.len());
        if !self.games[index].is_live() {
            return None;
        }
        let home = self.random_stats();
        let away = self.random_stats();
        let game = &self.games[index];
        Some(FeedEvent::Stats(StatUpdate {
            game_id: game.id.clone(),
            home_team: TeamStatLine {
                id: game.home_team.id.clone(),
                stats: home,
            },
            away_team: TeamStatLine {
                id: game.away_team.id.clone(),
                stats: away,
            },
        }))
    }

    /// One league news item. Highlights and milestones need a live game.
    pub fn news_tick(&mut self) -> Option<FeedEvent> {
        let kind = match self.rng.gen_range(0..4) {
            0 => NewsKind::Injury,
            1 => NewsKind::Highlight,
            2 => NewsKind::Milestone,
            _ => NewsKind::General,
        };
        let home_side = self.rng.gen_bool(0.5);

        let item = match kind {
            NewsKind::Injury => {
                if self.games.is_empty() {
                    return None;
                }
                let index = self.rng.gen_range(0..self.games.len());
                let game = &self.games[index];
                let team = if home_side { &game.home_team } else { &game.away_team };
                NewsItem::new(
                    kind,
                    format!("{} player leaves game with injury", team.name),
                    format!(
                        "A player from the {} has left the game with an apparent injury. \
                         Status updates to follow.",
                        team.name
                    ),
                )
                .for_team(&team.id)
            }
            NewsKind::Highlight | NewsKind::Milestone => {
                let game = self.games.iter().find(|game| game.is_live())?;
                let (team, opponent) = if home_side {
                    (&game.home_team, &game.away_team)
                } else {
                    (&game.away_team, &game.home_team)
                };
                let item = if kind == NewsKind::Highlight {
                    NewsItem::new(
                        kind,
                        format!("Spectacular play by {}", team.name),
                        format!(
                            "{} just made a highlight-reel worthy play against {}.",
                            team.name, opponent.name
                        ),
                    )
                } else {
                    NewsItem::new(
                        kind,
                        format!("{} reach significant milestone", team.name),
                        format!(
                            "The {} have reached a significant statistical milestone in today's game.",
                            team.name
                        ),
                    )
                };
                item.for_game(&game.id).for_team(&team.id)
            }
            _ => NewsItem::new(
                NewsKind::General,
                "League announces schedule changes",
                "The league has announced several schedule changes affecting upcoming games.",
            ),
        };
        Some(FeedEvent::News(item))
    }
}
