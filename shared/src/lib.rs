use serde::{Deserialize, Serialize};

pub const MAX_LETTERS: usize = 6;
pub const INITIAL_FALL_RATE: f64 = 0.005;
pub const INITIAL_FALL_DURATION: f64 = 40.0;
pub const FALL_ACCELERATION: f64 = 1.1;
pub const FALL_DECELERATION: f64 = 0.9;
pub const FATAL_LIMIT: f64 = 160.0;
pub const FALL_BOUNDARY: f64 = 410.0;
pub const BONUS_MARGIN: f64 = 3.0;
pub const START_LINE_GAP: f64 = 12.0;

pub const PLACEHOLDER_LETTER: char = '?';
pub const GAME_OVER_MESSAGE: &str = "GAME OVER";

pub const GUESS_WORD_PATH: &str = "/guess_word";
pub const NEXT_TILE_PATH: &str = "/next_tile";
pub const ACCEPT_LETTER_PATH: &str = "/accept_new_letter";
pub const PREVIOUS_GUESSES_PATH: &str = "/previous_guesses";

/// Outbound calls the client makes to the game server.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GuessWord { guess: String, bonus: bool },
    NextTile,
    AcceptLetter { letter: char },
    PreviousGuesses,
}

impl Request {
    pub fn path(&self) -> &'static str {
        match self {
            Request::GuessWord { .. } => GUESS_WORD_PATH,
            Request::NextTile => NEXT_TILE_PATH,
            Request::AcceptLetter { .. } => ACCEPT_LETTER_PATH,
            Request::PreviousGuesses => PREVIOUS_GUESSES_PATH,
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Request::GuessWord { guess, bonus } => {
                vec![("guess", guess.clone()), ("bonus", bonus.to_string())]
            }
            Request::AcceptLetter { letter } => vec![("next_letter", letter.to_string())],
            Request::NextTile | Request::PreviousGuesses => Vec::new(),
        }
    }
}

/// One-way server streams, one per piece of client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    PreviousGuesses,
    CurrentScore,
    Rack,
    TotalScore,
    Started,
}

impl Concern {
    pub const ALL: [Concern; 5] = [
        Concern::PreviousGuesses,
        Concern::CurrentScore,
        Concern::Rack,
        Concern::TotalScore,
        Concern::Started,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Concern::PreviousGuesses => "/get_previous_guesses",
            Concern::CurrentScore => "/get_current_score",
            Concern::Rack => "/get_rack",
            Concern::TotalScore => "/get_total_score",
            Concern::Started => "/started",
        }
    }
}

/// JSON body answering a guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessReply {
    #[serde(default)]
    pub status: String,
    /// Cumulative score after this guess.
    pub score: f64,
    pub current_score: f64,
    #[serde(default)]
    pub tiles: String,
    #[serde(default)]
    pub previous_guesses: Option<Transcript>,
}

/// Previous-guess log, either as a list or as plain text with one guess per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transcript {
    Entries(Vec<String>),
    Text(String),
}

impl Transcript {
    pub fn parse(payload: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(payload.trim()) {
            Ok(entries) => Transcript::Entries(entries),
            Err(_) => Transcript::Text(payload.to_string()),
        }
    }

    pub fn into_entries(self) -> Vec<String> {
        match self {
            Transcript::Entries(entries) => entries,
            Transcript::Text(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Parses a pushed score. Scores are finite and never negative.
pub fn parse_score(payload: &str) -> Option<f64> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|score| score.is_finite() && *score >= 0.0)
}

/// Score pushed after a guess: a bare number, or `[score, "WORD"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub score: f64,
    pub word: Option<String>,
}

impl ScoreUpdate {
    pub fn parse(payload: &str) -> Option<Self> {
        let payload = payload.trim();
        if let Some(score) = parse_score(payload) {
            return Some(ScoreUpdate { score, word: None });
        }
        let (score, word) = serde_json::from_str::<(f64, String)>(payload).ok()?;
        if !score.is_finite() || score < 0.0 {
            return None;
        }
        Some(ScoreUpdate {
            score,
            word: Some(word),
        })
    }
}

/// How an awarded score pushes the threshold back up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum ScorePolicy {
    HalfScore,
    FullScore,
    FixedPerGuess(f64),
}

impl ScorePolicy {
    pub fn relief(&self, score: f64) -> f64 {
        match self {
            ScorePolicy::HalfScore => score / 2.0,
            ScorePolicy::FullScore => score,
            ScorePolicy::FixedPerGuess(amount) => *amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTrigger {
    /// A guess that uses every tile on the rack.
    FullRack,
    Never,
}

impl ResetTrigger {
    pub fn fires(&self, guess_len: usize, max_letters: usize) -> bool {
        match self {
            ResetTrigger::FullRack => guess_len == max_letters,
            ResetTrigger::Never => false,
        }
    }
}

/// Where score-driven board movement comes from. Exactly one source is
/// honoured so a score is never applied twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFeed {
    Reply,
    Push,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub initial_fall_rate: f64,
    pub initial_fall_duration: f64,
    pub acceleration: f64,
    pub deceleration: f64,
    pub fatal_limit: f64,
    pub fall_boundary: f64,
    pub max_letters: usize,
    pub bonus_margin: f64,
    pub start_line_gap: f64,
    pub score_policy: ScorePolicy,
    pub reset_trigger: ResetTrigger,
    pub score_feed: ScoreFeed,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            initial_fall_rate: INITIAL_FALL_RATE,
            initial_fall_duration: INITIAL_FALL_DURATION,
            acceleration: FALL_ACCELERATION,
            deceleration: FALL_DECELERATION,
            fatal_limit: FATAL_LIMIT,
            fall_boundary: FALL_BOUNDARY,
            max_letters: MAX_LETTERS,
            bonus_margin: BONUS_MARGIN,
            start_line_gap: START_LINE_GAP,
            score_policy: ScorePolicy::HalfScore,
            reset_trigger: ResetTrigger::FullRack,
            score_feed: ScoreFeed::Reply,
        }
    }
}

impl Tuning {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Rejects values under which the board could rise on its own or the
    /// game could never end.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.initial_fall_rate.is_finite() && self.initial_fall_rate > 0.0) {
            return Err(format!("initial_fall_rate must be positive, got {}", self.initial_fall_rate));
        }
        if !(self.initial_fall_duration.is_finite() && self.initial_fall_duration > 0.0) {
            return Err(format!(
                "initial_fall_duration must be positive, got {}",
                self.initial_fall_duration
            ));
        }
        if !(self.acceleration.is_finite() && self.acceleration > 1.0) {
            return Err(format!("acceleration must be greater than 1, got {}", self.acceleration));
        }
        if !(self.deceleration > 0.0 && self.deceleration < 1.0) {
            return Err(format!("deceleration must be between 0 and 1, got {}", self.deceleration));
        }
        if self.max_letters == 0 {
            return Err("max_letters must be at least 1".to_string());
        }

        let limits = [
            ("fatal_limit", self.fatal_limit),
            ("fall_boundary", self.fall_boundary),
            ("bonus_margin", self.bonus_margin),
            ("start_line_gap", self.start_line_gap),
        ];
        for (name, value) in limits {
            if !value.is_finite() {
                return Err(format!("{} must be finite, got {}", name, value));
            }
        }

        if let ScorePolicy::FixedPerGuess(amount) = self.score_policy {
            if !(amount.is_finite() && amount >= 0.0) {
                return Err(format!("fixed relief must be a non-negative number, got {}", amount));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_guess_request_query() {
        let request = Request::GuessWord {
            guess: "HELLO".to_string(),
            bonus: true,
        };
        assert_eq!(request.path(), "/guess_word");
        assert_eq!(
            request.query(),
            vec![("guess", "HELLO".to_string()), ("bonus", "true".to_string())]
        );
    }

    #[test]
    fn test_accept_letter_query() {
        let request = Request::AcceptLetter { letter: 'Q' };
        assert_eq!(request.path(), "/accept_new_letter");
        assert_eq!(request.query(), vec![("next_letter", "Q".to_string())]);
        assert!(Request::NextTile.query().is_empty());
    }

    #[test]
    fn test_concern_paths_are_distinct() {
        let mut paths: Vec<&str> = Concern::ALL.iter().map(|c| c.path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), Concern::ALL.len());
    }

    #[test]
    fn test_guess_reply_decoding() {
        let body = r#"{"status":"ok","score":12,"currentScore":3,"tiles":"HELLOX","previousGuesses":["HELL","HELLO"]}"#;
        let reply: GuessReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.status, "ok");
        assert_approx_eq!(reply.score, 12.0);
        assert_approx_eq!(reply.current_score, 3.0);
        assert_eq!(reply.tiles, "HELLOX");
        assert_eq!(
            reply.previous_guesses.unwrap().into_entries(),
            vec!["HELL".to_string(), "HELLO".to_string()]
        );
    }

    #[test]
    fn test_guess_reply_without_optional_fields() {
        let reply: GuessReply = serde_json::from_str(r#"{"score":0,"currentScore":0}"#).unwrap();
        assert!(reply.status.is_empty());
        assert!(reply.tiles.is_empty());
        assert!(reply.previous_guesses.is_none());
    }

    #[test]
    fn test_guess_reply_rejects_plain_text() {
        assert!(serde_json::from_str::<GuessReply>("ok").is_err());
    }

    #[test]
    fn test_transcript_text_lines() {
        let entries = Transcript::parse("CAT\n\n  DOG \nBIRD").into_entries();
        assert_eq!(entries, vec!["CAT", "DOG", "BIRD"]);
    }

    #[test]
    fn test_transcript_json_list() {
        let entries = Transcript::parse(r#"["ANT", "BEE"]"#).into_entries();
        assert_eq!(entries, vec!["ANT", "BEE"]);
    }

    #[test]
    fn test_score_update_forms() {
        let bare = ScoreUpdate::parse(" 7 ").unwrap();
        assert_approx_eq!(bare.score, 7.0);
        assert!(bare.word.is_none());

        let paired = ScoreUpdate::parse(r#"[16, "BINGOS"]"#).unwrap();
        assert_approx_eq!(paired.score, 16.0);
        assert_eq!(paired.word.as_deref(), Some("BINGOS"));

        assert!(ScoreUpdate::parse("lots").is_none());
    }

    #[test]
    fn test_non_finite_and_negative_scores_are_rejected() {
        assert_eq!(parse_score("12"), Some(12.0));
        assert_eq!(parse_score("NaN"), None);
        assert_eq!(parse_score("inf"), None);
        assert_eq!(parse_score("-3"), None);

        assert!(ScoreUpdate::parse("NaN").is_none());
        assert!(ScoreUpdate::parse("-infinity").is_none());
        assert!(ScoreUpdate::parse(r#"[-4, "CAT"]"#).is_none());
    }

    #[test]
    fn test_score_policies() {
        assert_approx_eq!(ScorePolicy::HalfScore.relief(3.0), 1.5);
        assert_approx_eq!(ScorePolicy::FullScore.relief(3.0), 3.0);
        assert_approx_eq!(ScorePolicy::FixedPerGuess(2.0).relief(9.0), 2.0);
    }

    #[test]
    fn test_reset_trigger() {
        assert!(ResetTrigger::FullRack.fires(6, MAX_LETTERS));
        assert!(!ResetTrigger::FullRack.fires(5, MAX_LETTERS));
        assert!(!ResetTrigger::Never.fires(6, MAX_LETTERS));
    }

    #[test]
    fn test_partial_tuning_file() {
        let tuning = Tuning::from_json(
            r#"{"fatal_limit": 90.0, "score_policy": {"kind": "fixed_per_guess", "amount": 2.5}}"#,
        )
        .unwrap();
        assert_approx_eq!(tuning.fatal_limit, 90.0);
        assert_eq!(tuning.score_policy, ScorePolicy::FixedPerGuess(2.5));
        assert_approx_eq!(tuning.initial_fall_rate, INITIAL_FALL_RATE);
        assert_eq!(tuning.max_letters, MAX_LETTERS);
    }

    #[test]
    fn test_default_tuning_is_valid() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn test_tuning_validation_rejects_bad_values() {
        let negative_rate =
            Tuning::from_json(r#"{"initial_fall_rate": -0.5, "acceleration": 0.5}"#).unwrap();
        assert!(negative_rate.validate().is_err());

        let bad = [
            Tuning {
                initial_fall_duration: 0.0,
                ..Tuning::default()
            },
            Tuning {
                acceleration: 1.0,
                ..Tuning::default()
            },
            Tuning {
                deceleration: 1.0,
                ..Tuning::default()
            },
            Tuning {
                deceleration: 0.0,
                ..Tuning::default()
            },
            Tuning {
                max_letters: 0,
                ..Tuning::default()
            },
            Tuning {
                fatal_limit: f64::INFINITY,
                ..Tuning::default()
            },
            Tuning {
                score_policy: ScorePolicy::FixedPerGuess(f64::NAN),
                ..Tuning::default()
            },
        ];
        for tuning in bad {
            assert!(tuning.validate().is_err(), "accepted {:?}", tuning);
        }
    }

    #[test]
    fn test_unit_policy_serialization() {
        let tuning = Tuning::from_json(r#"{"score_policy": {"kind": "full_score"}, "score_feed": "push"}"#)
            .unwrap();
        assert_eq!(tuning.score_policy, ScorePolicy::FullScore);
        assert_eq!(tuning.score_feed, ScoreFeed::Push);
    }
}
