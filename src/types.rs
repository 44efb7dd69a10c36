use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::registry::RegistrationRecord;
use crate::results::MatchResultStore;

// ── Constants ──────────────────────────────────────────────────────────

pub const MIN_PARTICIPANTS: usize = 2;
pub const DEFAULT_COLUMN_SIZE: usize = 5;
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const MAX_SCORE: i64 = 999;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedBracketRegistry = Arc<Mutex<BracketRegistry>>;

// ── Competition modes & generation options ─────────────────────────────

/// Medal rule set of a competition class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetitionMode {
    /// Beginner tier: everybody who plays gets gold or silver.
    #[default]
    Pemula,
    /// Advanced tier: final plus semifinal podium.
    Prestasi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeparationMode {
    Strict,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeparationOptions {
    pub enabled: bool,
    pub mode: SeparationMode,
}

impl SeparationOptions {
    pub fn strict() -> Self {
        SeparationOptions { enabled: true, mode: SeparationMode::Strict }
    }

    pub fn balanced() -> Self {
        SeparationOptions { enabled: true, mode: SeparationMode::Balanced }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateOptions {
    pub shuffle: bool,
    pub separation: SeparationOptions,
    /// Fixed shuffle seed; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

// ── Participants ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Athlete {
    pub name: String,
    pub affiliation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Competitor {
    Individual { athlete: Athlete },
    Team { members: Vec<Athlete> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: u64,
    pub competitor: Competitor,
    pub display_name: String,
    /// Club (dojang) name, empty when unknown.
    pub affiliation: String,
}

impl Participant {
    pub fn individual(id: u64, name: &str, affiliation: &str) -> Self {
        let athlete = Athlete {
            name: name.trim().to_uppercase(),
            affiliation: affiliation.trim().to_string(),
        };
        Participant {
            id,
            display_name: athlete.name.clone(),
            affiliation: athlete.affiliation.clone(),
            competitor: Competitor::Individual { athlete },
        }
    }

    /// Builds a team entry; `None` when no member has a usable name.
    pub fn team(id: u64, members: Vec<Athlete>) -> Option<Self> {
        let members = members
            .into_iter()
            .filter(|m| !m.name.trim().is_empty())
            .map(|m| Athlete {
                name: m.name.trim().to_uppercase(),
                affiliation: m.affiliation.trim().to_string(),
            })
            .collect::<Vec<_>>();
        let first = members.first()?;
        let affiliation = first.affiliation.clone();
        let display_name = members
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Some(Participant {
            id,
            competitor: Competitor::Team { members },
            display_name,
            affiliation,
        })
    }

    pub fn is_team(&self) -> bool {
        matches!(self.competitor, Competitor::Team { .. })
    }

    /// Two participants collide when they share a known affiliation.
    pub fn shares_affiliation(&self, other: &Participant) -> bool {
        !self.affiliation.is_empty() && self.affiliation == other.affiliation
    }
}

// ── Matches ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    #[default]
    Regular,
    /// Only slot A is fed; the occupant advances without playing.
    Bye,
    /// PEMULA extra match: last normal fight winner vs. the bye recipient.
    Additional,
}

/// Where a slot's participant comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "matchId", rename_all = "camelCase")]
pub enum SlotSource {
    /// Assigned at generation time.
    #[default]
    Seeded,
    WinnerOf(u64),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: u64,
    pub round: u32,
    pub participant_a: Option<Participant>,
    pub participant_b: Option<Participant>,
    #[serde(default)]
    pub score_a: u32,
    #[serde(default)]
    pub score_b: u32,
    #[serde(default)]
    pub kind: MatchKind,
    #[serde(default)]
    pub last_normal_fight: bool,
    #[serde(default)]
    pub source_a: SlotSource,
    #[serde(default)]
    pub source_b: SlotSource,
    #[serde(default)]
    pub queue_number: Option<u32>,
    #[serde(default)]
    pub field_number: Option<u32>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl Match {
    pub fn new(id: u64, round: u32, kind: MatchKind) -> Self {
        Match {
            id,
            round,
            participant_a: None,
            participant_b: None,
            score_a: 0,
            score_b: 0,
            kind,
            last_normal_fight: false,
            source_a: SlotSource::Empty,
            source_b: SlotSource::Empty,
            queue_number: None,
            field_number: None,
            date: None,
        }
    }

    pub fn seeded(id: u64, a: Participant, b: Participant) -> Self {
        let mut m = Match::new(id, 1, MatchKind::Regular);
        m.participant_a = Some(a);
        m.participant_b = Some(b);
        m.source_a = SlotSource::Seeded;
        m.source_b = SlotSource::Seeded;
        m
    }

    pub fn bye(id: u64, a: Participant) -> Self {
        let mut m = Match::new(id, 1, MatchKind::Bye);
        m.participant_a = Some(a);
        m.source_a = SlotSource::Seeded;
        m
    }

    pub fn is_bye(&self) -> bool {
        self.kind == MatchKind::Bye
    }

    pub fn is_additional(&self) -> bool {
        self.kind == MatchKind::Additional
    }

    /// A tie (0-0 included) is never a decision.
    pub fn is_decided(&self) -> bool {
        self.score_a != self.score_b && (self.score_a > 0 || self.score_b > 0)
    }

    pub fn winner(&self) -> Option<&Participant> {
        if !self.is_decided() {
            return None;
        }
        if self.score_a > self.score_b {
            self.participant_a.as_ref()
        } else {
            self.participant_b.as_ref()
        }
    }

    pub fn loser(&self) -> Option<&Participant> {
        if !self.is_decided() {
            return None;
        }
        if self.score_a > self.score_b {
            self.participant_b.as_ref()
        } else {
            self.participant_a.as_ref()
        }
    }

    pub fn has_both_participants(&self) -> bool {
        self.participant_a.is_some() && self.participant_b.is_some()
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participant_a.iter().chain(self.participant_b.iter())
    }

    pub fn reset_scores(&mut self) {
        self.score_a = 0;
        self.score_b = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSet {
    pub mode: CompetitionMode,
    pub matches: Vec<Match>,
}

impl BracketSet {
    pub fn new(mode: CompetitionMode, matches: Vec<Match>) -> Self {
        BracketSet { mode, matches }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn total_rounds(&self) -> u32 {
        self.matches.iter().map(|m| m.round).max().unwrap_or(0)
    }

    pub fn round(&self, round: u32) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(move |m| m.round == round)
    }

    /// Matches grouped by round, in round order then match order.
    pub fn rounds(&self) -> Vec<Vec<&Match>> {
        (1..=self.total_rounds())
            .map(|round| self.round(round).collect::<Vec<_>>())
            .filter(|round| !round.is_empty())
            .collect()
    }

    pub fn get(&self, match_id: u64) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    pub fn additional_match(&self) -> Option<&Match> {
        self.matches.iter().find(|m| m.is_additional())
    }

    pub fn last_normal_fight(&self) -> Option<&Match> {
        self.matches.iter().find(|m| m.last_normal_fight)
    }
}

// ── Leaderboard ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedalEntry {
    pub participant_id: u64,
    pub name: String,
    pub affiliation: String,
}

impl From<&Participant> for MedalEntry {
    fn from(p: &Participant) -> Self {
        MedalEntry {
            participant_id: p.id,
            name: p.display_name.clone(),
            affiliation: p.affiliation.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub gold: Vec<MedalEntry>,
    pub silver: Vec<MedalEntry>,
    pub bronze: Vec<MedalEntry>,
}

impl Leaderboard {
    pub fn contains(&self, participant_id: u64) -> bool {
        self.gold
            .iter()
            .chain(self.silver.iter())
            .chain(self.bronze.iter())
            .any(|e| e.participant_id == participant_id)
    }

    pub fn is_empty(&self) -> bool {
        self.gold.is_empty() && self.silver.is_empty() && self.bronze.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedalTally {
    pub affiliation: String,
    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,
}

impl MedalTally {
    pub fn total(&self) -> u32 {
        self.gold + self.silver + self.bronze
    }
}

// ── Competition context & host state ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketKey {
    pub competition_id: u64,
    pub class_id: u64,
}

/// Explicit per-call context: which class of which competition, under
/// which medal rules. Without a mode the engine config's `default_mode`
/// applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionContext {
    pub competition_id: u64,
    pub class_id: u64,
    #[serde(default)]
    pub mode: Option<CompetitionMode>,
}

impl CompetitionContext {
    pub fn key(&self) -> BracketKey {
        BracketKey {
            competition_id: self.competition_id,
            class_id: self.class_id,
        }
    }

    pub fn mode_or(&self, fallback: CompetitionMode) -> CompetitionMode {
        self.mode.unwrap_or(fallback)
    }
}

/// One generated class: the participants it was drawn from plus its
/// result store.
#[derive(Debug, Clone)]
pub struct ClassBracket {
    pub context: CompetitionContext,
    pub participants: Vec<Participant>,
    pub store: MatchResultStore,
    pub degraded_separation: bool,
}

#[derive(Debug, Default)]
pub struct BracketRegistry {
    pub brackets: HashMap<BracketKey, ClassBracket>,
    pub config: EngineConfig,
}

impl BracketRegistry {
    pub fn with_config(config: EngineConfig) -> Self {
        BracketRegistry {
            brackets: HashMap::new(),
            config,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub context: CompetitionContext,
    pub records: Vec<RegistrationRecord>,
    #[serde(default)]
    pub options: Option<GenerateOptions>,
}

/// Validated score submission from a score-entry form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCommand {
    pub match_id: u64,
    pub score_a: i64,
    pub score_b: i64,
    #[serde(default)]
    pub queue_number: Option<u32>,
    #[serde(default)]
    pub field_number: Option<u32>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// ── Presentation types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub round: u32,
    pub label: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketView {
    pub key: BracketKey,
    pub mode: CompetitionMode,
    pub rounds: Vec<RoundView>,
    /// Round-1 match ids grouped into display columns.
    pub columns: Vec<Vec<u64>>,
    pub degraded_separation: bool,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub default_mode: CompetitionMode,
    pub separation: SeparationOptions,
    pub shuffle_seed: Option<u64>,
    pub column_size: usize,
    pub log_filter: String,
    pub log_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_mode: CompetitionMode::Pemula,
            separation: SeparationOptions::default(),
            shuffle_seed: None,
            column_size: DEFAULT_COLUMN_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn generate_options(&self, shuffle: bool) -> GenerateOptions {
        GenerateOptions {
            shuffle,
            separation: self.separation,
            seed: self.shuffle_seed,
        }
    }
}
