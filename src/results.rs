use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::bracket::resolve_slots;
use crate::error::{BracketError, Result};
use crate::types::{BracketSet, Match, ScoreCommand, MAX_SCORE};

/// Scores of one class bracket. Winners are never stored; they are read
/// off the scores each time.
#[derive(Debug, Clone)]
pub struct MatchResultStore {
    bracket: BracketSet,
    index: HashMap<u64, usize>,
}

impl MatchResultStore {
    pub fn new(bracket: BracketSet) -> Self {
        let mut store = MatchResultStore {
            bracket,
            index: HashMap::new(),
        };
        store.reindex();
        resolve_slots(&mut store.bracket.matches);
        store
    }

    fn reindex(&mut self) {
        self.index = self
            .bracket
            .matches
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.id, idx))
            .collect();
    }

    pub fn bracket(&self) -> &BracketSet {
        &self.bracket
    }

    pub fn matches(&self) -> &[Match] {
        &self.bracket.matches
    }

    pub fn is_empty(&self) -> bool {
        self.bracket.is_empty()
    }

    pub fn get(&self, match_id: u64) -> Result<&Match> {
        self.index
            .get(&match_id)
            .and_then(|idx| self.bracket.matches.get(*idx))
            .ok_or(BracketError::NotFound { match_id })
    }

    /// Checks a score pair against match `match_id` without touching state.
    fn validate(&self, match_id: u64, score_a: i64, score_b: i64) -> Result<(usize, u32, u32)> {
        let idx = *self
            .index
            .get(&match_id)
            .ok_or(BracketError::NotFound { match_id })?;
        let a = validate_score("scoreA", score_a)?;
        let b = validate_score("scoreB", score_b)?;
        let m = &self.bracket.matches[idx];
        if (a > 0 || b > 0) && !m.has_both_participants() {
            return Err(BracketError::InvalidScore(format!(
                "match {match_id} does not have two participants yet"
            )));
        }
        Ok((idx, a, b))
    }

    pub fn set_score(&mut self, match_id: u64, score_a: i64, score_b: i64) -> Result<()> {
        let (idx, a, b) = self.validate(match_id, score_a, score_b)?;
        let m = &mut self.bracket.matches[idx];
        m.score_a = a;
        m.score_b = b;
        info!(match_id, score_a = a, score_b = b, "score recorded");
        resolve_slots(&mut self.bracket.matches);
        Ok(())
    }

    /// Applies a score form submission, scheduling fields included.
    pub fn apply(&mut self, command: &ScoreCommand) -> Result<()> {
        let (idx, _, _) = self.validate(command.match_id, command.score_a, command.score_b)?;
        {
            let m = &mut self.bracket.matches[idx];
            if command.queue_number.is_some() {
                m.queue_number = command.queue_number;
            }
            if command.field_number.is_some() {
                m.field_number = command.field_number;
            }
            if command.date.is_some() {
                m.date = command.date;
            }
        }
        self.set_score(command.match_id, command.score_a, command.score_b)
    }

    /// Zeroes every score. Seeded slots and the round structure stay; slots
    /// derived from results empty out again.
    pub fn clear_results(&mut self) {
        for m in self.bracket.matches.iter_mut() {
            m.reset_scores();
        }
        resolve_slots(&mut self.bracket.matches);
        info!(matches = self.bracket.matches.len(), "results cleared");
    }

    /// Drops every match. The bracket has to be generated again.
    pub fn delete_all(&mut self) {
        let removed = self.bracket.matches.len();
        self.bracket.matches.clear();
        self.index.clear();
        info!(removed, "bracket deleted");
    }

    /// Swaps in a freshly generated bracket, discarding all prior results.
    pub fn replace(&mut self, bracket: BracketSet) {
        debug!(matches = bracket.matches.len(), "bracket replaced");
        *self = MatchResultStore::new(bracket);
    }
}

fn validate_score(field: &str, value: i64) -> Result<u32> {
    if value < 0 {
        return Err(BracketError::InvalidScore(format!(
            "{field} must not be negative (got {value})"
        )));
    }
    if value > MAX_SCORE {
        return Err(BracketError::InvalidScore(format!(
            "{field} exceeds {MAX_SCORE} (got {value})"
        )));
    }
    Ok(value as u32)
}

fn integer_field(value: Option<&Value>, field: &str) -> Result<i64> {
    let Some(value) = value else {
        return Err(BracketError::InvalidScore(format!("{field} is missing")));
    };
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            BracketError::InvalidScore(format!("{field} must be an integer (got {n})"))
        }),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| BracketError::InvalidScore(format!("{field} is not a number: {s:?}"))),
        other => Err(BracketError::InvalidScore(format!("{field} is not a number: {other}"))),
    }
}

fn optional_u32(value: Option<&Value>, field: &str) -> Result<Option<u32>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => {
            let raw = match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            raw.and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| {
                    BracketError::InvalidInput(format!("{field} must be a non-negative integer"))
                })
        }
    }
}

impl ScoreCommand {
    /// Builds a command from loosely typed form JSON. Scores may arrive as
    /// numbers or numeric strings; anything else is rejected.
    pub fn from_json(value: &Value) -> Result<ScoreCommand> {
        let match_id = value
            .get("matchId")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                BracketError::InvalidInput("matchId must be a positive integer".to_string())
            })?;
        let score_a = integer_field(value.get("scoreA"), "scoreA")?;
        let score_b = integer_field(value.get("scoreB"), "scoreB")?;
        let queue_number = optional_u32(value.get("queueNumber"), "queueNumber")?;
        let field_number = optional_u32(value.get("fieldNumber"), "fieldNumber")?;
        let date = match value.get("date").and_then(Value::as_str).map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|e| BracketError::InvalidInput(format!("date {raw:?}: {e}")))?,
            ),
        };
        Ok(ScoreCommand {
            match_id,
            score_a,
            score_b,
            queue_number,
            field_number,
            date,
        })
    }
}
