use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pairing::plan_round1;
use crate::types::{
  BracketSet, CompetitionMode, GenerateOptions, Match, MatchKind, Participant, SlotSource,
};

#[derive(Clone, Debug)]
pub struct BuiltBracket {
  pub bracket: BracketSet,
  pub same_affiliation_pairs: usize,
  pub degraded_separation: bool,
}

/// Full bracket for a class: the round-1 draw plus, for PRESTASI, every
/// elimination round up to the final.
pub fn build_bracket(
  mode: CompetitionMode,
  participants: &[Participant],
  options: &GenerateOptions,
) -> Result<BuiltBracket> {
  let pairing = plan_round1(participants, options)?;
  let matches = match mode {
    CompetitionMode::Pemula => pairing.matches,
    CompetitionMode::Prestasi => elimination_rounds(pairing.matches),
  };
  let bracket = BracketSet::new(mode, matches);
  info!(
    ?mode,
    participants = participants.len(),
    matches = bracket.matches.len(),
    rounds = bracket.total_rounds(),
    "bracket built"
  );
  Ok(BuiltBracket {
    bracket,
    same_affiliation_pairs: pairing.same_affiliation_pairs,
    degraded_separation: pairing.degraded,
  })
}

/// Drops the PEMULA additional match and stacks halving rounds on top of
/// round 1. Feeding matches are paired in order; a match fed from one side
/// only is a bye. The previous round's bye always ends its round, and when
/// that round is odd it moves to the front so its occupant plays next
/// instead of taking a second bye.
fn elimination_rounds(round1: Vec<Match>) -> Vec<Match> {
  let mut matches = round1
    .into_iter()
    .filter(|m| !m.is_additional())
    .map(|mut m| {
      m.last_normal_fight = false;
      m
    })
    .collect::<Vec<_>>();
  let mut next_id = matches.iter().map(|m| m.id).max().unwrap_or(0) + 1;
  let mut previous = matches.iter().map(|m| m.id).collect::<Vec<_>>();
  let mut previous_ends_in_bye = matches.last().is_some_and(Match::is_bye);
  let mut round = 1u32;

  while previous.len() > 1 {
    round += 1;
    if previous_ends_in_bye && previous.len() % 2 == 1 {
      previous.rotate_right(1);
    }
    previous_ends_in_bye = previous.len() % 2 == 1;
    let mut ids = Vec::with_capacity(previous.len().div_ceil(2));
    for pair in previous.chunks(2) {
      let kind = if pair.len() == 2 { MatchKind::Regular } else { MatchKind::Bye };
      let mut m = Match::new(next_id, round, kind);
      m.source_a = SlotSource::WinnerOf(pair[0]);
      m.source_b = pair.get(1).copied().map(SlotSource::WinnerOf).unwrap_or(SlotSource::Empty);
      ids.push(next_id);
      matches.push(m);
      next_id += 1;
    }
    previous = ids;
  }
  matches
}

/// The participant a finished (or bye) match sends forward.
fn advancing(m: &Match) -> Option<&Participant> {
  if m.is_bye() {
    return m.participant_a.as_ref();
  }
  m.winner()
}

fn resolve_source(
  matches: &[Match],
  index: &HashMap<u64, usize>,
  current: Option<&Participant>,
  source: SlotSource,
) -> Option<Participant> {
  match source {
    SlotSource::Seeded => current.cloned(),
    SlotSource::Empty => None,
    SlotSource::WinnerOf(id) => index
      .get(&id)
      .and_then(|idx| matches.get(*idx))
      .and_then(advancing)
      .cloned(),
  }
}

fn same_occupant(a: Option<&Participant>, b: Option<&Participant>) -> bool {
  a.map(|p| p.id) == b.map(|p| p.id)
}

/// Recomputes every derived slot from its source. A slot whose occupant
/// changes under a recorded score gets that score wiped. Returns how many
/// matches changed.
pub fn resolve_slots(matches: &mut [Match]) -> usize {
  let index = matches
    .iter()
    .enumerate()
    .map(|(idx, m)| (m.id, idx))
    .collect::<HashMap<_, _>>();
  let mut changed_total = 0usize;
  let mut safety = 0;

  loop {
    safety += 1;
    if safety > 1000 {
      warn!("slot resolution did not settle");
      break;
    }
    let mut progressed = false;

    for idx in 0..matches.len() {
      let (mut next_a, mut next_b) = {
        let m = &matches[idx];
        (
          resolve_source(matches, &index, m.participant_a.as_ref(), m.source_a),
          resolve_source(matches, &index, m.participant_b.as_ref(), m.source_b),
        )
      };
      let m = &mut matches[idx];
      if m.is_additional() && (next_a.is_none() || next_b.is_none()) {
        next_a = None;
        next_b = None;
      }
      let unchanged = same_occupant(m.participant_a.as_ref(), next_a.as_ref())
        && same_occupant(m.participant_b.as_ref(), next_b.as_ref());
      if unchanged {
        continue;
      }

      if m.score_a > 0 || m.score_b > 0 {
        warn!(
          match_id = m.id,
          score_a = m.score_a,
          score_b = m.score_b,
          "occupants changed; clearing stale score"
        );
        m.reset_scores();
      }
      debug!(
        match_id = m.id,
        a = ?next_a.as_ref().map(|p| p.id),
        b = ?next_b.as_ref().map(|p| p.id),
        "slots resolved"
      );
      m.participant_a = next_a;
      m.participant_b = next_b;
      changed_total += 1;
      progressed = true;
    }

    if !progressed {
      break;
    }
  }
  changed_total
}
