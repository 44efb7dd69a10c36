use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::error::{BracketError, Result};
use crate::types::{
  GenerateOptions, Match, MatchKind, Participant, SeparationMode, SlotSource, MIN_PARTICIPANTS,
};

/// Round-1 draw plus how well affiliation separation held up.
#[derive(Clone, Debug)]
pub struct Pairing {
  pub matches: Vec<Match>,
  /// Pairs whose two sides share a known affiliation.
  pub same_affiliation_pairs: usize,
  /// Lowest collision count any pairing of these participants can reach.
  pub minimum_possible: usize,
  /// Separation was requested but could not be fully honored.
  pub degraded: bool,
}

/// Flat round-1 match list: regular pairs, then the bye match and the
/// round-2 additional match when the count is odd.
pub fn generate_round1(
  participants: &[Participant],
  options: &GenerateOptions,
) -> Result<Vec<Match>> {
  plan_round1(participants, options).map(|pairing| pairing.matches)
}

pub fn plan_round1(participants: &[Participant], options: &GenerateOptions) -> Result<Pairing> {
  if participants.len() < MIN_PARTICIPANTS {
    return Err(BracketError::InsufficientParticipants {
      found: participants.len(),
    });
  }

  let mut order = participants.to_vec();
  if options.shuffle {
    shuffle_order(&mut order, options.seed);
  }
  let bye = if order.len() % 2 == 1 { order.pop() } else { None };

  let pairs = if options.separation.enabled {
    match options.separation.mode {
      SeparationMode::Strict => strict_pairs(&order),
      SeparationMode::Balanced => balanced_pairs(&order),
    }
  } else {
    sequential_pairs(order.len())
  };
  let same_affiliation_pairs = count_collisions(&order, &pairs);
  let minimum_possible = minimum_collisions(&order);
  let degraded = options.separation.enabled && same_affiliation_pairs > 0;
  if degraded {
    warn!(
      same_affiliation_pairs,
      participants = participants.len(),
      "affiliation separation degraded; bracket built best-effort"
    );
  }

  let mut matches = Vec::with_capacity(pairs.len() + 2);
  let mut next_id = 1u64;
  for (a, b) in pairs {
    matches.push(Match::seeded(next_id, order[a].clone(), order[b].clone()));
    next_id += 1;
  }

  if let Some(bye) = bye {
    let last_normal_id = match matches.last_mut() {
      Some(last) => {
        last.last_normal_fight = true;
        last.id
      }
      None => {
        return Err(BracketError::InsufficientParticipants {
          found: participants.len(),
        })
      }
    };
    let bye_id = next_id;
    debug!(participant = bye.id, match_id = bye_id, "bye assigned");
    matches.push(Match::bye(bye_id, bye));

    let mut additional = Match::new(bye_id + 1, 2, MatchKind::Additional);
    additional.source_a = SlotSource::WinnerOf(last_normal_id);
    additional.source_b = SlotSource::WinnerOf(bye_id);
    matches.push(additional);
  }

  debug!(
    matches = matches.len(),
    shuffle = options.shuffle,
    separation = options.separation.enabled,
    "round 1 generated"
  );
  Ok(Pairing {
    matches,
    same_affiliation_pairs,
    minimum_possible,
    degraded,
  })
}

fn shuffle_order(order: &mut [Participant], seed: Option<u64>) {
  match seed {
    Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
    None => order.shuffle(&mut rand::rng()),
  }
}

fn sequential_pairs(len: usize) -> Vec<(usize, usize)> {
  (0..len / 2).map(|i| (i * 2, i * 2 + 1)).collect()
}

fn collides(order: &[Participant], a: usize, b: usize) -> bool {
  order[a].shares_affiliation(&order[b])
}

fn count_collisions(order: &[Participant], pairs: &[(usize, usize)]) -> usize {
  pairs.iter().filter(|(a, b)| collides(order, *a, *b)).count()
}

/// Seed positions grouped by affiliation, groups in first-appearance order.
/// An unknown affiliation is a group of its own.
fn affiliation_groups(order: &[Participant]) -> Vec<VecDeque<usize>> {
  let mut groups: Vec<VecDeque<usize>> = Vec::new();
  let mut by_name: HashMap<&str, usize> = HashMap::new();
  for (idx, participant) in order.iter().enumerate() {
    if participant.affiliation.is_empty() {
      groups.push(VecDeque::from([idx]));
      continue;
    }
    let group = *by_name.entry(participant.affiliation.as_str()).or_insert_with(|| {
      groups.push(VecDeque::new());
      groups.len() - 1
    });
    groups[group].push_back(idx);
  }
  groups
}

fn minimum_collisions(order: &[Participant]) -> usize {
  let largest = affiliation_groups(order)
    .iter()
    .map(|group| group.len())
    .max()
    .unwrap_or(0);
  largest.saturating_sub(order.len() / 2)
}

/// Largest group first: its earliest member meets the earliest member of
/// any other group. Only the surplus of a majority group is paired inside
/// the group, which is the minimum possible.
fn strict_pairs(order: &[Participant]) -> Vec<(usize, usize)> {
  let mut groups = affiliation_groups(order);
  let mut pairs = Vec::with_capacity(order.len() / 2);

  loop {
    let Some(largest) = groups
      .iter()
      .enumerate()
      .filter(|(_, group)| !group.is_empty())
      .max_by(|(_, a), (_, b)| a.len().cmp(&b.len()).then_with(|| b[0].cmp(&a[0])))
      .map(|(idx, _)| idx)
    else {
      break;
    };
    let Some(first) = groups[largest].pop_front() else {
      break;
    };
    let partner_group = groups
      .iter()
      .enumerate()
      .filter(|(idx, group)| *idx != largest && !group.is_empty())
      .min_by_key(|(_, group)| group[0])
      .map(|(idx, _)| idx)
      .unwrap_or(largest);
    let Some(second) = groups[partner_group].pop_front() else {
      break;
    };
    pairs.push((first.min(second), first.max(second)));
  }

  pairs.sort_by_key(|(a, _)| *a);
  pairs
}

/// Seed-order pairs with colliding partners swapped into other pairs;
/// falls back to `strict_pairs` when swaps cannot reach the minimum.
fn balanced_pairs(order: &[Participant]) -> Vec<(usize, usize)> {
  let mut pairs = sequential_pairs(order.len());

  for i in 0..pairs.len() {
    if !collides(order, pairs[i].0, pairs[i].1) {
      continue;
    }
    for j in (0..pairs.len()).filter(|j| *j != i) {
      let (a, b) = pairs[i];
      let (c, d) = pairs[j];
      if !collides(order, a, d) && !collides(order, c, b) {
        pairs[i] = (a, d);
        pairs[j] = (c, b);
        break;
      }
      if !collides(order, a, c) && !collides(order, b, d) {
        pairs[i] = (a, c);
        pairs[j] = (b, d);
        break;
      }
    }
  }

  if count_collisions(order, &pairs) > minimum_collisions(order) {
    debug!("balanced separation fell back to strict pairing");
    return strict_pairs(order);
  }
  pairs
}
