use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::types::{
    BracketSet, CompetitionMode, Leaderboard, Match, MatchKind, MedalEntry, MedalTally, Participant,
};

/// Placement bookkeeping: a participant is placed at most once.
#[derive(Default)]
struct Podium {
    board: Leaderboard,
    placed: HashSet<u64>,
}

impl Podium {
    fn gold(&mut self, p: &Participant) {
        if self.placed.insert(p.id) {
            self.board.gold.push(MedalEntry::from(p));
        }
    }

    fn silver(&mut self, p: &Participant) {
        if self.placed.insert(p.id) {
            self.board.silver.push(MedalEntry::from(p));
        }
    }

    fn bronze(&mut self, p: &Participant) {
        if self.placed.insert(p.id) {
            self.board.bronze.push(MedalEntry::from(p));
        }
    }
}

pub fn derive_leaderboard(bracket: &BracketSet) -> Leaderboard {
    let board = match bracket.mode {
        CompetitionMode::Pemula => pemula(&bracket.matches),
        CompetitionMode::Prestasi => prestasi(&bracket.matches),
    };
    debug!(
        mode = ?bracket.mode,
        gold = board.gold.len(),
        silver = board.silver.len(),
        bronze = board.bronze.len(),
        "leaderboard derived"
    );
    board
}

/// Everybody who played a decided match medals: winners gold, losers
/// silver. A decided additional match goes first, and the last normal
/// fight that fed it is not counted again.
pub fn pemula(matches: &[Match]) -> Leaderboard {
    let mut podium = Podium::default();

    let additional = matches.iter().find(|m| m.is_additional() && m.is_decided());
    if let Some(m) = additional {
        if let (Some(w), Some(l)) = (m.winner(), m.loser()) {
            podium.gold(w);
            podium.silver(l);
        }
    }

    for m in matches.iter().filter(|m| m.round == 1 && m.kind == MatchKind::Regular) {
        if additional.is_some() && m.last_normal_fight {
            continue;
        }
        if let (Some(w), Some(l)) = (m.winner(), m.loser()) {
            podium.gold(w);
            podium.silver(l);
        }
    }
    podium.board
}

/// Final decides gold and silver; semifinal losers take bronze, one per
/// affiliation (first in match order). Earlier rounds never medal.
pub fn prestasi(matches: &[Match]) -> Leaderboard {
    let mut podium = Podium::default();
    let total_rounds = matches.iter().map(|m| m.round).max().unwrap_or(0);
    if total_rounds == 0 {
        return podium.board;
    }

    if let Some(final_match) = matches.iter().find(|m| m.round == total_rounds) {
        if let (Some(w), Some(l)) = (final_match.winner(), final_match.loser()) {
            podium.gold(w);
            podium.silver(l);
        }
    }

    let mut bronze_affiliations: HashSet<&str> = HashSet::new();
    for semi in matches.iter().filter(|m| m.round + 1 == total_rounds) {
        let Some(loser) = semi.loser() else {
            continue;
        };
        let affiliation = loser.affiliation.as_str();
        if !affiliation.is_empty() && !bronze_affiliations.insert(affiliation) {
            debug!(participant = loser.id, affiliation, "bronze already awarded to affiliation");
            continue;
        }
        podium.bronze(loser);
    }
    podium.board
}

fn tally_entry<'m>(
    by_affiliation: &'m mut BTreeMap<String, MedalTally>,
    entry: &MedalEntry,
) -> Option<&'m mut MedalTally> {
    let affiliation = entry.affiliation.trim();
    if affiliation.is_empty() {
        return None;
    }
    Some(
        by_affiliation
            .entry(affiliation.to_string())
            .or_insert_with(|| MedalTally {
                affiliation: affiliation.to_string(),
                ..Default::default()
            }),
    )
}

/// Medal counts per affiliation across many class leaderboards, best
/// first. Entries without an affiliation are not tallied.
pub fn medal_tally<'a, I>(boards: I) -> Vec<MedalTally>
where
    I: IntoIterator<Item = &'a Leaderboard>,
{
    let mut by_affiliation: BTreeMap<String, MedalTally> = BTreeMap::new();
    for board in boards {
        for entry in &board.gold {
            if let Some(t) = tally_entry(&mut by_affiliation, entry) {
                t.gold += 1;
            }
        }
        for entry in &board.silver {
            if let Some(t) = tally_entry(&mut by_affiliation, entry) {
                t.silver += 1;
            }
        }
        for entry in &board.bronze {
            if let Some(t) = tally_entry(&mut by_affiliation, entry) {
                t.bronze += 1;
            }
        }
    }

    let mut out = by_affiliation.into_values().collect::<Vec<_>>();
    out.sort_by(|a, b| {
        b.gold
            .cmp(&a.gold)
            .then_with(|| b.silver.cmp(&a.silver))
            .then_with(|| b.bronze.cmp(&a.bronze))
            .then_with(|| a.affiliation.cmp(&b.affiliation))
    });
    out
}
