use crate::types::{BracketKey, BracketSet, BracketView, CompetitionMode, Match, RoundView};

/// Display name of a round. PEMULA brackets only have round 1 and the
/// additional match, so depth labels apply to PRESTASI.
pub fn round_label(mode: CompetitionMode, round: u32, total_rounds: u32) -> String {
  if mode == CompetitionMode::Pemula {
    return if round >= 2 {
      "Additional Match".to_string()
    } else {
      "Round 1".to_string()
    };
  }
  match total_rounds.saturating_sub(round) {
    0 => "Final".to_string(),
    1 => "Semifinal".to_string(),
    2 => "Quarterfinal".to_string(),
    _ => format!("Round {round}"),
  }
}

/// Splits round-1 match ids into `ceil(len / column_size)` columns whose
/// sizes differ by at most one, earlier columns taking the extra match.
pub fn balance_columns(matches: &[Match], column_size: usize) -> Vec<Vec<u64>> {
  let ids = matches
    .iter()
    .filter(|m| m.round == 1)
    .map(|m| m.id)
    .collect::<Vec<_>>();
  if ids.is_empty() {
    return Vec::new();
  }
  let column_size = column_size.max(1);
  let columns = ids.len().div_ceil(column_size);
  let base = ids.len() / columns;
  let extra = ids.len() % columns;

  let mut out = Vec::with_capacity(columns);
  let mut start = 0;
  for col in 0..columns {
    let len = base + usize::from(col < extra);
    out.push(ids[start..start + len].to_vec());
    start += len;
  }
  out
}

pub fn bracket_view(
  key: BracketKey,
  bracket: &BracketSet,
  column_size: usize,
  degraded_separation: bool,
) -> BracketView {
  let total = bracket.total_rounds();
  let rounds = bracket
    .rounds()
    .into_iter()
    .map(|matches| {
      let round = matches.first().map(|m| m.round).unwrap_or(1);
      RoundView {
        round,
        label: round_label(bracket.mode, round, total),
        matches: matches.into_iter().cloned().collect(),
      }
    })
    .collect();
  BracketView {
    key,
    mode: bracket.mode,
    rounds,
    columns: balance_columns(&bracket.matches, column_size),
    degraded_separation,
  }
}
