use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::bracket::build_bracket;
use crate::layout::bracket_view;
use crate::leaderboard::{derive_leaderboard, medal_tally};
use crate::registry::normalize;
use crate::results::MatchResultStore;
use crate::types::*;

// ── Helpers ─────────────────────────────────────────────────────────────

pub fn init_registry(config: EngineConfig) -> SharedBracketRegistry {
    Arc::new(Mutex::new(BracketRegistry::with_config(config)))
}

/// Lock the registry, then call `f` with it. The lock is the per-registry
/// writer serialization the engine itself does not provide.
fn with_registry<F, R>(registry: &SharedBracketRegistry, f: F) -> Result<R, String>
where
    F: FnOnce(&mut BracketRegistry) -> Result<R, String>,
{
    let mut guard = registry.lock().map_err(|e| e.to_string())?;
    f(&mut guard)
}

/// Lock the registry, look up one class, then call `f` with
/// `(&mut ClassBracket, &EngineConfig)`.
fn with_class<F, R>(registry: &SharedBracketRegistry, key: BracketKey, f: F) -> Result<R, String>
where
    F: FnOnce(&mut ClassBracket, &EngineConfig) -> Result<R, String>,
{
    with_registry(registry, |guard| {
        let BracketRegistry { brackets, config } = guard;
        let class = brackets.get_mut(&key).ok_or_else(|| {
            format!(
                "No bracket for class {} of competition {}.",
                key.class_id, key.competition_id
            )
        })?;
        f(class, config)
    })
}

fn view_of(class: &ClassBracket, config: &EngineConfig) -> BracketView {
    bracket_view(
        class.context.key(),
        class.store.bracket(),
        config.column_size,
        class.degraded_separation,
    )
}

// ── Commands ────────────────────────────────────────────────────────────

/// Generate the bracket of a class from its registrations
pub fn generate_bracket(
    request: GenerateRequest,
    registry: &SharedBracketRegistry,
) -> Result<BracketView, String> {
    with_registry(registry, |guard| {
        let key = request.context.key();
        if guard.brackets.get(&key).is_some_and(|class| !class.store.is_empty()) {
            return Err(
                "Bracket already generated for this class; shuffle or delete it first.".to_string(),
            );
        }
        let participants = normalize(&request.records);
        let options = request
            .options
            .unwrap_or_else(|| guard.config.generate_options(false));
        let mode = request.context.mode_or(guard.config.default_mode);
        let built =
            build_bracket(mode, &participants, &options).map_err(|e| e.to_string())?;
        if built.degraded_separation {
            warn!(
                competition = key.competition_id,
                class = key.class_id,
                same_affiliation_pairs = built.same_affiliation_pairs,
                "bracket generated with degraded separation"
            );
        }
        let class = ClassBracket {
            context: CompetitionContext {
                mode: Some(mode),
                ..request.context
            },
            participants,
            store: MatchResultStore::new(built.bracket),
            degraded_separation: built.degraded_separation,
        };
        let view = view_of(&class, &guard.config);
        guard.brackets.insert(key, class);
        info!(competition = key.competition_id, class = key.class_id, "bracket generated");
        Ok(view)
    })
}

/// Re-draw a class. Destroys every match and score, so the caller must
/// pass `confirmed = true`.
pub fn shuffle_bracket(
    key: BracketKey,
    confirmed: bool,
    registry: &SharedBracketRegistry,
) -> Result<BracketView, String> {
    if !confirmed {
        return Err(
            "Shuffling discards every match and score of this class; confirm to continue."
                .to_string(),
        );
    }
    with_class(registry, key, |class, config| {
        let options = config.generate_options(true);
        let mode = class.context.mode_or(config.default_mode);
        let built =
            build_bracket(mode, &class.participants, &options).map_err(|e| e.to_string())?;
        class.store.replace(built.bracket);
        class.degraded_separation = built.degraded_separation;
        info!(competition = key.competition_id, class = key.class_id, "bracket shuffled");
        Ok(view_of(class, config))
    })
}

/// Record a score (with optional queue/field/date) for one match
pub fn record_score(
    key: BracketKey,
    command: ScoreCommand,
    registry: &SharedBracketRegistry,
) -> Result<BracketView, String> {
    with_class(registry, key, |class, config| {
        class.store.apply(&command).map_err(|e| e.to_string())?;
        Ok(view_of(class, config))
    })
}

/// Same as `record_score`, from raw form JSON
pub fn record_score_json(
    key: BracketKey,
    payload: &Value,
    registry: &SharedBracketRegistry,
) -> Result<BracketView, String> {
    let command = ScoreCommand::from_json(payload).map_err(|e| e.to_string())?;
    record_score(key, command, registry)
}

/// Zero every score of a class, keeping the draw
pub fn clear_results(
    key: BracketKey,
    registry: &SharedBracketRegistry,
) -> Result<BracketView, String> {
    with_class(registry, key, |class, config| {
        class.store.clear_results();
        Ok(view_of(class, config))
    })
}

/// Delete every match of a class; it can be generated again afterwards
pub fn delete_bracket(key: BracketKey, registry: &SharedBracketRegistry) -> Result<(), String> {
    with_class(registry, key, |class, _| {
        class.store.delete_all();
        class.degraded_separation = false;
        Ok(())
    })
}

pub fn get_bracket(
    key: BracketKey,
    registry: &SharedBracketRegistry,
) -> Result<BracketView, String> {
    with_class(registry, key, |class, config| Ok(view_of(class, config)))
}

pub fn get_leaderboard(
    key: BracketKey,
    registry: &SharedBracketRegistry,
) -> Result<Leaderboard, String> {
    with_class(registry, key, |class, _| Ok(derive_leaderboard(class.store.bracket())))
}

/// Medal tally per affiliation over every class of a competition
pub fn get_medal_tally(
    competition_id: u64,
    registry: &SharedBracketRegistry,
) -> Result<Vec<MedalTally>, String> {
    with_registry(registry, |guard| {
        let mut classes = guard
            .brackets
            .iter()
            .filter(|(key, _)| key.competition_id == competition_id)
            .collect::<Vec<_>>();
        classes.sort_by_key(|(key, _)| **key);
        let boards = classes
            .into_iter()
            .map(|(_, class)| derive_leaderboard(class.store.bracket()))
            .collect::<Vec<_>>();
        Ok(medal_tally(&boards))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RawAthlete, RawDojang, RegistrationRecord, RegistrationStatus};
    use serde_json::json;

    fn records(names: &[(&str, &str)]) -> Vec<RegistrationRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, (name, dojang))| RegistrationRecord {
                id: Some(i as u64 + 1),
                status: RegistrationStatus::Approved,
                athlete: Some(RawAthlete {
                    id: None,
                    name: Some(name.to_string()),
                    dojang: Some(RawDojang { name: Some(dojang.to_string()) }),
                }),
                team_members: None,
            })
            .collect()
    }

    fn context(class_id: u64, mode: CompetitionMode) -> CompetitionContext {
        CompetitionContext {
            competition_id: 1,
            class_id,
            mode: Some(mode),
        }
    }

    fn registry() -> SharedBracketRegistry {
        init_registry(EngineConfig {
            shuffle_seed: Some(7),
            ..Default::default()
        })
    }

    fn generate(registry: &SharedBracketRegistry, ctx: CompetitionContext, names: &[(&str, &str)]) -> BracketView {
        generate_bracket(
            GenerateRequest {
                context: ctx,
                records: records(names),
                options: None,
            },
            registry,
        )
        .unwrap()
    }

    fn score(a: i64, b: i64, match_id: u64) -> ScoreCommand {
        ScoreCommand {
            match_id,
            score_a: a,
            score_b: b,
            queue_number: None,
            field_number: None,
            date: None,
        }
    }

    #[test]
    fn test_generate_then_score_then_leaderboard() {
        let registry = registry();
        let ctx = context(10, CompetitionMode::Pemula);
        let view = generate(&registry, ctx, &[("andi", "Garuda"), ("budi", "Elang")]);
        assert_eq!(view.rounds.len(), 1);
        assert_eq!(view.columns, vec![vec![1]]);

        record_score(ctx.key(), score(6, 2, 1), &registry).unwrap();

        let board = get_leaderboard(ctx.key(), &registry).unwrap();
        assert_eq!(board.gold[0].name, "ANDI");
        assert_eq!(board.silver[0].name, "BUDI");
    }

    #[test]
    fn test_second_generate_is_refused() {
        let registry = registry();
        let ctx = context(10, CompetitionMode::Pemula);
        generate(&registry, ctx, &[("andi", ""), ("budi", "")]);
        let err = generate_bracket(
            GenerateRequest {
                context: ctx,
                records: records(&[("citra", ""), ("dewi", "")]),
                options: None,
            },
            &registry,
        )
        .unwrap_err();
        assert!(err.contains("already generated"));
    }

    #[test]
    fn test_too_few_participants_builds_nothing() {
        let registry = registry();
        let ctx = context(10, CompetitionMode::Pemula);
        let err = generate_bracket(
            GenerateRequest {
                context: ctx,
                records: records(&[("andi", "")]),
                options: None,
            },
            &registry,
        )
        .unwrap_err();
        assert!(err.contains("at least 2"));
        assert!(get_bracket(ctx.key(), &registry).is_err());
    }

    #[test]
    fn test_shuffle_requires_confirmation_and_discards_scores() {
        let registry = registry();
        let ctx = context(10, CompetitionMode::Pemula);
        generate(&registry, ctx, &[("a", ""), ("b", ""), ("c", ""), ("d", "")]);
        record_score(ctx.key(), score(3, 1, 1), &registry).unwrap();

        assert!(shuffle_bracket(ctx.key(), false, &registry).is_err());
        let still_scored = get_bracket(ctx.key(), &registry).unwrap();
        assert_eq!(still_scored.rounds[0].matches[0].score_a, 3);

        let view = shuffle_bracket(ctx.key(), true, &registry).unwrap();
        let matches = &view.rounds[0].matches;
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.score_a == 0 && m.score_b == 0));
    }

    #[test]
    fn test_seeded_shuffle_is_repeatable() {
        let names = [("a", ""), ("b", ""), ("c", ""), ("d", ""), ("e", ""), ("f", "")];
        let ctx = context(10, CompetitionMode::Pemula);

        let first = registry();
        generate(&first, ctx, &names);
        let one = shuffle_bracket(ctx.key(), true, &first).unwrap();

        let second = registry();
        generate(&second, ctx, &names);
        let two = shuffle_bracket(ctx.key(), true, &second).unwrap();

        assert_eq!(one.rounds[0].matches, two.rounds[0].matches);
    }

    #[test]
    fn test_record_score_json_rejects_bad_input() {
        let registry = registry();
        let ctx = context(10, CompetitionMode::Pemula);
        generate(&registry, ctx, &[("a", ""), ("b", "")]);

        let err = record_score_json(ctx.key(), &json!({"matchId": 1, "scoreA": -1, "scoreB": 0}), &registry)
            .unwrap_err();
        assert!(err.contains("invalid score"));
        let err = record_score_json(ctx.key(), &json!({"matchId": 5, "scoreA": 1, "scoreB": 0}), &registry)
            .unwrap_err();
        assert!(err.contains("not found"));

        let view = record_score_json(
            ctx.key(),
            &json!({"matchId": 1, "scoreA": "4", "scoreB": "9", "fieldNumber": 2}),
            &registry,
        )
        .unwrap();
        let m = &view.rounds[0].matches[0];
        assert_eq!((m.score_a, m.score_b, m.field_number), (4, 9, Some(2)));
    }

    #[test]
    fn test_delete_then_generate_again() {
        let registry = registry();
        let ctx = context(10, CompetitionMode::Prestasi);
        generate(&registry, ctx, &[("a", ""), ("b", ""), ("c", "")]);
        delete_bracket(ctx.key(), &registry).unwrap();
        assert!(get_bracket(ctx.key(), &registry).unwrap().rounds.is_empty());

        let view = generate(&registry, ctx, &[("a", ""), ("b", ""), ("c", ""), ("d", "")]);
        let labels = view.rounds.iter().map(|r| r.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Semifinal", "Final"]);
    }

    #[test]
    fn test_clear_results_keeps_draw() {
        let registry = registry();
        let ctx = context(10, CompetitionMode::Pemula);
        generate(&registry, ctx, &[("a", ""), ("b", "")]);
        record_score(ctx.key(), score(5, 0, 1), &registry).unwrap();

        let view = clear_results(ctx.key(), &registry).unwrap();

        let m = &view.rounds[0].matches[0];
        assert_eq!((m.score_a, m.score_b), (0, 0));
        assert!(m.has_both_participants());
        assert!(get_leaderboard(ctx.key(), &registry).unwrap().is_empty());
    }

    #[test]
    fn test_context_without_mode_uses_config_default() {
        let registry = init_registry(EngineConfig {
            default_mode: CompetitionMode::Prestasi,
            ..Default::default()
        });
        let ctx = CompetitionContext {
            competition_id: 1,
            class_id: 3,
            mode: None,
        };
        let names = [("a", ""), ("b", ""), ("c", ""), ("d", "")];

        let view = generate(&registry, ctx, &names);
        assert_eq!(view.mode, CompetitionMode::Prestasi);
        assert_eq!(view.rounds.last().map(|r| r.label.as_str()), Some("Final"));

        // An explicit mode still wins over the default.
        let pemula = generate(&registry, context(4, CompetitionMode::Pemula), &names);
        assert_eq!(pemula.mode, CompetitionMode::Pemula);

        // The resolved mode sticks to the class even if the default changes.
        registry.lock().unwrap().config.default_mode = CompetitionMode::Pemula;
        let shuffled = shuffle_bracket(ctx.key(), true, &registry).unwrap();
        assert_eq!(shuffled.mode, CompetitionMode::Prestasi);
    }

    #[test]
    fn test_context_mode_is_optional_in_json() {
        let request: GenerateRequest = serde_json::from_value(json!({
            "context": {"competitionId": 1, "classId": 2},
            "records": []
        }))
        .unwrap();
        assert_eq!(request.context.mode, None);
        assert_eq!(request.context.mode_or(CompetitionMode::Prestasi), CompetitionMode::Prestasi);
    }

    #[test]
    fn test_medal_tally_spans_classes() {
        let registry = registry();
        let junior = context(1, CompetitionMode::Pemula);
        let senior = context(2, CompetitionMode::Pemula);
        generate(&registry, junior, &[("a", "Garuda"), ("b", "Elang")]);
        generate(&registry, senior, &[("c", "Garuda"), ("d", "Elang")]);
        record_score(junior.key(), score(5, 1, 1), &registry).unwrap();
        record_score(senior.key(), score(6, 2, 1), &registry).unwrap();

        let tally = get_medal_tally(1, &registry).unwrap();

        assert_eq!(tally[0].affiliation, "Garuda");
        assert_eq!(tally[0].gold, 2);
        assert_eq!(tally[1].silver, 2);
        assert!(get_medal_tally(99, &registry).unwrap().is_empty());
    }
}
