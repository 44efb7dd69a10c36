use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{BracketError, Result};
use crate::types::{Athlete, Participant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Approved,
    #[default]
    Pending,
    Rejected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDojang {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAthlete {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dojang: Option<RawDojang>,
}

impl RawAthlete {
    fn usable_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }

    fn affiliation(&self) -> String {
        self.dojang
            .as_ref()
            .and_then(|d| d.name.as_deref())
            .map(|name| name.trim().to_string())
            .unwrap_or_default()
    }
}

/// A registration row as fetched from the registration/approval system.
/// Either `athlete` (individual) or `team_members` (team) carries identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub status: RegistrationStatus,
    #[serde(default)]
    pub athlete: Option<RawAthlete>,
    #[serde(default)]
    pub team_members: Option<Vec<RawAthlete>>,
}

/// Resolve one record into a participant, ignoring its status.
pub fn resolve_record(record: &RegistrationRecord) -> Result<Participant> {
    let id = record
        .id
        .ok_or_else(|| BracketError::InvalidInput("registration record has no id".to_string()))?;

    if let Some(members) = record.team_members.as_ref().filter(|m| !m.is_empty()) {
        let athletes = members
            .iter()
            .filter_map(|m| {
                m.usable_name().map(|name| Athlete {
                    name: name.to_string(),
                    affiliation: m.affiliation(),
                })
            })
            .collect::<Vec<_>>();
        if let Some(team) = Participant::team(id, athletes) {
            return Ok(team);
        }
    }

    if let Some(athlete) = record.athlete.as_ref() {
        if let Some(name) = athlete.usable_name() {
            return Ok(Participant::individual(id, name, &athlete.affiliation()));
        }
    }

    Err(BracketError::InvalidInput(format!(
        "registration {id} has neither team members nor athlete data"
    )))
}

/// Approved records become participants, in input order. Records that
/// cannot be identified, and repeated ids, are dropped with a warning.
pub fn normalize(records: &[RegistrationRecord]) -> Vec<Participant> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        if record.status != RegistrationStatus::Approved {
            debug!(id = ?record.id, status = ?record.status, "skipping unapproved registration");
            continue;
        }
        match resolve_record(record) {
            Ok(participant) => {
                if !seen.insert(participant.id) {
                    warn!(id = participant.id, "duplicate registration id dropped");
                    continue;
                }
                out.push(participant);
            }
            Err(e) => warn!("dropping registration: {e}"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn individual(id: u64, name: &str, dojang: Option<&str>) -> RegistrationRecord {
        RegistrationRecord {
            id: Some(id),
            status: RegistrationStatus::Approved,
            athlete: Some(RawAthlete {
                id: Some(id * 10),
                name: Some(name.to_string()),
                dojang: dojang.map(|d| RawDojang { name: Some(d.to_string()) }),
            }),
            team_members: None,
        }
    }

    #[test]
    fn test_only_approved_records_survive() {
        let mut pending = individual(2, "budi", None);
        pending.status = RegistrationStatus::Pending;
        let mut rejected = individual(3, "citra", None);
        rejected.status = RegistrationStatus::Rejected;
        let records = vec![individual(1, "andi", Some("Garuda")), pending, rejected];

        let participants = normalize(&records);

        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].id, 1);
    }

    #[test]
    fn test_individual_name_is_uppercased() {
        let participants = normalize(&[individual(1, "  Andi Wijaya ", Some("Garuda"))]);
        let p = &participants[0];
        assert_eq!(p.display_name, "ANDI WIJAYA");
        assert_eq!(p.affiliation, "Garuda");
        assert!(!p.is_team());
    }

    #[test]
    fn test_missing_dojang_gives_empty_affiliation() {
        let participants = normalize(&[individual(1, "andi", None)]);
        assert_eq!(participants[0].affiliation, "");
    }

    #[test]
    fn test_team_joins_member_names() {
        let record = RegistrationRecord {
            id: Some(7),
            status: RegistrationStatus::Approved,
            athlete: None,
            team_members: Some(vec![
                RawAthlete {
                    id: Some(1),
                    name: Some("andi".to_string()),
                    dojang: Some(RawDojang { name: Some("Garuda".to_string()) }),
                },
                RawAthlete {
                    id: Some(2),
                    name: Some("budi".to_string()),
                    dojang: Some(RawDojang { name: Some("Elang".to_string()) }),
                },
            ]),
        };

        let participants = normalize(&[record]);

        let team = &participants[0];
        assert!(team.is_team());
        assert_eq!(team.display_name, "ANDI, BUDI");
        assert_eq!(team.affiliation, "Garuda");
    }

    #[test]
    fn test_unidentifiable_records_are_dropped() {
        let empty = RegistrationRecord {
            id: Some(5),
            status: RegistrationStatus::Approved,
            athlete: None,
            team_members: Some(vec![]),
        };
        let no_id = RegistrationRecord {
            id: None,
            ..individual(6, "dewi", None)
        };
        let blank_name = individual(8, "   ", None);

        let participants = normalize(&[empty, no_id, blank_name, individual(9, "eka", None)]);

        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].id, 9);
    }

    #[test]
    fn test_resolve_record_reports_invalid_input() {
        let record = RegistrationRecord {
            id: Some(5),
            status: RegistrationStatus::Approved,
            ..Default::default()
        };
        assert!(matches!(resolve_record(&record), Err(BracketError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let participants = normalize(&[individual(1, "andi", None), individual(1, "budi", None)]);
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].display_name, "ANDI");
    }

    #[test]
    fn test_records_parse_from_json() {
        let json = r#"[
            {"id": 1, "status": "APPROVED", "athlete": {"name": "andi", "dojang": {"name": "Garuda"}}},
            {"id": 2, "status": "WITHDRAWN", "athlete": {"name": "budi"}},
            {"id": 3, "status": "APPROVED", "teamMembers": [{"name": "citra"}, {"name": "dewi"}]}
        ]"#;
        let records: Vec<RegistrationRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[1].status, RegistrationStatus::Unknown);

        let participants = normalize(&records);
        let names = participants.iter().map(|p| p.display_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["ANDI", "CITRA, DEWI"]);
    }
}
