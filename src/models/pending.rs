use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::intent::IntentAnalysis;

/// How long an open question stays answerable. Expired rows are invisible
/// to reads and swept opportunistically.
pub const PENDING_TTL_MINUTES: i64 = 10;

/// The kinds of question the assistant can leave open between turns, in
/// the order a turn checks them when more than one row survives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    ProductSelection,
    ProfessionalSelection,
    ReschedulingSelection,
    CancellationSelection,
}

pub const PENDING_PRIORITY: [PendingKind; 4] = [
    PendingKind::ProductSelection,
    PendingKind::ProfessionalSelection,
    PendingKind::ReschedulingSelection,
    PendingKind::CancellationSelection,
];

impl PendingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingKind::ProductSelection => "product_selection",
            PendingKind::ProfessionalSelection => "professional_selection",
            PendingKind::ReschedulingSelection => "rescheduling_selection",
            PendingKind::CancellationSelection => "cancellation_selection",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "product_selection" => Some(PendingKind::ProductSelection),
            "professional_selection" => Some(PendingKind::ProfessionalSelection),
            "rescheduling_selection" => Some(PendingKind::ReschedulingSelection),
            "cancellation_selection" => Some(PendingKind::CancellationSelection),
            _ => None,
        }
    }
}

/// One enumerated choice offered to the customer. Tagged so the stored
/// JSON is self-describing and additions stay backward compatible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptionDescriptor {
    Product {
        id: String,
        name: String,
        duration_minutes: i64,
    },
    Professional {
        id: String,
        name: String,
    },
    Appointment {
        id: String,
        label: String,
        scheduled_at: DateTime<Utc>,
    },
}

impl OptionDescriptor {
    pub fn display_name(&self) -> &str {
        match self {
            OptionDescriptor::Product { name, .. } => name,
            OptionDescriptor::Professional { name, .. } => name,
            OptionDescriptor::Appointment { label, .. } => label,
        }
    }
}

/// JSON blob stored in the pending row: the offered options plus the
/// analysis of the turn that opened the question, so date/time/service
/// slots survive to the answering turn. `product_id` is set once a
/// product has been resolved (a professional question without its product
/// would be unanswerable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingData {
    pub options: Vec<OptionDescriptor>,
    pub analysis: IntentAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PendingInteraction {
    pub contact_id: String,
    pub tenant_id: String,
    pub kind: PendingKind,
    pub options: Vec<OptionDescriptor>,
    pub analysis: IntentAnalysis,
    pub product_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// What the customer's reply means against an open question.
#[derive(Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Zero-based index into `options`.
    Selected(usize),
    /// Looked like a selection attempt but matched nothing; re-ask and
    /// keep the question open.
    Invalid,
    /// Reads like a new request; let fresh intention classification run.
    Unrelated,
}

impl PendingInteraction {
    pub fn new(
        contact_id: &str,
        tenant_id: &str,
        kind: PendingKind,
        options: Vec<OptionDescriptor>,
        analysis: IntentAnalysis,
        now: NaiveDateTime,
    ) -> Self {
        PendingInteraction {
            contact_id: contact_id.to_string(),
            tenant_id: tenant_id.to_string(),
            kind,
            options,
            analysis,
            product_id: None,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(PENDING_TTL_MINUTES),
        }
    }

    pub fn option_labels(&self) -> Vec<String> {
        self.options.iter().map(|o| o.display_name().to_string()).collect()
    }

    /// Numeric choice first (1-based, tolerating "1." and "1)"), then a
    /// case-insensitive name fragment. Short non-matching replies are
    /// treated as failed attempts; longer ones as a change of subject.
    pub fn resolve_selection(&self, input: &str) -> SelectionOutcome {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return SelectionOutcome::Invalid;
        }

        let numeric = trimmed.trim_end_matches(['.', ')', '-']).trim();
        if let Ok(n) = numeric.parse::<usize>() {
            return if n >= 1 && n <= self.options.len() {
                SelectionOutcome::Selected(n - 1)
            } else {
                SelectionOutcome::Invalid
            };
        }

        let needle = trimmed.to_lowercase();
        if let Some(i) = self
            .options
            .iter()
            .position(|o| o.display_name().to_lowercase().contains(&needle))
        {
            return SelectionOutcome::Selected(i);
        }

        if trimmed.split_whitespace().count() <= 3 {
            SelectionOutcome::Invalid
        } else {
            SelectionOutcome::Unrelated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intent::IntentAnalysis;

    fn pending_with(names: &[&str]) -> PendingInteraction {
        let options = names
            .iter()
            .map(|n| OptionDescriptor::Professional {
                id: format!("prof-{n}"),
                name: n.to_string(),
            })
            .collect();
        PendingInteraction {
            contact_id: "c1".into(),
            tenant_id: "t1".into(),
            kind: PendingKind::ProfessionalSelection,
            options,
            analysis: IntentAnalysis::fallback(),
            product_id: None,
            created_at: chrono::Utc::now().naive_utc(),
            expires_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_numeric_selection() {
        let p = pending_with(&["Dr. Silva", "Dr. Costa"]);
        assert_eq!(p.resolve_selection("2"), SelectionOutcome::Selected(1));
        assert_eq!(p.resolve_selection(" 1 "), SelectionOutcome::Selected(0));
    }

    #[test]
    fn test_numeric_with_punctuation() {
        let p = pending_with(&["Dr. Silva", "Dr. Costa"]);
        assert_eq!(p.resolve_selection("1."), SelectionOutcome::Selected(0));
        assert_eq!(p.resolve_selection("2)"), SelectionOutcome::Selected(1));
    }

    #[test]
    fn test_numeric_out_of_range_is_invalid() {
        let p = pending_with(&["Dr. Silva", "Dr. Costa"]);
        assert_eq!(p.resolve_selection("5"), SelectionOutcome::Invalid);
        assert_eq!(p.resolve_selection("0"), SelectionOutcome::Invalid);
    }

    #[test]
    fn test_name_fragment_case_insensitive() {
        let p = pending_with(&["Dr. Silva", "Dr. Costa"]);
        assert_eq!(p.resolve_selection("costa"), SelectionOutcome::Selected(1));
        assert_eq!(p.resolve_selection("COSTA"), SelectionOutcome::Selected(1));
        assert_eq!(p.resolve_selection("dr. silva"), SelectionOutcome::Selected(0));
    }

    #[test]
    fn test_short_garbage_is_invalid() {
        let p = pending_with(&["Dr. Silva", "Dr. Costa"]);
        assert_eq!(p.resolve_selection("xyz"), SelectionOutcome::Invalid);
        assert_eq!(p.resolve_selection("esse mesmo aí"), SelectionOutcome::Invalid);
        assert_eq!(p.resolve_selection("  "), SelectionOutcome::Invalid);
    }

    #[test]
    fn test_longer_text_falls_through() {
        let p = pending_with(&["Dr. Silva", "Dr. Costa"]);
        assert_eq!(
            p.resolve_selection("quero cancelar meu horário de sexta"),
            SelectionOutcome::Unrelated
        );
        assert_eq!(
            p.resolve_selection("na verdade qual o horário de vocês?"),
            SelectionOutcome::Unrelated
        );
    }

    #[test]
    fn test_data_round_trips_through_json() {
        let data = PendingData {
            options: vec![
                OptionDescriptor::Product {
                    id: "p1".into(),
                    name: "Corte de cabelo".into(),
                    duration_minutes: 60,
                },
                OptionDescriptor::Appointment {
                    id: "a1".into(),
                    label: "Corte de cabelo - 16/06/2025 às 15:00".into(),
                    scheduled_at: chrono::Utc::now(),
                },
            ],
            analysis: IntentAnalysis::fallback(),
            product_id: None,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"type\":\"product\""));
        assert!(json.contains("\"type\":\"appointment\""));
        let back: PendingData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.options, data.options);
    }

    #[test]
    fn test_data_without_product_id_still_parses() {
        let json = r#"{"options":[{"type":"professional","id":"p1","name":"Dra. Silva"}],"analysis":{"intention":"scheduling","date":null,"time":null,"service":null,"professional":null}}"#;
        let data: PendingData = serde_json::from_str(json).unwrap();
        assert!(data.product_id.is_none());
        assert_eq!(data.options.len(), 1);
    }
}
