use serde::{Deserialize, Serialize};

/// Closed set of conversational intentions. Anything the extractor cannot
/// place lands on `GeneralInquiry`, never on a free-form string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intention {
    Scheduling,
    Rescheduling,
    Cancellation,
    /// Questions about the contact's own appointments.
    Inquiry,
    #[serde(other)]
    GeneralInquiry,
}

impl Intention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intention::Scheduling => "scheduling",
            Intention::Rescheduling => "rescheduling",
            Intention::Cancellation => "cancellation",
            Intention::Inquiry => "inquiry",
            Intention::GeneralInquiry => "general_inquiry",
        }
    }
}

/// Structured slots pulled out of the message alongside the intention.
/// `date` is "YYYY-MM-DD", `time` is "HH:MM", both in the tenant's local
/// clock as the customer speaks it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedInfo {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub professional: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub intention: Intention,
    #[serde(flatten)]
    pub extracted: ExtractedInfo,
    /// The message the analysis was made from. Not part of the LLM output;
    /// the extractor fills it in, and it travels with any pending question
    /// the analysis opens.
    #[serde(default)]
    pub original_message: String,
}

impl IntentAnalysis {
    pub fn fallback() -> Self {
        IntentAnalysis {
            intention: Intention::GeneralInquiry,
            extracted: ExtractedInfo::default(),
            original_message: String::new(),
        }
    }

    pub fn has_date_and_time(&self) -> bool {
        self.extracted.date.is_some() && self.extracted.time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intention_known_values() {
        let i: Intention = serde_json::from_str("\"scheduling\"").unwrap();
        assert_eq!(i, Intention::Scheduling);
        let i: Intention = serde_json::from_str("\"cancellation\"").unwrap();
        assert_eq!(i, Intention::Cancellation);
    }

    #[test]
    fn test_intention_unknown_value_defaults() {
        let i: Intention = serde_json::from_str("\"complain_loudly\"").unwrap();
        assert_eq!(i, Intention::GeneralInquiry);
    }

    #[test]
    fn test_analysis_flattened_slots() {
        let json = r#"{"intention":"scheduling","date":"2025-06-16","time":"15:00","service":"corte","professional":null}"#;
        let a: IntentAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(a.intention, Intention::Scheduling);
        assert_eq!(a.extracted.date.as_deref(), Some("2025-06-16"));
        assert_eq!(a.extracted.time.as_deref(), Some("15:00"));
        assert!(a.has_date_and_time());
    }
}
