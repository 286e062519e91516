use crate::models::IntentAnalysis;
use crate::services::ai::{ChatTurn, LlmProvider};

const SYSTEM_PROMPT: &str = r#"You are an intent extraction engine for a scheduling assistant that chats with customers of a local business. Analyze the customer's latest message in the context of the conversation history.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "intention": "scheduling|rescheduling|cancellation|inquiry|general_inquiry",
  "date": "2025-01-15 or null",
  "time": "14:00 or null",
  "service": "service name mentioned or null",
  "professional": "professional name mentioned or null"
}

Intention rules:
- "scheduling": the customer wants a new appointment
- "rescheduling": the customer wants to move an existing appointment
- "cancellation": the customer wants to cancel an existing appointment
- "inquiry": the customer asks about their own appointments ("when is my appointment?")
- "general_inquiry": anything else (greetings, prices, opening hours, small talk)

Slot rules:
- Dates and times are in the business's local timezone, exactly as the customer means them.
- Resolve relative expressions ("amanhã", "sexta que vem", "daqui a uma hora") against the current local date/time given in the business context.
- Copy service and professional names as the customer wrote them; do not translate or expand.
- Use null for anything not present in the message.
"#;

/// Classifies the latest message. Never fails: provider errors and
/// unparseable output both land on the general-inquiry fallback so the
/// conversation keeps moving.
pub async fn extract_intention(
    llm: &dyn LlmProvider,
    history: &[ChatTurn],
    latest_message: &str,
    business_context: &str,
) -> IntentAnalysis {
    let mut messages: Vec<ChatTurn> = history.to_vec();
    messages.push(ChatTurn::user(latest_message));

    let system = format!("{SYSTEM_PROMPT}\nBusiness context:\n{business_context}");

    let mut analysis = match llm.chat(&system, &messages).await {
        Ok(response) => parse_analysis(&response),
        Err(e) => {
            tracing::warn!(error = %e, "intent extraction call failed, defaulting to general_inquiry");
            IntentAnalysis::fallback()
        }
    };
    analysis.original_message = latest_message.to_string();
    analysis
}

fn parse_analysis(response: &str) -> IntentAnalysis {
    // Try direct parse first
    if let Ok(analysis) = serde_json::from_str::<IntentAnalysis>(response) {
        return analysis;
    }

    // Strip markdown code fences
    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(analysis) = serde_json::from_str::<IntentAnalysis>(cleaned) {
        return analysis;
    }

    // Try to find a JSON object inside prose
    if let Some(start) = cleaned.find('{') {
        if let Some(end) = cleaned.rfind('}') {
            if let Ok(analysis) = serde_json::from_str::<IntentAnalysis>(&cleaned[start..=end]) {
                return analysis;
            }
        }
    }

    tracing::warn!("failed to parse LLM response as intention JSON, using fallback");
    IntentAnalysis::fallback()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Intention;

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"intention":"scheduling","date":"2025-06-16","time":"15:00","service":"corte","professional":null}"#;
        let result = parse_analysis(json);
        assert_eq!(result.intention, Intention::Scheduling);
        assert_eq!(result.extracted.date.as_deref(), Some("2025-06-16"));
        assert_eq!(result.extracted.time.as_deref(), Some("15:00"));
        assert_eq!(result.extracted.service.as_deref(), Some("corte"));
        assert!(result.extracted.professional.is_none());
    }

    #[test]
    fn test_parse_markdown_fenced_json() {
        let fenced = "```json\n{\"intention\":\"cancellation\",\"date\":null,\"time\":null,\"service\":null,\"professional\":null}\n```";
        let result = parse_analysis(fenced);
        assert_eq!(result.intention, Intention::Cancellation);
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let wrapped = r#"Sure, here is the analysis: {"intention":"inquiry","date":null,"time":null,"service":null,"professional":null} hope that helps"#;
        let result = parse_analysis(wrapped);
        assert_eq!(result.intention, Intention::Inquiry);
    }

    #[test]
    fn test_parse_unknown_intention_value() {
        let json = r#"{"intention":"demand_refund","date":null,"time":null,"service":null,"professional":null}"#;
        let result = parse_analysis(json);
        assert_eq!(result.intention, Intention::GeneralInquiry);
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        let result = parse_analysis("I cannot help with that");
        assert_eq!(result.intention, Intention::GeneralInquiry);
        assert!(result.extracted.date.is_none());
    }
}
