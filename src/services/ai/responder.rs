use crate::models::{CommunicationStyle, CustomerContext, SenderType, Tenant};
use crate::services::ai::{ChatTurn, LlmProvider};

/// Channel-friendly ceiling per outbound message.
pub const MAX_CHUNK_CHARS: usize = 150;

/// Everything the assistant may need to say, with the facts it must say it
/// with. List-like situations render deterministically; prose ones go
/// through the LLM with a hardcoded fallback per situation.
#[derive(Debug, Clone, PartialEq)]
pub enum Situation {
    Scheduling,
    ProductChoices { options: Vec<String> },
    ProfessionalChoices { product: String, options: Vec<String> },
    CancellationChoices { options: Vec<String> },
    ReschedulingChoices { options: Vec<String> },
    OutsideBusinessHours { hours: String },
    NoAvailability { when: String },
    BookingFailed,
    AppointmentConfirmed { professional: String, when: String },
    AppointmentCancelled { when: String },
    AppointmentRescheduled { when: String },
    NothingToCancel,
    NothingToReschedule,
    NeedNewTime,
    UpcomingAppointments { items: Vec<String> },
    InvalidSelection { options: Vec<String> },
    NoMatchingService,
    UnsupportedMedia { kind: String },
    GeneralInquiry,
}

impl Situation {
    pub fn key(&self) -> &'static str {
        match self {
            Situation::Scheduling => "scheduling",
            Situation::ProductChoices { .. } => "product_choices",
            Situation::ProfessionalChoices { .. } => "professional_choices",
            Situation::CancellationChoices { .. } => "cancellation_choices",
            Situation::ReschedulingChoices { .. } => "rescheduling_choices",
            Situation::OutsideBusinessHours { .. } => "outside_business_hours",
            Situation::NoAvailability { .. } => "no_availability",
            Situation::BookingFailed => "booking_failed",
            Situation::AppointmentConfirmed { .. } => "appointment_confirmed",
            Situation::AppointmentCancelled { .. } => "appointment_cancelled",
            Situation::AppointmentRescheduled { .. } => "appointment_rescheduled",
            Situation::NothingToCancel => "nothing_to_cancel",
            Situation::NothingToReschedule => "nothing_to_reschedule",
            Situation::NeedNewTime => "need_new_time",
            Situation::UpcomingAppointments { .. } => "upcoming_appointments",
            Situation::InvalidSelection { .. } => "invalid_selection",
            Situation::NoMatchingService => "no_matching_service",
            Situation::UnsupportedMedia { .. } => "unsupported_media",
            Situation::GeneralInquiry => "general_inquiry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Warm,
    Neutral,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Warm => "warm",
            Tone::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedReply {
    pub situation_key: &'static str,
    pub messages: Vec<String>,
    pub tone: Tone,
}

const RESPONDER_PROMPT: &str = r#"You are the virtual receptionist of a local business, chatting with a customer on Telegram in Brazilian Portuguese.

Rules:
- 1 to 3 short sentences, warm but efficient.
- State every fact given in the situation exactly (names, dates, times); never invent availability, prices or services.
- Plain text only: no markdown, no lists, at most one emoji.
"#;

/// Turns a situation into deliverable chunks. Total: deterministic
/// templates for enumerations, LLM with per-situation fallback for prose.
/// The reply is never empty.
pub async fn generate(
    llm: &dyn LlmProvider,
    tenant: &Tenant,
    context: &CustomerContext,
    situation: Situation,
) -> RenderedReply {
    let key = situation.key();

    let text = match deterministic_text(&situation) {
        Some(text) => text,
        None => {
            let system = build_system_prompt(tenant, context, &situation);
            let turns = history_turns(context);
            match llm.chat(&system, &turns).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => {
                    tracing::warn!(situation = key, "LLM returned empty reply, using fallback");
                    fallback_text(&situation)
                }
                Err(e) => {
                    tracing::warn!(situation = key, error = %e, "reply generation failed, using fallback");
                    fallback_text(&situation)
                }
            }
        }
    };

    let mut messages = chunk_message(&text);
    if messages.is_empty() {
        messages = chunk_message(&fallback_text(&situation));
    }

    let tone = detect_tone(context.communication_style, &messages);

    RenderedReply { situation_key: key, messages, tone }
}

fn build_system_prompt(tenant: &Tenant, context: &CustomerContext, situation: &Situation) -> String {
    let mut prompt = format!("{RESPONDER_PROMPT}\nBusiness: {}.", tenant.business_name);
    if let Some(hours) = tenant.hours() {
        let readable = hours.to_human_readable();
        if !readable.is_empty() {
            prompt.push_str(&format!(" Opening hours: {readable}."));
        }
    }
    prompt.push_str(&format!(
        "\nCustomer: {} ({} customer, {} tone).",
        context.name.as_deref().unwrap_or("unknown name"),
        if context.is_returning { "returning" } else { "new" },
        context.communication_style.as_str(),
    ));
    prompt.push_str(&format!("\nSituation: {}", situation_brief(situation)));
    prompt
}

fn history_turns(context: &CustomerContext) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = context
        .recent_messages
        .iter()
        .map(|m| match m.sender_type {
            SenderType::Contact => ChatTurn::user(m.content.clone()),
            SenderType::Assistant => ChatTurn::assistant(m.content.clone()),
        })
        .collect();
    if turns.is_empty() {
        turns.push(ChatTurn::user("(início da conversa)"));
    }
    turns
}

fn situation_brief(situation: &Situation) -> String {
    match situation {
        Situation::Scheduling => {
            "the customer wants to book but gave no usable date and time; ask which day and time they would like".into()
        }
        Situation::NoAvailability { when } => {
            format!("the requested slot at {when} is already taken; apologize briefly and ask for another time")
        }
        Situation::BookingFailed => {
            "a technical problem stopped the booking from completing; apologize and ask them to try again in a moment".into()
        }
        Situation::AppointmentConfirmed { professional, when } => {
            format!("the appointment with {professional} is confirmed for {when}; confirm it warmly, repeating professional and time")
        }
        Situation::AppointmentCancelled { when } => {
            format!("the appointment of {when} was cancelled as requested; confirm the cancellation")
        }
        Situation::AppointmentRescheduled { when } => {
            format!("the appointment was moved to {when}; confirm the new time")
        }
        Situation::NothingToCancel => {
            "no upcoming appointment was found to cancel; say so politely".into()
        }
        Situation::NothingToReschedule => {
            "no upcoming appointment was found to reschedule; say so politely".into()
        }
        Situation::NeedNewTime => {
            "the customer chose which appointment to move; ask for the new day and time".into()
        }
        Situation::NoMatchingService => {
            "the requested service is not offered here; say so kindly and offer to list the available services".into()
        }
        Situation::UnsupportedMedia { kind } => {
            format!("the customer sent a {kind}, which cannot be processed; ask them to write a text message instead")
        }
        Situation::GeneralInquiry => {
            "answer the customer's last message briefly as a scheduling assistant, and offer to book, move or cancel an appointment".into()
        }
        // Deterministic situations never reach the LLM.
        _ => String::new(),
    }
}

fn enumerate(options: &[String]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, o)| format!("{}. {o}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Enumerations and exact-fact notices are rendered from data, not the
/// LLM, so numbering always matches what selection resolution expects.
fn deterministic_text(situation: &Situation) -> Option<String> {
    match situation {
        Situation::ProductChoices { options } => Some(format!(
            "Esses são os nossos serviços:\n{}\nQual você prefere? Responda com o número.",
            enumerate(options)
        )),
        Situation::ProfessionalChoices { product, options } => Some(format!(
            "Para {product}, temos:\n{}\nQual profissional você prefere? Responda com o número.",
            enumerate(options)
        )),
        Situation::CancellationChoices { options } => Some(format!(
            "Encontrei esses horários marcados:\n{}\nQual deles você quer cancelar? Responda com o número.",
            enumerate(options)
        )),
        Situation::ReschedulingChoices { options } => Some(format!(
            "Encontrei esses horários marcados:\n{}\nQual deles você quer remarcar? Responda com o número.",
            enumerate(options)
        )),
        Situation::UpcomingAppointments { items } => Some(if items.is_empty() {
            "Você não tem horários marcados no momento. Quer agendar um?".to_string()
        } else {
            format!("Seus próximos horários:\n{}", enumerate(items))
        }),
        Situation::InvalidSelection { options } => Some(format!(
            "Não entendi sua escolha. Responda com o número de uma das opções:\n{}",
            enumerate(options)
        )),
        Situation::OutsideBusinessHours { hours } => Some(format!(
            "Esse horário fica fora do nosso atendimento ({hours}). Pode escolher outro horário?"
        )),
        _ => None,
    }
}

/// Hardcoded reply per prose situation. Every situation has one; the
/// conversation never goes silent because a model call failed.
fn fallback_text(situation: &Situation) -> String {
    match situation {
        Situation::Scheduling => {
            "Claro! Para qual dia e horário você gostaria de agendar?".into()
        }
        Situation::NoAvailability { when } => {
            format!("Infelizmente não temos horário livre em {when}. Quer tentar outro horário?")
        }
        Situation::BookingFailed => {
            "Não consegui concluir o agendamento agora. Pode tentar de novo em instantes?".into()
        }
        Situation::AppointmentConfirmed { professional, when } => {
            format!("Perfeito! Seu horário com {professional} está confirmado para {when}. Até lá!")
        }
        Situation::AppointmentCancelled { when } => {
            format!("Pronto, seu horário de {when} foi cancelado. Se precisar, é só chamar!")
        }
        Situation::AppointmentRescheduled { when } => {
            format!("Feito! Seu horário foi remarcado para {when}.")
        }
        Situation::NothingToCancel => {
            "Não encontrei nenhum horário marcado em seu nome para cancelar.".into()
        }
        Situation::NothingToReschedule => {
            "Não encontrei nenhum horário marcado em seu nome para remarcar.".into()
        }
        Situation::NeedNewTime => {
            "Claro! Para qual dia e horário você quer remarcar?".into()
        }
        Situation::NoMatchingService => {
            "Não encontrei esse serviço por aqui. Quer que eu liste as opções disponíveis?".into()
        }
        Situation::UnsupportedMedia { kind } => {
            format!("Ainda não consigo abrir {kind} por aqui. Pode me escrever em texto, por favor?")
        }
        Situation::GeneralInquiry => {
            "Posso ajudar com agendamentos: marcar, remarcar ou cancelar um horário. O que você precisa?".into()
        }
        // Deterministic situations fall back to their own template.
        other => deterministic_text(other).unwrap_or_else(|| {
            "Desculpe, tive um problema por aqui. Pode repetir, por favor?".into()
        }),
    }
}

fn detect_tone(style: CommunicationStyle, messages: &[String]) -> Tone {
    if style == CommunicationStyle::Informal {
        return Tone::Warm;
    }
    if messages.iter().any(|m| m.contains('!')) {
        Tone::Warm
    } else {
        Tone::Neutral
    }
}

/// Splits a reply into chunks of at most `MAX_CHUNK_CHARS` characters,
/// preferring sentence boundaries and preserving line breaks (lists stay
/// lists). A single overlong word is left whole rather than split.
pub fn chunk_message(text: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for (piece, starts_line) in segments(text) {
        for part in hard_split(&piece, MAX_CHUNK_CHARS) {
            let part_len = part.chars().count();
            let sep = if current.is_empty() {
                ""
            } else if starts_line {
                "\n"
            } else {
                " "
            };

            if !current.is_empty() && current_len + sep.len() + part_len > MAX_CHUNK_CHARS {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                current.push_str(&part);
                current_len += part_len;
            } else {
                current.push_str(sep);
                current.push_str(&part);
                current_len += sep.len() + part_len;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Sentence-or-line segments, tagging the first segment of each line so
/// chunking can restore the line break.
fn segments(text: &str) -> Vec<(String, bool)> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut first = true;
        for sentence in split_sentences(line) {
            out.push((sentence, first));
            first = false;
        }
    }
    out
}

fn split_sentences(line: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?' | '…') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?' | '…') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

fn hard_split(sentence: &str, max: usize) -> Vec<String> {
    if sentence.chars().count() <= max {
        return vec![sentence.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            parts.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
