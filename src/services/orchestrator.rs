use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

use crate::db::queries;
use crate::models::catalog::filter_by_hint;
use crate::models::{
    Appointment, AppointmentStatus, Contact, Conversation, CustomerContext, IntentAnalysis,
    Intention, OptionDescriptor, PendingInteraction, PendingKind, Product, Professional,
    SelectionOutcome, SenderType, Tenant, PENDING_PRIORITY,
};
use crate::services::ai::intent::extract_intention;
use crate::services::ai::responder::{self, RenderedReply, Situation};
use crate::services::ai::ChatTurn;
use crate::services::calendar::EventDraft;
use crate::services::context::load_customer_context;
use crate::services::scheduling;
use crate::state::AppState;

const CREATED_VIA_ASSISTANT: &str = "assistant";

/// One normalized inbound update. The webhook handler resolves tenant,
/// contact and conversation before calling in; from here on everything is
/// channel-agnostic.
pub struct TurnInput {
    pub tenant: Tenant,
    pub contact: Contact,
    pub conversation: Conversation,
    pub body: TurnBody,
}

pub enum TurnBody {
    Text(String),
    /// Kind label used in the reply ("imagem", "áudio", ...).
    Media(String),
}

/// Runs one full turn of the state machine and renders the reply. The
/// caller delivers the chunks and persists them. Errors escaping here mean
/// the turn could not even reach a situation; the webhook layer converts
/// them to an apology.
pub async fn process_turn(
    state: &Arc<AppState>,
    input: &TurnInput,
) -> anyhow::Result<RenderedReply> {
    let context = {
        let db = state.db.lock().unwrap();
        load_customer_context(&db, &state.context_cache, &input.contact)
    };

    let situation = match &input.body {
        TurnBody::Media(kind) => Situation::UnsupportedMedia { kind: kind.clone() },
        TurnBody::Text(text) => text_turn(state, input, &context, text).await?,
    };

    tracing::info!(
        contact_id = %input.contact.id,
        tenant_id = %input.tenant.id,
        situation = situation.key(),
        "turn resolved"
    );

    Ok(responder::generate(state.llm.as_ref(), &input.tenant, &context, situation).await)
}

async fn text_turn(
    state: &Arc<AppState>,
    input: &TurnInput,
    context: &CustomerContext,
    text: &str,
) -> anyhow::Result<Situation> {
    // An unreadable store must not kill the turn; worst case we ask again.
    let pendings = {
        let db = state.db.lock().unwrap();
        match queries::live_pendings(&db, &input.contact.id, &input.tenant.id) {
            Ok(pendings) => pendings,
            Err(e) => {
                tracing::warn!(
                    contact_id = %input.contact.id,
                    error = %e,
                    "pending interaction read failed, treating as none"
                );
                Vec::new()
            }
        }
    };

    if pendings.len() > 1 {
        tracing::warn!(
            contact_id = %input.contact.id,
            count = pendings.len(),
            "multiple pending interactions live for one contact, resolving by priority"
        );
    }

    let pending = PENDING_PRIORITY
        .iter()
        .find_map(|kind| pendings.iter().find(|p| p.kind == *kind))
        .cloned();

    if let Some(pending) = pending {
        match pending.resolve_selection(text) {
            SelectionOutcome::Selected(index) => {
                return continue_flow(state, input, &pending, index).await;
            }
            SelectionOutcome::Invalid => {
                // Recoverable: the question stays open until its TTL.
                return Ok(Situation::InvalidSelection {
                    options: pending.option_labels(),
                });
            }
            SelectionOutcome::Unrelated => {
                tracing::debug!(
                    kind = pending.kind.as_str(),
                    opened_by = %pending.analysis.original_message,
                    "reply unrelated to open question, classifying fresh"
                );
            }
        }
    }

    let business_context = {
        let db = state.db.lock().unwrap();
        build_business_context(&db, &input.tenant)
    };
    let history = history_turns(context, text);
    let analysis =
        extract_intention(state.llm.as_ref(), &history, text, &business_context).await;

    tracing::info!(
        contact_id = %input.contact.id,
        intention = analysis.intention.as_str(),
        "intention classified"
    );

    match analysis.intention {
        Intention::Scheduling => handle_scheduling(state, input, &analysis).await,
        Intention::Rescheduling => {
            open_appointment_selection(state, input, &analysis, PendingKind::ReschedulingSelection)
        }
        Intention::Cancellation => {
            open_appointment_selection(state, input, &analysis, PendingKind::CancellationSelection)
        }
        Intention::Inquiry => handle_inquiry(state, input),
        Intention::GeneralInquiry => Ok(Situation::GeneralInquiry),
    }
}

// ── Fresh-intention handlers ──

async fn handle_scheduling(
    state: &Arc<AppState>,
    input: &TurnInput,
    analysis: &IntentAnalysis,
) -> anyhow::Result<Situation> {
    let Some(local) = carried_datetime(analysis) else {
        return Ok(Situation::Scheduling);
    };

    // Hours gate runs before anything is listed or written.
    if let Err(outside) =
        scheduling::check_business_hours(input.tenant.hours().as_ref(), &local, 0)
    {
        return Ok(Situation::OutsideBusinessHours { hours: outside.hours });
    }

    let products = {
        let db = state.db.lock().unwrap();
        queries::active_products(&db, &input.tenant.id)?
    };
    if products.is_empty() {
        tracing::warn!(tenant_id = %input.tenant.id, "no active products configured");
        return Ok(Situation::NoMatchingService);
    }

    let hint = analysis.extracted.service.as_deref().unwrap_or("");
    let matches = filter_by_hint(&products, hint, |p| &p.name);
    match matches.len() {
        0 => Ok(Situation::NoMatchingService),
        1 => {
            let product = matches[0].clone();
            offer_professionals(state, input, analysis, &product, &local).await
        }
        _ => {
            let options: Vec<OptionDescriptor> = matches
                .iter()
                .map(|p| OptionDescriptor::Product {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    duration_minutes: p.duration_minutes,
                })
                .collect();
            let labels: Vec<String> = matches.iter().map(|p| p.name.clone()).collect();
            {
                let db = state.db.lock().unwrap();
                store_pending(&db, input, PendingKind::ProductSelection, options, analysis, None);
            }
            Ok(Situation::ProductChoices { options: labels })
        }
    }
}

/// Product is settled; narrow down the professional or go straight to
/// booking. A professional hint that matches nobody is dropped rather than
/// dead-ending the flow.
async fn offer_professionals(
    state: &Arc<AppState>,
    input: &TurnInput,
    analysis: &IntentAnalysis,
    product: &Product,
    local: &NaiveDateTime,
) -> anyhow::Result<Situation> {
    let professionals = {
        let db = state.db.lock().unwrap();
        queries::professionals_for_product(&db, &input.tenant.id, &product.id)?
    };
    if professionals.is_empty() {
        tracing::warn!(product_id = %product.id, "no professionals linked to product");
        return Ok(Situation::NoMatchingService);
    }

    let hint = analysis.extracted.professional.as_deref().unwrap_or("");
    let mut matches = filter_by_hint(&professionals, hint, |p| &p.name);
    if matches.is_empty() {
        tracing::debug!(hint, "professional hint matched nobody, offering all");
        matches = professionals.iter().collect();
    }

    if matches.len() == 1 {
        let professional = matches[0].clone();
        return book_appointment(state, input, product, &professional, local).await;
    }

    let options: Vec<OptionDescriptor> = matches
        .iter()
        .map(|p| OptionDescriptor::Professional {
            id: p.id.clone(),
            name: p.name.clone(),
        })
        .collect();
    let labels: Vec<String> = matches.iter().map(|p| p.name.clone()).collect();
    {
        let db = state.db.lock().unwrap();
        store_pending(
            &db,
            input,
            PendingKind::ProfessionalSelection,
            options,
            analysis,
            Some(product.id.clone()),
        );
        // The product question, if there was one, is answered now.
        if let Err(e) = queries::clear_pending(
            &db,
            &input.contact.id,
            &input.tenant.id,
            &PendingKind::ProductSelection,
        ) {
            tracing::warn!(error = %e, "failed to clear answered product question");
        }
    }
    Ok(Situation::ProfessionalChoices {
        product: product.name.clone(),
        options: labels,
    })
}

/// Cancellation and rescheduling both start by picking which upcoming
/// appointment the customer means, even when there is only one.
fn open_appointment_selection(
    state: &Arc<AppState>,
    input: &TurnInput,
    analysis: &IntentAnalysis,
    kind: PendingKind,
) -> anyhow::Result<Situation> {
    let db = state.db.lock().unwrap();
    let upcoming = queries::upcoming_appointments(&db, &input.contact.id, &Utc::now())?;

    if upcoming.is_empty() {
        return Ok(match kind {
            PendingKind::CancellationSelection => Situation::NothingToCancel,
            _ => Situation::NothingToReschedule,
        });
    }

    let mut options = Vec::with_capacity(upcoming.len());
    let mut labels = Vec::with_capacity(upcoming.len());
    for appointment in &upcoming {
        let label = appointment_label(&db, appointment, input.tenant.utc_offset_minutes)?;
        options.push(OptionDescriptor::Appointment {
            id: appointment.id.clone(),
            label: label.clone(),
            scheduled_at: appointment.scheduled_at,
        });
        labels.push(label);
    }
    store_pending(&db, input, kind, options, analysis, None);

    Ok(match kind {
        PendingKind::CancellationSelection => Situation::CancellationChoices { options: labels },
        _ => Situation::ReschedulingChoices { options: labels },
    })
}

fn handle_inquiry(state: &Arc<AppState>, input: &TurnInput) -> anyhow::Result<Situation> {
    let db = state.db.lock().unwrap();
    let upcoming = queries::upcoming_appointments(&db, &input.contact.id, &Utc::now())?;
    let mut items = Vec::with_capacity(upcoming.len());
    for appointment in &upcoming {
        items.push(appointment_label(&db, appointment, input.tenant.utc_offset_minutes)?);
    }
    Ok(Situation::UpcomingAppointments { items })
}

// ── Selection continuations ──

async fn continue_flow(
    state: &Arc<AppState>,
    input: &TurnInput,
    pending: &PendingInteraction,
    index: usize,
) -> anyhow::Result<Situation> {
    let option = pending
        .options
        .get(index)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("selection index {index} out of bounds"))?;

    tracing::info!(
        contact_id = %input.contact.id,
        kind = pending.kind.as_str(),
        choice = option.display_name(),
        "selection resolved"
    );

    match (pending.kind, option) {
        (PendingKind::ProductSelection, OptionDescriptor::Product { id, .. }) => {
            product_selected(state, input, pending, &id).await
        }
        (PendingKind::ProfessionalSelection, OptionDescriptor::Professional { id, .. }) => {
            professional_selected(state, input, pending, &id).await
        }
        (PendingKind::CancellationSelection, OptionDescriptor::Appointment { id, .. }) => {
            cancel_selected(state, input, &id).await
        }
        (PendingKind::ReschedulingSelection, OptionDescriptor::Appointment { id, .. }) => {
            reschedule_selected(state, input, pending, &id).await
        }
        (kind, option) => {
            anyhow::bail!(
                "pending interaction {} carries mismatched option {:?}",
                kind.as_str(),
                option
            )
        }
    }
}

async fn product_selected(
    state: &Arc<AppState>,
    input: &TurnInput,
    pending: &PendingInteraction,
    product_id: &str,
) -> anyhow::Result<Situation> {
    let product = {
        let db = state.db.lock().unwrap();
        queries::get_product(&db, product_id)?
    };
    let Some(product) = product else {
        tracing::warn!(product_id, "selected product no longer exists");
        clear_all(state, input);
        return Ok(Situation::NoMatchingService);
    };

    let Some(local) = carried_datetime(&pending.analysis) else {
        // No usable time survived in the stored analysis; restart cleanly
        // so the next reply is read as a date, not a selection.
        clear_all(state, input);
        return Ok(Situation::Scheduling);
    };

    offer_professionals(state, input, &pending.analysis, &product, &local).await
}

async fn professional_selected(
    state: &Arc<AppState>,
    input: &TurnInput,
    pending: &PendingInteraction,
    professional_id: &str,
) -> anyhow::Result<Situation> {
    let (product, professional) = {
        let db = state.db.lock().unwrap();
        let product = match &pending.product_id {
            Some(id) => queries::get_product(&db, id)?,
            None => None,
        };
        let professional = queries::get_professional(&db, professional_id)?;
        (product, professional)
    };

    let (Some(product), Some(professional)) = (product, professional) else {
        tracing::warn!(
            contact_id = %input.contact.id,
            "stored professional question lost its product or professional"
        );
        clear_all(state, input);
        return Ok(Situation::BookingFailed);
    };

    let Some(local) = carried_datetime(&pending.analysis) else {
        clear_all(state, input);
        return Ok(Situation::Scheduling);
    };

    book_appointment(state, input, &product, &professional, &local).await
}

async fn cancel_selected(
    state: &Arc<AppState>,
    input: &TurnInput,
    appointment_id: &str,
) -> anyhow::Result<Situation> {
    let appointment = {
        let db = state.db.lock().unwrap();
        queries::get_appointment(&db, appointment_id)?
    };
    let Some(appointment) = appointment else {
        clear_all(state, input);
        return Ok(Situation::NothingToCancel);
    };

    // External delete is best-effort: a stray calendar entry beats an
    // appointment the customer believes is cancelled but is not.
    let calendar_id = calendar_for_appointment(state, &input.tenant, &appointment);
    let mut needs_reconcile = false;
    if let Some(event_id) = &appointment.calendar_event_id {
        if let Err(e) = state
            .calendar
            .delete_event(&calendar_id, event_id)
            .await
        {
            tracing::warn!(
                error = %e,
                event_id = %event_id,
                appointment_id = %appointment.id,
                "calendar event delete failed, flagging for reconciliation"
            );
            needs_reconcile = true;
        }
    }

    let when = scheduling::format_local(&appointment.scheduled_at, input.tenant.utc_offset_minutes);
    {
        let db = state.db.lock().unwrap();
        if let Err(e) = queries::update_appointment_status(
            &db,
            &appointment.id,
            &AppointmentStatus::Cancelled,
            needs_reconcile,
        ) {
            tracing::error!(
                error = %e,
                appointment_id = %appointment.id,
                "status update failed after external delete, needs manual reconciliation"
            );
        }
        if let Err(e) = queries::clear_all_pendings(&db, &input.contact.id, &input.tenant.id) {
            tracing::warn!(error = %e, "failed to clear pending interactions after cancellation");
        }
    }
    state.context_cache.invalidate(&input.tenant.id, &input.contact.id);

    Ok(Situation::AppointmentCancelled { when })
}

async fn reschedule_selected(
    state: &Arc<AppState>,
    input: &TurnInput,
    pending: &PendingInteraction,
    appointment_id: &str,
) -> anyhow::Result<Situation> {
    // Target is settled either way; keeping the question open would make
    // the customer's next message look like another selection.
    clear_all(state, input);

    let Some(local) = carried_datetime(&pending.analysis) else {
        return Ok(Situation::NeedNewTime);
    };

    let appointment = {
        let db = state.db.lock().unwrap();
        queries::get_appointment(&db, appointment_id)?
    };
    let Some(appointment) = appointment else {
        return Ok(Situation::NothingToReschedule);
    };

    let tenant = &input.tenant;
    if let Err(outside) =
        scheduling::check_business_hours(tenant.hours().as_ref(), &local, appointment.duration_minutes)
    {
        return Ok(Situation::OutsideBusinessHours { hours: outside.hours });
    }

    let start_utc = scheduling::local_to_utc(&local, tenant.utc_offset_minutes);
    let when = scheduling::format_local(&start_utc, tenant.utc_offset_minutes);
    let calendar_id = calendar_for_appointment(state, tenant, &appointment);

    match state
        .calendar
        .check_availability(&calendar_id, start_utc, appointment.duration_minutes)
        .await
    {
        Ok(check) if !check.available => {
            tracing::info!(
                reason = check.reason.as_deref().unwrap_or("busy"),
                "reschedule target slot unavailable"
            );
            return Ok(Situation::NoAvailability { when });
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "availability check failed, aborting reschedule");
            return Ok(Situation::BookingFailed);
        }
    }

    // New event goes in before the old one comes out, so a failure here
    // leaves the original booking untouched.
    let title = format!(
        "{} - {}",
        service_name_for(state, &appointment),
        input.contact.name()
    );
    let draft = event_draft(input, &title, start_utc, appointment.duration_minutes);
    let new_event_id = match state.calendar.create_event(&calendar_id, &draft).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "calendar event creation failed, aborting reschedule");
            return Ok(Situation::BookingFailed);
        }
    };

    let mut needs_reconcile = false;
    if let Some(old_event_id) = &appointment.calendar_event_id {
        if let Err(e) = state
            .calendar
            .delete_event(&calendar_id, old_event_id)
            .await
        {
            tracing::warn!(
                error = %e,
                event_id = %old_event_id,
                "old calendar event delete failed, flagging for reconciliation"
            );
            needs_reconcile = true;
        }
    }

    {
        let db = state.db.lock().unwrap();
        if let Err(e) = queries::reschedule_appointment(
            &db,
            &appointment.id,
            &start_utc,
            Some(&new_event_id),
            needs_reconcile,
        ) {
            tracing::error!(
                error = %e,
                appointment_id = %appointment.id,
                calendar_event_id = %new_event_id,
                "appointment update failed after calendar events were moved, needs manual reconciliation"
            );
        }
    }
    state.context_cache.invalidate(&tenant.id, &input.contact.id);

    Ok(Situation::AppointmentRescheduled { when })
}

// ── Booking pipeline ──

/// Side effects run in a fixed order: availability, external event, local
/// row, clear open questions, confirm. An aborted step leaves everything
/// before it intact, and once the external event exists the customer is
/// told it exists, whatever the local row did.
async fn book_appointment(
    state: &Arc<AppState>,
    input: &TurnInput,
    product: &Product,
    professional: &Professional,
    local: &NaiveDateTime,
) -> anyhow::Result<Situation> {
    let tenant = &input.tenant;

    if let Err(outside) =
        scheduling::check_business_hours(tenant.hours().as_ref(), local, product.duration_minutes)
    {
        return Ok(Situation::OutsideBusinessHours { hours: outside.hours });
    }

    let start_utc = scheduling::local_to_utc(local, tenant.utc_offset_minutes);
    let when = scheduling::format_local(&start_utc, tenant.utc_offset_minutes);
    let calendar_id = professional
        .calendar_id
        .as_deref()
        .unwrap_or(&tenant.calendar_id);

    match state
        .calendar
        .check_availability(calendar_id, start_utc, product.duration_minutes)
        .await
    {
        Ok(check) if !check.available => {
            tracing::info!(
                reason = check.reason.as_deref().unwrap_or("busy"),
                when = %when,
                "requested slot unavailable"
            );
            return Ok(Situation::NoAvailability { when });
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "availability check failed, aborting booking");
            return Ok(Situation::BookingFailed);
        }
    }

    let title = format!("{} - {}", product.name, input.contact.name());
    let draft = event_draft(input, &title, start_utc, product.duration_minutes);
    let event_id = match state.calendar.create_event(calendar_id, &draft).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "calendar event creation failed, aborting booking");
            return Ok(Situation::BookingFailed);
        }
    };

    let now = Utc::now();
    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        tenant_id: tenant.id.clone(),
        contact_id: input.contact.id.clone(),
        professional_id: professional.id.clone(),
        product_id: product.id.clone(),
        title,
        description: draft.description.clone(),
        scheduled_at: start_utc,
        duration_minutes: product.duration_minutes,
        status: AppointmentStatus::Confirmed,
        calendar_event_id: Some(event_id.clone()),
        needs_reconcile: false,
        created_via: CREATED_VIA_ASSISTANT.to_string(),
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db.lock().unwrap();
        if let Err(e) = queries::insert_appointment(&db, &appointment) {
            // The calendar event is live; the customer sees a booking, so
            // never report failure here.
            tracing::error!(
                error = %e,
                calendar_event_id = %event_id,
                contact_id = %input.contact.id,
                "appointment row write failed after calendar event was created, needs manual reconciliation"
            );
        }
        if let Err(e) = queries::clear_all_pendings(&db, &input.contact.id, &tenant.id) {
            tracing::warn!(error = %e, "failed to clear pending interactions after booking");
        }
    }
    state.context_cache.invalidate(&tenant.id, &input.contact.id);

    tracing::info!(
        contact_id = %input.contact.id,
        appointment_id = %appointment.id,
        professional = %professional.name,
        scheduled_at = %start_utc,
        "appointment booked"
    );

    Ok(Situation::AppointmentConfirmed {
        professional: professional.name.clone(),
        when,
    })
}

// ── Helpers ──

/// A failed write must not kill the turn: the question still goes out,
/// and an answer that finds no stored row just classifies fresh.
fn store_pending(
    db: &rusqlite::Connection,
    input: &TurnInput,
    kind: PendingKind,
    options: Vec<OptionDescriptor>,
    analysis: &IntentAnalysis,
    product_id: Option<String>,
) {
    let mut pending = PendingInteraction::new(
        &input.contact.id,
        &input.tenant.id,
        kind,
        options,
        analysis.clone(),
        Utc::now().naive_utc(),
    );
    pending.product_id = product_id;
    if let Err(e) = queries::put_pending(db, &pending) {
        tracing::error!(
            contact_id = %input.contact.id,
            kind = kind.as_str(),
            error = %e,
            "failed to store pending interaction, sending the question anyway"
        );
    }
}

fn clear_all(state: &Arc<AppState>, input: &TurnInput) {
    let db = state.db.lock().unwrap();
    if let Err(e) = queries::clear_all_pendings(&db, &input.contact.id, &input.tenant.id) {
        tracing::warn!(error = %e, "failed to clear pending interactions");
    }
}

fn carried_datetime(analysis: &IntentAnalysis) -> Option<NaiveDateTime> {
    let date = analysis.extracted.date.as_deref()?;
    let time = analysis.extracted.time.as_deref()?;
    scheduling::parse_extracted_datetime(date, time)
}

fn appointment_label(
    db: &rusqlite::Connection,
    appointment: &Appointment,
    offset_minutes: i32,
) -> anyhow::Result<String> {
    let service = queries::get_product(db, &appointment.product_id)?
        .map(|p| p.name)
        .unwrap_or_else(|| "Atendimento".to_string());
    Ok(format!(
        "{} - {}",
        service,
        scheduling::format_local(&appointment.scheduled_at, offset_minutes)
    ))
}

fn event_draft(
    input: &TurnInput,
    title: &str,
    start: chrono::DateTime<Utc>,
    duration_minutes: i64,
) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        description: Some(format!(
            "Agendado pelo assistente de {} para {}.",
            input.tenant.business_name,
            input.contact.name()
        )),
        start,
        end: start + chrono::Duration::minutes(duration_minutes),
    }
}

fn service_name_for(state: &Arc<AppState>, appointment: &Appointment) -> String {
    let db = state.db.lock().unwrap();
    queries::get_product(&db, &appointment.product_id)
        .ok()
        .flatten()
        .map(|p| p.name)
        .unwrap_or_else(|| "Atendimento".to_string())
}

/// Calendar the appointment's events live on. Professionals may carry a
/// calendar of their own; the tenant calendar covers everyone else, and
/// also professionals that were deleted under an existing appointment.
fn calendar_for_appointment(
    state: &Arc<AppState>,
    tenant: &Tenant,
    appointment: &Appointment,
) -> String {
    let db = state.db.lock().unwrap();
    queries::get_professional(&db, &appointment.professional_id)
        .ok()
        .flatten()
        .and_then(|p| p.calendar_id)
        .unwrap_or_else(|| tenant.calendar_id.clone())
}

/// Context the extractor needs to resolve relative dates and recognize
/// service names. Catalog read is fail-soft; a missing list only costs
/// extraction quality.
fn build_business_context(db: &rusqlite::Connection, tenant: &Tenant) -> String {
    let now_local = scheduling::utc_to_local(&Utc::now(), tenant.utc_offset_minutes);
    let mut context = format!(
        "Business: {}.\nCurrent local date/time: {} ({}).",
        tenant.business_name,
        now_local.format("%Y-%m-%d %H:%M"),
        now_local.format("%A"),
    );

    match queries::active_products(db, &tenant.id) {
        Ok(products) if !products.is_empty() => {
            let services = products
                .iter()
                .map(|p| format!("{} ({} min)", p.name, p.duration_minutes))
                .collect::<Vec<_>>()
                .join(", ");
            context.push_str(&format!("\nServices offered: {services}."));
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to load products for extraction context");
        }
    }

    if let Some(hours) = tenant.hours() {
        let readable = hours.to_human_readable();
        if !readable.is_empty() {
            context.push_str(&format!("\nOpening hours: {readable}."));
        }
    }

    context
}

/// History for the extractor. The inbound message was already persisted,
/// so when the snapshot is fresh its last entry duplicates `latest`; drop
/// it to keep the transcript clean.
fn history_turns(context: &CustomerContext, latest: &str) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = context
        .recent_messages
        .iter()
        .map(|m| match m.sender_type {
            SenderType::Contact => ChatTurn::user(m.content.clone()),
            SenderType::Assistant => ChatTurn::assistant(m.content.clone()),
        })
        .collect();
    if turns
        .last()
        .map(|t| t.role == "user" && t.content == latest)
        .unwrap_or(false)
    {
        turns.pop();
    }
    turns
}
