use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Appointment, AppointmentStatus, Contact, ContactStatus, Conversation, Message,
    PendingData, PendingInteraction, PendingKind, Product, Professional, SenderType, Tenant,
};

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc())
}

fn fmt_utc(dt: &DateTime<Utc>) -> String {
    fmt_dt(&dt.naive_utc())
}

fn parse_utc(s: &str) -> DateTime<Utc> {
    Utc.from_utc_datetime(&parse_dt(s))
}

// ── Tenants ──

pub fn get_tenant(conn: &Connection, id: &str) -> anyhow::Result<Option<Tenant>> {
    let result = conn.query_row(
        "SELECT id, business_name, utc_offset_minutes, business_hours, calendar_id, telegram_webhook_secret
         FROM tenants WHERE id = ?1",
        params![id],
        |row| {
            Ok(Tenant {
                id: row.get(0)?,
                business_name: row.get(1)?,
                utc_offset_minutes: row.get(2)?,
                business_hours: row.get(3)?,
                calendar_id: row.get(4)?,
                telegram_webhook_secret: row.get(5)?,
            })
        },
    );

    match result {
        Ok(tenant) => Ok(Some(tenant)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_tenant(conn: &Connection, tenant: &Tenant) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO tenants (id, business_name, utc_offset_minutes, business_hours, calendar_id, telegram_webhook_secret)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           business_name = excluded.business_name,
           utc_offset_minutes = excluded.utc_offset_minutes,
           business_hours = excluded.business_hours,
           calendar_id = excluded.calendar_id,
           telegram_webhook_secret = excluded.telegram_webhook_secret",
        params![
            tenant.id,
            tenant.business_name,
            tenant.utc_offset_minutes,
            tenant.business_hours,
            tenant.calendar_id,
            tenant.telegram_webhook_secret,
        ],
    )?;
    Ok(())
}

// ── Contacts ──

fn parse_contact_row(row: &rusqlite::Row) -> anyhow::Result<Contact> {
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    Ok(Contact {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        channel: row.get(2)?,
        channel_user_id: row.get(3)?,
        display_name: row.get(4)?,
        handle: row.get(5)?,
        status: ContactStatus::parse(&status_str),
        created_at: parse_dt(&created_at_str),
    })
}

pub fn find_or_create_contact(
    conn: &Connection,
    tenant_id: &str,
    channel: &str,
    channel_user_id: &str,
    display_name: Option<&str>,
    handle: Option<&str>,
) -> anyhow::Result<Contact> {
    let result = conn.query_row(
        "SELECT id, tenant_id, channel, channel_user_id, display_name, handle, status, created_at
         FROM contacts WHERE tenant_id = ?1 AND channel = ?2 AND channel_user_id = ?3",
        params![tenant_id, channel, channel_user_id],
        |row| Ok(parse_contact_row(row)),
    );

    match result {
        Ok(contact) => Ok(contact?),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            let contact = Contact {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                channel: channel.to_string(),
                channel_user_id: channel_user_id.to_string(),
                display_name: display_name.map(|s| s.to_string()),
                handle: handle.map(|s| s.to_string()),
                status: ContactStatus::Active,
                created_at: Utc::now().naive_utc(),
            };
            conn.execute(
                "INSERT INTO contacts (id, tenant_id, channel, channel_user_id, display_name, handle, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    contact.id,
                    contact.tenant_id,
                    contact.channel,
                    contact.channel_user_id,
                    contact.display_name,
                    contact.handle,
                    contact.status.as_str(),
                    fmt_dt(&contact.created_at),
                ],
            )?;
            Ok(contact)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn set_contact_status(
    conn: &Connection,
    contact_id: &str,
    status: &ContactStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE contacts SET status = ?1 WHERE id = ?2",
        params![status.as_str(), contact_id],
    )?;
    Ok(count > 0)
}

// ── Conversations ──

fn parse_conversation_row(row: &rusqlite::Row) -> anyhow::Result<Conversation> {
    let last_activity_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    Ok(Conversation {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        tenant_id: row.get(2)?,
        channel: row.get(3)?,
        chat_id: row.get(4)?,
        message_count: row.get(5)?,
        last_activity: parse_dt(&last_activity_str),
        created_at: parse_dt(&created_at_str),
    })
}

pub fn find_or_create_conversation(
    conn: &Connection,
    contact_id: &str,
    tenant_id: &str,
    channel: &str,
    chat_id: &str,
) -> anyhow::Result<Conversation> {
    let result = conn.query_row(
        "SELECT id, contact_id, tenant_id, channel, chat_id, message_count, last_activity, created_at
         FROM conversations WHERE contact_id = ?1 AND tenant_id = ?2 AND channel = ?3",
        params![contact_id, tenant_id, channel],
        |row| Ok(parse_conversation_row(row)),
    );

    match result {
        Ok(conv) => Ok(conv?),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            let now = Utc::now().naive_utc();
            let conv = Conversation {
                id: uuid::Uuid::new_v4().to_string(),
                contact_id: contact_id.to_string(),
                tenant_id: tenant_id.to_string(),
                channel: channel.to_string(),
                chat_id: chat_id.to_string(),
                message_count: 0,
                last_activity: now,
                created_at: now,
            };
            conn.execute(
                "INSERT INTO conversations (id, contact_id, tenant_id, channel, chat_id, message_count, last_activity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    conv.id,
                    conv.contact_id,
                    conv.tenant_id,
                    conv.channel,
                    conv.chat_id,
                    conv.message_count,
                    fmt_dt(&conv.last_activity),
                    fmt_dt(&conv.created_at),
                ],
            )?;
            Ok(conv)
        }
        Err(e) => Err(e.into()),
    }
}

// ── Messages ──

pub fn append_message(
    conn: &Connection,
    conversation_id: &str,
    sender: &SenderType,
    content: &str,
    channel_message_id: Option<&str>,
    metadata: Option<&str>,
) -> anyhow::Result<i64> {
    let now = fmt_dt(&Utc::now().naive_utc());
    conn.execute(
        "INSERT INTO messages (conversation_id, sender_type, content, channel_message_id, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![conversation_id, sender.as_str(), content, channel_message_id, metadata, now],
    )?;
    let id = conn.last_insert_rowid();

    conn.execute(
        "UPDATE conversations SET message_count = message_count + 1, last_activity = ?1 WHERE id = ?2",
        params![now, conversation_id],
    )?;

    Ok(id)
}

fn parse_message_row(row: &rusqlite::Row) -> anyhow::Result<Message> {
    let sender_str: String = row.get(2)?;
    let created_at_str: String = row.get(6)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_type: SenderType::parse(&sender_str),
        content: row.get(3)?,
        channel_message_id: row.get(4)?,
        metadata: row.get(5)?,
        created_at: parse_dt(&created_at_str),
    })
}

/// Last `limit` messages across the contact's conversations, oldest first.
pub fn recent_messages(
    conn: &Connection,
    contact_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.conversation_id, m.sender_type, m.content, m.channel_message_id, m.metadata, m.created_at
         FROM messages m
         JOIN conversations c ON c.id = m.conversation_id
         WHERE c.contact_id = ?1
         ORDER BY m.id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![contact_id, limit], |row| Ok(parse_message_row(row)))?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row??);
    }
    messages.reverse();
    Ok(messages)
}

// ── Pending interactions ──

pub fn put_pending(conn: &Connection, pending: &PendingInteraction) -> anyhow::Result<()> {
    let data = serde_json::to_string(&PendingData {
        options: pending.options.clone(),
        analysis: pending.analysis.clone(),
        product_id: pending.product_id.clone(),
    })?;

    conn.execute(
        "INSERT INTO pending_interactions (contact_id, tenant_id, kind, data, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(contact_id, tenant_id, kind) DO UPDATE SET
           data = excluded.data,
           created_at = excluded.created_at,
           expires_at = excluded.expires_at",
        params![
            pending.contact_id,
            pending.tenant_id,
            pending.kind.as_str(),
            data,
            fmt_dt(&pending.created_at),
            fmt_dt(&pending.expires_at),
        ],
    )?;
    Ok(())
}

fn parse_pending_row(row: &rusqlite::Row) -> anyhow::Result<PendingInteraction> {
    let kind_str: String = row.get(2)?;
    let data_json: String = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    let expires_at_str: String = row.get(5)?;

    let kind = PendingKind::parse(&kind_str)
        .ok_or_else(|| anyhow::anyhow!("unknown pending kind: {kind_str}"))?;
    let data: PendingData = serde_json::from_str(&data_json)?;

    Ok(PendingInteraction {
        contact_id: row.get(0)?,
        tenant_id: row.get(1)?,
        kind,
        options: data.options,
        analysis: data.analysis,
        product_id: data.product_id,
        created_at: parse_dt(&created_at_str),
        expires_at: parse_dt(&expires_at_str),
    })
}

/// All unexpired pending rows for the contact, as of `now`. Expired rows
/// are simply invisible here; `sweep_expired_pendings` removes them.
pub fn live_pendings_at(
    conn: &Connection,
    contact_id: &str,
    tenant_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Vec<PendingInteraction>> {
    let mut stmt = conn.prepare(
        "SELECT contact_id, tenant_id, kind, data, created_at, expires_at
         FROM pending_interactions
         WHERE contact_id = ?1 AND tenant_id = ?2 AND expires_at > ?3",
    )?;

    let rows = stmt.query_map(params![contact_id, tenant_id, fmt_dt(now)], |row| {
        Ok(parse_pending_row(row))
    })?;

    let mut pendings = vec![];
    for row in rows {
        pendings.push(row??);
    }
    Ok(pendings)
}

pub fn live_pendings(
    conn: &Connection,
    contact_id: &str,
    tenant_id: &str,
) -> anyhow::Result<Vec<PendingInteraction>> {
    live_pendings_at(conn, contact_id, tenant_id, &Utc::now().naive_utc())
}

pub fn clear_pending(
    conn: &Connection,
    contact_id: &str,
    tenant_id: &str,
    kind: &PendingKind,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM pending_interactions WHERE contact_id = ?1 AND tenant_id = ?2 AND kind = ?3",
        params![contact_id, tenant_id, kind.as_str()],
    )?;
    Ok(count > 0)
}

/// Removes every pending row for the contact, any kind. Used when a flow
/// reaches a terminal outcome. Deleting nothing is fine.
pub fn clear_all_pendings(
    conn: &Connection,
    contact_id: &str,
    tenant_id: &str,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM pending_interactions WHERE contact_id = ?1 AND tenant_id = ?2",
        params![contact_id, tenant_id],
    )?;
    Ok(count)
}

pub fn sweep_expired_pendings(conn: &Connection) -> anyhow::Result<usize> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "DELETE FROM pending_interactions WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(count)
}

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, tenant_id, contact_id, professional_id, product_id, title, description,
                                   scheduled_at, duration_minutes, status, calendar_event_id, needs_reconcile,
                                   created_via, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            appt.id,
            appt.tenant_id,
            appt.contact_id,
            appt.professional_id,
            appt.product_id,
            appt.title,
            appt.description,
            fmt_utc(&appt.scheduled_at),
            appt.duration_minutes,
            appt.status.as_str(),
            appt.calendar_event_id,
            appt.needs_reconcile as i32,
            appt.created_via,
            fmt_utc(&appt.created_at),
            fmt_utc(&appt.updated_at),
        ],
    )?;
    Ok(())
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let scheduled_at_str: String = row.get(7)?;
    let status_str: String = row.get(9)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;
    Ok(Appointment {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        contact_id: row.get(2)?,
        professional_id: row.get(3)?,
        product_id: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        scheduled_at: parse_utc(&scheduled_at_str),
        duration_minutes: row.get(8)?,
        status: AppointmentStatus::parse(&status_str),
        calendar_event_id: row.get(10)?,
        needs_reconcile: row.get::<_, i32>(11)? != 0,
        created_via: row.get(12)?,
        created_at: parse_utc(&created_at_str),
        updated_at: parse_utc(&updated_at_str),
    })
}

const APPOINTMENT_COLUMNS: &str =
    "id, tenant_id, contact_id, professional_id, product_id, title, description, scheduled_at, \
     duration_minutes, status, calendar_event_id, needs_reconcile, created_via, created_at, updated_at";

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_appointment_row(row)));

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Non-cancelled appointments still ahead of `now`, soonest first.
pub fn upcoming_appointments(
    conn: &Connection,
    contact_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE contact_id = ?1 AND status != 'cancelled' AND scheduled_at > ?2
         ORDER BY scheduled_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(params![contact_id, fmt_utc(now)], |row| {
        Ok(parse_appointment_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Booking history regardless of status, most recent first.
pub fn recent_appointments(
    conn: &Connection,
    contact_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE contact_id = ?1 ORDER BY scheduled_at DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(params![contact_id, limit], |row| {
        Ok(parse_appointment_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: &AppointmentStatus,
    needs_reconcile: bool,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, needs_reconcile = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), needs_reconcile as i32, fmt_utc(&Utc::now()), id],
    )?;
    Ok(count > 0)
}

pub fn reschedule_appointment(
    conn: &Connection,
    id: &str,
    new_scheduled_at: &DateTime<Utc>,
    new_event_id: Option<&str>,
    needs_reconcile: bool,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET scheduled_at = ?1, calendar_event_id = ?2, needs_reconcile = ?3,
                                 status = 'confirmed', updated_at = ?4
         WHERE id = ?5",
        params![fmt_utc(new_scheduled_at), new_event_id, needs_reconcile as i32, fmt_utc(&Utc::now()), id],
    )?;
    Ok(count > 0)
}

// ── Catalog ──

pub fn active_products(conn: &Connection, tenant_id: &str) -> anyhow::Result<Vec<Product>> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, name, duration_minutes, active
         FROM products WHERE tenant_id = ?1 AND active = 1 ORDER BY name ASC",
    )?;

    let rows = stmt.query_map(params![tenant_id], |row| {
        Ok(Product {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            name: row.get(2)?,
            duration_minutes: row.get(3)?,
            active: row.get::<_, i32>(4)? != 0,
        })
    })?;

    let mut products = vec![];
    for row in rows {
        products.push(row?);
    }
    Ok(products)
}

pub fn get_product(conn: &Connection, id: &str) -> anyhow::Result<Option<Product>> {
    let result = conn.query_row(
        "SELECT id, tenant_id, name, duration_minutes, active FROM products WHERE id = ?1",
        params![id],
        |row| {
            Ok(Product {
                id: row.get(0)?,
                tenant_id: row.get(1)?,
                name: row.get(2)?,
                duration_minutes: row.get(3)?,
                active: row.get::<_, i32>(4)? != 0,
            })
        },
    );

    match result {
        Ok(product) => Ok(Some(product)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn professionals_for_product(
    conn: &Connection,
    tenant_id: &str,
    product_id: &str,
) -> anyhow::Result<Vec<Professional>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.tenant_id, p.name, p.calendar_id, p.active
         FROM professionals p
         JOIN professional_products pp ON pp.professional_id = p.id
         WHERE p.tenant_id = ?1 AND pp.product_id = ?2 AND p.active = 1
         ORDER BY p.name ASC",
    )?;

    let rows = stmt.query_map(params![tenant_id, product_id], |row| {
        Ok(Professional {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            name: row.get(2)?,
            calendar_id: row.get(3)?,
            active: row.get::<_, i32>(4)? != 0,
        })
    })?;

    let mut professionals = vec![];
    for row in rows {
        professionals.push(row?);
    }
    Ok(professionals)
}

pub fn get_professional(conn: &Connection, id: &str) -> anyhow::Result<Option<Professional>> {
    let result = conn.query_row(
        "SELECT id, tenant_id, name, calendar_id, active FROM professionals WHERE id = ?1",
        params![id],
        |row| {
            Ok(Professional {
                id: row.get(0)?,
                tenant_id: row.get(1)?,
                name: row.get(2)?,
                calendar_id: row.get(3)?,
                active: row.get::<_, i32>(4)? != 0,
            })
        },
    );

    match result {
        Ok(professional) => Ok(Some(professional)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Rate limits ──

pub fn increment_message_count(conn: &Connection, contact_key: &str) -> anyhow::Result<i64> {
    let window = current_hour_window();

    conn.execute(
        "INSERT INTO rate_limits (contact_key, message_count, window_start)
         VALUES (?1, 1, ?2)
         ON CONFLICT(contact_key, window_start) DO UPDATE SET message_count = message_count + 1",
        params![contact_key, window],
    )?;

    let count: i64 = conn.query_row(
        "SELECT message_count FROM rate_limits WHERE contact_key = ?1 AND window_start = ?2",
        params![contact_key, window],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn cleanup_old_windows(conn: &Connection) -> anyhow::Result<()> {
    let cutoff = (Utc::now() - chrono::Duration::hours(2))
        .format("%Y-%m-%d %H:00:00")
        .to_string();
    conn.execute(
        "DELETE FROM rate_limits WHERE window_start < ?1",
        params![cutoff],
    )?;
    Ok(())
}

fn current_hour_window() -> String {
    Utc::now().format("%Y-%m-%d %H:00:00").to_string()
}
