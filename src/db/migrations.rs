use anyhow::Context;
use rusqlite::Connection;

/// Ordered, embedded migrations. Applied names are recorded in
/// `_migrations` so re-running is a no-op.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id TEXT PRIMARY KEY,
        business_name TEXT NOT NULL,
        utc_offset_minutes INTEGER NOT NULL DEFAULT -180,
        business_hours TEXT,
        calendar_id TEXT NOT NULL DEFAULT 'primary',
        telegram_webhook_secret TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS contacts (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        channel TEXT NOT NULL,
        channel_user_id TEXT NOT NULL,
        display_name TEXT,
        handle TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(tenant_id, channel, channel_user_id)
    );

    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        contact_id TEXT NOT NULL REFERENCES contacts(id),
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        channel TEXT NOT NULL,
        chat_id TEXT NOT NULL,
        message_count INTEGER NOT NULL DEFAULT 0,
        last_activity TEXT NOT NULL DEFAULT (datetime('now')),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(contact_id, tenant_id, channel)
    );

    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        sender_type TEXT NOT NULL,
        content TEXT NOT NULL,
        channel_message_id TEXT,
        metadata TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, id);

    CREATE TABLE IF NOT EXISTS pending_interactions (
        contact_id TEXT NOT NULL,
        tenant_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        PRIMARY KEY (contact_id, tenant_id, kind)
    );

    CREATE TABLE IF NOT EXISTS appointments (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        contact_id TEXT NOT NULL REFERENCES contacts(id),
        professional_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        scheduled_at TEXT NOT NULL,
        duration_minutes INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'confirmed',
        calendar_event_id TEXT,
        needs_reconcile INTEGER NOT NULL DEFAULT 0,
        created_via TEXT NOT NULL DEFAULT 'assistant',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_appointments_contact ON appointments(contact_id, scheduled_at);

    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        name TEXT NOT NULL,
        duration_minutes INTEGER NOT NULL DEFAULT 60,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS professionals (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL REFERENCES tenants(id),
        name TEXT NOT NULL,
        calendar_id TEXT,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS professional_products (
        professional_id TEXT NOT NULL REFERENCES professionals(id),
        product_id TEXT NOT NULL REFERENCES products(id),
        PRIMARY KEY (professional_id, product_id)
    );

    CREATE TABLE IF NOT EXISTS rate_limits (
        contact_key TEXT NOT NULL,
        message_count INTEGER NOT NULL DEFAULT 0,
        window_start TEXT NOT NULL,
        PRIMARY KEY (contact_key, window_start)
    );
    "#,
)];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
