pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Inserts a demo tenant with a small catalog so a fresh local run has
/// something to talk to. No-op when any tenant exists.
pub fn seed_demo(conn: &Connection) -> anyhow::Result<()> {
    let tenants: i64 = conn.query_row("SELECT COUNT(*) FROM tenants", [], |row| row.get(0))?;
    if tenants > 0 {
        return Ok(());
    }

    conn.execute_batch(
        r#"
        INSERT INTO tenants (id, business_name, utc_offset_minutes, business_hours, calendar_id)
        VALUES ('demo', 'Estúdio Demo', -180,
                '{"slots":[{"day":"mon","start":"09:00","end":"18:00"},
                           {"day":"tue","start":"09:00","end":"18:00"},
                           {"day":"wed","start":"09:00","end":"18:00"},
                           {"day":"thu","start":"09:00","end":"18:00"},
                           {"day":"fri","start":"09:00","end":"18:00"}]}',
                'primary');

        INSERT INTO products (id, tenant_id, name, duration_minutes) VALUES
            ('prod-corte', 'demo', 'Corte de cabelo', 60),
            ('prod-manicure', 'demo', 'Manicure', 45);

        INSERT INTO professionals (id, tenant_id, name) VALUES
            ('prof-silva', 'demo', 'Dra. Silva'),
            ('prof-costa', 'demo', 'Dr. Costa');

        INSERT INTO professional_products (professional_id, product_id) VALUES
            ('prof-silva', 'prod-corte'),
            ('prof-costa', 'prod-corte'),
            ('prof-silva', 'prod-manicure');
        "#,
    )
    .context("failed to seed demo tenant")?;

    tracing::info!("seeded demo tenant with sample catalog");
    Ok(())
}
