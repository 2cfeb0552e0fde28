// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied on
//! every [`crate::Database::open`].

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Runs all pending migrations against the given connection.
///
/// Refinery tracks applied migrations in its own `refinery_schema_history` table.
pub(crate) fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), refinery::Error> {
    let report = embedded::migrations::runner().run(conn)?;
    for migration in report.applied_migrations() {
        tracing::info!(
            version = migration.version(),
            name = migration.name(),
            "applied migration"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_rebuild_keeps_rows_and_references() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "OFF").unwrap();
        embedded::migrations::runner()
            .set_target(refinery::Target::Version(1))
            .run(&mut conn)
            .unwrap();
        conn.execute_batch(
            "INSERT INTO contacts (id, tenant_id, phone_number, name, created_at, updated_at) \
             VALUES ('k1', 't1', '5511999990000', 'Ana', '2026-01-01T00:00:00.000000Z', \
                     '2026-01-01T00:00:00.000000Z'); \
             INSERT INTO conversations (id, tenant_id, contact_id, status, last_message_at, \
                     created_at, updated_at) \
             VALUES ('c1', 't1', 'k1', 'OPEN', '2026-01-01T00:00:00.000000Z', \
                     '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z');",
        )
        .unwrap();

        run_migrations(&mut conn).unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();

        let (channel, phone): (String, String) = conn
            .query_row(
                "SELECT channel, phone_number FROM contacts WHERE id = 'k1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(channel, "WHATSAPP");
        assert_eq!(phone, "5511999990000");

        let violations: i64 = conn
            .query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |row| row.get(0))
            .unwrap();
        assert_eq!(violations, 0);
        // Orphans are still rejected after the rebuild.
        assert!(
            conn.execute(
                "INSERT INTO conversations (id, tenant_id, contact_id, status, last_message_at, \
                 created_at, updated_at) VALUES ('c2', 't1', 'missing', 'OPEN', 'x', 'x', 'x')",
                [],
            )
            .is_err()
        );
    }
}
