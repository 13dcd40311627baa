//! Database migrations for deskflow.
//!
//! Each migration upgrades the schema by one version. The version is kept in
//! `PRAGMA user_version` and migrations run automatically on open.

use rusqlite::Connection;

use crate::error::DeskError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 for a new database.
pub fn get_version(conn: &Connection) -> Result<i32, DeskError> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| DeskError::Database(format!("Failed to get schema version: {e}")))?;

    Ok(version)
}

fn set_version(conn: &Connection, version: i32) -> Result<(), DeskError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| DeskError::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), DeskError> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<(), DeskError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(DeskError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Timestamps are RFC 3339 text in UTC. Met flags are nullable integers.
fn migrate_v1(conn: &Connection) -> Result<(), DeskError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS sla_profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            response_time_minutes INTEGER NOT NULL,
            resolution_time_minutes INTEGER NOT NULL,
            business_hours_only INTEGER NOT NULL DEFAULT 0,
            priority_multipliers TEXT NOT NULL DEFAULT '{}',
            is_default INTEGER NOT NULL DEFAULT 0
        );

        -- At most one default profile
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sla_profiles_default
        ON sla_profiles(is_default) WHERE is_default = 1;

        -- Ticket numbers are never reused, even after deletion
        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO counters (name, value) VALUES ('ticket_number', 0);

        CREATE TABLE IF NOT EXISTS tickets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_number INTEGER NOT NULL UNIQUE,
            title TEXT NOT NULL,
            status TEXT NOT NULL,
            priority TEXT NOT NULL,
            organization_id TEXT,
            assignee_id TEXT,
            sla_profile_id INTEGER REFERENCES sla_profiles(id),
            sla_response_due TEXT,
            sla_resolution_due TEXT,
            sla_response_met INTEGER,
            sla_resolution_met INTEGER,
            first_response_at TEXT,
            resolved_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_tickets_status
        ON tickets(status);

        CREATE TABLE IF NOT EXISTS ticket_tags (
            ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            UNIQUE (ticket_id, tag)
        );

        CREATE TABLE IF NOT EXISTS ticket_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL,
            field TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT,
            actor TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_ticket_history_ticket
        ON ticket_history(ticket_id);

        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER REFERENCES tickets(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'todo',
            priority TEXT NOT NULL DEFAULT 'medium',
            assignee_id TEXT,
            due_at TEXT,
            due_notified INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_due
        ON tasks(due_at) WHERE due_notified = 0;

        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS automation_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            trigger_type TEXT NOT NULL,
            conditions TEXT NOT NULL DEFAULT '[]',
            action_type TEXT NOT NULL,
            action_config TEXT NOT NULL,
            schedule_cron TEXT,
            last_run_at TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_automation_rules_trigger
        ON automation_rules(trigger_type) WHERE is_active = 1;

        -- Append-only
        CREATE TABLE IF NOT EXISTS automation_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_id INTEGER NOT NULL,
            ticket_id INTEGER,
            task_id INTEGER,
            status TEXT NOT NULL,
            message TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_automation_logs_rule
        ON automation_logs(rule_id);
        ",
    )
    .map_err(|e| DeskError::Database(format!("Migration v1 failed: {e}")))?;

    Ok(())
}
