//! `SQLite` database connection and operations.
//!
//! The database is stored at `~/.deskflow/deskflow.db`. One connection is
//! shared behind a mutex; every multi-statement write runs in a transaction.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use super::{migrations, Storage};
use crate::config::Paths;
use crate::core::{TaskCreator, TaskSpec};
use crate::error::DeskError;
use crate::features::automation::{AutomationLog, Rule};
use crate::features::sla::SlaProfile;
use crate::tickets::{HistoryRecord, Task, TaskStatus, Ticket, TicketStatus};

const TICKET_COLUMNS: &str = "id, ticket_number, title, status, priority, organization_id,
    assignee_id, sla_profile_id, sla_response_due, sla_resolution_due, sla_response_met,
    sla_resolution_met, first_response_at, resolved_at, created_at, updated_at, version";

const RULE_COLUMNS: &str = "id, name, description, is_active, trigger_type, conditions,
    action_config, schedule_cron, last_run_at, created_at";

const TASK_COLUMNS: &str = "id, ticket_id, title, description, status, priority, assignee_id,
    due_at, due_notified, created_at";

const PROFILE_COLUMNS: &str = "id, name, response_time_minutes, resolution_time_minutes,
    business_hours_only, priority_multipliers, is_default";

/// An agent tickets and tasks can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
}

/// Database connection wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open() -> Result<Self, DeskError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, DeskError> {
        let conn = Connection::open(path).map_err(|e| {
            DeskError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        // Other processes may hold the write lock briefly
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, DeskError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DeskError::Database(format!("Failed to open in-memory database: {e}"))
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DeskError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DeskError::Database(format!("Failed to enable foreign keys: {e}")))?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DeskError> {
        self.conn
            .lock()
            .map_err(|_| DeskError::Database("database connection lock poisoned".to_string()))
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, DeskError> {
        migrations::get_version(&*self.conn()?)
    }

    // SLA profiles

    /// Insert a profile and set its id.
    ///
    /// Marking it default clears the flag on every other profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is invalid or the name is taken.
    pub fn insert_profile(&self, profile: &mut SlaProfile) -> Result<(), DeskError> {
        profile.validate()?;
        let multipliers = serde_json::to_string(&profile.priority_multipliers)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if profile.is_default {
            tx.execute("UPDATE sla_profiles SET is_default = 0 WHERE is_default = 1", [])?;
        }
        tx.execute(
            r"INSERT INTO sla_profiles (name, response_time_minutes, resolution_time_minutes,
                                        business_hours_only, priority_multipliers, is_default)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.name,
                profile.response_time_minutes,
                profile.resolution_time_minutes,
                profile.business_hours_only,
                multipliers,
                profile.is_default,
            ],
        )
        .map_err(|e| DeskError::Database(format!("Failed to insert SLA profile: {e}")))?;
        profile.id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(())
    }

    /// Make `id` the only default profile.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if there is no such profile.
    pub fn set_default_profile(&self, id: i64) -> Result<(), DeskError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("UPDATE sla_profiles SET is_default = 0 WHERE is_default = 1", [])?;
        let changed = tx.execute("UPDATE sla_profiles SET is_default = 1 WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(DeskError::NotFound(format!("SLA profile {id}")));
        }
        tx.commit()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_profiles(&self) -> Result<Vec<SlaProfile>, DeskError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {PROFILE_COLUMNS} FROM sla_profiles ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_profile)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // Agents

    /// Add or rename an agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_agent(&self, agent: &Agent) -> Result<(), DeskError> {
        self.conn()?.execute(
            "INSERT INTO agents (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![agent.id, agent.name],
        )?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_agents(&self) -> Result<Vec<Agent>, DeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM agents ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Agent {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // Rules

    /// Insert a rule and set its id and creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule is invalid or cannot be stored.
    pub fn insert_rule(&self, rule: &mut Rule, now: DateTime<Utc>) -> Result<(), DeskError> {
        rule.validate()?;
        rule.action.validate()?;
        let created_at = *rule.created_at.get_or_insert(now);

        let conn = self.conn()?;
        conn.execute(
            r"INSERT INTO automation_rules (name, description, is_active, trigger_type, conditions,
                                            action_type, action_config, schedule_cron, last_run_at,
                                            created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                rule.name,
                rule.description,
                rule.is_active,
                rule.trigger_type.as_str(),
                serde_json::to_string(&rule.conditions)?,
                rule.action.action_type().as_str(),
                serde_json::to_string(&rule.action)?,
                rule.schedule_cron,
                rule.last_run_at.map(|t| t.to_rfc3339()),
                created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| DeskError::Database(format!("Failed to insert rule: {e}")))?;
        rule.id = Some(conn.last_insert_rowid());

        Ok(())
    }

    /// All rules, active or not, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_rules(&self) -> Result<Vec<Rule>, DeskError> {
        self.query_rules("1 = 1")
    }

    /// # Errors
    ///
    /// Returns `DeskError::NotFound` if there is no such rule.
    pub fn set_rule_active(&self, id: i64, active: bool) -> Result<(), DeskError> {
        let changed = self.conn()?.execute(
            "UPDATE automation_rules SET is_active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if changed == 0 {
            return Err(DeskError::NotFound(format!("rule {id}")));
        }
        Ok(())
    }

    fn query_rules(&self, filter: &str) -> Result<Vec<Rule>, DeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rules WHERE {filter} ORDER BY id"
        ))?;
        let rows = stmt.query_map([], row_to_rule)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // Logs and history

    /// Most recent log entries first, optionally for one rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_logs(
        &self,
        rule_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<AutomationLog>, DeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"SELECT id, rule_id, ticket_id, task_id, status, message, metadata, created_at
              FROM automation_logs
              WHERE ?1 IS NULL OR rule_id = ?1
              ORDER BY id DESC
              LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![rule_id, limit], row_to_log)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Audit trail of one ticket, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn ticket_history(&self, ticket_id: i64) -> Result<Vec<HistoryRecord>, DeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"SELECT id, ticket_id, field, old_value, new_value, actor, created_at
              FROM ticket_history
              WHERE ticket_id = ?1
              ORDER BY id",
        )?;
        let rows = stmt.query_map([ticket_id], |row| {
            Ok(HistoryRecord {
                id: Some(row.get(0)?),
                ticket_id: row.get(1)?,
                field: row.get(2)?,
                old_value: row.get(3)?,
                new_value: row.get(4)?,
                actor: row.get(5)?,
                created_at: get_time(row, 6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // Tasks

    /// Tasks, optionally only those linked to one ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tasks(&self, ticket_id: Option<i64>) -> Result<Vec<Task>, DeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE ?1 IS NULL OR ticket_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map([ticket_id], row_to_task)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn load_tags(conn: &Connection, ticket_id: i64) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT tag FROM ticket_tags WHERE ticket_id = ?1 ORDER BY tag")?;
    let rows = stmt.query_map([ticket_id], |row| row.get(0))?;
    rows.collect()
}

fn write_tags(tx: &Transaction<'_>, ticket: &Ticket) -> Result<(), rusqlite::Error> {
    tx.execute("DELETE FROM ticket_tags WHERE ticket_id = ?1", [ticket.id])?;
    for tag in &ticket.tags {
        tx.execute(
            "INSERT OR IGNORE INTO ticket_tags (ticket_id, tag) VALUES (?1, ?2)",
            params![ticket.id, tag],
        )?;
    }
    Ok(())
}

fn write_history(tx: &Transaction<'_>, records: &[HistoryRecord]) -> Result<(), rusqlite::Error> {
    let mut stmt = tx.prepare(
        r"INSERT INTO ticket_history (ticket_id, field, old_value, new_value, actor, created_at)
          VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for record in records {
        stmt.execute(params![
            record.ticket_id,
            record.field,
            record.old_value,
            record.new_value,
            record.actor,
            record.created_at.to_rfc3339(),
        ])?;
    }
    Ok(())
}

impl Storage for Database {
    fn load_ticket(&self, id: i64) -> Result<Ticket, DeskError> {
        let conn = self.conn()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"),
                [id],
                row_to_ticket,
            )
            .optional()?;

        let mut ticket = ticket.ok_or_else(|| DeskError::NotFound(format!("ticket {id}")))?;
        ticket.tags = load_tags(&conn, id)?;
        Ok(ticket)
    }

    fn insert_ticket(&self, ticket: &mut Ticket) -> Result<(), DeskError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let number: i64 = tx.query_row(
            "UPDATE counters SET value = value + 1 WHERE name = 'ticket_number' RETURNING value",
            [],
            |row| row.get(0),
        )?;

        tx.execute(
            r"INSERT INTO tickets (ticket_number, title, status, priority, organization_id,
                                   assignee_id, sla_profile_id, sla_response_due,
                                   sla_resolution_due, sla_response_met, sla_resolution_met,
                                   first_response_at, resolved_at, created_at, updated_at,
                                   version)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 1)",
            params![
                number,
                ticket.title,
                ticket.status.as_str(),
                ticket.priority.as_str(),
                ticket.organization_id,
                ticket.assignee_id,
                ticket.sla_profile_id,
                ticket.sla_response_due.map(|t| t.to_rfc3339()),
                ticket.sla_resolution_due.map(|t| t.to_rfc3339()),
                ticket.sla_response_met,
                ticket.sla_resolution_met,
                ticket.first_response_at.map(|t| t.to_rfc3339()),
                ticket.resolved_at.map(|t| t.to_rfc3339()),
                ticket.created_at.to_rfc3339(),
                ticket.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| DeskError::Database(format!("Failed to insert ticket: {e}")))?;

        ticket.id = tx.last_insert_rowid();
        ticket.ticket_number = number;
        ticket.version = 1;
        write_tags(&tx, ticket)?;
        tx.commit()?;

        debug!(ticket = ticket.id, number, "inserted ticket");
        Ok(())
    }

    fn save_ticket(&self, ticket: &mut Ticket, history: &[HistoryRecord]) -> Result<(), DeskError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r"UPDATE tickets SET
                title = ?1, status = ?2, priority = ?3, organization_id = ?4, assignee_id = ?5,
                sla_profile_id = ?6, sla_response_due = ?7, sla_resolution_due = ?8,
                sla_response_met = ?9, sla_resolution_met = ?10, first_response_at = ?11,
                resolved_at = ?12, updated_at = ?13, version = version + 1
              WHERE id = ?14 AND version = ?15",
            params![
                ticket.title,
                ticket.status.as_str(),
                ticket.priority.as_str(),
                ticket.organization_id,
                ticket.assignee_id,
                ticket.sla_profile_id,
                ticket.sla_response_due.map(|t| t.to_rfc3339()),
                ticket.sla_resolution_due.map(|t| t.to_rfc3339()),
                ticket.sla_response_met,
                ticket.sla_resolution_met,
                ticket.first_response_at.map(|t| t.to_rfc3339()),
                ticket.resolved_at.map(|t| t.to_rfc3339()),
                ticket.updated_at.to_rfc3339(),
                ticket.id,
                ticket.version,
            ],
        )?;

        if changed == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM tickets WHERE id = ?1)",
                [ticket.id],
                |row| row.get(0),
            )?;
            return Err(if exists {
                DeskError::Conflict(ticket.id)
            } else {
                DeskError::NotFound(format!("ticket {}", ticket.id))
            });
        }

        write_tags(&tx, ticket)?;
        write_history(&tx, history)?;
        tx.commit()?;

        ticket.version += 1;
        Ok(())
    }

    fn list_tickets(&self, active_only: bool) -> Result<Vec<Ticket>, DeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets
             WHERE ?1 = 0 OR status NOT IN ('resolved', 'closed')
             ORDER BY id"
        ))?;
        let rows = stmt.query_map([active_only], row_to_ticket)?;

        let mut tickets = Vec::new();
        for row in rows {
            let mut ticket = row?;
            ticket.tags = load_tags(&conn, ticket.id)?;
            tickets.push(ticket);
        }
        Ok(tickets)
    }

    fn load_active_rules(&self) -> Result<Vec<Rule>, DeskError> {
        self.query_rules("is_active = 1")
    }

    fn claim_rule_window(
        &self,
        rule_id: i64,
        expected: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, DeskError> {
        let changed = self.conn()?.execute(
            "UPDATE automation_rules SET last_run_at = ?1 WHERE id = ?2 AND last_run_at IS ?3",
            params![
                now.to_rfc3339(),
                rule_id,
                expected.map(|t| t.to_rfc3339())
            ],
        )?;
        Ok(changed == 1)
    }

    fn append_history(&self, records: &[HistoryRecord]) -> Result<(), DeskError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_history(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    fn append_automation_log(&self, log: &mut AutomationLog) -> Result<(), DeskError> {
        let conn = self.conn()?;
        conn.execute(
            r"INSERT INTO automation_logs (rule_id, ticket_id, task_id, status, message, metadata,
                                           created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                log.rule_id,
                log.ticket_id,
                log.task_id,
                log.status.as_str(),
                log.message,
                log.metadata.to_string(),
                log.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| DeskError::Database(format!("Failed to append automation log: {e}")))?;
        log.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    fn load_sla_profile(&self, id: i64) -> Result<Option<SlaProfile>, DeskError> {
        Ok(self
            .conn()?
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM sla_profiles WHERE id = ?1"),
                [id],
                row_to_profile,
            )
            .optional()?)
    }

    fn default_sla_profile(&self) -> Result<Option<SlaProfile>, DeskError> {
        Ok(self
            .conn()?
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM sla_profiles WHERE is_default = 1"),
                [],
                row_to_profile,
            )
            .optional()?)
    }

    fn agent_exists(&self, agent_id: &str) -> Result<bool, DeskError> {
        Ok(self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM agents WHERE id = ?1)",
            [agent_id],
            |row| row.get(0),
        )?)
    }

    fn load_task(&self, id: i64) -> Result<Task, DeskError> {
        self.conn()?
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                [id],
                row_to_task,
            )
            .optional()?
            .ok_or_else(|| DeskError::NotFound(format!("task {id}")))
    }

    fn save_task(&self, task: &Task) -> Result<(), DeskError> {
        let changed = self.conn()?.execute(
            r"UPDATE tasks SET title = ?1, description = ?2, status = ?3, priority = ?4,
                               assignee_id = ?5, due_at = ?6, due_notified = ?7
              WHERE id = ?8",
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.assignee_id,
                task.due_at.map(|t| t.to_rfc3339()),
                task.due_notified,
                task.id,
            ],
        )?;
        if changed == 0 {
            return Err(DeskError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, DeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE due_notified = 0 AND status != 'done' AND due_at IS NOT NULL
             ORDER BY id"
        ))?;
        let rows = stmt.query_map([], row_to_task)?;

        let mut due = Vec::new();
        for row in rows {
            let task = row?;
            if task.is_newly_due(now) {
                due.push(task);
            }
        }
        Ok(due)
    }

    fn mark_task_notified(&self, task_id: i64) -> Result<bool, DeskError> {
        let changed = self.conn()?.execute(
            "UPDATE tasks SET due_notified = 1 WHERE id = ?1 AND due_notified = 0",
            [task_id],
        )?;
        Ok(changed == 1)
    }
}

impl TaskCreator for Database {
    fn create_task(&self, spec: &TaskSpec, now: DateTime<Utc>) -> Result<i64, DeskError> {
        let conn = self.conn()?;
        conn.execute(
            r"INSERT INTO tasks (ticket_id, title, description, status, priority, assignee_id,
                                 due_at, created_at)
              VALUES (?1, ?2, ?3, 'todo', ?4, ?5, ?6, ?7)",
            params![
                spec.ticket_id,
                spec.title,
                spec.description,
                spec.priority.as_str(),
                spec.assignee_id,
                spec.due_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| DeskError::Database(format!("Failed to create task: {e}")))?;
        Ok(conn.last_insert_rowid())
    }
}

fn conversion_error(idx: usize, e: DeskError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_time(idx: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, DeskError::Parse(format!("bad timestamp '{value}': {e}"))))
}

fn get_time(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let value: String = row.get(idx)?;
    parse_time(idx, &value)
}

fn get_opt_time(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let value: Option<String> = row.get(idx)?;
    value.map(|v| parse_time(idx, &v)).transpose()
}

fn get_parsed<T>(row: &Row<'_>, idx: usize) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = DeskError>,
{
    let value: String = row.get(idx)?;
    value.parse().map_err(|e| conversion_error(idx, e))
}

fn get_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> Result<T, rusqlite::Error> {
    let value: String = row.get(idx)?;
    serde_json::from_str(&value).map_err(|e| conversion_error(idx, e.into()))
}

fn row_to_ticket(row: &Row<'_>) -> Result<Ticket, rusqlite::Error> {
    let status: TicketStatus = get_parsed(row, 3)?;

    Ok(Ticket {
        id: row.get(0)?,
        ticket_number: row.get(1)?,
        title: row.get(2)?,
        status,
        priority: get_parsed(row, 4)?,
        organization_id: row.get(5)?,
        assignee_id: row.get(6)?,
        tags: Vec::new(),
        sla_profile_id: row.get(7)?,
        sla_response_due: get_opt_time(row, 8)?,
        sla_resolution_due: get_opt_time(row, 9)?,
        sla_response_met: row.get(10)?,
        sla_resolution_met: row.get(11)?,
        first_response_at: get_opt_time(row, 12)?,
        resolved_at: get_opt_time(row, 13)?,
        created_at: get_time(row, 14)?,
        updated_at: get_time(row, 15)?,
        version: row.get(16)?,
    })
}

fn row_to_rule(row: &Row<'_>) -> Result<Rule, rusqlite::Error> {
    Ok(Rule {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        is_active: row.get(3)?,
        trigger_type: get_parsed(row, 4)?,
        conditions: get_json(row, 5)?,
        action: get_json(row, 6)?,
        schedule_cron: row.get(7)?,
        last_run_at: get_opt_time(row, 8)?,
        created_at: Some(get_time(row, 9)?),
    })
}

fn row_to_task(row: &Row<'_>) -> Result<Task, rusqlite::Error> {
    let status: TaskStatus = get_parsed(row, 4)?;

    Ok(Task {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status,
        priority: get_parsed(row, 5)?,
        assignee_id: row.get(6)?,
        due_at: get_opt_time(row, 7)?,
        due_notified: row.get(8)?,
        created_at: get_time(row, 9)?,
    })
}

fn row_to_profile(row: &Row<'_>) -> Result<SlaProfile, rusqlite::Error> {
    Ok(SlaProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        response_time_minutes: row.get(2)?,
        resolution_time_minutes: row.get(3)?,
        business_hours_only: row.get(4)?,
        priority_multipliers: get_json(row, 5)?,
        is_default: row.get(6)?,
    })
}

fn row_to_log(row: &Row<'_>) -> Result<AutomationLog, rusqlite::Error> {
    Ok(AutomationLog {
        id: Some(row.get(0)?),
        rule_id: row.get(1)?,
        ticket_id: row.get(2)?,
        task_id: row.get(3)?,
        status: get_parsed(row, 4)?,
        message: row.get(5)?,
        metadata: get_json(row, 6)?,
        created_at: get_time(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::automation::{Action, Condition, TriggerType};
    use crate::tickets::{Actor, Priority};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn inserted(db: &Database, title: &str) -> Ticket {
        let mut ticket = Ticket::new(title, Priority::Medium, now());
        db.insert_ticket(&mut ticket).unwrap();
        ticket
    }

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.schema_version().unwrap() > 0);
    }

    #[test]
    fn test_reopen_database() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let db = Database::open_at(&db_path).unwrap();
            inserted(&db, "first");
        }

        let db = Database::open_at(&db_path).unwrap();
        let second = inserted(&db, "second");
        assert_eq!(second.ticket_number, 2);
    }

    #[test]
    fn test_ticket_numbers_never_reused() {
        let db = Database::open_in_memory().unwrap();
        let first = inserted(&db, "a");
        db.conn()
            .unwrap()
            .execute("DELETE FROM tickets WHERE id = ?1", [first.id])
            .unwrap();
        let second = inserted(&db, "b");
        assert_eq!(first.ticket_number, 1);
        assert_eq!(second.ticket_number, 2);
    }

    #[test]
    fn test_ticket_round_trip_with_tags() {
        let db = Database::open_in_memory().unwrap();
        let mut ticket = Ticket::new("VPN down", Priority::High, now());
        ticket.tags = vec!["network".to_string(), "vip".to_string()];
        ticket.sla_response_due = Some(now() + Duration::hours(2));
        ticket.sla_response_met = Some(false);
        db.insert_ticket(&mut ticket).unwrap();

        let loaded = db.load_ticket(ticket.id).unwrap();
        assert_eq!(loaded, ticket);
    }

    #[test]
    fn test_save_checks_version() {
        let db = Database::open_in_memory().unwrap();
        let ticket = inserted(&db, "race");

        let mut first = db.load_ticket(ticket.id).unwrap();
        let mut second = db.load_ticket(ticket.id).unwrap();

        first.priority = Priority::High;
        db.save_ticket(&mut first, &[]).unwrap();
        assert_eq!(first.version, 2);

        second.priority = Priority::Low;
        let err = db.save_ticket(&mut second, &[]).unwrap_err();
        assert!(matches!(err, DeskError::Conflict(id) if id == ticket.id));
        assert_eq!(db.load_ticket(ticket.id).unwrap().priority, Priority::High);
    }

    #[test]
    fn test_save_writes_history_and_tags_together() {
        let db = Database::open_in_memory().unwrap();
        let before = inserted(&db, "tagged");
        let mut after = before.clone();
        after.tags.push("vip".to_string());
        let history = HistoryRecord::diff(&before, &after, Actor::Rule(4), now());

        db.save_ticket(&mut after, &history).unwrap();

        let records = db.ticket_history(before.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field, "tags");
        assert_eq!(records[0].actor, "rule:4");
        assert_eq!(db.load_ticket(before.id).unwrap().tags, vec!["vip"]);
    }

    #[test]
    fn test_duplicate_tags_collapse() {
        let db = Database::open_in_memory().unwrap();
        let mut ticket = inserted(&db, "dupes");
        ticket.tags = vec!["vip".to_string(), "vip".to_string()];
        db.save_ticket(&mut ticket, &[]).unwrap();

        let count: i64 = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM ticket_tags WHERE ticket_id = ?1",
                [ticket.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_list_active_tickets() {
        let db = Database::open_in_memory().unwrap();
        inserted(&db, "open");
        let mut done = inserted(&db, "done");
        done.status = TicketStatus::Closed;
        db.save_ticket(&mut done, &[]).unwrap();

        assert_eq!(db.list_tickets(false).unwrap().len(), 2);
        let active = db.list_tickets(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "open");
    }

    #[test]
    fn test_default_profile_is_exclusive() {
        let db = Database::open_in_memory().unwrap();
        let mut a = SlaProfile::new("A", 60, 480).as_default();
        let mut b = SlaProfile::new("B", 30, 240).with_standard_multipliers().as_default();
        db.insert_profile(&mut a).unwrap();
        db.insert_profile(&mut b).unwrap();

        let default = db.default_sla_profile().unwrap().unwrap();
        assert_eq!(default.name, "B");
        assert_eq!(default.priority_multipliers.len(), 4);
        assert!(!db.load_sla_profile(a.id).unwrap().unwrap().is_default);

        db.set_default_profile(a.id).unwrap();
        assert_eq!(db.default_sla_profile().unwrap().unwrap().id, a.id);
        assert!(db.set_default_profile(999).is_err());
    }

    #[test]
    fn test_rules_round_trip_and_toggle() {
        let db = Database::open_in_memory().unwrap();
        let mut rule = Rule::new("Tag VIP", TriggerType::TicketCreated, Action::add_tag("vip"))
            .with_condition(Condition::equals("organization_id", "acme"));
        db.insert_rule(&mut rule, now()).unwrap();

        let active = db.load_active_rules().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0], rule);

        db.set_rule_active(rule.id.unwrap(), false).unwrap();
        assert!(db.load_active_rules().unwrap().is_empty());
        assert_eq!(db.list_rules().unwrap().len(), 1);
    }

    #[test]
    fn test_claim_rule_window_once() {
        let db = Database::open_in_memory().unwrap();
        let mut rule = Rule::new("nightly", TriggerType::Scheduled, Action::add_tag("x"))
            .with_schedule("0 2 * * *");
        db.insert_rule(&mut rule, now()).unwrap();
        let id = rule.id.unwrap();

        let tick = now() + Duration::days(1);
        assert!(db.claim_rule_window(id, None, tick).unwrap());
        // A second claimer still holding the stale value loses
        assert!(!db.claim_rule_window(id, None, tick).unwrap());
        assert!(db.claim_rule_window(id, Some(tick), tick + Duration::days(1)).unwrap());
    }

    #[test]
    fn test_logs_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..3 {
            let mut log = AutomationLog::success(1, format!("run {i}"), now());
            db.append_automation_log(&mut log).unwrap();
            assert!(log.id.is_some());
        }
        let mut other = AutomationLog::skipped(2, "nothing to do", now());
        db.append_automation_log(&mut other).unwrap();

        let logs = db.list_logs(Some(1), 2).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "run 2");
        assert_eq!(db.list_logs(None, 10).unwrap().len(), 4);
    }

    #[test]
    fn test_tasks_and_due_scan() {
        let db = Database::open_in_memory().unwrap();
        let ticket = inserted(&db, "parent");
        let spec = TaskSpec {
            ticket_id: Some(ticket.id),
            title: "Call customer".to_string(),
            description: None,
            priority: Priority::High,
            assignee_id: None,
            due_at: Some(now() + Duration::hours(1)),
        };
        let id = db.create_task(&spec, now()).unwrap();

        assert!(db.due_tasks(now()).unwrap().is_empty());
        let due = db.due_tasks(now() + Duration::hours(2)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].ticket_id, Some(ticket.id));

        assert!(db.mark_task_notified(id).unwrap());
        assert!(!db.mark_task_notified(id).unwrap());
        assert!(db.due_tasks(now() + Duration::hours(2)).unwrap().is_empty());
        assert_eq!(db.list_tasks(Some(ticket.id)).unwrap().len(), 1);
    }

    #[test]
    fn test_agents() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.agent_exists("alice").unwrap());
        db.upsert_agent(&Agent {
            id: "alice".to_string(),
            name: "Alice".to_string(),
        })
        .unwrap();
        assert!(db.agent_exists("alice").unwrap());
        assert_eq!(db.list_agents().unwrap().len(), 1);
    }
}
