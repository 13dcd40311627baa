//! Rule command implementation.
//!
//! Handles automation rule management commands.

use std::path::Path;

use colored::Colorize;

use super::AppContext;
use crate::cli::args::{OutputFormat, RuleCommands};
use crate::error::DeskError;
use crate::features::automation::RuleSet;
use crate::output::{format_logs, format_rules, to_json};

/// Execute rule subcommands.
///
/// # Errors
///
/// Returns an error if the database cannot be read or written, or a rule
/// file is invalid.
pub fn rule(ctx: &AppContext, cmd: RuleCommands, format: OutputFormat) -> Result<String, DeskError> {
    match cmd {
        RuleCommands::List => format_rules(&ctx.database.list_rules()?, format),
        RuleCommands::Import { path } => import_rules(ctx, Path::new(&path), format),
        RuleCommands::Export { path } => export_rules(ctx, path.as_deref().map(Path::new), format),
        RuleCommands::Toggle { id, enable, disable } => toggle_rule(ctx, id, enable, disable, format),
        RuleCommands::Logs { rule, limit } => format_logs(&ctx.database.list_logs(rule, limit)?, format),
    }
}

/// Import rules from file.
fn import_rules(ctx: &AppContext, path: &Path, format: OutputFormat) -> Result<String, DeskError> {
    let set = RuleSet::load_file(path)?;
    let now = chrono::Utc::now();

    let mut ids = Vec::with_capacity(set.rules.len());
    for mut rule in set.rules {
        rule.id = None;
        rule.last_run_at = None;
        rule.created_at = None;
        ctx.database.insert_rule(&mut rule, now)?;
        ids.extend(rule.id);
    }

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "imported": ids.len(),
            "ids": ids,
        })),
        OutputFormat::Pretty => Ok(format!(
            "{} Imported {} rules from {}",
            "✓".green(),
            ids.len(),
            path.display()
        )),
    }
}

/// Export rules to a file or stdout.
fn export_rules(ctx: &AppContext, path: Option<&Path>, format: OutputFormat) -> Result<String, DeskError> {
    let set = RuleSet::export(ctx.database.list_rules()?);

    let Some(path) = path else {
        return match format {
            OutputFormat::Json => to_json(&set),
            OutputFormat::Pretty => set.to_yaml(),
        };
    };

    set.save_file(path)?;

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "exported": set.rules.len(),
            "path": path.display().to_string(),
        })),
        OutputFormat::Pretty => Ok(format!(
            "{} Exported {} rules to {}",
            "✓".green(),
            set.rules.len(),
            path.display()
        )),
    }
}

/// Enable or disable a rule. Without a flag the state is flipped.
fn toggle_rule(
    ctx: &AppContext,
    id: i64,
    enable: bool,
    disable: bool,
    format: OutputFormat,
) -> Result<String, DeskError> {
    let current = ctx
        .database
        .list_rules()?
        .into_iter()
        .find(|r| r.id == Some(id))
        .ok_or_else(|| DeskError::NotFound(format!("rule {id}")))?;

    let active = if enable {
        true
    } else if disable {
        false
    } else {
        !current.is_active
    };
    ctx.database.set_rule_active(id, active)?;

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "id": id,
            "name": current.name,
            "is_active": active,
        })),
        OutputFormat::Pretty => {
            let state = if active { "enabled".green() } else { "disabled".yellow() };
            Ok(format!("Rule [{id}] {} {state}", current.name.bold()))
        }
    }
}
