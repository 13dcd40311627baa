//! Profile and agent command implementations.

use colored::Colorize;

use super::AppContext;
use crate::cli::args::{AgentCommands, OutputFormat, ProfileCommands};
use crate::error::DeskError;
use crate::features::sla::SlaProfile;
use crate::output::{format_agents, format_profiles, to_json};
use crate::storage::Agent;
use crate::tickets::Priority;

/// Execute profile subcommands.
///
/// # Errors
///
/// Returns an error if the profile is invalid or the database fails.
pub fn profile(
    ctx: &AppContext,
    cmd: ProfileCommands,
    format: OutputFormat,
) -> Result<String, DeskError> {
    match cmd {
        ProfileCommands::Add {
            name,
            response,
            resolution,
            business_hours,
            multipliers,
            standard_multipliers,
            default,
        } => {
            let mut profile = SlaProfile::new(name, response, resolution).business_hours(business_hours);
            if standard_multipliers {
                profile = profile.with_standard_multipliers();
            }
            for spec in &multipliers {
                let (priority, factor) = parse_multiplier(spec)?;
                profile = profile.with_multiplier(priority, factor);
            }
            if default {
                profile = profile.as_default();
            }

            ctx.database.insert_profile(&mut profile)?;

            match format {
                OutputFormat::Json => to_json(&profile),
                OutputFormat::Pretty => Ok(format!(
                    "{} Added SLA profile [{}] {}",
                    "✓".green(),
                    profile.id,
                    profile.name.bold()
                )),
            }
        }
        ProfileCommands::List => format_profiles(&ctx.database.list_profiles()?, format),
        ProfileCommands::Default { id } => {
            ctx.database.set_default_profile(id)?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "default_profile": id })),
                OutputFormat::Pretty => Ok(format!("{} Profile [{id}] is now the default", "✓".green())),
            }
        }
    }
}

/// Execute agent subcommands.
///
/// # Errors
///
/// Returns an error if the database fails.
pub fn agent(ctx: &AppContext, cmd: AgentCommands, format: OutputFormat) -> Result<String, DeskError> {
    match cmd {
        AgentCommands::Add { id, name } => {
            let agent = Agent { id, name };
            ctx.database.upsert_agent(&agent)?;
            match format {
                OutputFormat::Json => to_json(&agent),
                OutputFormat::Pretty => Ok(format!("{} Saved agent {}", "✓".green(), agent.id.bold())),
            }
        }
        AgentCommands::List => format_agents(&ctx.database.list_agents()?, format),
    }
}

/// Parse `PRIORITY=FACTOR`.
fn parse_multiplier(spec: &str) -> Result<(Priority, f64), DeskError> {
    let (priority, factor) = spec.split_once('=').ok_or_else(|| {
        DeskError::InvalidArgument(format!("multiplier '{spec}' should look like high=0.5"))
    })?;
    let priority = priority.parse::<Priority>()?;
    let factor = factor
        .trim()
        .parse::<f64>()
        .map_err(|_| DeskError::InvalidArgument(format!("invalid multiplier factor in '{spec}'")))?;
    Ok((priority, factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiplier() {
        assert_eq!(parse_multiplier("high=0.5").unwrap(), (Priority::High, 0.5));
        assert_eq!(parse_multiplier("Critical= 0.25").unwrap(), (Priority::Critical, 0.25));
        assert!(parse_multiplier("high").is_err());
        assert!(parse_multiplier("urgent=1").is_err());
        assert!(parse_multiplier("low=fast").is_err());
    }
}
