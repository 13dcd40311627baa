use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::tickets::{Priority, TicketStatus};

#[derive(Parser)]
#[command(name = "deskflow")]
#[command(about = "SLA deadlines and automation rules for a helpdesk")]
#[command(long_about = "deskflow - SLA deadline and automation rule engine

Tracks response and resolution deadlines for tickets, optionally counted in
business hours only, and runs automation rules when tickets change, SLAs
breach, tasks fall due, or cron schedules fire.

QUICK START:
  deskflow profile add Standard --response 240 --resolution 1440 --default
  deskflow ticket create \"Printer jammed\" --priority high
  deskflow rule import rules.yaml
  deskflow sweep                    Check deadlines and run scheduled rules

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

Data lives in ~/.deskflow/ unless DESKFLOW_HOME is set.")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output, or 'json' for
    /// machine-readable output. Defaults to `general.default_output`.
    #[arg(short, long, value_enum, global = true, env = "DESKFLOW_OUTPUT")]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage SLA profiles
    ///
    /// A profile sets the response and resolution targets in minutes.
    /// Priority multipliers scale them per ticket; exactly one profile can
    /// be the default used for new tickets.
    ///
    /// # Examples
    ///
    ///   deskflow profile add Standard --response 240 --resolution 1440 --default
    ///   deskflow profile add Gold --response 60 --resolution 480 -m critical=0.25
    ///   deskflow profile list
    Profile(ProfileArgs),

    /// Manage agents that tickets and tasks can be assigned to
    Agent(AgentArgs),

    /// Create, inspect and update tickets
    ///
    /// # Examples
    ///
    ///   deskflow ticket create "VPN down" --priority critical --tag network
    ///   deskflow ticket status 3 in_progress
    ///   deskflow ticket respond 3
    ///   deskflow ticket history 3
    #[command(alias = "t")]
    Ticket(TicketArgs),

    /// Create and list tasks
    Task(TaskArgs),

    /// Manage automation rules
    ///
    /// Rules are kept in the database. Import and export move them as YAML
    /// rule sets.
    ///
    /// # Examples
    ///
    ///   deskflow rule import rules.yaml
    ///   deskflow rule list
    ///   deskflow rule toggle 2 --disable
    ///   deskflow rule logs --rule 2
    Rule(RuleArgs),

    /// Run one sweep
    ///
    /// Marks missed SLA deadlines as breached, announces tasks that fell
    /// due, and runs cron rules whose window has come up. Each finding is
    /// dispatched to the matching rules.
    Sweep,

    /// Run the sweep repeatedly
    ///
    /// Sweeps every `automation.sweep_interval_secs` seconds until stopped.
    Watch {
        /// Seconds between sweeps (overrides the config)
        #[arg(long, short = 'i')]
        interval: Option<u64>,

        /// Stop after this many sweeps
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommands,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Add an SLA profile
    Add {
        /// Profile name
        name: String,

        /// Response target in minutes
        #[arg(long, short = 'r')]
        response: i64,

        /// Resolution target in minutes
        #[arg(long, short = 's')]
        resolution: i64,

        /// Count only business hours
        #[arg(long)]
        business_hours: bool,

        /// Priority multiplier as PRIORITY=FACTOR, repeatable
        #[arg(long = "multiplier", short = 'm')]
        multipliers: Vec<String>,

        /// Use low=2, medium=1, high=0.5, critical=0.25
        #[arg(long, conflicts_with = "multipliers")]
        standard_multipliers: bool,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// List SLA profiles
    List,

    /// Make a profile the default
    Default {
        /// Profile ID
        id: i64,
    },
}

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommands,
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Add or rename an agent
    Add {
        /// Agent ID used in assignments
        id: String,

        /// Display name
        name: String,
    },

    /// List agents
    List,
}

#[derive(Args)]
pub struct TicketArgs {
    #[command(subcommand)]
    pub command: TicketCommands,
}

#[derive(Subcommand)]
pub enum TicketCommands {
    /// Open a new ticket
    ///
    /// The ticket is bound to the given profile, or the default profile,
    /// and its deadlines are computed from now.
    Create {
        /// Ticket title
        title: String,

        /// Priority: low, medium, high, critical
        #[arg(long, short = 'p', default_value = "medium")]
        priority: Priority,

        /// SLA profile ID
        #[arg(long)]
        profile: Option<i64>,

        /// Assignee agent ID
        #[arg(long, short = 'a')]
        assignee: Option<String>,

        /// Organization ID
        #[arg(long)]
        org: Option<String>,

        /// Tag, repeatable
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },

    /// List tickets
    #[command(alias = "ls")]
    List {
        /// Include resolved and closed tickets
        #[arg(long)]
        all: bool,
    },

    /// Show a ticket with its history
    Show {
        /// Ticket ID
        id: i64,
    },

    /// Change a ticket's status
    Status {
        /// Ticket ID
        id: i64,

        /// New status: open, pending, in_progress, waiting, resolved, closed
        status: TicketStatus,
    },

    /// Change a ticket's priority
    Priority {
        /// Ticket ID
        id: i64,

        /// New priority
        priority: Priority,
    },

    /// Record the first agent response
    Respond {
        /// Ticket ID
        id: i64,
    },

    /// Move a ticket to another SLA profile and recompute its deadlines
    Reassign {
        /// Ticket ID
        id: i64,

        /// SLA profile ID
        profile: i64,
    },

    /// Show a ticket's audit trail
    History {
        /// Ticket ID
        id: i64,
    },
}

#[derive(Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Link the task to a ticket
        #[arg(long)]
        ticket: Option<i64>,

        /// Priority
        #[arg(long, short = 'p', default_value = "medium")]
        priority: Priority,

        /// Assignee agent ID
        #[arg(long, short = 'a')]
        assignee: Option<String>,

        /// Due in this many minutes
        #[arg(long)]
        due_in: Option<i64>,

        /// Description
        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// List tasks
    List {
        /// Only tasks linked to this ticket
        #[arg(long)]
        ticket: Option<i64>,
    },
}

#[derive(Args)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommands,
}

#[derive(Subcommand)]
pub enum RuleCommands {
    /// List all automation rules
    List,

    /// Import rules from a YAML rule set
    ///
    /// Every rule is validated before any is stored.
    Import {
        /// Path to YAML file
        path: String,
    },

    /// Export rules to a YAML rule set
    Export {
        /// Output file; prints to stdout when omitted
        path: Option<String>,
    },

    /// Enable or disable a rule
    Toggle {
        /// Rule ID
        id: i64,

        /// Explicitly enable
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Explicitly disable
        #[arg(long)]
        disable: bool,
    },

    /// Show the automation log, newest first
    Logs {
        /// Only entries for this rule
        #[arg(long, short = 'r')]
        rule: Option<i64>,

        /// Maximum number of entries
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_output_format_default() {
        let cli = Cli::try_parse_from(["deskflow", "sweep"]).unwrap();
        assert!(cli.output.is_none());
    }

    #[test]
    fn test_cli_output_format_json() {
        let cli = Cli::try_parse_from(["deskflow", "--output", "json", "sweep"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_cli_output_format_short() {
        let cli = Cli::try_parse_from(["deskflow", "sweep", "-o", "json"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_ticket_create_parses_priority_and_tags() {
        let cli = Cli::try_parse_from([
            "deskflow", "ticket", "create", "VPN down", "-p", "critical", "-t", "network", "-t",
            "vip",
        ])
        .unwrap();

        match cli.command {
            Commands::Ticket(TicketArgs {
                command: TicketCommands::Create { title, priority, tags, .. },
            }) => {
                assert_eq!(title, "VPN down");
                assert_eq!(priority, Priority::Critical);
                assert_eq!(tags, vec!["network", "vip"]);
            }
            _ => panic!("expected ticket create"),
        }
    }

    #[test]
    fn test_ticket_status_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["deskflow", "ticket", "status", "1", "done"]).is_err());

        let cli = Cli::try_parse_from(["deskflow", "t", "status", "1", "in_progress"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ticket(TicketArgs {
                command: TicketCommands::Status {
                    id: 1,
                    status: TicketStatus::InProgress
                }
            })
        ));
    }

    #[test]
    fn test_profile_add() {
        let cli = Cli::try_parse_from([
            "deskflow", "profile", "add", "Gold", "-r", "60", "-s", "480", "-m", "high=0.5",
            "--default",
        ])
        .unwrap();

        match cli.command {
            Commands::Profile(ProfileArgs {
                command: ProfileCommands::Add { name, response, multipliers, default, .. },
            }) => {
                assert_eq!(name, "Gold");
                assert_eq!(response, 60);
                assert_eq!(multipliers, vec!["high=0.5"]);
                assert!(default);
            }
            _ => panic!("expected profile add"),
        }
    }

    #[test]
    fn test_rule_toggle_flags_conflict() {
        assert!(Cli::try_parse_from(["deskflow", "rule", "toggle", "1", "--enable", "--disable"]).is_err());
    }

    #[test]
    fn test_watch_args() {
        let cli = Cli::try_parse_from(["deskflow", "watch", "-i", "5", "--count", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Watch {
                interval: Some(5),
                count: Some(2)
            }
        ));
    }
}
