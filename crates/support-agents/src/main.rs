use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resolution::{EventBus, Outcome, OutcomeLog, OutcomeRecord, Ticket};
use support_agents::{
    load_tickets, resolve_batch, spawn_event_logger, AgentConfig, AgentFactory, SystemStatus,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Resolve support tickets with retry and escalation",
    long_about = None
)]
struct Args {
    /// TOML file overriding environment configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the keyword/template/policy agents even when an API key is set
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a single ticket
    Resolve {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        description: String,
        /// Upstream ticket id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Print the full outcome as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Resolve every ticket in a JSON array or JSON Lines file
    Batch {
        #[arg(long)]
        input: PathBuf,
        /// Tickets in flight at once (defaults to the configured value)
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Summarise the outcome log
    History {
        /// Outcome log to read (defaults to the configured path)
        #[arg(long)]
        log: Option<PathBuf>,
        /// List every escalated ticket
        #[arg(long, default_value_t = false)]
        escalations: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show configuration, endpoint reachability and knowledge-base size
    Status {
        /// Skip the endpoint reachability check
        #[arg(long, default_value_t = false)]
        no_probe: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = AgentConfig::load(args.config.as_deref())?;
    info!(
        llm = %config.llm.url,
        model = %config.llm.model,
        data_dir = %config.data_dir.display(),
        "Support agents starting"
    );

    match args.command {
        Command::Resolve {
            subject,
            description,
            id,
            json,
        } => {
            let ticket = match id {
                Some(id) => Ticket::with_id(id, &subject, &description),
                None => Ticket::new(&subject, &description),
            }
            .context("Invalid ticket")?;
            let factory = AgentFactory::new(&config, args.offline)?;
            let outcome = run_one(&factory, ticket).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Command::Batch {
            input,
            concurrency,
            json,
        } => {
            let inputs = load_tickets(&input)?;
            let factory = AgentFactory::new(&config, args.offline)?;
            let events = EventBus::new().shared();
            let logger = spawn_event_logger(&events);
            let controller = Arc::new(factory.build_controller(events.clone()));
            drop(events);

            let report = resolve_batch(
                controller.clone(),
                inputs,
                concurrency.unwrap_or(config.concurrency),
            )
            .await?;
            drop(controller);
            let summary = logger.await.context("Event logger task failed")?;
            info!(events = summary.events, lagged = summary.lagged, "Event log closed");

            for entry in &report.entries {
                match &entry.result {
                    Ok(outcome) if json => println!("{}", serde_json::to_string(outcome)?),
                    Ok(outcome) => println!(
                        "#{:<4} {:<38} {:<10} {:<10} attempts={}",
                        entry.index,
                        outcome.ticket_id(),
                        outcome.tag(),
                        outcome
                            .category()
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "-".into()),
                        outcome.attempt_count()
                    ),
                    Err(e) => eprintln!("#{:<4} invalid ticket: {e}", entry.index),
                }
            }
            if !json {
                println!(
                    "\n{} delivered, {} escalated, {} invalid",
                    report.delivered(),
                    report.escalated(),
                    report.invalid()
                );
            }
        }
        Command::History {
            log,
            escalations,
            json,
        } => {
            let path = log.unwrap_or_else(|| config.outcome_log.clone());
            let history = OutcomeLog::read_from_file(&path)
                .with_context(|| format!("Failed to read outcome log {}", path.display()))?;
            let stats = history.stats();

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            println!("Outcome log: {}", path.display());
            println!(
                "{} outcomes: {} delivered, {} escalated ({:.1}%), average attempts {:.2}",
                stats.total,
                stats.delivered,
                stats.escalated,
                stats.escalation_rate * 100.0,
                stats.average_attempts
            );
            println!(
                "Escalations: {} after rejection, {} after collaborator failure",
                stats.policy_escalations, stats.failure_escalations
            );
            for (category, counts) in &stats.by_category {
                println!(
                    "  {category:<13} delivered={} escalated={}",
                    counts.delivered, counts.escalated
                );
            }

            if escalations {
                println!();
                for record in history.escalations() {
                    if let OutcomeRecord::Escalated {
                        ticket_id,
                        ticket_subject,
                        reason,
                        attempt_count,
                        recorded_at,
                        ..
                    } = record
                    {
                        println!(
                            "{recorded_at} {ticket_id} \"{ticket_subject}\" attempts={attempt_count}: {reason}"
                        );
                    }
                }
            }
        }
        Command::Status { no_probe, json } => {
            let factory = AgentFactory::new(&config, args.offline)?;
            let status = SystemStatus::collect(&factory, !no_probe).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{status}");
            }
        }
    }

    Ok(())
}

async fn run_one(factory: &AgentFactory, ticket: Ticket) -> Outcome {
    let events = EventBus::new().shared();
    let logger = spawn_event_logger(&events);
    let controller = factory.build_controller(events.clone());
    drop(events);

    let outcome = controller.resolve(ticket).await;
    drop(controller);
    if let Err(e) = logger.await {
        tracing::warn!("Event logger task failed: {e}");
    }
    outcome
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Delivered(delivery) => {
            println!(
                "Delivered ({}, {} attempt(s))\n",
                delivery.category,
                delivery.attempt_count()
            );
        }
        Outcome::Escalated(escalation) => {
            println!(
                "Escalated after {} attempt(s): {}\n",
                escalation.attempt_count, escalation.reason
            );
        }
    }
    println!("{}", outcome.customer_message());
}
