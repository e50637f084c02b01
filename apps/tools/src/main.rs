use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use client_core::{CoordinatorOptions, DurableRecordStore, RecordController};
use serde::de::DeserializeOwned;
use shared::{
    domain::{
        ContactStatus, Expense, ExpenseCategory, ExpensePatch, NetworkContact,
        NetworkContactPatch, PartnerBalance, PartnerBalancePatch, RecordId, Vessel, VesselPatch,
        WorkItem, WorkItemPatch,
    },
    record::Record,
};
use tracing::{error, info};

mod config;

use config::{load_settings, normalize_database_url};

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Expenses(ExpenseCommand),
    #[command(subcommand)]
    Balances(BalanceCommand),
    #[command(subcommand)]
    Contacts(ContactCommand),
    #[command(subcommand)]
    Vessels(VesselCommand),
    #[command(subcommand)]
    WorkItems(WorkItemCommand),
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    List,
    Add {
        #[arg(long)]
        description: String,
        #[arg(long, allow_negative_numbers = true)]
        amount_cents: i64,
        #[arg(long, value_parser = parse_snake::<ExpenseCategory>, default_value = "material")]
        category: ExpenseCategory,
        #[arg(long)]
        partner: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        /// Defaults to today.
        #[arg(long)]
        incurred_on: Option<NaiveDate>,
    },
    Update {
        id: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        amount_cents: Option<i64>,
        #[arg(long, value_parser = parse_snake::<ExpenseCategory>)]
        category: Option<ExpenseCategory>,
        #[arg(long)]
        partner: Option<String>,
        #[arg(long, conflicts_with = "partner")]
        clear_partner: bool,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum BalanceCommand {
    List,
    /// Creates the partner's balance or overwrites the existing one.
    Set {
        partner: String,
        #[arg(allow_negative_numbers = true)]
        balance_cents: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ContactCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Status {
        id: String,
        #[arg(value_parser = parse_snake::<ContactStatus>)]
        status: ContactStatus,
    },
    Note {
        id: String,
        notes: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum VesselCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        hull_number: Option<String>,
    },
    Rename {
        id: String,
        name: String,
    },
    /// Sets the hull number, or clears it when none is given.
    Hull {
        id: String,
        hull_number: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum WorkItemCommand {
    List {
        #[arg(long)]
        vessel_id: Option<String>,
    },
    Add {
        #[arg(long)]
        vessel_id: String,
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        department_id: String,
        title: String,
    },
    Progress {
        id: String,
        percent: u8,
    },
    Complete {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let raw_database_url = cli.database_url.as_deref().unwrap_or(&settings.database_url);
    let database_url = normalize_database_url(raw_database_url);
    let store = DurableRecordStore::open(&database_url)
        .await
        .map_err(|error| {
            let reason = format!("{error:#}");
            error!(
                %database_url,
                error = %reason,
                "tools: failed to open document store"
            );
            error
        })?;
    info!(%database_url, "tools: document store ready");

    let session = Session {
        store: Arc::new(store),
        options: CoordinatorOptions {
            event_capacity: settings.event_capacity,
        },
    };

    match cli.command {
        Command::Expenses(command) => run_expenses(&session, command).await,
        Command::Balances(command) => run_balances(&session, command).await,
        Command::Contacts(command) => run_contacts(&session, command).await,
        Command::Vessels(command) => run_vessels(&session, command).await,
        Command::WorkItems(command) => run_work_items(&session, command).await,
    }
}

struct Session {
    store: Arc<DurableRecordStore>,
    options: CoordinatorOptions,
}

impl Session {
    async fn loaded<R: Record<Key = RecordId>>(&self) -> Result<RecordController<R>> {
        let controller = RecordController::with_options(self.store.clone(), self.options.clone());
        if !controller.load().await {
            return Err(failure(&controller));
        }
        Ok(controller)
    }
}

async fn run_expenses(session: &Session, command: ExpenseCommand) -> Result<()> {
    let controller = session.loaded::<Expense>().await?;
    match command {
        ExpenseCommand::List => print_records(&controller.coordinator().items()),
        ExpenseCommand::Add {
            description,
            amount_cents,
            category,
            partner,
            project_id,
            incurred_on,
        } => {
            let mut expense = Expense::draft(
                description,
                amount_cents,
                category,
                incurred_on.unwrap_or_else(|| Utc::now().date_naive()),
            );
            expense.partner = partner;
            expense.project_id = project_id.map(RecordId::from);
            create(&controller, expense).await
        }
        ExpenseCommand::Update {
            id,
            description,
            amount_cents,
            category,
            partner,
            clear_partner,
        } => {
            let partner = if clear_partner { Some(None) } else { partner.map(Some) };
            let patch = ExpensePatch {
                description,
                amount_cents,
                category,
                partner,
                ..ExpensePatch::default()
            };
            update(&controller, RecordId::from(id), patch).await
        }
        ExpenseCommand::Delete { id } => remove(&controller, RecordId::from(id)).await,
    }
}

async fn run_balances(session: &Session, command: BalanceCommand) -> Result<()> {
    let controller = session.loaded::<PartnerBalance>().await?;
    match command {
        BalanceCommand::List => print_records(&controller.coordinator().items()),
        BalanceCommand::Set {
            partner,
            balance_cents,
        } => {
            let existing = controller
                .coordinator()
                .items()
                .into_iter()
                .find(|balance| balance.partner_name.eq_ignore_ascii_case(&partner));
            match existing {
                Some(balance) => {
                    let patch = PartnerBalancePatch {
                        balance_cents: Some(balance_cents),
                        ..PartnerBalancePatch::default()
                    };
                    update(&controller, balance.id, patch).await
                }
                None => {
                    let balance = PartnerBalance {
                        id: RecordId::default(),
                        partner_name: partner,
                        balance_cents,
                        updated_at: Utc::now(),
                    };
                    create(&controller, balance).await
                }
            }
        }
    }
}

async fn run_contacts(session: &Session, command: ContactCommand) -> Result<()> {
    let controller = session.loaded::<NetworkContact>().await?;
    match command {
        ContactCommand::List => print_records(&controller.coordinator().items()),
        ContactCommand::Add {
            name,
            company,
            phone,
            email,
        } => {
            let mut contact = NetworkContact::lead(name);
            contact.company = company;
            contact.phone = phone;
            contact.email = email;
            create(&controller, contact).await
        }
        ContactCommand::Status { id, status } => {
            let patch = NetworkContactPatch {
                status: Some(status),
                ..NetworkContactPatch::default()
            };
            update(&controller, RecordId::from(id), patch).await
        }
        ContactCommand::Note { id, notes } => {
            let patch = NetworkContactPatch {
                notes: Some(notes),
                ..NetworkContactPatch::default()
            };
            update(&controller, RecordId::from(id), patch).await
        }
        ContactCommand::Delete { id } => remove(&controller, RecordId::from(id)).await,
    }
}

async fn run_vessels(session: &Session, command: VesselCommand) -> Result<()> {
    let controller = session.loaded::<Vessel>().await?;
    match command {
        VesselCommand::List => print_records(&controller.coordinator().items()),
        VesselCommand::Add { name, hull_number } => {
            let vessel = Vessel {
                id: RecordId::default(),
                name,
                hull_number,
            };
            create(&controller, vessel).await
        }
        VesselCommand::Rename { id, name } => {
            let patch = VesselPatch {
                name: Some(name),
                ..VesselPatch::default()
            };
            update(&controller, RecordId::from(id), patch).await
        }
        VesselCommand::Hull { id, hull_number } => {
            let patch = VesselPatch {
                hull_number: Some(hull_number),
                ..VesselPatch::default()
            };
            update(&controller, RecordId::from(id), patch).await
        }
        VesselCommand::Delete { id } => remove(&controller, RecordId::from(id)).await,
    }
}

async fn run_work_items(session: &Session, command: WorkItemCommand) -> Result<()> {
    let controller = session.loaded::<WorkItem>().await?;
    match command {
        WorkItemCommand::List { vessel_id } => {
            let items: Vec<WorkItem> = controller
                .coordinator()
                .items()
                .into_iter()
                .filter(|item| {
                    vessel_id
                        .as_deref()
                        .map_or(true, |vessel| item.vessel_id.as_str() == vessel)
                })
                .collect();
            print_records(&items)
        }
        WorkItemCommand::Add {
            vessel_id,
            project_id,
            department_id,
            title,
        } => {
            let item = WorkItem::planned(
                RecordId::from(vessel_id),
                RecordId::from(project_id),
                RecordId::from(department_id),
                title,
            );
            create(&controller, item).await
        }
        WorkItemCommand::Progress { id, percent } => {
            let patch = WorkItemPatch {
                progress_percent: Some(percent),
                ..WorkItemPatch::default()
            };
            update(&controller, RecordId::from(id), patch).await
        }
        WorkItemCommand::Complete { id } => {
            update(&controller, RecordId::from(id), WorkItemPatch::completed()).await
        }
        WorkItemCommand::Delete { id } => remove(&controller, RecordId::from(id)).await,
    }
}

async fn create<R: Record>(controller: &RecordController<R>, candidate: R) -> Result<()> {
    match controller.create(candidate).await {
        Some(id) => {
            println!("created {} id={id}", R::COLLECTION);
            Ok(())
        }
        None => Err(failure(controller)),
    }
}

async fn update<R: Record>(
    controller: &RecordController<R>,
    id: R::Key,
    patch: R::Patch,
) -> Result<()> {
    if !controller.update(id.clone(), patch).await {
        return Err(failure(controller));
    }
    println!("updated {} id={id}", R::COLLECTION);
    Ok(())
}

async fn remove<R: Record>(controller: &RecordController<R>, id: R::Key) -> Result<()> {
    if !controller.remove(id.clone()).await {
        return Err(failure(controller));
    }
    println!("deleted {} id={id}", R::COLLECTION);
    Ok(())
}

fn print_records<R: Record>(records: &[R]) -> Result<()> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

fn failure<R: Record>(controller: &RecordController<R>) -> anyhow::Error {
    match controller.coordinator().error() {
        Some(err) => anyhow::Error::new(err),
        None => anyhow!("{} operation failed", R::COLLECTION),
    }
}

/// Parses a snake_case enum value the same way documents store it.
fn parse_snake<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| format!("unrecognised value '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_snake_case_enum_values() {
        assert_eq!(
            parse_snake::<ExpenseCategory>("Equipment"),
            Ok(ExpenseCategory::Equipment)
        );
        assert_eq!(
            parse_snake::<ContactStatus>("dormant"),
            Ok(ContactStatus::Dormant)
        );
        assert!(parse_snake::<ContactStatus>("archived").is_err());
    }

    #[test]
    fn expense_update_can_clear_partner() {
        let cli = Cli::try_parse_from(["tools", "expenses", "update", "e1", "--clear-partner"])
            .expect("parse");
        match cli.command {
            Command::Expenses(ExpenseCommand::Update {
                partner,
                clear_partner,
                ..
            }) => {
                assert_eq!(partner, None);
                assert!(clear_partner);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from([
            "tools",
            "expenses",
            "update",
            "e1",
            "--partner",
            "Nordic Steel",
            "--clear-partner",
        ])
        .is_err());
    }

    #[test]
    fn parses_nested_work_item_command() {
        let cli = Cli::try_parse_from([
            "tools",
            "--database-url",
            "sqlite::memory:",
            "work-items",
            "add",
            "--vessel-id",
            "v1",
            "--project-id",
            "p1",
            "--department-id",
            "d1",
            "blast and paint",
        ])
        .expect("parse");

        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
        match cli.command {
            Command::WorkItems(WorkItemCommand::Add { title, .. }) => {
                assert_eq!(title, "blast and paint");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
