use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use equipment_lending::{
    auth::Role,
    config, db,
    services::{
        audit::AuditService,
        reports::{InventorySummary, ReportService},
        users::UserService,
    },
};

#[derive(Parser)]
#[command(
    name = "lending-admin",
    about = "Operator tooling for the equipment lending backend",
    version
)]
struct Cli {
    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an account, optionally with the admin role
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, action = ArgAction::SetTrue)]
        admin: bool,
    },
    /// Print the inventory summary
    Summary {
        /// Restrict to one category
        #[arg(long)]
        category: Option<Uuid>,
    },
}

#[derive(Serialize)]
struct CreatedUser {
    id: Uuid,
    username: String,
    role: Role,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    let pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    let db = Arc::new(pool);

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&db)
                .await
                .context("failed to run migrations")?;
            if cli.json {
                print_json(&serde_json::json!({ "migrated": true }))?;
            } else {
                println!("Migrations applied");
            }
        }
        Commands::CreateUser {
            username,
            password,
            admin,
        } => {
            let audit = Arc::new(AuditService::new(db.clone()));
            let users = UserService::new(db.clone(), audit);
            let role = if admin { Role::Admin } else { Role::User };
            let user = users
                .create_user(&username, &password, role)
                .await
                .with_context(|| format!("failed to create user '{}'", username))?;

            let created = CreatedUser {
                id: user.id,
                username: user.username,
                role: user.role,
            };
            if cli.json {
                print_json(&created)?;
            } else {
                println!(
                    "Created {} account {} ({})",
                    created.role.as_str(),
                    created.username,
                    created.id
                );
            }
        }
        Commands::Summary { category } => {
            let reports = ReportService::new(db.clone());
            let summary = reports
                .inventory_summary(category)
                .await
                .context("failed to build inventory summary")?;
            if cli.json {
                print_json(&summary)?;
            } else {
                render_summary(&summary);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_summary(summary: &InventorySummary) {
    if summary.items.is_empty() {
        println!("No items tracked");
        return;
    }
    for row in &summary.items {
        println!(
            "- {} [{}] • on hand {} • on loan {} • open borrows {} • broken {}",
            row.item_name,
            row.category_name.as_deref().unwrap_or("uncategorized"),
            row.on_hand,
            row.on_loan,
            row.open_borrows,
            row.reported_broken
        );
    }
    let totals = &summary.totals;
    println!(
        "Totals: on hand {} • on loan {} • tracked {} • broken {}",
        totals.on_hand, totals.on_loan, totals.total_tracked, totals.reported_broken
    );
}
