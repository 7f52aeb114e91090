// src/admin_cli.rs
use crate::core::{ConfigManager, Database};
use crate::facebook_extraction::FacebookExtractor;
use crate::repository::{AgencyRepository, FacebookListingRepository, StatsRepository, UserRepository};
use crate::types::{AgencyStatus, NewFacebookListing, UserRole};
use crate::utils::clean_optional;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Args)]
#[command(about = "Operator commands for the sublease marketplace")]
pub struct AdminCli {
    #[command(subcommand)]
    pub command: AdminCommand,

    /// Overrides the database path from config.yaml
    #[arg(long)]
    pub database_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Initialize the database
    Init,
    /// List agencies, optionally by status (pending, verified, rejected)
    ListAgencies {
        #[arg(long)]
        status: Option<String>,
    },
    /// Mark an agency as verified
    VerifyAgency { id: i64 },
    /// Mark an agency as rejected
    RejectAgency { id: i64 },
    /// Give an existing user the admin role
    GrantAdmin { email: String },
    /// Print dashboard counters
    Stats,
    /// Import Facebook posts from a CSV file (post_text,post_url,author_name)
    ImportFacebook { csv_file: PathBuf },
}

#[derive(Debug, Deserialize)]
struct FacebookCsvRow {
    post_text: String,
    #[serde(default)]
    post_url: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Run pattern-matching extraction on every CSV row and store the results
pub async fn import_facebook_csv(
    db: &Database,
    content: &str,
    reference: NaiveDate,
) -> Result<ImportSummary> {
    let repo = FacebookListingRepository::new(db.pool());
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut summary = ImportSummary::default();

    for (line, result) in reader.deserialize::<FacebookCsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                summary.failed += 1;
                app_log!(warn, "❌ CSV parsing error on row {}: {}", line + 1, e);
                continue;
            }
        };

        if row.post_text.trim().is_empty() {
            summary.skipped += 1;
            app_log!(info, "⚠️  Skipping row {} without post text", line + 1);
            continue;
        }

        let extraction = FacebookExtractor::extract_heuristics(&row.post_text, reference);
        let listing = NewFacebookListing {
            submitted_by: None,
            post_url: clean_optional(row.post_url),
            author_name: clean_optional(row.author_name),
            post_text: row.post_text,
            image_paths: Vec::new(),
            extraction,
        };

        match repo.insert(&listing).await {
            Ok(stored) => {
                summary.imported += 1;
                app_log!(info, "✅ Imported row {} as listing {}: {}", line + 1, stored.id, stored.title);
            }
            Err(e) => {
                summary.failed += 1;
                app_log!(error, "❌ Failed to import row {}: {}", line + 1, e);
            }
        }
    }

    Ok(summary)
}

pub async fn handle_admin_command(cli: AdminCli, config: &ConfigManager) -> Result<()> {
    let database_path = cli
        .database_path
        .clone()
        .unwrap_or_else(|| config.database.path.clone());
    let db = Database::new(&database_path).await?;

    match cli.command {
        AdminCommand::Init => {
            app_log!(info, "✅ Database initialized at: {}", database_path.display());
            app_log!(info, "   Ready for: psu-sublease admin grant-admin <email>");
        }

        AdminCommand::ListAgencies { status } => {
            let status = clean_optional(status)
                .map(|raw| raw.parse::<AgencyStatus>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            let agencies = AgencyRepository::new(db.pool()).list_by_status(status).await?;

            if agencies.is_empty() {
                app_log!(info, "No agencies found.");
            } else {
                app_log!(
                    info,
                    "{:<5} {:<30} {:<30} {:<10} {:<20}",
                    "ID", "Name", "Email", "Status", "Created"
                );
                app_log!(info, "{}", "-".repeat(95));
                for agency in agencies {
                    app_log!(
                        info,
                        "{:<5} {:<30} {:<30} {:<10} {:<20}",
                        agency.id,
                        agency.name,
                        agency.email,
                        agency.status.as_str(),
                        agency.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        AdminCommand::VerifyAgency { id } => {
            set_agency_status(&db, id, AgencyStatus::Verified).await?;
        }

        AdminCommand::RejectAgency { id } => {
            set_agency_status(&db, id, AgencyStatus::Rejected).await?;
        }

        AdminCommand::GrantAdmin { email } => {
            let users = UserRepository::new(db.pool());
            if users.set_role_by_email(&email, UserRole::Admin).await? {
                app_log!(info, "✅ {} is now an admin", email);
            } else {
                app_log!(
                    info,
                    "❌ No user with email {}. They need to sign in once first, or add them to auth.admin_emails",
                    email
                );
            }
        }

        AdminCommand::Stats => {
            let stats = StatsRepository::new(db.pool()).collect().await?;
            app_log!(info, "Users:                  {} ({} students, {} admins)", stats.users, stats.students, stats.admins);
            app_log!(info, "Sublease listings:      {} active / {} total", stats.sublease_listings_active, stats.sublease_listings_total);
            app_log!(info, "Listings last 7 days:   {}", stats.listings_last_7_days);
            app_log!(info, "Agencies:               {} pending, {} verified, {} rejected", stats.agencies_pending, stats.agencies_verified, stats.agencies_rejected);
            app_log!(info, "Agency listings:        {}", stats.agency_listings);
            app_log!(info, "Sublease requests:      {}", stats.sublease_requests);
            app_log!(info, "Facebook listings:      {}", stats.facebook_listings);
        }

        AdminCommand::ImportFacebook { csv_file } => {
            let content = tokio::fs::read_to_string(&csv_file)
                .await
                .with_context(|| format!("Failed to read CSV file: {}", csv_file.display()))?;

            let summary = import_facebook_csv(&db, &content, Utc::now().date_naive()).await?;

            app_log!(info, "Import completed:");
            app_log!(info, "  ✅ Imported: {}", summary.imported);
            app_log!(info, "  ⚠️  Skipped:  {}", summary.skipped);
            app_log!(info, "  ❌ Failed:   {}", summary.failed);
        }
    }

    Ok(())
}

async fn set_agency_status(db: &Database, id: i64, status: AgencyStatus) -> Result<()> {
    match AgencyRepository::new(db.pool()).set_status(id, status).await? {
        Some(agency) => {
            app_log!(info, "✅ Agency {} ({}) is now {}", agency.id, agency.name, status.as_str());
        }
        None => {
            app_log!(info, "❌ No agency with id {}", id);
        }
    }
    Ok(())
}
