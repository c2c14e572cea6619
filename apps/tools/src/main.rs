use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use server_api::{profile, ApiContext};
use shared::{
    domain::{
        AccessLevel, AssignmentStatus, NewProfile, ProfileId, RelationStatus, UserType,
        VerificationStatus,
    },
    error::ApiException,
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Operator commands that act directly on the coordinator database.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/coordinator.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateProfile {
        full_name: String,
        email: String,
        #[arg(long, default_value = "volunteer")]
        user_type: UserType,
        #[arg(long, default_value = "")]
        location: String,
        /// Comma separated.
        #[arg(long, default_value = "")]
        skills: String,
        #[arg(long)]
        verified: bool,
    },
    VerifyProfile {
        user_id: Uuid,
        #[arg(long, default_value = "verified")]
        status: VerificationStatus,
    },
    RecordActivity {
        user_id: Uuid,
        activity_type: String,
        points: u32,
        #[arg(long, default_value = "")]
        description: String,
    },
    CreateOpportunity {
        title: String,
        #[arg(long)]
        location: Option<String>,
    },
    CreateEvent {
        title: String,
        #[arg(long)]
        location: Option<String>,
    },
    AssignOpportunity {
        user_id: Uuid,
        title: String,
        #[arg(long, default_value = "assigned")]
        status: AssignmentStatus,
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },
    ListRelations {
        partner_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let api = ApiContext::new(Storage::new(&cli.database_url).await?);
    run(&api, cli.command).await
}

async fn run(api: &ApiContext, command: Command) -> Result<()> {
    let storage = &api.storage;
    match command {
        Command::CreateProfile {
            full_name,
            email,
            user_type,
            location,
            skills,
            verified,
        } => {
            let (verification_status, access_level) = if verified {
                (VerificationStatus::Verified, AccessLevel::FullAccess)
            } else {
                (VerificationStatus::InVerification, AccessLevel::ReadOnly)
            };
            let Some(id) = storage.create_identity(&email).await? else {
                bail!("an account for {email} already exists");
            };
            let profile = storage
                .insert_profile(&NewProfile {
                    id,
                    full_name,
                    email,
                    location,
                    bio: String::new(),
                    user_type,
                    skills: shared::forms::split_list(&skills),
                    interests: Vec::new(),
                    verification_status,
                    access_level,
                })
                .await?;
            info!(user_id = %profile.id, "profile created");
            println!("created profile id={}", profile.id);
        }
        Command::VerifyProfile { user_id, status } => {
            let access = match status {
                VerificationStatus::Verified => AccessLevel::FullAccess,
                _ => AccessLevel::ReadOnly,
            };
            match storage
                .set_verification(ProfileId(user_id), status, access)
                .await?
            {
                Some(profile) => println!(
                    "profile {} is now {} ({})",
                    profile.id, profile.verification_status, profile.access_level
                ),
                None => bail!("no profile with id {user_id}"),
            }
        }
        Command::RecordActivity {
            user_id,
            activity_type,
            points,
            description,
        } => {
            let activity = profile::record_activity(
                api,
                ProfileId(user_id),
                &activity_type,
                &description,
                points,
            )
            .await
            .map_err(ApiException::from)?;
            println!(
                "recorded activity id={} points={}",
                activity.id, activity.points_earned
            );
        }
        Command::CreateOpportunity { title, location } => {
            let id = storage
                .create_opportunity(&title, location.as_deref())
                .await?;
            println!("created opportunity id={}", id.0);
        }
        Command::CreateEvent { title, location } => {
            let id = storage.create_event(&title, location.as_deref()).await?;
            println!("created event id={}", id.0);
        }
        Command::AssignOpportunity {
            user_id,
            title,
            status,
            start_date,
        } => {
            let assignment = storage
                .assign_opportunity(ProfileId(user_id), &title, status, start_date)
                .await?;
            println!("assigned opportunity id={}", assignment.id);
        }
        Command::ListRelations { partner_id } => {
            let relations = storage
                .partner_relations(ProfileId(partner_id), RelationStatus::ALL, None)
                .await?;
            for entry in relations {
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.relation.id,
                    entry.relation.status,
                    entry.relation.invitation_type,
                    entry.counterpart.full_name
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
