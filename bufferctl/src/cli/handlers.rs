//! Command execution handlers

use anyhow::Result;
use buffer_core::{ErrorReport, Profile, Update};
use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::{BufferClient, NewUpdate, UpdateEdit};
use crate::config::{self, CliConfig, ConfigStore};
use crate::format::{format_output, format_success, OutputFormat};
use crate::http::RetryPolicy;

use super::commands::*;

/// Delay before the first retry of a read-only request.
const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// A command that reached the API but was refused in the response body.
#[derive(Error, Debug)]
#[error("{}: {}", .0.code, .0.message)]
pub struct CommandFailure(pub ErrorReport);

impl CommandFailure {
    pub fn new(code: &str, message: Option<String>, fallback: &str) -> Self {
        Self(ErrorReport::new(
            code,
            message.unwrap_or_else(|| fallback.to_string()),
        ))
    }
}

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub struct Session {
    pub store: ConfigStore,
    pub config: CliConfig,
    /// `--access-token` value, if given
    pub access_token: Option<String>,
    pub format: OutputFormat,
}

impl Session {
    pub fn new(store: ConfigStore, config: CliConfig, access_token: Option<String>) -> Result<Self> {
        let format = config.output_format.parse()?;
        Ok(Self {
            store,
            config,
            access_token,
            format,
        })
    }

    /// Client authenticated with the resolved token.
    pub fn client(&self) -> Result<BufferClient> {
        let token = config::require_token(self.access_token.as_deref(), &self.store)?;
        self.client_for(token)
    }

    fn client_for(&self, token: String) -> Result<BufferClient> {
        let retry = (self.config.retries > 0)
            .then(|| RetryPolicy::new(self.config.retries, RETRY_INITIAL_DELAY));

        BufferClient::with_config(
            &self.config.api_url,
            token,
            Duration::from_secs(self.config.timeout),
            retry,
        )
    }

    /// Write `value` to stdout in the session's output format.
    pub fn print(&self, value: &Value) -> Result<()> {
        println!("{}", format_output(value, self.format)?);
        Ok(())
    }
}

/// Handle auth commands
pub async fn handle_auth(session: &Session, command: AuthCommands) -> Result<()> {
    let config_path = session.store.path().display().to_string();

    match command {
        AuthCommands::Login { token } => {
            config::save_token(&session.store, &token)?;
            println!("{}", format_success("Access token saved successfully."));
            println!("Config stored at: {}", config_path);
        }
        AuthCommands::Status => {
            let Some(token) = config::resolve_token(session.access_token.as_deref(), &session.store)
            else {
                println!("Not authenticated. Run: bufferctl auth login <token>");
                return Ok(());
            };

            let preview = token_preview(&token);
            let status = match session.client_for(token)?.get_user().await {
                Ok(user) => json!({
                    "authenticated": true,
                    "user_id": user.id,
                    "name": user.name,
                    "email": user.email.unwrap_or_else(|| "N/A".to_string()),
                    "plan": user.plan.unwrap_or_else(|| "N/A".to_string()),
                    "config_path": config_path,
                }),
                Err(e) => {
                    debug!("Token verification failed: {}", e);
                    json!({
                        "authenticated": true,
                        "token_present": true,
                        "token_preview": preview,
                        "config_path": config_path,
                        "note": "Could not verify token with API (may be offline)",
                    })
                }
            };
            session.print(&status)?;
        }
        AuthCommands::Logout => {
            config::clear_auth(&session.store)?;
            println!("{}", format_success("Credentials removed."));
        }
    }

    Ok(())
}

/// Handle profiles commands
pub async fn handle_profiles(session: &Session, command: ProfilesCommands) -> Result<()> {
    let client = session.client()?;

    match command {
        ProfilesCommands::List => {
            let profiles = client.list_profiles().await?;
            let rows: Vec<Value> = profiles.iter().map(profile_row).collect();
            session.print(&Value::Array(rows))?;
        }
        ProfilesCommands::Get { profile_id } => {
            let profile = client.get_profile(&profile_id).await?;
            session.print(&profile_detail_row(&profile))?;
        }
    }

    Ok(())
}

/// Handle posts commands
pub async fn handle_posts(session: &Session, command: PostsCommands) -> Result<()> {
    let client = session.client()?;

    match command {
        PostsCommands::List { profile_id, paging } => {
            let result = client
                .pending_updates(&profile_id, paging.count, paging.page)
                .await?;
            info!("Total pending: {}", result.total);
            print_updates(session, &result.updates)?;
        }
        PostsCommands::Sent { profile_id, paging } => {
            let result = client
                .sent_updates(&profile_id, paging.count, paging.page)
                .await?;
            info!("Total sent: {}", result.total);
            print_updates(session, &result.updates)?;
        }
        PostsCommands::Create {
            profile_ids,
            text,
            content,
            now,
            dry_run,
        } => {
            let update = NewUpdate {
                profile_ids,
                text,
                media_link: content.media_link,
                media_description: content.media_description,
                scheduled_at: content.scheduled_at,
                now,
            };

            if dry_run {
                println!("{}", dry_run_banner("would send:"));
                return session.print(&serde_json::to_value(update.to_form())?);
            }

            let result = client.create_update(&update).await?;
            if !result.success {
                return Err(
                    CommandFailure::new("CREATE_FAILED", result.message, "Failed to create post")
                        .into(),
                );
            }

            info!("Post created successfully. Buffer count: {}", result.buffer_count);
            print_updates(session, &result.updates)?;
        }
        PostsCommands::Update {
            post_id,
            text,
            content,
            dry_run,
        } => {
            let edit = UpdateEdit {
                text,
                media_link: content.media_link,
                media_description: content.media_description,
                scheduled_at: content.scheduled_at,
            };

            if dry_run {
                let mut preview = Map::new();
                preview.insert("post_id".to_string(), Value::String(post_id));
                if let Value::Object(fields) = serde_json::to_value(edit.to_form())? {
                    preview.extend(fields);
                }
                println!("{}", dry_run_banner("would send:"));
                return session.print(&Value::Object(preview));
            }

            let result = client.edit_update(&post_id, &edit).await?;
            if !result.success {
                return Err(
                    CommandFailure::new("UPDATE_FAILED", result.message, "Failed to update post")
                        .into(),
                );
            }

            info!("Post updated successfully.");
            match result.update {
                Some(update) => session.print(&update_row(&update))?,
                None => session.print(&json!({ "success": true, "post_id": post_id }))?,
            }
        }
        PostsCommands::Delete { post_id, dry_run } => {
            if dry_run {
                println!("{}", dry_run_banner(&format!("would delete post: {}", post_id)));
                return Ok(());
            }

            let result = client.destroy_update(&post_id).await?;
            if !result.success {
                return Err(
                    CommandFailure::new("DELETE_FAILED", result.message, "Failed to delete post")
                        .into(),
                );
            }

            info!("Post {} deleted.", post_id);
            session.print(&json!({ "success": true, "post_id": post_id }))?;
        }
        PostsCommands::Share { post_id, dry_run } => {
            if dry_run {
                println!(
                    "{}",
                    dry_run_banner(&format!("would share post immediately: {}", post_id))
                );
                return Ok(());
            }

            let result = client.share_update(&post_id).await?;
            if !result.success {
                return Err(
                    CommandFailure::new("SHARE_FAILED", result.message, "Failed to share post")
                        .into(),
                );
            }

            info!("Post {} shared immediately.", post_id);
            session.print(&json!({ "success": true, "post_id": post_id }))?;
        }
    }

    Ok(())
}

/// Handle analytics commands
pub async fn handle_analytics(session: &Session, command: AnalyticsCommands) -> Result<()> {
    let client = session.client()?;

    match command {
        AnalyticsCommands::Get { profile_id, paging } => {
            let result = client
                .sent_updates(&profile_id, paging.count, paging.page)
                .await?;
            info!(
                "Analyzing {} sent posts (total: {})",
                result.updates.len(),
                result.total
            );

            let rows: Vec<Value> = result.updates.iter().map(analytics_row).collect();
            session.print(&Value::Array(rows))?;
        }
    }

    Ok(())
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

fn print_updates(session: &Session, updates: &[Update]) -> Result<()> {
    let rows: Vec<Value> = updates.iter().map(update_row).collect();
    session.print(&Value::Array(rows))
}

fn dry_run_banner(action: &str) -> String {
    use colored::*;
    format!("{} {}", "Dry run:".yellow().bold(), action)
}

/// First 8 characters of the token followed by `...`.
fn token_preview(token: &str) -> String {
    format!("{}...", token.chars().take(8).collect::<String>())
}

/// Cut `text` to `max` characters, ending in `...` when shortened.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Unix seconds as an RFC 3339 UTC timestamp with milliseconds.
fn timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| secs.to_string())
}

/// Like [`timestamp`], but missing or zero becomes `N/A`.
fn optional_timestamp(secs: Option<i64>) -> String {
    match secs {
        Some(secs) if secs != 0 => timestamp(secs),
        _ => "N/A".to_string(),
    }
}

fn profile_row(profile: &Profile) -> Value {
    json!({
        "id": profile.id,
        "service": profile.service,
        "username": profile.formatted_username,
        "pending": profile.counts.pending,
        "sent": profile.counts.sent,
        "drafts": profile.counts.drafts,
        "default": profile.default,
    })
}

fn profile_detail_row(profile: &Profile) -> Value {
    json!({
        "id": profile.id,
        "service": profile.service,
        "username": profile.formatted_username,
        "avatar": profile.avatar,
        "default": profile.default,
        "pending": profile.counts.pending,
        "sent": profile.counts.sent,
        "drafts": profile.counts.drafts,
        "created_at": timestamp(profile.created_at),
    })
}

fn update_row(update: &Update) -> Value {
    json!({
        "id": update.id,
        "text": truncate(&update.text, 80),
        "status": update.status,
        "profile_id": update.profile_id,
        "created_at": timestamp(update.created_at),
        "due_at": optional_timestamp(update.due_at),
    })
}

fn analytics_row(update: &Update) -> Value {
    let stats = update.statistics.clone().unwrap_or_default();
    json!({
        "id": update.id,
        "text": truncate(&update.text, 60),
        "sent_at": optional_timestamp(update.sent_at),
        "reach": stats.reach,
        "clicks": stats.clicks,
        "retweets": stats.retweets,
        "favorites": stats.favorites,
        "mentions": stats.mentions,
    })
}
