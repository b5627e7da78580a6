//! CLI command and subcommand definitions

use clap::{Parser, Subcommand};

/// Buffer social media scheduling CLI
#[derive(Parser, Debug)]
#[command(name = "bufferctl")]
#[command(version, about = "Command-line client for the Buffer API", long_about = None)]
pub struct Cli {
    /// Buffer access token (overrides BUFFER_ACCESS_TOKEN and the config file)
    #[arg(long, global = true)]
    pub access_token: Option<String>,

    /// Output format (overrides config file)
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output, including request traces
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// API base URL (overrides config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds (overrides config file)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Don't load settings from the config file
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Config file path (default: ~/.config/buffer/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Table with a header row
    Table,
    /// Comma-separated values with a header row
    Csv,
}

impl From<OutputFormat> for crate::format::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => crate::format::OutputFormat::Json,
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Csv => crate::format::OutputFormat::Csv,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage authentication
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Manage connected social profiles
    Profiles {
        #[command(subcommand)]
        command: ProfilesCommands,
    },

    /// Manage Buffer posts (updates)
    Posts {
        #[command(subcommand)]
        command: PostsCommands,
    },

    /// Interaction statistics for sent posts
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Save a Buffer access token
    Login {
        /// Buffer OAuth2 access token
        token: String,
    },

    /// Show current authentication status
    Status,

    /// Remove stored credentials
    Logout,
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCommands {
    /// List all connected profiles
    List,

    /// Show a single profile
    Get {
        /// Profile ID
        #[arg(long)]
        profile_id: String,
    },
}

/// Paging options shared by listing commands
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct Paging {
    /// Number of posts to return
    #[arg(long, default_value_t = 20)]
    pub count: u32,

    /// Page number (starting from 1)
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

/// Optional media and schedule fields for create/update
#[derive(clap::Args, Debug, Clone)]
pub struct PostContent {
    /// URL to attach as media
    #[arg(long)]
    pub media_link: Option<String>,

    /// Description for the media attachment
    #[arg(long)]
    pub media_description: Option<String>,

    /// Schedule time (ISO 8601 format)
    #[arg(long)]
    pub scheduled_at: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PostsCommands {
    /// List pending posts for a profile
    List {
        /// Profile ID
        #[arg(long)]
        profile_id: String,

        #[command(flatten)]
        paging: Paging,
    },

    /// List sent posts for a profile
    Sent {
        /// Profile ID
        #[arg(long)]
        profile_id: String,

        #[command(flatten)]
        paging: Paging,
    },

    /// Create a new post
    Create {
        /// Profile ID(s) to post to
        #[arg(long = "profile-id", required = true, num_args = 1..)]
        profile_ids: Vec<String>,

        /// Post text content
        #[arg(long)]
        text: String,

        #[command(flatten)]
        content: PostContent,

        /// Share immediately instead of adding to queue
        #[arg(long)]
        now: bool,

        /// Show what would be sent without making the request
        #[arg(long)]
        dry_run: bool,
    },

    /// Update an existing post
    Update {
        /// Post/update ID
        #[arg(long)]
        post_id: String,

        /// New text content
        #[arg(long)]
        text: String,

        #[command(flatten)]
        content: PostContent,

        /// Show what would be sent without making the request
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete a post
    Delete {
        /// Post/update ID
        #[arg(long)]
        post_id: String,

        /// Show what would be deleted without making the request
        #[arg(long)]
        dry_run: bool,
    },

    /// Share a post immediately
    Share {
        /// Post/update ID
        #[arg(long)]
        post_id: String,

        /// Show what would be shared without making the request
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum AnalyticsCommands {
    /// Interaction statistics for a profile's sent posts
    Get {
        /// Profile ID
        #[arg(long)]
        profile_id: String,

        #[command(flatten)]
        paging: Paging,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bufferctl",
            "profiles",
            "list",
            "-o",
            "csv",
            "--access-token",
            "abc",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(OutputFormat::Csv));
        assert_eq!(cli.access_token.as_deref(), Some("abc"));
        assert!(matches!(
            cli.command,
            Commands::Profiles {
                command: ProfilesCommands::List
            }
        ));
    }

    #[test]
    fn test_create_accepts_several_profiles() {
        let cli = Cli::try_parse_from([
            "bufferctl",
            "posts",
            "create",
            "--profile-id",
            "p1",
            "p2",
            "--text",
            "Hello",
            "--now",
        ])
        .unwrap();

        match cli.command {
            Commands::Posts {
                command:
                    PostsCommands::Create {
                        profile_ids,
                        text,
                        now,
                        dry_run,
                        ..
                    },
            } => {
                assert_eq!(profile_ids, vec!["p1", "p2"]);
                assert_eq!(text, "Hello");
                assert!(now);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_paging_defaults() {
        let cli =
            Cli::try_parse_from(["bufferctl", "posts", "sent", "--profile-id", "p1"]).unwrap();

        match cli.command {
            Commands::Posts {
                command: PostsCommands::Sent { profile_id, paging },
            } => {
                assert_eq!(profile_id, "p1");
                assert_eq!(paging.count, 20);
                assert_eq!(paging.page, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["bufferctl", "-q", "-v", "auth", "status"]).is_err());
    }

    #[test]
    fn test_missing_required_option() {
        assert!(Cli::try_parse_from(["bufferctl", "posts", "create", "--text", "hi"]).is_err());
        assert!(Cli::try_parse_from(["bufferctl", "profiles", "get"]).is_err());
    }
}
