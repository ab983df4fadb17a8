//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use epsimo_client::ClientConfig;
use epsimo_core::{AssistantId, ProjectId, RunId, ThreadId};

/// Epsimo - terminal client for the Epsimo agent platform.
#[derive(Parser, Debug)]
#[command(name = "epsimo")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend URL.
    #[arg(
        long,
        global = true,
        env = "EPSIMO_BACKEND_URL",
        default_value = "http://localhost:8100"
    )]
    pub backend: String,

    /// Session file (defaults to the platform config directory).
    #[arg(long, global = true, env = "EPSIMO_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Credit counter refresh period in seconds.
    #[arg(long, global = true, env = "EPSIMO_POLL_INTERVAL", default_value_t = 5)]
    pub poll_interval: u64,

    /// Enable debug logging to stderr.
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,
}

impl Args {
    /// Client configuration derived from the arguments.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            backend_url: self.backend.clone(),
            session_path: self.session_file.clone(),
            poll_interval_seconds: self.poll_interval,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with email and password
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long, env = "EPSIMO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long, env = "EPSIMO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Store a session token obtained from the Google sign-in page
    Token {
        /// The token shown after signing in
        token: String,
    },
    /// Print the URL that starts Google sign-in
    GoogleUrl,
    /// Forget the session token
    Logout,
    /// Show the current session
    Whoami,
    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectCommand,
    },
    /// Manage assistants
    Assistants {
        #[command(subcommand)]
        action: AssistantCommand,
    },
    /// Manage threads
    Threads {
        #[command(subcommand)]
        action: ThreadCommand,
    },
    /// Manage third-party API keys
    Keys {
        #[command(subcommand)]
        action: KeyCommand,
    },
    /// Show thread credits
    Credits,
    /// Show the price per thread of an agent type
    Price {
        /// Agent type name
        agent_name: String,
    },
    /// Buy thread credits (prints the payment URL)
    Buy {
        /// Number of threads
        #[arg(value_parser = clap::value_parser!(u32).range(100..=1000))]
        quantity: u32,
    },
    /// Rate a run
    Feedback {
        /// Run to rate
        run_id: RunId,
        /// Score, e.g. 1 for good and 0 for bad
        score: f64,
    },
    /// Open the chat interface (default)
    Chat {
        /// Open this thread
        #[arg(long, conflicts_with = "assistant")]
        thread: Option<ThreadId>,
        /// Start a new chat with this assistant
        #[arg(long)]
        assistant: Option<AssistantId>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// List projects
    List,
    /// Show one project
    Show { id: ProjectId },
    /// Create a project
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Rename a project
    Update {
        id: ProjectId,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a project
    Delete { id: ProjectId },
    /// Scope the session to a project
    Select { id: ProjectId },
}

#[derive(Subcommand, Debug)]
pub enum AssistantCommand {
    /// List assistants
    List,
    /// Show one assistant with its configuration
    Show { id: AssistantId },
    /// Delete an assistant
    Delete { id: AssistantId },
    /// Share or unshare an assistant
    SetPublic {
        id: AssistantId,
        #[arg(action = clap::ArgAction::Set)]
        public: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ThreadCommand {
    /// List threads
    List,
    /// Create a thread
    New {
        name: String,
        #[arg(long)]
        assistant: AssistantId,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Show stored keys (masked)
    Show,
    /// Update keys; omitted keys keep their value
    Set {
        #[arg(long)]
        openai: Option<String>,
        #[arg(long)]
        anthropic: Option<String>,
        #[arg(long)]
        ydc: Option<String>,
        #[arg(long)]
        tavily: Option<String>,
    },
}
