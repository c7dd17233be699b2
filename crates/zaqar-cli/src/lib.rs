//! # Zaqar CLI
//!
//! Command-line interface for the Zaqar messaging service.
//!
//! This module provides CLI commands for:
//! - Queue, message and claim handling
//! - Pool, flavor and subscription administration
//! - Service health checks
//!
//! Every command maps onto one call of the [`zaqar_client`] resource API and
//! renders the result as a table, JSON or YAML.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zaqar_client::{
    ApiVersion, AuthBackendKind, Claim, ClaimOptions, Client, ClientConfig, Flavor, FlavorSpec,
    Message, Pool, PoolSpec, SignedUrlOptions, Subscription, SubscriptionSpec, ZaqarError,
};

// ============================================================================
// CLI Structure
// ============================================================================

/// Zaqar CLI - Client for the Zaqar messaging service
#[derive(Parser)]
#[command(name = "zaqar")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the Zaqar messaging service")]
#[command(
    long_about = "Manage Zaqar queues, messages, claims, subscriptions, pools and flavors"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ZAQAR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Messaging service endpoint
    #[arg(long, env = "OS_MESSAGING_URL", global = true)]
    pub os_url: Option<String>,

    /// Queues API version (1, 1.1 or 2)
    #[arg(long, env = "OS_QUEUES_API_VERSION", global = true)]
    pub os_queues_api_version: Option<String>,

    /// Authentication backend
    #[arg(long, value_enum, global = true)]
    pub auth_backend: Option<AuthBackendArg>,

    /// Identity service endpoint
    #[arg(long, env = "OS_AUTH_URL", global = true)]
    pub os_auth_url: Option<String>,

    #[arg(long, env = "OS_USERNAME", global = true)]
    pub os_username: Option<String>,

    #[arg(long, env = "OS_PASSWORD", hide_env_values = true, global = true)]
    pub os_password: Option<String>,

    #[arg(long, env = "OS_PROJECT_ID", global = true)]
    pub os_project_id: Option<String>,

    #[arg(long, env = "OS_PROJECT_NAME", global = true)]
    pub os_project_name: Option<String>,

    /// Pre-issued identity token
    #[arg(long, env = "OS_AUTH_TOKEN", hide_env_values = true, global = true)]
    pub os_auth_token: Option<String>,

    #[arg(long, env = "OS_REGION_NAME", global = true)]
    pub os_region_name: Option<String>,

    #[arg(long, env = "OS_USER_DOMAIN_NAME", global = true)]
    pub os_user_domain_name: Option<String>,

    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME", global = true)]
    pub os_project_domain_name: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Manage queues
    Queue {
        #[command(subcommand)]
        action: QueueCommands,
    },

    /// Post and list messages
    Message {
        #[command(subcommand)]
        action: MessageCommands,
    },

    /// Claim messages for processing
    Claim {
        #[command(subcommand)]
        action: ClaimCommands,
    },

    /// Administer storage pools
    Pool {
        #[command(subcommand)]
        action: PoolCommands,
    },

    /// Administer flavors
    Flavor {
        #[command(subcommand)]
        action: FlavorCommands,
    },

    /// Manage queue subscriptions
    Subscription {
        #[command(subcommand)]
        action: SubscriptionCommands,
    },

    /// Check whether the server answers
    Ping,

    /// Show the server health report
    Health,

    /// Show the API home document
    Homedoc,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Queue subcommands
#[derive(Subcommand)]
pub enum QueueCommands {
    /// Create a queue
    Create { name: String },

    /// Delete a queue
    Delete { name: String },

    /// List queues
    List {
        /// Start listing after this queue
        #[arg(long)]
        marker: Option<String>,

        /// Page size
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Check whether a queue exists
    Exists { name: String },

    /// Show message counts for a queue
    Stats { name: String },

    /// Show queue metadata
    GetMetadata { name: String },

    /// Replace queue metadata
    SetMetadata {
        name: String,

        /// Metadata as a JSON object
        metadata: String,
    },

    /// Delete all messages and/or subscriptions of a queue
    Purge {
        name: String,

        /// Resource types to purge (messages, subscriptions)
        #[arg(long = "resource-type", value_delimiter = ',')]
        resource_types: Vec<String>,
    },

    /// Create a pre-signed URL for a queue
    SignedUrl {
        name: String,

        /// Paths the URL grants access to
        #[arg(long, value_delimiter = ',')]
        paths: Vec<String>,

        /// Seconds until the URL expires
        #[arg(long)]
        ttl_seconds: Option<u64>,

        /// HTTP methods the URL allows
        #[arg(long, value_delimiter = ',')]
        methods: Vec<String>,
    },
}

/// Message subcommands
#[derive(Subcommand)]
pub enum MessageCommands {
    /// Post messages to a queue
    Post {
        queue: String,

        /// A message or list of messages as JSON
        messages: String,
    },

    /// List messages in a queue
    List {
        queue: String,

        /// Fetch only these message ids
        #[arg(long = "message-ids", value_delimiter = ',')]
        message_ids: Vec<String>,

        /// Include messages posted by this client
        #[arg(long)]
        echo: bool,

        /// Include claimed messages
        #[arg(long)]
        include_claimed: bool,

        #[arg(long)]
        marker: Option<String>,

        #[arg(long)]
        limit: Option<u64>,
    },
}

/// Claim subcommands
#[derive(Subcommand)]
pub enum ClaimCommands {
    /// Claim messages from a queue
    Create {
        queue: String,

        /// Seconds the claim lives
        #[arg(long, default_value = "300")]
        ttl: u64,

        /// Seconds added to the lifetime of claimed messages
        #[arg(long, default_value = "60")]
        grace: u64,

        /// Maximum number of messages to claim
        #[arg(long, default_value = "10")]
        limit: u64,
    },

    /// Show the messages of a claim
    Query { queue: String, claim_id: String },

    /// Extend a claim
    Renew {
        queue: String,
        claim_id: String,

        #[arg(long)]
        ttl: Option<u64>,

        #[arg(long)]
        grace: Option<u64>,
    },

    /// Release a claim
    Release { queue: String, claim_id: String },
}

/// Pool subcommands
#[derive(Subcommand)]
pub enum PoolCommands {
    /// Create a pool
    Create {
        name: String,

        /// Storage URI of the pool
        uri: String,

        /// Weight for placing queues on the pool
        weight: u64,

        /// Pool group (API v1.1)
        #[arg(long)]
        group: Option<String>,

        /// Flavor the pool belongs to (API v2)
        #[arg(long)]
        flavor: Option<String>,

        /// Storage driver options as a JSON object
        #[arg(long)]
        options: Option<String>,
    },

    /// Show a pool
    Show { name: String },

    /// Update a pool
    Update {
        name: String,

        #[arg(long)]
        uri: Option<String>,

        #[arg(long)]
        weight: Option<u64>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        flavor: Option<String>,

        #[arg(long)]
        options: Option<String>,
    },

    /// Delete a pool
    Delete { name: String },

    /// List pools
    List {
        #[arg(long)]
        marker: Option<String>,

        #[arg(long)]
        limit: Option<u64>,

        /// Include pool details
        #[arg(long)]
        detailed: bool,
    },
}

/// Flavor subcommands
#[derive(Subcommand)]
pub enum FlavorCommands {
    /// Create a flavor
    Create {
        name: String,

        /// Pool group (API v1.1)
        #[arg(long)]
        pool_group: Option<String>,

        /// Pools of the flavor (API v2)
        #[arg(long, value_delimiter = ',')]
        pool_list: Vec<String>,

        /// Capabilities as a JSON object
        #[arg(long)]
        capabilities: Option<String>,
    },

    /// Show a flavor
    Show { name: String },

    /// Update a flavor
    Update {
        name: String,

        #[arg(long)]
        pool_group: Option<String>,

        #[arg(long, value_delimiter = ',')]
        pool_list: Vec<String>,

        #[arg(long)]
        capabilities: Option<String>,
    },

    /// Delete a flavor
    Delete { name: String },

    /// List flavors
    List {
        #[arg(long)]
        marker: Option<String>,

        #[arg(long)]
        limit: Option<u64>,

        /// Include flavor details
        #[arg(long)]
        detailed: bool,
    },
}

/// Subscription subcommands
#[derive(Subcommand)]
pub enum SubscriptionCommands {
    /// Subscribe to a queue
    Create {
        queue: String,

        /// Receiver of notifications, e.g. an http(s) or mailto URI
        subscriber: String,

        /// Seconds the subscription lives
        ttl: u64,

        /// Subscription options as a JSON object
        #[arg(long)]
        options: Option<String>,
    },

    /// Show a subscription
    Show { queue: String, subscription_id: String },

    /// Update a subscription
    Update {
        queue: String,
        subscription_id: String,

        #[arg(long)]
        subscriber: Option<String>,

        #[arg(long)]
        ttl: Option<u64>,

        #[arg(long)]
        options: Option<String>,
    },

    /// Delete a subscription
    Delete { queue: String, subscription_id: String },

    /// List the subscriptions of a queue
    List {
        queue: String,

        #[arg(long)]
        marker: Option<String>,

        #[arg(long)]
        limit: Option<u64>,
    },
}

/// Authentication backends selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthBackendArg {
    Noauth,
    Keystone,
    SignedUrl,
}

impl From<AuthBackendArg> for AuthBackendKind {
    fn from(value: AuthBackendArg) -> Self {
        match value {
            AuthBackendArg::Noauth => AuthBackendKind::Noauth,
            AuthBackendArg::Keystone => AuthBackendKind::Keystone,
            AuthBackendArg::SignedUrl => AuthBackendKind::SignedUrl,
        }
    }
}

/// Output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zaqar error: {0}")]
    Zaqar(#[from] ZaqarError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration: {0}")]
    InvalidFormat(#[from] config::ConfigError),

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },
}

// ============================================================================
// Configuration
// ============================================================================

/// Settings read from the configuration file and `ZAQAR_` environment variables.
///
/// ```toml
/// url = "http://localhost:8888"
/// api_version = "2"
///
/// [client.auth_opts]
/// backend = "keystone"
///
/// [client.auth_opts.options]
/// os_auth_url = "http://keystone:5000/v3"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub url: Option<String>,
    pub api_version: Option<String>,
    pub client: ClientConfig,
}

/// Default configuration file location, `<config dir>/zaqar/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zaqar").join("config.toml"))
}

/// Load configuration from a file and the environment.
///
/// An explicit path must exist; the default path is optional. Variables such
/// as `ZAQAR_URL` or `ZAQAR_CLIENT__TIMEOUT` override file values.
pub fn load_configuration(config_path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let mut builder = config::Config::builder();

    match config_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }
        None => {
            if let Some(path) = default_config_path() {
                debug!(path = %path.display(), "Checking default configuration path");
                builder = builder.add_source(
                    config::File::from(path)
                        .format(config::FileFormat::Toml)
                        .required(false),
                );
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("ZAQAR")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Build the client from command-line flags layered over the loaded configuration.
pub fn build_client(cli: &Cli, config: CliConfig) -> Result<Client, CliError> {
    let url = cli
        .os_url
        .clone()
        .or(config.url)
        .ok_or_else(|| ConfigError::MissingRequired {
            key: "os-url".to_string(),
        })?;

    let version_text = cli
        .os_queues_api_version
        .clone()
        .or(config.api_version)
        .unwrap_or_else(|| "2".to_string());
    let version: ApiVersion = version_text
        .parse()
        .map_err(|e: ZaqarError| CliError::InvalidArgument {
            arg: "os-queues-api-version".to_string(),
            message: e.to_string(),
        })?;

    let mut client_config = config.client;
    if let Some(backend) = cli.auth_backend {
        client_config.auth_opts.backend = backend.into();
    }

    let options = &mut client_config.auth_opts.options;
    let overrides = [
        (&mut options.auth_url, &cli.os_auth_url),
        (&mut options.username, &cli.os_username),
        (&mut options.password, &cli.os_password),
        (&mut options.project_id, &cli.os_project_id),
        (&mut options.project_name, &cli.os_project_name),
        (&mut options.auth_token, &cli.os_auth_token),
        (&mut options.region_name, &cli.os_region_name),
        (&mut options.user_domain_name, &cli.os_user_domain_name),
        (&mut options.project_domain_name, &cli.os_project_domain_name),
    ];
    for (slot, value) in overrides {
        if let Some(value) = value {
            *slot = Some(value.clone());
        }
    }
    if cli.insecure {
        options.insecure = true;
    }

    info!(
        url = %url,
        version = %version,
        backend = %client_config.auth_opts.backend,
        "Connecting to Zaqar"
    );

    Ok(Client::builder()
        .url(url)
        .version(version)
        .config(client_config)
        .build())
}

// ============================================================================
// CLI Implementation
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;
    run(cli).await
}

/// Execute parsed arguments and print the result to stdout.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "zaqar", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_configuration(cli.config.as_deref())?;
    let client = build_client(&cli, config)?;
    let format = cli.format;

    let output = execute_command(&client, cli.command).await?;
    let rendered = render(&output, format)?;
    if !rendered.is_empty() {
        println!("{}", rendered);
    }
    Ok(())
}

/// Initialize the tracing subscriber. Logs go to stderr so they never mix with command output.
pub fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_new(&cli.log_level).map_err(|e| CliError::InvalidArgument {
        arg: "log-level".to_string(),
        message: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        debug!(error = %e, "Logging already initialized");
    }
    Ok(())
}

/// Run one command against the service and return the value to render.
///
/// Commands without output return `Value::Null`.
pub async fn execute_command(client: &Client, command: Commands) -> Result<Value, CliError> {
    match command {
        Commands::Queue { action } => execute_queue_command(client, action).await,
        Commands::Message { action } => execute_message_command(client, action).await,
        Commands::Claim { action } => execute_claim_command(client, action).await,
        Commands::Pool { action } => execute_pool_command(client, action).await,
        Commands::Flavor { action } => execute_flavor_command(client, action).await,
        Commands::Subscription { action } => execute_subscription_command(client, action).await,
        Commands::Ping => Ok(json!({ "pingable": client.ping().await })),
        Commands::Health => execute_health_command(client).await,
        Commands::Homedoc => Ok(client.homedoc().await?.unwrap_or(Value::Null)),
        Commands::Completions { .. } => Ok(Value::Null),
    }
}

/// Execute queue commands
async fn execute_queue_command(client: &Client, action: QueueCommands) -> Result<Value, CliError> {
    match action {
        QueueCommands::Create { name } => {
            info!(queue = %name, "Creating queue");
            let queue = client.queue(name).await?;
            Ok(json!({ "name": queue.name() }))
        }
        QueueCommands::Delete { name } => {
            info!(queue = %name, "Deleting queue");
            client.queue_ref(name).delete().await?;
            Ok(Value::Null)
        }
        QueueCommands::List { marker, limit } => {
            let queues = client
                .queues(listing_params(marker, limit, false))
                .await?
                .try_collect()
                .await?;
            Ok(Value::Array(
                queues.iter().map(|q| json!({ "name": q.name() })).collect(),
            ))
        }
        QueueCommands::Exists { name } => {
            let exists = client.queue_ref(name).exists().await?;
            Ok(json!({ "exists": exists }))
        }
        QueueCommands::Stats { name } => {
            let stats = client.queue_ref(name).stats().await?;
            let messages = stats.get("messages").cloned();
            Ok(messages.unwrap_or(stats))
        }
        QueueCommands::GetMetadata { name } => {
            let mut queue = client.queue_ref(name);
            Ok(Value::Object(queue.metadata(None, true).await?))
        }
        QueueCommands::SetMetadata { name, metadata } => {
            let metadata = parse_object("metadata", &metadata)?;
            info!(queue = %name, keys = metadata.len(), "Setting queue metadata");
            let mut queue = client.queue_ref(name);
            queue.metadata(Some(metadata), false).await?;
            Ok(Value::Null)
        }
        QueueCommands::Purge {
            name,
            resource_types,
        } => {
            info!(queue = %name, resource_types = ?resource_types, "Purging queue");
            let resource_types = non_empty(resource_types);
            client
                .queue_ref(name)
                .purge(resource_types.as_deref())
                .await?;
            Ok(Value::Null)
        }
        QueueCommands::SignedUrl {
            name,
            paths,
            ttl_seconds,
            methods,
        } => {
            let options = SignedUrlOptions {
                paths: non_empty(paths),
                ttl_seconds,
                methods: non_empty(methods),
            };
            let url = client.queue_ref(name).signed_url(&options).await?;
            Ok(json!({
                "paths": url.paths,
                "methods": url.methods,
                "expires": url.expires,
                "signature": url.signature,
                "project": url.project,
            }))
        }
    }
}

/// Execute message commands
async fn execute_message_command(
    client: &Client,
    action: MessageCommands,
) -> Result<Value, CliError> {
    match action {
        MessageCommands::Post { queue, messages } => {
            let messages = parse_json("messages", &messages)?;
            info!(queue = %queue, "Posting messages");
            let posted = client.queue_ref(queue).post(messages).await?;
            Ok(posted.unwrap_or(Value::Null))
        }
        MessageCommands::List {
            queue,
            message_ids,
            echo,
            include_claimed,
            marker,
            limit,
        } => {
            let queue = client.queue_ref(queue);
            let messages = if message_ids.is_empty() {
                let mut params = listing_params(marker, limit, false);
                if echo {
                    params.insert("echo".to_string(), json!(true));
                }
                if include_claimed {
                    params.insert("include_claimed".to_string(), json!(true));
                }
                queue.messages(params).await?
            } else {
                queue.messages_by_id(&message_ids).await?
            };
            let messages = messages.try_collect().await?;
            Ok(Value::Array(messages.iter().map(message_row).collect()))
        }
    }
}

/// Execute claim commands
async fn execute_claim_command(client: &Client, action: ClaimCommands) -> Result<Value, CliError> {
    match action {
        ClaimCommands::Create {
            queue,
            ttl,
            grace,
            limit,
        } => {
            info!(queue = %queue, ttl, grace, limit, "Claiming messages");
            let options = ClaimOptions {
                ttl: Some(ttl),
                grace: Some(grace),
                limit: Some(limit),
            };
            let claim = client.queue_ref(queue).claim(options).await?;
            claimed_messages(&claim).await
        }
        ClaimCommands::Query { queue, claim_id } => {
            let mut claim = client.queue_ref(queue).claim_ref(claim_id);
            claim.reload().await?;
            claimed_messages(&claim).await
        }
        ClaimCommands::Renew {
            queue,
            claim_id,
            ttl,
            grace,
        } => {
            if ttl.is_none() && grace.is_none() {
                return Err(CliError::InvalidArgument {
                    arg: "ttl".to_string(),
                    message: "either --ttl or --grace is required".to_string(),
                });
            }
            info!(queue = %queue, claim = %claim_id, ?ttl, ?grace, "Renewing claim");
            let mut claim = client.queue_ref(queue).claim_ref(claim_id);
            claim.update(ttl, grace).await?;
            Ok(Value::Null)
        }
        ClaimCommands::Release { queue, claim_id } => {
            info!(queue = %queue, claim = %claim_id, "Releasing claim");
            client.queue_ref(queue).claim_ref(claim_id).delete().await?;
            Ok(Value::Null)
        }
    }
}

/// Execute pool commands
async fn execute_pool_command(client: &Client, action: PoolCommands) -> Result<Value, CliError> {
    match action {
        PoolCommands::Create {
            name,
            uri,
            weight,
            group,
            flavor,
            options,
        } => {
            let spec = PoolSpec {
                uri,
                weight,
                group,
                flavor,
                options: parse_optional_object("options", options.as_deref())?,
            };
            info!(pool = %name, "Creating pool");
            let pool = client.pool(name, spec).await?;
            Ok(pool_row(&pool))
        }
        PoolCommands::Show { name } => {
            let mut pool = client.pool_ref(name);
            pool.get().await?;
            Ok(pool_row(&pool))
        }
        PoolCommands::Update {
            name,
            uri,
            weight,
            group,
            flavor,
            options,
        } => {
            let mut data = Map::new();
            insert_some(&mut data, "uri", uri);
            insert_some(&mut data, "weight", weight);
            insert_some(&mut data, "group", group);
            insert_some(&mut data, "flavor", flavor);
            if let Some(options) = options {
                data.insert("options".to_string(), Value::Object(parse_object("options", &options)?));
            }
            require_changes(&data)?;

            info!(pool = %name, fields = ?data.keys().collect::<Vec<_>>(), "Updating pool");
            let mut pool = client.pool_ref(name);
            pool.update(data).await?;
            pool.get().await?;
            Ok(pool_row(&pool))
        }
        PoolCommands::Delete { name } => {
            info!(pool = %name, "Deleting pool");
            client.pool_ref(name).delete().await?;
            Ok(Value::Null)
        }
        PoolCommands::List {
            marker,
            limit,
            detailed,
        } => {
            let pools = client
                .pools(listing_params(marker, limit, detailed))
                .await?
                .try_collect()
                .await?;
            Ok(Value::Array(pools.iter().map(pool_row).collect()))
        }
    }
}

/// Execute flavor commands
async fn execute_flavor_command(
    client: &Client,
    action: FlavorCommands,
) -> Result<Value, CliError> {
    match action {
        FlavorCommands::Create {
            name,
            pool_group,
            pool_list,
            capabilities,
        } => {
            let spec = FlavorSpec {
                pool: pool_group,
                pool_list,
                capabilities: parse_optional_object("capabilities", capabilities.as_deref())?,
            };
            info!(flavor = %name, "Creating flavor");
            let flavor = client.flavor(name, spec).await?;
            Ok(flavor_row(&flavor))
        }
        FlavorCommands::Show { name } => {
            let mut flavor = client.flavor_ref(name);
            flavor.get().await?;
            Ok(flavor_row(&flavor))
        }
        FlavorCommands::Update {
            name,
            pool_group,
            pool_list,
            capabilities,
        } => {
            let mut data = Map::new();
            insert_some(&mut data, "pool", pool_group);
            insert_some(&mut data, "pool_list", non_empty(pool_list));
            if let Some(capabilities) = capabilities {
                data.insert(
                    "capabilities".to_string(),
                    Value::Object(parse_object("capabilities", &capabilities)?),
                );
            }
            require_changes(&data)?;

            info!(flavor = %name, "Updating flavor");
            let mut flavor = client.flavor_ref(name);
            flavor.update(data).await?;
            flavor.get().await?;
            Ok(flavor_row(&flavor))
        }
        FlavorCommands::Delete { name } => {
            info!(flavor = %name, "Deleting flavor");
            client.flavor_ref(name).delete().await?;
            Ok(Value::Null)
        }
        FlavorCommands::List {
            marker,
            limit,
            detailed,
        } => {
            let flavors = client
                .flavors(listing_params(marker, limit, detailed))
                .await?
                .try_collect()
                .await?;
            Ok(Value::Array(flavors.iter().map(flavor_row).collect()))
        }
    }
}

/// Execute subscription commands
async fn execute_subscription_command(
    client: &Client,
    action: SubscriptionCommands,
) -> Result<Value, CliError> {
    match action {
        SubscriptionCommands::Create {
            queue,
            subscriber,
            ttl,
            options,
        } => {
            let spec = SubscriptionSpec::new(subscriber)
                .with_ttl(ttl)
                .with_options(parse_optional_object("options", options.as_deref())?);
            info!(queue = %queue, "Creating subscription");
            let subscription = client.subscription(queue, spec).await?;
            Ok(subscription_row(&subscription))
        }
        SubscriptionCommands::Show {
            queue,
            subscription_id,
        } => {
            let mut subscription = client.subscription_ref(queue, subscription_id);
            subscription.get().await?;
            Ok(subscription_row(&subscription))
        }
        SubscriptionCommands::Update {
            queue,
            subscription_id,
            subscriber,
            ttl,
            options,
        } => {
            let mut data = Map::new();
            insert_some(&mut data, "subscriber", subscriber);
            insert_some(&mut data, "ttl", ttl);
            if let Some(options) = options {
                data.insert("options".to_string(), Value::Object(parse_object("options", &options)?));
            }
            require_changes(&data)?;

            info!(queue = %queue, subscription = %subscription_id, "Updating subscription");
            let mut subscription = client.subscription_ref(queue, subscription_id);
            subscription.update(data).await?;
            Ok(Value::Null)
        }
        SubscriptionCommands::Delete {
            queue,
            subscription_id,
        } => {
            info!(queue = %queue, subscription = %subscription_id, "Deleting subscription");
            client
                .subscription_ref(queue, subscription_id)
                .delete()
                .await?;
            Ok(Value::Null)
        }
        SubscriptionCommands::List {
            queue,
            marker,
            limit,
        } => {
            let subscriptions = client
                .subscriptions(&queue, listing_params(marker, limit, false))
                .await?
                .try_collect()
                .await?;
            Ok(Value::Array(subscriptions.iter().map(subscription_row).collect()))
        }
    }
}

/// Execute health command. v1 servers only answer with a status.
async fn execute_health_command(client: &Client) -> Result<Value, CliError> {
    if client.api_version() >= ApiVersion::V1_1 {
        Ok(client.health().await?.unwrap_or(Value::Null))
    } else {
        Ok(json!({ "healthy": client.health_check().await? }))
    }
}

// ============================================================================
// Argument Helpers
// ============================================================================

fn listing_params(marker: Option<String>, limit: Option<u64>, detailed: bool) -> Map<String, Value> {
    let mut params = Map::new();
    insert_some(&mut params, "marker", marker);
    insert_some(&mut params, "limit", limit);
    if detailed {
        params.insert("detailed".to_string(), json!(true));
    }
    params
}

fn insert_some<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

fn require_changes(data: &Map<String, Value>) -> Result<(), CliError> {
    if data.is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "update".to_string(),
            message: "no fields to update were given".to_string(),
        });
    }
    Ok(())
}

/// Parse a JSON command-line argument.
pub fn parse_json(arg: &str, raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(|e| CliError::InvalidArgument {
        arg: arg.to_string(),
        message: format!("not valid JSON: {}", e),
    })
}

/// Parse a JSON command-line argument that must be an object.
pub fn parse_object(arg: &str, raw: &str) -> Result<Map<String, Value>, CliError> {
    match parse_json(arg, raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::InvalidArgument {
            arg: arg.to_string(),
            message: "expected a JSON object".to_string(),
        }),
    }
}

fn parse_optional_object(arg: &str, raw: Option<&str>) -> Result<Map<String, Value>, CliError> {
    Ok(raw
        .map(|raw| parse_object(arg, raw))
        .transpose()?
        .unwrap_or_default())
}

// ============================================================================
// Output
// ============================================================================

fn message_row(message: &Message) -> Value {
    json!({
        "id": message.id(),
        "body": message.body(),
        "ttl": message.ttl(),
        "age": message.age(),
        "claim_id": message.claim_id(),
    })
}

async fn claimed_messages(claim: &Claim) -> Result<Value, CliError> {
    let messages = claim.messages().try_collect().await?;
    Ok(Value::Array(messages.iter().map(message_row).collect()))
}

fn pool_row(pool: &Pool) -> Value {
    json!({
        "name": pool.name(),
        "uri": pool.uri(),
        "weight": pool.weight(),
        "group": pool.group(),
        "flavor": pool.flavor(),
        "options": pool.options(),
    })
}

fn flavor_row(flavor: &Flavor) -> Value {
    json!({
        "name": flavor.name(),
        "pool_group": flavor.pool(),
        "pool_list": flavor.pool_list(),
        "capabilities": flavor.capabilities(),
    })
}

fn subscription_row(subscription: &Subscription) -> Value {
    json!({
        "id": subscription.id(),
        "subscriber": subscription.subscriber(),
        "ttl": subscription.ttl(),
        "age": subscription.age(),
        "confirmed": subscription.confirmed(),
        "options": subscription.options(),
    })
}

/// Render a command result. `Value::Null` renders as nothing.
pub fn render(value: &Value, format: OutputFormat) -> Result<String, CliError> {
    if value.is_null() {
        return Ok(String::new());
    }

    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|e| CliError::CommandFailed {
                message: format!("Failed to render JSON: {}", e),
            })
        }
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map(|text| text.trim_end().to_string())
            .map_err(|e| CliError::CommandFailed {
                message: format!("Failed to render YAML: {}", e),
            }),
        OutputFormat::Table => Ok(render_table(value)),
    }
}

/// Lists of objects become one row per object; a single object becomes a
/// Field/Value table.
fn render_table(value: &Value) -> String {
    match value {
        Value::Array(rows) if !rows.is_empty() && rows.iter().all(Value::is_object) => {
            let mut columns: Vec<String> = Vec::new();
            for row in rows.iter().filter_map(Value::as_object) {
                for key in row.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|row| columns.iter().map(|column| cell(row.get(column))).collect())
                .collect();
            format_grid(&columns, &cells)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| cell(Some(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => {
            let cells: Vec<Vec<String>> = map
                .iter()
                .map(|(key, value)| vec![key.clone(), cell(Some(value))])
                .collect();
            format_grid(&["Field".to_string(), "Value".to_string()], &cells)
        }
        other => cell(Some(other)),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_grid(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, text) in widths.iter_mut().zip(row) {
            *width = (*width).max(text.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(text, width)| format!("{:<width$}", text, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![
        line(header),
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    ];
    lines.extend(rows.iter().map(|row| line(row)));
    lines.join("\n")
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
