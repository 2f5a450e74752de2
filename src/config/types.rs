use serde::Deserialize;

/// Main configuration structure for the syncer
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub syncer: SyncerConfig,
    pub source: SourceConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Walker and worker pool behavior
#[derive(Debug, Clone, Deserialize)]
pub struct SyncerConfig {
    /// Number of concurrent fetch+parse workers
    pub concurrency: u32,

    /// Listing position used when no checkpoint has been stored yet
    #[serde(rename = "inscription-id-start")]
    pub inscription_id_start: i64,

    /// Seconds to sleep between two walks of the listing
    #[serde(rename = "poll-interval", default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Key the checkpoint is stored under
    #[serde(rename = "checkpoint-key", default = "default_checkpoint_key")]
    pub checkpoint_key: String,
}

/// Explorer endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the explorer (listing, detail and content pages hang off it)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Whole-request deadline in seconds
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Connection deadline in seconds
    #[serde(rename = "connect-timeout", default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Bot name sent in the User-Agent header
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Bot version sent in the User-Agent header
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the bot
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Contact address for the explorer operator
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_checkpoint_key() -> String {
    "last_inscription_id".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}
