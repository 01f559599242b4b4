// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "ProjectHub";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "projecthub";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".projecthub";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "projecthub.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "PROJECTHUB_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

pub const ENV_HOST: &str = "PROJECTHUB_HOST";
pub const ENV_PORT: &str = "PROJECTHUB_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "PROJECTHUB_LOG";

/// Set to `json` for structured log lines
pub const ENV_LOG_FORMAT: &str = "PROJECTHUB_LOG_FORMAT";

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "PROJECTHUB_DATA_DIR";

/// Comma-separated extra CORS origins
pub const ENV_CORS_ORIGINS: &str = "PROJECTHUB_CORS_ORIGINS";

// =============================================================================
// Server Defaults
// =============================================================================

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// Authentication
// =============================================================================

/// Environment variable holding the JWT signing secret (takes precedence over the key file)
pub const ENV_JWT_SECRET: &str = "PROJECTHUB_JWT_SECRET";

/// Environment variable for session token lifetime in hours
pub const ENV_TOKEN_TTL_HOURS: &str = "PROJECTHUB_TOKEN_TTL_HOURS";

/// Key file name under `{data_dir}/secrets/`
pub const SECRET_KEY_JWT_SIGNING: &str = "jwt_signing_key";

/// Default session TTL in hours
pub const DEFAULT_TOKEN_TTL_HOURS: u32 = 24;

/// Minimum accepted length for a signing secret supplied via env
pub const JWT_SECRET_MIN_LEN: usize = 32;

pub const PASSWORD_MIN_LEN: u64 = 8;
pub const PASSWORD_MAX_LEN: u64 = 128;

// =============================================================================
// SQLite Database
// =============================================================================

pub const SQLITE_DB_FILENAME: &str = "projecthub.db";

pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for general API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Body limit for auth endpoints (64 KB)
pub const AUTH_BODY_LIMIT: usize = 64 * 1024;

/// Body limit for upload endpoints (file cap plus multipart framing)
pub const UPLOAD_BODY_LIMIT: usize = FILE_MAX_SIZE_BYTES + 64 * 1024;

// =============================================================================
// File Attachments
// =============================================================================

/// Maximum attachment size (5 MB)
pub const FILE_MAX_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Multipart field carrying the upload
pub const FILE_UPLOAD_FIELD: &str = "file";

pub const FILE_NAME_MAX_LEN: usize = 255;

// =============================================================================
// Deadline Sweep
// =============================================================================

pub const ENV_SWEEP_ENABLED: &str = "PROJECTHUB_SWEEP_ENABLED";
pub const ENV_SWEEP_INTERVAL_HOURS: &str = "PROJECTHUB_SWEEP_INTERVAL_HOURS";

pub const DEFAULT_SWEEP_INTERVAL_HOURS: u64 = 24;

/// Tasks due within this many days are flagged
pub const DEFAULT_TASK_DUE_DAYS: u32 = 3;

/// Projects ending within this many days are flagged
pub const DEFAULT_PROJECT_ENDING_DAYS: u32 = 7;

/// Budgets with this percentage or less remaining are flagged
pub const DEFAULT_BUDGET_THRESHOLD_PERCENT: u32 = 20;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Cache
// =============================================================================

pub const ENV_CACHE_MAX_ENTRIES: &str = "PROJECTHUB_CACHE_MAX_ENTRIES";

pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Cache key version (bump on schema changes to invalidate all cached data)
pub const CACHE_KEY_VERSION: &str = "v1";

/// Cache TTL for user profile (5 min)
pub const CACHE_TTL_USER: u64 = 300;

/// Cache TTL for project rows (5 min)
pub const CACHE_TTL_PROJECT: u64 = 300;

/// Cache TTL for team membership (1 min - critical)
pub const CACHE_TTL_MEMBERSHIP: u64 = 60;

// =============================================================================
// Rate Limiting
// =============================================================================

pub const ENV_RATE_LIMIT_ENABLED: &str = "PROJECTHUB_RATE_LIMIT_ENABLED";

/// Per-IP limiting for the API bucket (disabled by default)
pub const ENV_RATE_LIMIT_PER_IP: &str = "PROJECTHUB_RATE_LIMIT_PER_IP";

pub const ENV_RATE_LIMIT_API_RPM: &str = "PROJECTHUB_RATE_LIMIT_API_RPM";
pub const ENV_RATE_LIMIT_AUTH_RPM: &str = "PROJECTHUB_RATE_LIMIT_AUTH_RPM";
pub const ENV_RATE_LIMIT_FILES_RPM: &str = "PROJECTHUB_RATE_LIMIT_FILES_RPM";

pub const DEFAULT_RATE_LIMIT_API_RPM: u32 = 1000;
pub const DEFAULT_RATE_LIMIT_AUTH_RPM: u32 = 30;
pub const DEFAULT_RATE_LIMIT_FILES_RPM: u32 = 100;

/// Rate limit window in seconds (fixed 1-minute window)
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

// =============================================================================
// Validation Limits
// =============================================================================

pub const NAME_MAX_LEN: u64 = 200;
pub const DESCRIPTION_MAX_LEN: u64 = 10_000;
pub const COMMENT_MAX_LEN: u64 = 10_000;
pub const CATEGORY_MAX_LEN: u64 = 100;
pub const INVITATION_MESSAGE_MAX_LEN: u64 = 1_000;
