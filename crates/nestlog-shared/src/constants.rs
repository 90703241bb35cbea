/// Application name
pub const APP_NAME: &str = "nestlog";

/// Default base URL of the remote document store (JSONBin v3 API)
pub const DEFAULT_API_BASE: &str = "https://api.jsonbin.io/v3";

/// Header carrying the document store credential
pub const ACCESS_KEY_HEADER: &str = "X-Access-Key";

/// A current span younger than this is never considered ongoing by the merge
pub const ONGOING_MIN_AGE_MS: i64 = 5_000;

/// Default interval between periodic pulls, in seconds
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 10;

/// Default interval between alert threshold checks, in seconds
pub const DEFAULT_ALERT_INTERVAL_SECS: u64 = 60;

/// Default HTTP request timeout, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Number of trailing document id characters shown in a room code
pub const ROOM_CODE_LEN: usize = 6;

/// Separator between the two halves of a room code
pub const ROOM_CODE_SEPARATOR: char = '-';

/// Local key-value storage keys
pub const KEY_TRACKER_DATA: &str = "baby-tracker-data";
pub const KEY_ROOM_INFO: &str = "baby-tracker-room";
pub const KEY_DEVICE_ID: &str = "baby-tracker-device-id";
pub const KEY_NOTIFICATION_SETTINGS: &str = "baby-tracker-notification-settings";
pub const KEY_API_KEY: &str = "jsonbin-api-key";

/// Alert thresholds used when no settings have been saved
pub const DEFAULT_AWAKE_ALERT_MINUTES: u32 = 90;
pub const DEFAULT_SLEEP_ALERT_MINUTES: u32 = 120;

/// Alert dedup tags
pub const ALERT_TAG_AWAKE: &str = "awake-alert";
pub const ALERT_TAG_SLEEP: &str = "sleep-alert";
