pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
// multipart framing allowance on top of the image limit
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT_QUOTA: u32 = 8;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_FLOOD_BURST_PER_MINUTE: u32 = 120;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 120;
pub const GEMINI_TEMPERATURE: f32 = 0.3;
pub const GEMINI_MAX_OUTPUT_TOKENS: u32 = 2048;

pub const SESSION_COOKIE_NAME: &str = "vitalcare_session";
