pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub const BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

pub const TEXT_MAX_TOKENS: u32 = 500;
pub const IMAGE_MAX_TOKENS: u32 = 1000;
pub const TEMPERATURE: f32 = 0.7;

pub const CREDENTIAL_CHECK_PROMPT: &str = "Hello";
pub const CREDENTIAL_CHECK_MAX_TOKENS: u32 = 5;
pub const MODEL_PREFIX: &str = "gpt-";

pub const WOLFRAM_BASE_URL: &str = "https://api.wolframalpha.com";

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const ELEVENLABS_KEY_HEADER: &str = "xi-api-key";
pub const ELEVENLABS_OUTPUT_FORMAT: &str = "pcm_24000";
