// Configuration for the terminal client

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub tts_token: Option<String>,
    pub output_device: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000/api".to_string(),
            tts_token: None,
            output_device: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_url: std::env::var("SERVER_URL").unwrap_or(defaults.server_url),
            tts_token: std::env::var("TTS_TOKEN").ok().filter(|t| !t.is_empty()),
            output_device: std::env::var("OUTPUT_DEVICE").ok().filter(|d| !d.is_empty()),
        }
    }
}
