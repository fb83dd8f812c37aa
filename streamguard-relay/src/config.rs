//! Process-level configuration for one relay instance, mirroring the
//! teacher's `Config::from_env()` (`infra/config.rs`) but scoped to the
//! single channel this relay was launched for — the supervisor passes
//! the channel slug and encoder paths as environment variables when it
//! spawns the child (spec §4.3).

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "streamguard-relay", about = "Per-channel media pipe")]
pub struct Config {
    /// Channel slug this relay instance serves.
    #[arg(long, env = "CHANNEL_SLUG")]
    pub channel_slug: String,

    /// Base URL of the media server (spec §6: MS).
    #[arg(long, env = "MS_API_URL")]
    pub ms_api_url: String,

    /// Control API listen port (spec §4.4: port 8080).
    #[arg(long, env = "RELAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Loop ingest RTMP URL (`rtmp://MS/app/{slug}?token={loop_token}`),
    /// supplied once at spawn time; the loop pump never changes target.
    #[arg(long, env = "LOOP_SOURCE_URL")]
    pub loop_source_url: String,

    /// Directory holding the per-channel named pipe.
    #[arg(long, env = "RELAY_PIPE_DIR", default_value = "/tmp/streamguard-relay")]
    pub pipe_dir: String,

    /// Encoder binary used for pumps, the transcoder, and distributors.
    #[arg(long, env = "ENCODER_PATH", default_value = "ffmpeg")]
    pub encoder_path: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Config::parse())
    }

    pub fn pipe_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.pipe_dir).join(format!("{}.fifo", self.channel_slug))
    }

    /// Loopback clean-feed path all distributors read from (spec §4.4).
    pub fn clean_feed_url(&self) -> String {
        format!("{}/app/relay_clean_{}", self.ms_api_url, self.channel_slug)
    }
}
