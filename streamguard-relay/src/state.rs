//! Shared relay state: wires the muxer, pumps, transcoder, and
//! distributor registry together and applies `POST /update` (spec §4.4).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use streamguard_contracts::relay::{RelayDestination, RelayStatusResponse, RelayUpdateRequest, RelayDestinationStatus};
use streamguard_model::source::Source;

use crate::config::Config;
use crate::distributor::DistributorRegistry;
use crate::mux::Muxer;
use crate::pump::{spawn_loop_pump, spawn_primary_pump, LoopPumpHandle, PrimaryPumpHandle};
use crate::transcoder::{Transcoder, TranscoderConfig};

pub struct RelayState {
    config: Config,
    muxer: Muxer,
    distributors: DistributorRegistry,
    transcoder: Transcoder,
    loop_pump: Mutex<Option<LoopPumpHandle>>,
    primary_pump: Mutex<Option<PrimaryPumpHandle>>,
    last_update: Mutex<Option<RelayUpdateRequest>>,
}

impl RelayState {
    pub async fn start(config: Config) -> anyhow::Result<Arc<Self>> {
        let pipe_path = config.pipe_path();
        let muxer = Muxer::start(&pipe_path, Source::Loop).await?;

        // Loop pump runs forever from the moment the relay starts (spec
        // §4.4(i)); it is already filling the channel by the time any
        // primary pump or preemption happens. Its handle is retained so
        // `shutdown()` can stop it.
        let loop_pump = spawn_loop_pump(
            config.encoder_path.clone(),
            config.loop_source_url.clone(),
            muxer.mode.clone(),
            muxer.sender(),
        );

        let transcoder = Transcoder::start(
            config.encoder_path.clone(),
            pipe_path.to_string_lossy().into_owned(),
            config.clean_feed_url(),
            TranscoderConfig {
                video_bitrate_kbps: 4500,
                audio_bitrate_kbps: 128,
                keyframe_interval_seconds: 2,
                output_resolution: String::new(),
            },
        );

        Ok(Arc::new(Self {
            config,
            muxer,
            distributors: DistributorRegistry::new(),
            transcoder,
            loop_pump: Mutex::new(Some(loop_pump)),
            primary_pump: Mutex::new(None),
            last_update: Mutex::new(None),
        }))
    }

    /// Idempotent: posting the same payload twice produces no observable
    /// change and no child restart (spec §8).
    pub async fn apply_update(self: &Arc<Self>, req: RelayUpdateRequest) {
        let mut last = self.last_update.lock().await;
        if last.as_ref() == Some(&req) {
            return;
        }

        // Source change triggers the mode flip; primary pump is started
        // lazily the first time a primary source URL is posted.
        if req.source == Source::Primary {
            let mut primary = self.primary_pump.lock().await;
            if primary.is_none() {
                let muxer = &self.muxer;
                let mode = muxer.mode.clone();
                let tx = muxer.sender();
                let mode_for_failover = mode.clone();
                *primary = Some(spawn_primary_pump(
                    self.config.encoder_path.clone(),
                    req.source_url.clone(),
                    mode,
                    tx,
                    Arc::new(move || {
                        // Internal failover: pure data-plane action, does
                        // not signal the reconciler (spec §4.4).
                        mode_for_failover.set(Source::Loop);
                    }),
                ));
            }
        }
        self.muxer.switch(req.source);

        // Destination diff.
        let keep: Vec<String> = req.destinations.iter().map(|d| d.id.clone()).collect();
        self.distributors.remove_all_except(&keep);
        for RelayDestination { id, url } in &req.destinations {
            self.distributors.ensure(
                id,
                self.config.encoder_path.clone(),
                self.config.clean_feed_url(),
                url.clone(),
            );
        }

        // Encoding changes restart the transcoder — "the only visible
        // hiccup" (spec §4.4).
        self.transcoder.update_config(TranscoderConfig {
            video_bitrate_kbps: req.video_bitrate_kbps,
            audio_bitrate_kbps: req.audio_bitrate_kbps,
            keyframe_interval_seconds: req.keyframe_interval_seconds,
            output_resolution: String::new(),
        });

        info!(source = ?req.source, destinations = req.destinations.len(), "relay configuration updated");
        *last = Some(req);
    }

    pub async fn status(&self) -> RelayStatusResponse {
        let last = self.last_update.lock().await;
        let source_url = last.as_ref().map(|u| u.source_url.clone()).unwrap_or_default();
        let destinations = last
            .as_ref()
            .map(|u| {
                u.destinations
                    .iter()
                    .map(|d| RelayDestinationStatus {
                        url: d.url.clone(),
                        running: self.distributors.is_running(&d.id),
                    })
                    .collect()
            })
            .unwrap_or_default();

        RelayStatusResponse {
            source: source_url,
            mode: self.muxer.mode.get(),
            destinations,
            transcoder_running: self.transcoder.is_running(),
        }
    }

    /// Structured cleanup on shutdown (spec §9): kill all children, remove
    /// the pipe file.
    pub async fn shutdown(&self) {
        self.distributors.shutdown_all();
        if let Some(primary) = self.primary_pump.lock().await.take() {
            primary.stop();
        }
        if let Some(loop_pump) = self.loop_pump.lock().await.take() {
            loop_pump.stop();
        }
        self.transcoder.shutdown();
        self.muxer.shutdown().await;
    }
}
