use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use volstream_manifest::deserialize_manifest;
use volstream_manifest::typedefs::Manifest;

use crate::asset::asset::Asset;
use crate::asset::catalog::RepresentationCatalog;
use crate::asset::decoder::{self, DecodedTrack, SegmentPlacement};
use crate::asset::playback::ActiveTrack;
use crate::asset::state::AssetState;
use crate::errors::{AssetError, IngestError};
use crate::interface::log_buffer::{LogLevel, LogSink};
use crate::io::common::loader::SegmentLoader;
use crate::io::source::{AssetSource, open_source};
use crate::networking::ingest::{FetchOutcome, FetchRequest, IngestClient};
use crate::networking::reorder::ReorderBuffer;
use crate::networking::throughput::ThroughputEstimator;
use crate::settings::engine::EngineConfig;
use crate::util::memory::MemoryTracker;

/// The interface wide services a streamer works with.
#[derive(Clone)]
pub struct StreamerContext {
    pub ingest: Arc<IngestClient>,
    pub memory: Arc<MemoryTracker>,
    pub config: Arc<EngineConfig>,
    pub log: Arc<LogSink>,
}

/// Where the asset comes from. Resolved by the streamer, so creating an asset never touches disk or network.
pub struct AssetOrigin {
    pub path: String,
    pub cache_dir: Option<PathBuf>,
    pub loader: Option<Arc<dyn SegmentLoader>>,
}

struct DecodeDone {
    epoch: u64,
    seq: u64,
    part: usize,
    result: Result<DecodedTrack, AssetError>,
}

/// An adaptation set that is fetched for every slot. Sets the engine can not decode are only fetched for the
/// representation data callback.
struct ActiveSet {
    set_index: usize,
    decodable: bool,
}

fn active_tracks(catalog: &RepresentationCatalog, active: &[ActiveSet]) -> Vec<ActiveTrack> {
    active
        .iter()
        .filter_map(|set| {
            let entry = catalog.entry(set.set_index);
            let representation = entry.selected_representation()?;
            Some(ActiveTrack {
                adaptation_set: entry.info.id.clone(),
                mime_type: entry.info.mime_type.clone(),
                codec: entry.info.codec.clone(),
                representation: representation.id.clone(),
                bandwidth: representation.bandwidth,
                max_fps: representation.max_fps,
                decoded: set.decodable,
            })
        })
        .collect_vec()
}

/// Drives one asset from manifest to buffered frames: fetches the slots of the forward window, decodes them off
/// the async workers, reorders completions and feeds the decode buffer. Runs until the asset is deleted or invalid.
pub async fn run_streamer(asset: Arc<Asset>, origin: AssetOrigin, context: StreamerContext) {
    let handle = asset.handle();
    match Streamer::start(asset.clone(), origin, context.clone()).await {
        Ok(Some(streamer)) => streamer.run().await,
        Ok(None) => {}
        Err(error) => {
            context
                .log
                .post(LogLevel::Error, &format!("Asset {} failed to initialise: {}", handle, error));
            asset.lock().invalidate(error);
        }
    }

    let failure = {
        let core = asset.lock();
        core.error().filter(|_| core.is_invalid()).map(AssetError::code)
    };
    if let Some(code) = failure {
        asset.report_initialised(code);
    }

    asset.notify_frames();
    debug!("Streamer of asset {} finished", handle);
}

struct Streamer {
    asset: Arc<Asset>,
    context: StreamerContext,
    loader: Arc<dyn SegmentLoader>,
    manifest: Arc<Manifest>,
    catalog: RepresentationCatalog,
    active: Vec<ActiveSet>,
    throughput: ThroughputEstimator,
    reorder: ReorderBuffer<Option<DecodedTrack>>,
    /// Slots fetched or decoding, until they reach the decode buffer.
    placements: HashMap<u64, SegmentPlacement>,
    next_seq: u64,
    epoch: u64,
    outcomes_tx: mpsc::UnboundedSender<FetchOutcome>,
    outcomes: mpsc::UnboundedReceiver<FetchOutcome>,
    decodes: JoinSet<DecodeDone>,
    /// Set while waiting for the next probe after going offline or running out of memory.
    stalled_until: Option<Instant>,
    connectivity: watch::Receiver<u64>,
    connectivity_open: bool,
}

impl Streamer {
    async fn start(
        asset: Arc<Asset>,
        origin: AssetOrigin,
        context: StreamerContext,
    ) -> Result<Option<Streamer>, AssetError> {
        let source = match origin.loader {
            Some(loader) => AssetSource {
                loader,
                manifest_location: origin.path.clone(),
            },
            None => open_source(&origin.path, origin.cache_dir.clone(), context.config.http_timeout())
                .map_err(|e| AssetError::ManifestUnreachable(e.to_string()))?,
        };
        debug!("Asset {}: loading {}{}", asset.handle(), source.loader.describe(), source.manifest_location);

        let fetched = context
            .ingest
            .load_with_retry(source.loader.clone(), &source.manifest_location, || {
                !asset.is_deleted() && !asset.lock().is_invalid()
            })
            .await;
        let bytes = match fetched {
            Ok((bytes, _, _)) => bytes,
            Err(IngestError::Cancelled) => return Ok(None),
            Err(e) => return Err(AssetError::ManifestUnreachable(e.to_string())),
        };

        let manifest =
            Arc::new(deserialize_manifest(Cursor::new(bytes)).map_err(|e| AssetError::ManifestMalformed(e.to_string()))?);
        let mut catalog = RepresentationCatalog::from_manifest(&manifest, context.config.abr.clone(), decoder::is_supported);

        let has_data_callback = asset.data_callback().is_some();
        let mut active = Vec::new();
        for (set_index, entry) in catalog.entries().iter().enumerate() {
            if entry.decodable {
                active.push(ActiveSet {
                    set_index,
                    decodable: true,
                });
            } else if has_data_callback {
                info!("{} ({}) is handed to the data callback only", entry.info.id, entry.info.codec);
                active.push(ActiveSet {
                    set_index,
                    decodable: false,
                });
            } else {
                return Err(AssetError::UnsupportedCodec {
                    mime_type: entry.info.mime_type.clone(),
                    codec: entry.info.codec.clone(),
                });
            }
        }

        if !active.iter().any(|set| set.decodable) {
            let entry = catalog.entry(0);
            return Err(AssetError::UnsupportedCodec {
                mime_type: entry.info.mime_type.clone(),
                codec: entry.info.codec.clone(),
            });
        }

        let throughput = ThroughputEstimator::new(
            context.config.abr.throughput_window,
            context.config.abr.initial_throughput_bps,
        );
        for set in &active {
            catalog.select_initial(set.set_index, throughput.estimate(), asset.selection_policy())?;
        }

        let tracks = active_tracks(&catalog, &active);
        let (next_seq, epoch) = {
            let mut core = asset.lock();
            if asset.is_deleted() || core.is_invalid() {
                return Ok(None);
            }
            core.resolve(manifest.clone(), tracks);
            (core.resume_slot(), asset.epoch())
        };

        context.log.post(
            LogLevel::Info,
            &format!(
                "Asset {}: {:.2}s in {} segments, {} tracks",
                asset.handle(),
                manifest.duration,
                manifest.segment_count(),
                active.len()
            ),
        );

        let (outcomes_tx, outcomes) = mpsc::unbounded_channel();
        let connectivity = context.ingest.subscribe_connectivity();
        Ok(Some(Streamer {
            reorder: ReorderBuffer::new(next_seq, active.len()),
            asset,
            loader: source.loader,
            manifest,
            catalog,
            active,
            throughput,
            placements: HashMap::new(),
            next_seq,
            epoch,
            outcomes_tx,
            outcomes,
            decodes: JoinSet::new(),
            stalled_until: None,
            connectivity,
            connectivity_open: true,
            context,
        }))
    }

    async fn run(mut self) {
        loop {
            if self.asset.is_deleted() || self.asset.lock().is_invalid() {
                break;
            }

            self.sync_epoch();
            self.schedule();

            let probe_at = self.stalled_until;
            tokio::select! {
                Some(outcome) = self.outcomes.recv() => self.on_fetched(outcome),
                Some(done) = self.decodes.join_next(), if !self.decodes.is_empty() => self.on_decoded(done),
                _ = self.asset.woken().notified() => {}
                changed = self.connectivity.changed(), if self.connectivity_open => {
                    if changed.is_ok() {
                        self.on_reconnect();
                    } else {
                        self.connectivity_open = false;
                    }
                }
                _ = tokio::time::sleep_until(probe_at.unwrap_or_else(Instant::now)), if probe_at.is_some() => {
                    self.recover();
                }
            }
        }
    }

    fn sync_epoch(&mut self) {
        let epoch = self.asset.epoch();
        if epoch != self.epoch {
            self.epoch = epoch;
            self.restart_pipeline();
        }
    }

    /// Forgets everything in flight and continues at the end of the buffered run.
    fn restart_pipeline(&mut self) {
        let next = self.asset.lock().resume_slot();
        trace!("Asset {}: fetching again from slot {}", self.asset.handle(), next);
        self.placements.clear();
        self.reorder.reset(next);
        self.next_seq = next;
    }

    fn schedule(&mut self) {
        if self.stalled_until.is_some() {
            return;
        }

        let max_in_flight = self.context.config.max_in_flight_segments.max(1);
        let mut requests = Vec::new();
        let mut failure = None;
        {
            let core = self.asset.lock();
            while self.placements.len() < max_in_flight && core.wants_slot(self.next_seq) {
                let seq = self.next_seq;
                let Some(placement) = core.placement(seq) else {
                    break;
                };
                let index = (seq % core.segment_count()) as u32;

                for set in &self.active {
                    let entry = self.catalog.entry(set.set_index);
                    let Some(representation_index) = entry.selected() else {
                        continue;
                    };
                    let representation = &entry.representations[representation_index];

                    match self.manifest.adaptation_sets[set.set_index].segment_path(
                        &self.manifest,
                        &representation.id,
                        index,
                    ) {
                        Ok(location) => requests.push(FetchRequest {
                            seq,
                            set_index: set.set_index,
                            representation_index,
                            location,
                            start_time: placement.start,
                            end_time: placement.end,
                            epoch: self.epoch,
                        }),
                        Err(e) => failure = Some(AssetError::ManifestMalformed(e.to_string())),
                    }
                }

                self.placements.insert(seq, placement);
                self.next_seq += 1;
            }
        }

        if let Some(error) = failure {
            self.fail(error);
            return;
        }

        for request in requests {
            self.context.ingest.enqueue_fetch(
                request,
                self.loader.clone(),
                self.asset.epoch_ref(),
                self.outcomes_tx.clone(),
            );
        }
    }

    fn on_fetched(&mut self, outcome: FetchOutcome) {
        let request = outcome.request;
        if request.epoch != self.epoch || !self.placements.contains_key(&request.seq) {
            trace!("Dropping stale result for slot {}", request.seq);
            return;
        }

        let fetched = match outcome.result {
            Ok(fetched) => fetched,
            Err(IngestError::Cancelled) => return,
            Err(error) => return self.on_fetch_failed(&request, error),
        };

        let Some(part) = self.active.iter().position(|set| set.set_index == request.set_index) else {
            return;
        };

        let came_back = {
            let mut core = self.asset.lock();
            let offline = core.state().contains(AssetState::OFFLINE);
            if offline {
                core.set_offline(false);
            }
            offline
        };
        if came_back {
            self.context
                .log
                .post(LogLevel::Info, &format!("Asset {} is back online", self.asset.handle()));
        }

        if !fetched.from_cache {
            let sample = self.throughput.record(fetched.data.len(), fetched.elapsed);
            let fill = self.asset.lock().fill_ratio();
            let switched =
                self.catalog
                    .observe_segment(request.set_index, sample, fill, self.asset.selection_policy());
            if switched.is_some() {
                let tracks = active_tracks(&self.catalog, &self.active);
                self.asset.lock().set_tracks(tracks);
            }
        }

        let entry = self.catalog.entry(request.set_index);
        let info = entry.info.clone();
        let representation = entry.representations[request.representation_index].id.clone();
        if let Some(callback) = self.asset.data_callback() {
            callback(&info.mime_type, &info.codec, request.start_time, &fetched.data);
        }

        if !self.active[part].decodable {
            self.deliver(request.seq, part, None);
            return;
        }

        let Some(placement) = self.placements.get(&request.seq).copied() else {
            return;
        };
        let memory = self.context.memory.clone();
        let data = fetched.data;
        let (epoch, seq) = (self.epoch, request.seq);

        self.decodes.spawn_blocking(move || DecodeDone {
            epoch,
            seq,
            part,
            result: decoder::decode_track(&data, &info, &representation, &placement, &memory),
        });
    }

    fn on_decoded(&mut self, done: Result<DecodeDone, JoinError>) {
        let done = match done {
            Ok(done) => done,
            Err(e) if e.is_cancelled() => return,
            Err(e) => return self.on_fatal(AssetError::Decode(format!("decoder panicked: {}", e))),
        };

        if done.epoch != self.epoch {
            return;
        }

        match done.result {
            Ok(track) => self.deliver(done.seq, done.part, Some(track)),
            Err(AssetError::OutOfMemory { bytes }) => {
                self.context.log.post(
                    LogLevel::Warning,
                    &format!("Asset {}: out of memory decoding {} bytes, retrying later", self.asset.handle(), bytes),
                );
                self.stall();
            }
            Err(error) => self.on_fatal(error),
        }
    }

    /// Collects the parts of a slot and pushes complete slots into the buffer in slot order.
    fn deliver(&mut self, seq: u64, part: usize, track: Option<DecodedTrack>) {
        if !self.reorder.insert(seq, part, track) {
            return;
        }

        while let Some((seq, parts)) = self.reorder.pop_ready() {
            let Some(placement) = self.placements.remove(&seq) else {
                continue;
            };

            let segment = decoder::assemble_segment(&placement, parts.into_iter().flatten().collect_vec());
            let (admitted, ready, fill) = {
                let mut core = self.asset.lock();
                let admitted = core.push_segment(segment);
                (admitted, core.try_mark_ready(), core.fill_ratio())
            };
            self.asset.notify_frames();
            trace!("Asset {}: slot {} buffered ({}), fill {:.2}", self.asset.handle(), seq, admitted, fill);

            if ready {
                self.context
                    .log
                    .post(LogLevel::Info, &format!("Asset {} is ready", self.asset.handle()));
                self.asset.report_initialised(0);
            }
        }
    }

    fn on_fetch_failed(&mut self, request: &FetchRequest, error: IngestError) {
        match error {
            IngestError::Cancelled => {}
            IngestError::Transient { .. } => self.go_offline(&format!("{}: {}", request.location, error)),
            IngestError::Fatal { reason } => {
                self.on_fatal(AssetError::SegmentUnavailable(format!("{}: {}", request.location, reason)))
            }
        }
    }

    /// With data buffered the asset keeps playing what it has; without, there is nothing to fall back to.
    fn on_fatal(&mut self, error: AssetError) {
        let received = self.asset.lock().segments_received();
        if received > 0 {
            self.go_offline(&error.to_string());
        } else {
            self.fail(error);
        }
    }

    fn go_offline(&mut self, reason: &str) {
        self.asset.lock().set_offline(true);
        self.context.log.post(
            LogLevel::Warning,
            &format!("Asset {} went offline: {}", self.asset.handle(), reason),
        );
        self.stall();
    }

    fn stall(&mut self) {
        self.stalled_until = Some(Instant::now() + self.context.config.offline_probe_interval());
        self.epoch = self.asset.bump_epoch();
        self.restart_pipeline();
    }

    fn fail(&mut self, error: AssetError) {
        self.context
            .log
            .post(LogLevel::Error, &format!("Asset {} is invalid: {}", self.asset.handle(), error));
        self.asset.lock().invalidate(error);
    }

    fn recover(&mut self) {
        if self.stalled_until.take().is_none() {
            return;
        }
        debug!("Asset {}: probing again", self.asset.handle());
        self.restart_pipeline();
    }

    fn on_reconnect(&mut self) {
        {
            let mut core = self.asset.lock();
            if core.state().contains(AssetState::OFFLINE) {
                core.set_offline(false);
            }
        }

        if self.stalled_until.is_some() {
            warn!("Asset {}: reconnect signalled, resuming", self.asset.handle());
            self.recover();
        }
    }
}
