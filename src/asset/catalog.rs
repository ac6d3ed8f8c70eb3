use std::collections::VecDeque;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use volstream_manifest::typedefs::Manifest;

use crate::errors::AssetError;

/// Tuning of the buffer aware bitrate adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbrConfig {
    /// Consecutive segments below the current bandwidth before demoting.
    pub demote_after: u32,
    /// Consecutive segments at or above the next tier before upgrading.
    pub upgrade_after: u32,
    /// Minimum buffer fill ratio required for an upgrade.
    pub upgrade_min_fill: f64,
    /// Number of samples the asset wide throughput estimate averages over.
    pub throughput_window: usize,
    /// Estimate used before the first segment arrived. Zero picks the lowest representation.
    pub initial_throughput_bps: f64,
}

impl Default for AbrConfig {
    fn default() -> Self {
        Self {
            demote_after: 2,
            upgrade_after: 2,
            upgrade_min_fill: 0.5,
            throughput_window: 3,
            initial_throughput_bps: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationSetInfo {
    pub id: String,
    pub mime_type: String,
    pub codec: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepresentationInfo {
    pub id: String,
    pub bandwidth: u32,
    pub max_fps: f32,
}

/// Asked with each candidate in preference order; the first candidate it accepts is used.
/// Called from a worker thread and must not block.
pub type SelectionPolicy = Arc<dyn Fn(&AdaptationSetInfo, usize, &[RepresentationInfo]) -> bool + Send + Sync>;

/// Highest bandwidth not above `estimate`, or the lowest representation if none fits.
pub fn highest_fitting(representations: &[RepresentationInfo], estimate: f64) -> usize {
    let fitting = representations
        .iter()
        .enumerate()
        .filter(|(_, rep)| rep.bandwidth as f64 <= estimate)
        .max_by_key(|(_, rep)| rep.bandwidth)
        .map(|(index, _)| index);

    fitting.unwrap_or_else(|| {
        representations
            .iter()
            .position_min_by_key(|rep| rep.bandwidth)
            .unwrap_or(0)
    })
}

/// Per adaptation set hysteresis state.
#[derive(Debug, Clone)]
pub struct AbrController {
    current: usize,
    below: u32,
    above: u32,
    samples: VecDeque<f64>,
}

impl AbrController {
    pub fn new(current: usize) -> Self {
        Self {
            current,
            below: 0,
            above: 0,
            samples: VecDeque::new(),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    fn reset_to(&mut self, index: usize) {
        self.current = index;
        self.below = 0;
        self.above = 0;
        self.samples.clear();
    }

    /// Feeds one per segment throughput sample. Returns the representation the controller would switch to.
    pub fn observe(
        &mut self,
        config: &AbrConfig,
        representations: &[RepresentationInfo],
        sample_bps: f64,
        fill_ratio: f64,
    ) -> Option<usize> {
        let keep = config.demote_after.max(config.upgrade_after).max(1) as usize;
        self.samples.push_back(sample_bps);
        while self.samples.len() > keep {
            self.samples.pop_front();
        }

        let current_bandwidth = representations[self.current].bandwidth as f64;
        if sample_bps < current_bandwidth {
            self.below += 1;
            self.above = 0;
        } else {
            self.below = 0;
        }

        if self.below >= config.demote_after.max(1) {
            let recent = self.samples.iter().rev().take(config.demote_after.max(1) as usize);
            let mean = recent.clone().sum::<f64>() / recent.count() as f64;
            self.below = 0;

            let target = highest_fitting(representations, mean);
            if (representations[target].bandwidth as f64) < current_bandwidth {
                return Some(target);
            }
            return None;
        }

        let next_tier = representations
            .iter()
            .map(|rep| rep.bandwidth as f64)
            .filter(|bandwidth| *bandwidth > current_bandwidth)
            .min_by(|a, b| a.total_cmp(b));

        match next_tier {
            Some(next) if sample_bps >= next => self.above += 1,
            _ => self.above = 0,
        }

        if self.above >= config.upgrade_after.max(1) {
            if fill_ratio < config.upgrade_min_fill {
                trace!("Upgrade held back, buffer fill {:.2} below {:.2}", fill_ratio, config.upgrade_min_fill);
                return None;
            }

            let floor = self
                .samples
                .iter()
                .rev()
                .take(config.upgrade_after.max(1) as usize)
                .copied()
                .fold(f64::INFINITY, f64::min);
            self.above = 0;

            let target = highest_fitting(representations, floor);
            if representations[target].bandwidth as f64 > current_bandwidth {
                return Some(target);
            }
        }

        None
    }
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub info: AdaptationSetInfo,
    pub representations: Vec<RepresentationInfo>,
    /// False for tracks the engine can not decode; those only go to the data callback.
    pub decodable: bool,
    abr: Option<AbrController>,
}

impl CatalogEntry {
    pub fn selected(&self) -> Option<usize> {
        self.abr.as_ref().map(|abr| abr.current())
    }

    pub fn selected_representation(&self) -> Option<&RepresentationInfo> {
        self.selected().map(|index| &self.representations[index])
    }

    /// The proposal first, then lower bandwidths from high to low, then higher ones from low to high.
    fn candidate_order(&self, proposed: usize) -> Vec<usize> {
        let proposed_bandwidth = self.representations[proposed].bandwidth;
        let lower = self
            .representations
            .iter()
            .enumerate()
            .filter(|(index, rep)| *index != proposed && rep.bandwidth <= proposed_bandwidth)
            .sorted_by(|(_, a), (_, b)| b.bandwidth.cmp(&a.bandwidth))
            .map(|(index, _)| index);
        let higher = self
            .representations
            .iter()
            .enumerate()
            .filter(|(_, rep)| rep.bandwidth > proposed_bandwidth)
            .sorted_by_key(|(_, rep)| rep.bandwidth)
            .map(|(index, _)| index);

        std::iter::once(proposed).chain(lower).chain(higher).collect_vec()
    }
}

/// The representations of every adaptation set of one asset, plus the current choice per set.
#[derive(Debug, Clone)]
pub struct RepresentationCatalog {
    entries: Vec<CatalogEntry>,
    config: AbrConfig,
}

impl RepresentationCatalog {
    pub fn from_manifest<F: Fn(&AdaptationSetInfo) -> bool>(manifest: &Manifest, config: AbrConfig, is_decodable: F) -> Self {
        let entries = manifest
            .adaptation_sets
            .iter()
            .map(|set| {
                let info = AdaptationSetInfo {
                    id: set.id.clone(),
                    mime_type: set.mime_type.clone(),
                    codec: set.codec.clone(),
                };
                CatalogEntry {
                    decodable: is_decodable(&info),
                    info,
                    representations: set
                        .representations
                        .iter()
                        .map(|rep| RepresentationInfo {
                            id: rep.id.clone(),
                            bandwidth: rep.bandwidth,
                            max_fps: rep.max_fps,
                        })
                        .collect_vec(),
                    abr: None,
                }
            })
            .collect_vec();

        Self { entries, config }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn entry(&self, set_index: usize) -> &CatalogEntry {
        &self.entries[set_index]
    }

    pub fn config(&self) -> &AbrConfig {
        &self.config
    }

    /// Picks the first representation of a set once data is about to flow for it.
    pub fn select_initial(
        &mut self,
        set_index: usize,
        estimate_bps: f64,
        policy: Option<&SelectionPolicy>,
    ) -> Result<usize, AssetError> {
        let entry = &self.entries[set_index];
        let proposed = highest_fitting(&entry.representations, estimate_bps);
        let chosen = match policy {
            None => Some(proposed),
            Some(policy) => Self::ask_policy(entry, proposed, policy),
        };

        let Some(chosen) = chosen else {
            warn!("Selection policy rejected every representation of {}", entry.info.id);
            return Err(AssetError::RepresentationRejected {
                adaptation_set: entry.info.id.clone(),
            });
        };

        info!(
            "{}: starting with representation {} ({} bps)",
            entry.info.id, entry.representations[chosen].id, entry.representations[chosen].bandwidth
        );
        self.entries[set_index].abr = Some(AbrController::new(chosen));
        Ok(chosen)
    }

    /// Feeds the throughput of one freshly downloaded segment. Returns the new selection if it changed.
    /// A rejected proposal keeps the current representation.
    pub fn observe_segment(
        &mut self,
        set_index: usize,
        sample_bps: f64,
        fill_ratio: f64,
        policy: Option<&SelectionPolicy>,
    ) -> Option<usize> {
        let config = self.config.clone();
        let entry = &mut self.entries[set_index];
        let abr = entry.abr.as_mut()?;
        let proposed = abr.observe(&config, &entry.representations, sample_bps, fill_ratio)?;

        let accepted = match policy {
            None => true,
            Some(policy) => policy(&entry.info, proposed, &entry.representations),
        };

        if !accepted {
            debug!("{}: selection policy kept the current representation", entry.info.id);
            return None;
        }

        let previous = abr.current();
        abr.reset_to(proposed);
        info!(
            "{}: switching representation {} -> {} ({:.0} bps measured)",
            entry.info.id, entry.representations[previous].id, entry.representations[proposed].id, sample_bps
        );
        Some(proposed)
    }

    fn ask_policy(entry: &CatalogEntry, proposed: usize, policy: &SelectionPolicy) -> Option<usize> {
        entry
            .candidate_order(proposed)
            .into_iter()
            .find(|candidate| policy(&entry.info, *candidate, &entry.representations))
    }
}
