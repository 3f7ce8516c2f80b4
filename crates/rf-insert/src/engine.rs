//! Insert Engine (control side)
//!
//! [`InsertEngine`] is the command surface. It validates every request,
//! builds processors off the render thread, and hands structural changes to
//! the [`InsertRenderer`] through a lock-free queue.
//!
//! The engine keeps no processor instances of its own. Per slot it holds the
//! atomic control block and, when loaded, the processor's shared parameter
//! store, which is how `set_param`/`get_param` reach the live instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use rtrb::{Consumer, Producer};

use crate::config::EngineConfig;
use crate::error::InsertError;
use crate::handoff::{Queues, RenderCommand, RenderStats, RenderStatsSnapshot, Retired, RetireSink};
use crate::insert_chain::{MAX_INSERT_SLOTS, SlotControls, TrackChain};
use crate::preset::{ChainPreset, SlotPreset};
use crate::processor::{InsertProcessor, ProcessorKind, ProcessorShared};
use crate::registry::create_kind;
use crate::renderer::InsertRenderer;

// ============ Commands ============

/// Closed set of control commands
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadProcessor {
        track: u32,
        slot: usize,
        processor: String,
    },
    SetParam {
        track: u32,
        slot: usize,
        index: usize,
        value: f64,
    },
    SetBypass {
        track: u32,
        slot: usize,
        bypassed: bool,
    },
    RemoveProcessor {
        track: u32,
        slot: usize,
    },
}

/// Query result for one slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSnapshot {
    pub slot: usize,
    pub processor: Option<ProcessorKind>,
    pub bypassed: bool,
    pub mix: f64,
    /// Current values in index order (empty when nothing is loaded)
    pub params: Vec<f64>,
    pub latency: usize,
    pub faults: u64,
}

// ============ Control Mirror ============

struct SlotState {
    controls: Arc<SlotControls>,
    loaded: Option<Arc<ProcessorShared>>,
}

impl SlotState {
    fn shared(&self, slot: usize) -> Result<&Arc<ProcessorShared>, InsertError> {
        self.loaded
            .as_ref()
            .ok_or(InsertError::ProcessorNotLoaded(slot))
    }

    fn snapshot(&self, slot: usize) -> SlotSnapshot {
        SlotSnapshot {
            slot,
            processor: self.loaded.as_ref().map(|s| s.kind()),
            bypassed: self.controls.is_bypassed(),
            mix: self.controls.mix(),
            params: self
                .loaded
                .as_ref()
                .map(|s| s.snapshot())
                .unwrap_or_default(),
            latency: self.loaded.as_ref().map_or(0, |s| s.latency()),
            faults: self.controls.faults(),
        }
    }
}

struct TrackState {
    lane: usize,
    slots: [SlotState; MAX_INSERT_SLOTS],
}

// ============ Insert Engine ============

/// Control-thread half of the insert engine
pub struct InsertEngine {
    config: EngineConfig,
    sample_rate: f64,
    fade_samples: usize,
    tracks: BTreeMap<u32, TrackState>,
    free_lanes: Vec<usize>,
    commands: Producer<RenderCommand>,
    retired: Consumer<Retired>,
    retire_capacity: usize,
    /// Chains and processors handed to the renderer and not yet reclaimed
    in_flight: usize,
    stats: Arc<RenderStats>,
}

impl InsertEngine {
    /// Create the engine and its renderer
    ///
    /// Move the renderer to the audio thread; keep the engine on the control
    /// thread.
    pub fn new(config: EngineConfig) -> Result<(Self, InsertRenderer), InsertError> {
        config
            .validate()
            .map_err(|e| InsertError::InvalidArgument(e.to_string()))?;

        let Queues {
            commands_tx,
            commands_rx,
            retired_tx,
            retired_rx,
            retire_capacity,
        } = Queues::new(config.command_capacity, config.max_tracks);
        let stats = Arc::new(RenderStats::default());
        let renderer = InsertRenderer::new(
            config.max_tracks,
            commands_rx,
            RetireSink::new(retired_tx, Arc::clone(&stats)),
        );

        log::info!(
            "[Insert] engine created: {} Hz, block {}, {} tracks, {:.1} ms crossfade",
            config.sample_rate.as_u32(),
            config.max_block_size,
            config.max_tracks,
            config.crossfade_ms
        );

        let engine = Self {
            sample_rate: config.sample_rate.as_f64(),
            fade_samples: config.fade_samples(),
            free_lanes: (0..config.max_tracks).rev().collect(),
            tracks: BTreeMap::new(),
            commands: commands_tx,
            retired: retired_rx,
            retire_capacity,
            in_flight: 0,
            stats,
            config,
        };
        Ok((engine, renderer))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    // --- hand-off ---

    /// Check there is room for `commands` more commands carrying `objects`
    /// new chains or processors
    ///
    /// Objects count against the retire queue until they are reclaimed, so
    /// the render side never has to drop one in place.
    fn ensure_capacity(&self, commands: usize, objects: usize) -> Result<(), InsertError> {
        if self.commands.slots() < commands {
            log::warn!(
                "[Insert] hand-off queue full ({} free, {} needed)",
                self.commands.slots(),
                commands
            );
            return Err(InsertError::QueueFull);
        }
        if self.in_flight + objects > self.retire_capacity {
            log::warn!(
                "[Insert] {} objects awaiting reclamation, retire queue holds {}",
                self.in_flight,
                self.retire_capacity
            );
            return Err(InsertError::QueueFull);
        }
        Ok(())
    }

    fn send(&mut self, cmd: RenderCommand) -> Result<(), InsertError> {
        let objects = match &cmd {
            RenderCommand::AttachChain { .. } | RenderCommand::Install { .. } => 1,
            RenderCommand::DetachChain { .. } | RenderCommand::Remove { .. } => 0,
        };
        self.commands
            .push(cmd)
            .map_err(|_| InsertError::QueueFull)?;
        self.in_flight += objects;
        Ok(())
    }

    /// Drop everything the render thread has handed back
    pub fn collect_garbage(&mut self) -> usize {
        let mut count = 0;
        while let Ok(item) = self.retired.pop() {
            self.in_flight = self.in_flight.saturating_sub(item.object_count());
            drop(item);
            count += 1;
        }
        if count > 0 {
            log::debug!("[Insert] reclaimed {count} retired objects");
        }
        count
    }

    pub fn stats(&self) -> RenderStatsSnapshot {
        self.stats.snapshot()
    }

    // --- addressing ---

    fn track(&self, track: u32) -> Result<&TrackState, InsertError> {
        self.tracks.get(&track).ok_or(InsertError::InvalidTrack(track))
    }

    fn slot(&self, track: u32, slot: usize) -> Result<&SlotState, InsertError> {
        self.track(track)?
            .slots
            .get(slot)
            .ok_or(InsertError::InvalidSlot(slot))
    }

    fn slot_mut(&mut self, track: u32, slot: usize) -> Result<&mut SlotState, InsertError> {
        self.tracks
            .get_mut(&track)
            .ok_or(InsertError::InvalidTrack(track))?
            .slots
            .get_mut(slot)
            .ok_or(InsertError::InvalidSlot(slot))
    }

    // --- tracks ---

    /// Create a track with an empty chain
    pub fn create_track(&mut self, track: u32) -> Result<(), InsertError> {
        self.collect_garbage();
        if self.tracks.contains_key(&track) {
            return Err(InsertError::TrackExists(track));
        }
        let Some(&lane) = self.free_lanes.last() else {
            return Err(InsertError::TrackLimitReached(self.config.max_tracks));
        };
        self.ensure_capacity(1, 1)?;

        let chain = Box::new(TrackChain::new(
            track,
            self.config.max_block_size,
            self.fade_samples,
        ));
        let slots = chain.controls().map(|controls| SlotState {
            controls,
            loaded: None,
        });
        self.send(RenderCommand::AttachChain { lane, chain })?;
        self.free_lanes.pop();
        self.tracks.insert(track, TrackState { lane, slots });

        log::info!("[Insert] track {track} created (lane {lane})");
        Ok(())
    }

    /// Destroy a track; its chain and processors are reclaimed later
    pub fn destroy_track(&mut self, track: u32) -> Result<(), InsertError> {
        self.collect_garbage();
        let lane = self.track(track)?.lane;
        self.ensure_capacity(1, 0)?;
        self.send(RenderCommand::DetachChain { lane })?;
        self.tracks.remove(&track);
        self.free_lanes.push(lane);

        log::info!("[Insert] track {track} destroyed");
        Ok(())
    }

    pub fn has_track(&self, track: u32) -> bool {
        self.tracks.contains_key(&track)
    }

    /// Track ids in ascending order
    pub fn tracks(&self) -> Vec<u32> {
        self.tracks.keys().copied().collect()
    }

    // --- slot commands ---

    /// Load a processor, replacing whatever the slot holds
    ///
    /// Returns the canonical kind (aliases are resolved).
    pub fn load_processor(
        &mut self,
        track: u32,
        slot: usize,
        processor: &str,
    ) -> Result<ProcessorKind, InsertError> {
        self.collect_garbage();
        let lane = self.track(track)?.lane;
        self.slot(track, slot)?;
        let kind: ProcessorKind = processor.parse()?;
        self.ensure_capacity(1, 1)?;

        let instance = create_kind(kind, self.sample_rate);
        let shared = Arc::clone(instance.shared());
        self.send(RenderCommand::Install {
            lane,
            slot,
            processor: instance,
        })?;
        self.slot_mut(track, slot)?.loaded = Some(shared);

        log::info!("[Insert] track {track} slot {slot}: loaded {kind}");
        Ok(kind)
    }

    /// Write a parameter; returns the stored (normalized) value
    pub fn set_param(
        &mut self,
        track: u32,
        slot: usize,
        index: usize,
        value: f64,
    ) -> Result<f64, InsertError> {
        self.collect_garbage();
        self.slot(track, slot)?.shared(slot)?.set(index, value)
    }

    pub fn get_param(&self, track: u32, slot: usize, index: usize) -> Result<f64, InsertError> {
        self.slot(track, slot)?.shared(slot)?.get(index)
    }

    /// Bypass or re-enable a slot, loaded or not
    pub fn set_bypass(&mut self, track: u32, slot: usize, bypassed: bool) -> Result<(), InsertError> {
        self.collect_garbage();
        self.slot(track, slot)?.controls.set_bypass(bypassed);
        log::debug!("[Insert] track {track} slot {slot}: bypass {bypassed}");
        Ok(())
    }

    pub fn is_bypassed(&self, track: u32, slot: usize) -> Result<bool, InsertError> {
        Ok(self.slot(track, slot)?.controls.is_bypassed())
    }

    /// Set wet/dry mix; returns the stored (clamped) value
    pub fn set_mix(&mut self, track: u32, slot: usize, mix: f64) -> Result<f64, InsertError> {
        self.collect_garbage();
        let controls = &self.slot(track, slot)?.controls;
        if !mix.is_finite() {
            return Err(InsertError::InvalidValue(mix));
        }
        controls.set_mix(mix);
        Ok(controls.mix())
    }

    pub fn mix(&self, track: u32, slot: usize) -> Result<f64, InsertError> {
        Ok(self.slot(track, slot)?.controls.mix())
    }

    /// Unload a slot's processor
    pub fn remove_processor(&mut self, track: u32, slot: usize) -> Result<(), InsertError> {
        self.collect_garbage();
        let lane = self.track(track)?.lane;
        let kind = self.slot(track, slot)?.shared(slot)?.kind();
        self.ensure_capacity(1, 0)?;
        self.send(RenderCommand::Remove { lane, slot })?;
        self.slot_mut(track, slot)?.loaded = None;

        log::info!("[Insert] track {track} slot {slot}: removed {kind}");
        Ok(())
    }

    pub fn loaded_type(&self, track: u32, slot: usize) -> Result<Option<ProcessorKind>, InsertError> {
        Ok(self.slot(track, slot)?.loaded.as_ref().map(|s| s.kind()))
    }

    pub fn query(&self, track: u32, slot: usize) -> Result<SlotSnapshot, InsertError> {
        Ok(self.slot(track, slot)?.snapshot(slot))
    }

    /// Every slot of a track, in slot order
    pub fn chain_snapshot(&self, track: u32) -> Result<Vec<SlotSnapshot>, InsertError> {
        let state = self.track(track)?;
        Ok(state
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| s.snapshot(i))
            .collect())
    }

    /// Total latency in samples of loaded, non-bypassed slots
    pub fn chain_latency(&self, track: u32) -> Result<usize, InsertError> {
        Ok(self
            .track(track)?
            .slots
            .iter()
            .filter(|s| !s.controls.is_bypassed())
            .filter_map(|s| s.loaded.as_ref())
            .map(|s| s.latency())
            .sum())
    }

    pub fn slot_faults(&self, track: u32, slot: usize) -> Result<u64, InsertError> {
        Ok(self.slot(track, slot)?.controls.faults())
    }

    /// Apply a command from the closed set
    pub fn execute(&mut self, command: Command) -> Result<(), InsertError> {
        match command {
            Command::LoadProcessor {
                track,
                slot,
                processor,
            } => self.load_processor(track, slot, &processor).map(|_| ()),
            Command::SetParam {
                track,
                slot,
                index,
                value,
            } => self.set_param(track, slot, index, value).map(|_| ()),
            Command::SetBypass {
                track,
                slot,
                bypassed,
            } => self.set_bypass(track, slot, bypassed),
            Command::RemoveProcessor { track, slot } => self.remove_processor(track, slot),
        }
    }

    // --- presets ---

    /// Capture a track's chain; only parameters that differ from the default are stored
    pub fn export_chain(&self, track: u32) -> Result<ChainPreset, InsertError> {
        let state = self.track(track)?;
        let slots = state
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| s.loaded.as_ref().map(|shared| (slot, s, shared)))
            .map(|(slot, s, shared)| SlotPreset {
                slot,
                processor: shared.kind().id().to_string(),
                bypassed: s.controls.is_bypassed(),
                mix: s.controls.mix(),
                params: shared
                    .snapshot()
                    .into_iter()
                    .zip(shared.layout().defaults())
                    .enumerate()
                    .filter(|(_, (value, default))| value != default)
                    .map(|(index, (value, _))| (index, value))
                    .collect(),
            })
            .collect();
        Ok(ChainPreset {
            slots,
            ..ChainPreset::default()
        })
    }

    /// Unload every slot and reset bypass and mix
    pub fn clear_chain(&mut self, track: u32) -> Result<(), InsertError> {
        self.collect_garbage();
        let state = self.track(track)?;
        let lane = state.lane;
        let loaded: Vec<usize> = (0..MAX_INSERT_SLOTS)
            .filter(|&i| state.slots[i].loaded.is_some())
            .collect();
        self.ensure_capacity(loaded.len(), 0)?;

        for &slot in &loaded {
            self.send(RenderCommand::Remove { lane, slot })?;
        }
        if let Some(state) = self.tracks.get_mut(&track) {
            for s in &mut state.slots {
                s.loaded = None;
                s.controls.set_bypass(false);
                s.controls.set_mix(1.0);
            }
        }

        log::info!("[Insert] track {track}: chain cleared ({} processors)", loaded.len());
        Ok(())
    }

    /// Replace a track's entire chain with a preset
    ///
    /// The preset is validated and every processor built before anything is
    /// sent, so on error the chain is left as it was.
    pub fn import_chain(&mut self, track: u32, preset: &ChainPreset) -> Result<(), InsertError> {
        self.collect_garbage();
        let kinds = preset.validate()?;
        let state = self.track(track)?;
        let lane = state.lane;

        let mut wanted = [false; MAX_INSERT_SLOTS];
        for entry in &preset.slots {
            wanted[entry.slot] = true;
        }
        let stale: Vec<usize> = (0..MAX_INSERT_SLOTS)
            .filter(|&i| !wanted[i] && state.slots[i].loaded.is_some())
            .collect();
        self.ensure_capacity(stale.len() + preset.slots.len(), preset.slots.len())?;

        let mut built: Vec<(usize, Box<dyn InsertProcessor>)> = Vec::with_capacity(kinds.len());
        for (entry, kind) in preset.slots.iter().zip(kinds) {
            let mut instance = create_kind(kind, self.sample_rate);
            for (&index, &value) in &entry.params {
                instance.set_param(index, value)?;
            }
            instance.prime();
            built.push((entry.slot, instance));
        }

        for &slot in &stale {
            self.send(RenderCommand::Remove { lane, slot })?;
        }
        let mut installed = Vec::with_capacity(built.len());
        for (slot, instance) in built {
            installed.push((slot, Arc::clone(instance.shared())));
            self.send(RenderCommand::Install {
                lane,
                slot,
                processor: instance,
            })?;
        }

        let Some(state) = self.tracks.get_mut(&track) else {
            return Err(InsertError::InvalidTrack(track));
        };
        for (i, s) in state.slots.iter_mut().enumerate() {
            let entry = preset.slots.iter().find(|e| e.slot == i);
            s.loaded = installed
                .iter()
                .find(|(slot, _)| *slot == i)
                .map(|(_, shared)| Arc::clone(shared));
            s.controls.set_bypass(entry.is_some_and(|e| e.bypassed));
            s.controls.set_mix(entry.map_or(1.0, |e| e.mix));
        }

        log::info!(
            "[Insert] track {track}: imported chain ({} processors)",
            preset.slots.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for InsertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertEngine")
            .field("sample_rate", &self.sample_rate)
            .field("tracks", &self.tracks.keys().collect::<Vec<_>>())
            .field("free_lanes", &self.free_lanes.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (InsertEngine, InsertRenderer) {
        InsertEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            max_tracks: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            InsertEngine::new(config),
            Err(InsertError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_track_lifecycle() {
        let (mut engine, mut renderer) = engine();
        engine.create_track(7).unwrap();
        engine.create_track(3).unwrap();
        assert_eq!(engine.create_track(7), Err(InsertError::TrackExists(7)));
        assert_eq!(engine.tracks(), vec![3, 7]);

        renderer.begin_block();
        assert_eq!(renderer.active_tracks(), 2);

        engine.destroy_track(7).unwrap();
        assert!(!engine.has_track(7));
        assert_eq!(engine.destroy_track(7), Err(InsertError::InvalidTrack(7)));

        renderer.begin_block();
        assert_eq!(renderer.active_tracks(), 1);
        assert_eq!(engine.collect_garbage(), 1);
    }

    #[test]
    fn test_track_limit_and_lane_reuse() {
        let config = EngineConfig {
            max_tracks: 2,
            ..EngineConfig::default()
        };
        let (mut engine, mut renderer) = InsertEngine::new(config).unwrap();
        engine.create_track(1).unwrap();
        engine.create_track(2).unwrap();
        assert_eq!(engine.create_track(3), Err(InsertError::TrackLimitReached(2)));

        engine.destroy_track(1).unwrap();
        engine.create_track(3).unwrap();
        renderer.begin_block();
        assert_eq!(renderer.active_tracks(), 2);

        let mut l = vec![0.5; 64];
        let mut r = vec![0.5; 64];
        assert!(renderer.process_track(3, &mut l, &mut r));
        assert!(!renderer.process_track(1, &mut l, &mut r));
    }

    #[test]
    fn test_addressing_errors_in_order() {
        let (mut engine, _renderer) = engine();
        engine.create_track(1).unwrap();

        assert_eq!(
            engine.load_processor(9, 99, "nope"),
            Err(InsertError::InvalidTrack(9))
        );
        assert_eq!(
            engine.load_processor(1, 8, "nope"),
            Err(InsertError::InvalidSlot(8))
        );
        assert!(matches!(
            engine.load_processor(1, 0, "nope"),
            Err(InsertError::UnknownProcessorType(_))
        ));
        assert_eq!(
            engine.set_param(1, 0, 0, 1.0),
            Err(InsertError::ProcessorNotLoaded(0))
        );
        assert_eq!(
            engine.remove_processor(1, 0),
            Err(InsertError::ProcessorNotLoaded(0))
        );
        assert_eq!(engine.set_bypass(1, 5, true), Ok(()));
        assert_eq!(engine.set_bypass(1, 8, true), Err(InsertError::InvalidSlot(8)));
        assert_eq!(engine.loaded_type(1, 0), Ok(None));
    }

    #[test]
    fn test_queue_full_mutates_nothing() {
        let config = EngineConfig {
            command_capacity: 16,
            ..EngineConfig::default()
        };
        let (mut engine, mut renderer) = InsertEngine::new(config).unwrap();
        for track in 0..16 {
            engine.create_track(track).unwrap();
        }
        assert_eq!(engine.create_track(16), Err(InsertError::QueueFull));
        assert!(!engine.has_track(16));
        assert_eq!(engine.load_processor(0, 0, "gate"), Err(InsertError::QueueFull));
        assert_eq!(engine.loaded_type(0, 0), Ok(None));

        renderer.begin_block();
        assert_eq!(renderer.stats().commands_applied, 16);
        engine.create_track(16).unwrap();
    }

    #[test]
    fn test_stacked_replacements_never_drop_on_render_thread() {
        let config = EngineConfig {
            max_tracks: 1,
            command_capacity: 16,
            ..EngineConfig::default()
        };
        let (mut engine, mut renderer) = InsertEngine::new(config).unwrap();
        engine.create_track(0).unwrap();
        let mut l = vec![0.1; 4096];
        let mut r = vec![0.1; 4096];

        for slot in 0..MAX_INSERT_SLOTS {
            engine.load_processor(0, slot, "gate").unwrap();
        }
        renderer.process_track(0, &mut l, &mut r);

        // Each round lands while the previous one is still fading, so slots
        // stack an active, an outgoing and a queued instance
        let mut refused = 0;
        for kind in ["expander", "compressor", "delay"] {
            for slot in 0..MAX_INSERT_SLOTS {
                match engine.load_processor(0, slot, kind) {
                    Ok(_) => {}
                    Err(InsertError::QueueFull) => refused += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            renderer.begin_block();
        }
        for slot in 0..MAX_INSERT_SLOTS {
            engine.remove_processor(0, slot).unwrap();
        }
        for _ in 0..4 {
            renderer.process_track(0, &mut l, &mut r);
        }
        engine.collect_garbage();

        assert!(refused > 0);
        assert_eq!(renderer.stats().retire_overflows, 0);
        assert_eq!(engine.in_flight, 1);
        assert!((0..MAX_INSERT_SLOTS).all(|s| engine.loaded_type(0, s) == Ok(None)));
    }

    #[test]
    fn test_replaced_processor_is_reclaimed_on_control_thread() {
        let (mut engine, mut renderer) = engine();
        engine.create_track(1).unwrap();
        engine.load_processor(1, 0, "gate").unwrap();

        let mut l = vec![0.1; 512];
        let mut r = vec![0.1; 512];
        renderer.process_track(1, &mut l, &mut r);
        engine.load_processor(1, 0, "expander").unwrap();
        renderer.process_track(1, &mut l, &mut r);

        assert_eq!(engine.collect_garbage(), 1);
        assert_eq!(engine.loaded_type(1, 0), Ok(Some(ProcessorKind::Expander)));
        assert_eq!(engine.stats().retire_overflows, 0);
    }

    #[test]
    fn test_execute_dispatches() {
        let (mut engine, _renderer) = engine();
        engine.create_track(1).unwrap();
        engine
            .execute(Command::LoadProcessor {
                track: 1,
                slot: 2,
                processor: "comp".into(),
            })
            .unwrap();
        engine
            .execute(Command::SetParam {
                track: 1,
                slot: 2,
                index: 0,
                value: -12.0,
            })
            .unwrap();
        engine
            .execute(Command::SetBypass {
                track: 1,
                slot: 2,
                bypassed: true,
            })
            .unwrap();

        let snapshot = engine.query(1, 2).unwrap();
        assert_eq!(snapshot.processor, Some(ProcessorKind::Compressor));
        assert_eq!(snapshot.params[0], -12.0);
        assert!(snapshot.bypassed);

        engine
            .execute(Command::RemoveProcessor { track: 1, slot: 2 })
            .unwrap();
        assert_eq!(engine.loaded_type(1, 2), Ok(None));
    }

    #[test]
    fn test_chain_latency_skips_bypassed() {
        let (mut engine, _renderer) = engine();
        engine.create_track(1).unwrap();
        engine.load_processor(1, 0, "limiter").unwrap();
        engine.load_processor(1, 1, "limiter").unwrap();
        let one = engine.query(1, 0).unwrap().latency;
        assert!(one > 0);
        assert_eq!(engine.chain_latency(1), Ok(2 * one));

        engine.set_bypass(1, 1, true).unwrap();
        assert_eq!(engine.chain_latency(1), Ok(one));
    }

    #[test]
    fn test_mix_is_clamped_and_validated() {
        let (mut engine, _renderer) = engine();
        engine.create_track(1).unwrap();
        assert_eq!(engine.set_mix(1, 0, 1.5), Ok(1.0));
        assert_eq!(engine.set_mix(1, 0, 0.25), Ok(0.25));
        assert!(matches!(
            engine.set_mix(1, 0, f64::NAN),
            Err(InsertError::InvalidValue(_))
        ));
        assert_eq!(engine.mix(1, 0), Ok(0.25));
    }
}
