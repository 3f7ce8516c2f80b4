//! Render loop
//!
//! [`InsertRenderer`] is the render-thread half of the engine. It owns every
//! track chain, and through them every processor instance. Per callback it
//! drains the hand-off queue, then walks each chain in slot order.
//!
//! Nothing here allocates, locks or waits on the control side.

use rf_core::Sample;
use rtrb::Consumer;

use crate::handoff::{RenderCommand, RenderStatsSnapshot, Retired, RetireSink};
use crate::insert_chain::TrackChain;

/// Host-side audio for the tracks being rendered
pub trait TrackIo {
    /// Stereo buffers for `track_id` this callback, or `None` to skip the track
    fn buffers(&mut self, track_id: u32) -> Option<(&mut [Sample], &mut [Sample])>;
}

/// Render-thread owner of all track chains
pub struct InsertRenderer {
    chains: Box<[Option<Box<TrackChain>>]>,
    commands: Consumer<RenderCommand>,
    retire: RetireSink,
}

impl InsertRenderer {
    pub(crate) fn new(max_tracks: usize, commands: Consumer<RenderCommand>, retire: RetireSink) -> Self {
        Self {
            chains: (0..max_tracks).map(|_| None).collect(),
            commands,
            retire,
        }
    }

    /// Apply every queued structural change (call at start of audio callback)
    ///
    /// Safe to call more than once per callback.
    pub fn begin_block(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
            self.retire.stats().command_applied();
        }
    }

    fn apply(&mut self, cmd: RenderCommand) {
        match cmd {
            RenderCommand::AttachChain { lane, chain } => match self.chains.get_mut(lane) {
                Some(entry) => {
                    if let Some(old) = entry.replace(chain) {
                        self.retire.retire(Retired::Chain(old));
                    }
                }
                None => self.retire.retire(Retired::Chain(chain)),
            },
            RenderCommand::DetachChain { lane } => {
                if let Some(chain) = self.chains.get_mut(lane).and_then(Option::take) {
                    self.retire.retire(Retired::Chain(chain));
                }
            }
            RenderCommand::Install {
                lane,
                slot,
                processor,
            } => {
                let target = self
                    .chains
                    .get_mut(lane)
                    .and_then(|c| c.as_deref_mut())
                    .and_then(|c| c.slot_mut(slot));
                match target {
                    Some(slot) => {
                        if let Some(old) = slot.install(processor) {
                            self.retire.retire(Retired::Processor(old));
                        }
                    }
                    None => self.retire.retire(Retired::Processor(processor)),
                }
            }
            RenderCommand::Remove { lane, slot } => {
                let target = self
                    .chains
                    .get_mut(lane)
                    .and_then(|c| c.as_deref_mut())
                    .and_then(|c| c.slot_mut(slot));
                if let Some(old) = target.and_then(|s| s.remove()) {
                    self.retire.retire(Retired::Processor(old));
                }
            }
        }
    }

    /// Process every attached chain against the host's buffers
    pub fn render<IO: TrackIo + ?Sized>(&mut self, io: &mut IO) {
        self.begin_block();
        let retire = &mut self.retire;
        for chain in self.chains.iter_mut().flatten() {
            if let Some((left, right)) = io.buffers(chain.track_id()) {
                chain.process(left, right, &mut |p| retire.retire(Retired::Processor(p)));
            }
        }
        self.retire.stats().block_rendered();
    }

    /// Process a single track in place; returns false if the track has no chain
    pub fn process_track(&mut self, track_id: u32, left: &mut [Sample], right: &mut [Sample]) -> bool {
        self.begin_block();
        let retire = &mut self.retire;
        let Some(chain) = self
            .chains
            .iter_mut()
            .flatten()
            .find(|c| c.track_id() == track_id)
        else {
            return false;
        };
        chain.process(left, right, &mut |p| retire.retire(Retired::Processor(p)));
        retire.stats().block_rendered();
        true
    }

    /// Number of chains currently attached
    pub fn active_tracks(&self) -> usize {
        self.chains.iter().flatten().count()
    }

    pub fn stats(&self) -> RenderStatsSnapshot {
        self.retire.stats().snapshot()
    }
}

impl Drop for InsertRenderer {
    fn drop(&mut self) {
        // Whatever is still queued is dropped with the consumer
        log::debug!("[Insert] renderer dropped with {} chains", self.active_tracks());
    }
}

/// [`TrackIo`] over a fixed set of owned stereo buffers
pub struct StereoTracks {
    tracks: Vec<(u32, Vec<Sample>, Vec<Sample>)>,
}

impl StereoTracks {
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    /// Add a track with zeroed buffers of `len` samples
    pub fn add(&mut self, track_id: u32, len: usize) {
        self.tracks.push((track_id, vec![0.0; len], vec![0.0; len]));
    }

    pub fn get(&self, track_id: u32) -> Option<(&[Sample], &[Sample])> {
        self.tracks
            .iter()
            .find(|(id, _, _)| *id == track_id)
            .map(|(_, l, r)| (l.as_slice(), r.as_slice()))
    }

    pub fn get_mut(&mut self, track_id: u32) -> Option<(&mut [Sample], &mut [Sample])> {
        self.tracks
            .iter_mut()
            .find(|(id, _, _)| *id == track_id)
            .map(|(_, l, r)| (l.as_mut_slice(), r.as_mut_slice()))
    }
}

impl Default for StereoTracks {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackIo for StereoTracks {
    fn buffers(&mut self, track_id: u32) -> Option<(&mut [Sample], &mut [Sample])> {
        self.get_mut(track_id)
    }
}
