//! Insert Effect Chain (render side)
//!
//! Provides per-track effect insert slots with:
//! - 8 insert slots per track, processed in ascending index order
//! - Bypass and wet/dry mix per slot, both crossfaded
//! - Click-free load / replace / remove (old and new instances overlap for
//!   one crossfade)
//! - Fault isolation: a processor that emits non-finite samples is reset and
//!   its slot passes audio through for that block
//!
//! Everything here runs on the render thread. Control-visible slot state lives
//! in [`SlotControls`] atomics; processors arrive fully built through the
//! hand-off queue and leave through the retire queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rf_core::{AtomicParam, Sample, all_finite};

use crate::processor::InsertProcessor;

/// Insert slots per track
pub const MAX_INSERT_SLOTS: usize = 8;

// ============ Slot Controls ============

/// Per-slot state written by the control side, read by the render side
#[derive(Debug)]
pub struct SlotControls {
    bypassed: AtomicBool,
    mix: AtomicParam,
    faults: AtomicU64,
}

impl SlotControls {
    pub fn new() -> Self {
        Self {
            bypassed: AtomicBool::new(false),
            mix: AtomicParam::new(1.0),
            faults: AtomicU64::new(0),
        }
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.bypassed.store(bypass, Ordering::Relaxed);
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Relaxed)
    }

    /// Set wet/dry mix (0.0 = dry, 1.0 = wet)
    pub fn set_mix(&self, mix: f64) {
        self.mix.set(mix.clamp(0.0, 1.0));
    }

    pub fn mix(&self) -> f64 {
        self.mix.get()
    }

    /// Blocks skipped because the processor produced non-finite output
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Weight the render side ramps towards
    #[inline]
    fn target_weight(&self) -> f64 {
        if self.is_bypassed() { 0.0 } else { self.mix() }
    }
}

impl Default for SlotControls {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Scratch Buffers ============

/// Pre-allocated block buffers shared by every slot of a chain
struct Scratch {
    dry_l: Box<[Sample]>,
    dry_r: Box<[Sample]>,
    active_l: Box<[Sample]>,
    active_r: Box<[Sample]>,
    outgoing_l: Box<[Sample]>,
    outgoing_r: Box<[Sample]>,
}

impl Scratch {
    fn new(max_block: usize) -> Self {
        let buf = || vec![0.0; max_block].into_boxed_slice();
        Self {
            dry_l: buf(),
            dry_r: buf(),
            active_l: buf(),
            active_r: buf(),
            outgoing_l: buf(),
            outgoing_r: buf(),
        }
    }
}

/// Run a processor on `left`/`right`; on non-finite output restore `dry`,
/// reset the processor and count a fault
#[inline]
fn run_isolated(
    processor: &mut dyn InsertProcessor,
    controls: &SlotControls,
    left: &mut [Sample],
    right: &mut [Sample],
    dry_l: &[Sample],
    dry_r: &[Sample],
) {
    processor.process_stereo(left, right);
    if !all_finite(left) || !all_finite(right) {
        left.copy_from_slice(dry_l);
        right.copy_from_slice(dry_r);
        processor.reset();
        controls.record_fault();
    }
}

#[inline(always)]
fn ramp_towards(current: f64, target: f64, step: f64) -> f64 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

// ============ Insert Slot ============

/// Change waiting for the current outgoing fade to finish
enum Pending {
    Install(Box<dyn InsertProcessor>),
    Remove,
}

/// Single insert slot
///
/// `active` is the loaded processor. During a replace or remove the previous
/// instance sits in `outgoing` until its weight reaches zero.
pub struct InsertSlot {
    active: Option<Box<dyn InsertProcessor>>,
    active_weight: f64,
    outgoing: Option<Box<dyn InsertProcessor>>,
    outgoing_weight: f64,
    pending: Option<Pending>,
    controls: Arc<SlotControls>,
}

impl InsertSlot {
    pub fn new() -> Self {
        Self {
            active: None,
            active_weight: 0.0,
            outgoing: None,
            outgoing_weight: 0.0,
            pending: None,
            controls: Arc::new(SlotControls::new()),
        }
    }

    pub fn controls(&self) -> &Arc<SlotControls> {
        &self.controls
    }

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    pub fn processor(&self) -> Option<&dyn InsertProcessor> {
        self.active.as_deref()
    }

    /// Processing is mid-crossfade or has a queued change
    pub fn is_transitioning(&self) -> bool {
        self.outgoing.is_some() || self.pending.is_some()
    }

    /// Load a processor, fading the previous one out
    ///
    /// Returns an instance that can be dropped right away, if any.
    pub fn install(
        &mut self,
        processor: Box<dyn InsertProcessor>,
    ) -> Option<Box<dyn InsertProcessor>> {
        if self.outgoing.is_some() {
            return match self.pending.replace(Pending::Install(processor)) {
                Some(Pending::Install(superseded)) => Some(superseded),
                _ => None,
            };
        }
        let previous = self.active.replace(processor);
        let previous_weight = self.active_weight;
        self.active_weight = 0.0;
        self.begin_fade_out(previous, previous_weight)
    }

    /// Unload the processor, fading it out
    pub fn remove(&mut self) -> Option<Box<dyn InsertProcessor>> {
        if self.outgoing.is_some() {
            return match self.pending.replace(Pending::Remove) {
                Some(Pending::Install(superseded)) => Some(superseded),
                _ => None,
            };
        }
        let previous = self.active.take();
        let previous_weight = self.active_weight;
        self.active_weight = 0.0;
        self.begin_fade_out(previous, previous_weight)
    }

    fn begin_fade_out(
        &mut self,
        previous: Option<Box<dyn InsertProcessor>>,
        weight: f64,
    ) -> Option<Box<dyn InsertProcessor>> {
        match previous {
            // Silent already: nothing to fade
            Some(p) if weight <= 0.0 => Some(p),
            Some(p) => {
                self.outgoing = Some(p);
                self.outgoing_weight = weight;
                None
            }
            None => None,
        }
    }

    /// Process one block (at most the chain's scratch size) in place
    #[inline]
    fn process<F>(
        &mut self,
        left: &mut [Sample],
        right: &mut [Sample],
        scratch: &mut Scratch,
        step: f64,
        retire: &mut F,
    ) where
        F: FnMut(Box<dyn InsertProcessor>),
    {
        let target = if self.active.is_some() {
            self.controls.target_weight()
        } else {
            0.0
        };

        if self.outgoing.is_none() && self.active_weight == target {
            if target <= 0.0 {
                // Empty, bypassed or fully dry: audio passes untouched
                return;
            }
            if target >= 1.0 {
                if let Some(active) = self.active.as_deref_mut() {
                    let len = left.len();
                    scratch.dry_l[..len].copy_from_slice(left);
                    scratch.dry_r[..len].copy_from_slice(right);
                    run_isolated(
                        active,
                        &self.controls,
                        left,
                        right,
                        &scratch.dry_l[..len],
                        &scratch.dry_r[..len],
                    );
                }
                return;
            }
        }

        self.process_blended(left, right, scratch, target, step);

        if self.outgoing.is_some() && self.outgoing_weight <= 0.0 {
            if let Some(done) = self.outgoing.take() {
                retire(done);
            }
            match self.pending.take() {
                Some(Pending::Install(next)) => {
                    if let Some(p) = self.install(next) {
                        retire(p);
                    }
                }
                Some(Pending::Remove) => {
                    if let Some(p) = self.remove() {
                        retire(p);
                    }
                }
                None => {}
            }
        }
    }

    fn process_blended(
        &mut self,
        left: &mut [Sample],
        right: &mut [Sample],
        scratch: &mut Scratch,
        target: f64,
        step: f64,
    ) {
        let len = left.len();
        let Scratch {
            dry_l,
            dry_r,
            active_l,
            active_r,
            outgoing_l,
            outgoing_r,
        } = scratch;
        let (dry_l, dry_r) = (&mut dry_l[..len], &mut dry_r[..len]);
        let (active_l, active_r) = (&mut active_l[..len], &mut active_r[..len]);
        let (outgoing_l, outgoing_r) = (&mut outgoing_l[..len], &mut outgoing_r[..len]);

        dry_l.copy_from_slice(left);
        dry_r.copy_from_slice(right);

        let run_active = self.active_weight > 0.0 || target > 0.0;
        if let Some(active) = self.active.as_deref_mut().filter(|_| run_active) {
            active_l.copy_from_slice(dry_l);
            active_r.copy_from_slice(dry_r);
            run_isolated(active, &self.controls, active_l, active_r, dry_l, dry_r);
        } else {
            active_l.copy_from_slice(dry_l);
            active_r.copy_from_slice(dry_r);
        }

        if let Some(outgoing) = self.outgoing.as_deref_mut() {
            outgoing_l.copy_from_slice(dry_l);
            outgoing_r.copy_from_slice(dry_r);
            run_isolated(outgoing, &self.controls, outgoing_l, outgoing_r, dry_l, dry_r);
        } else {
            outgoing_l.copy_from_slice(dry_l);
            outgoing_r.copy_from_slice(dry_r);
        }

        let mut wa = self.active_weight;
        let mut wo = self.outgoing_weight;
        for i in 0..len {
            wa = ramp_towards(wa, target, step);
            wo = ramp_towards(wo, 0.0, step);
            let (dl, dr) = (dry_l[i], dry_r[i]);
            left[i] = dl + wa * (active_l[i] - dl) + wo * (outgoing_l[i] - dl);
            right[i] = dr + wa * (active_r[i] - dr) + wo * (outgoing_r[i] - dr);
        }
        self.active_weight = wa;
        self.outgoing_weight = if self.outgoing.is_some() { wo } else { 0.0 };
    }

    /// Processor instances this slot owns, including ones fading out or queued
    fn held(&self) -> usize {
        usize::from(self.active.is_some())
            + usize::from(self.outgoing.is_some())
            + usize::from(matches!(self.pending, Some(Pending::Install(_))))
    }

    /// Drop everything this slot holds into `retire`
    fn drain<F>(&mut self, retire: &mut F)
    where
        F: FnMut(Box<dyn InsertProcessor>),
    {
        for p in [self.active.take(), self.outgoing.take()].into_iter().flatten() {
            retire(p);
        }
        if let Some(Pending::Install(p)) = self.pending.take() {
            retire(p);
        }
        self.active_weight = 0.0;
        self.outgoing_weight = 0.0;
    }
}

impl Default for InsertSlot {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Track Chain ============

/// Complete insert chain for a track
pub struct TrackChain {
    track_id: u32,
    slots: [InsertSlot; MAX_INSERT_SLOTS],
    scratch: Scratch,
    max_block: usize,
    fade_step: f64,
}

impl std::fmt::Debug for TrackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackChain")
            .field("track_id", &self.track_id)
            .field("max_block", &self.max_block)
            .field("loaded_slots", &self.loaded_slots())
            .finish()
    }
}

impl TrackChain {
    /// Empty chain; built on the control thread
    pub fn new(track_id: u32, max_block: usize, fade_samples: usize) -> Self {
        let max_block = max_block.max(1);
        Self {
            track_id,
            slots: std::array::from_fn(|_| InsertSlot::new()),
            scratch: Scratch::new(max_block),
            max_block,
            fade_step: 1.0 / fade_samples.max(1) as f64,
        }
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn slot(&self, index: usize) -> Option<&InsertSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut InsertSlot> {
        self.slots.get_mut(index)
    }

    /// Control handles for every slot, in slot order
    pub fn controls(&self) -> [Arc<SlotControls>; MAX_INSERT_SLOTS] {
        std::array::from_fn(|i| Arc::clone(&self.slots[i].controls))
    }

    /// Indices of loaded slots
    pub fn loaded_slots(&self) -> Vec<usize> {
        (0..MAX_INSERT_SLOTS)
            .filter(|&i| self.slots[i].is_loaded())
            .collect()
    }

    pub(crate) fn held_processors(&self) -> usize {
        self.slots.iter().map(InsertSlot::held).sum()
    }

    /// Process all slots in ascending order, in place
    ///
    /// Buffers longer than the scratch size are processed in chunks.
    /// Finished fade-outs are handed to `retire`.
    #[inline]
    pub fn process<F>(&mut self, left: &mut [Sample], right: &mut [Sample], retire: &mut F)
    where
        F: FnMut(Box<dyn InsertProcessor>),
    {
        let len = left.len().min(right.len());
        for (l, r) in left[..len]
            .chunks_mut(self.max_block)
            .zip(right[..len].chunks_mut(self.max_block))
        {
            for slot in &mut self.slots {
                slot.process(l, r, &mut self.scratch, self.fade_step, retire);
            }
        }
    }

    /// Hand every processor to `retire`, leaving the chain empty
    pub fn drain<F>(&mut self, retire: &mut F)
    where
        F: FnMut(Box<dyn InsertProcessor>),
    {
        for slot in &mut self.slots {
            slot.drain(retire);
        }
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{ProcessorKind, ProcessorShared};
    use approx::assert_relative_eq;

    /// Multiplies by a fixed gain; optionally emits NaN
    struct TestGain {
        shared: Arc<ProcessorShared>,
        gain: f64,
        poison: bool,
    }

    impl TestGain {
        fn boxed(gain: f64) -> Box<dyn InsertProcessor> {
            Box::new(Self {
                shared: ProcessorShared::new(ProcessorKind::Saturator),
                gain,
                poison: false,
            })
        }

        fn poisoned() -> Box<dyn InsertProcessor> {
            Box::new(Self {
                shared: ProcessorShared::new(ProcessorKind::Saturator),
                gain: 1.0,
                poison: true,
            })
        }
    }

    impl InsertProcessor for TestGain {
        fn shared(&self) -> &Arc<ProcessorShared> {
            &self.shared
        }

        fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
            for s in left.iter_mut().chain(right.iter_mut()) {
                *s = if self.poison { f64::NAN } else { *s * self.gain };
            }
        }

        fn reset(&mut self) {}
    }

    const FADE: usize = 240;

    fn run(chain: &mut TrackChain, len: usize, retired: &mut Vec<Box<dyn InsertProcessor>>) -> Vec<f64> {
        let mut left = vec![1.0; len];
        let mut right = vec![1.0; len];
        chain.process(&mut left, &mut right, &mut |p| retired.push(p));
        left
    }

    fn max_step(samples: &[f64]) -> f64 {
        samples
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_load_fades_in() {
        let mut chain = TrackChain::new(1, 64, FADE);
        let mut retired = Vec::new();
        assert!(chain.slot_mut(0).unwrap().install(TestGain::boxed(0.5)).is_none());

        let out = run(&mut chain, 1024, &mut retired);
        assert_relative_eq!(out[FADE - 1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(out[1023], 0.5, epsilon = 1e-12);
        assert!(max_step(&out) <= 0.5 / FADE as f64 + 1e-12);
        assert!(retired.is_empty());
    }

    #[test]
    fn test_bypass_crossfade() {
        let mut chain = TrackChain::new(1, 128, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(3).unwrap().install(TestGain::boxed(0.0));
        run(&mut chain, 512, &mut retired);

        chain.slot(3).unwrap().controls().set_bypass(true);
        let out = run(&mut chain, 512, &mut retired);
        assert!(max_step(&out) <= 1.0 / FADE as f64 + 1e-12);
        assert_eq!(out[511], 1.0);

        chain.slot(3).unwrap().controls().set_bypass(false);
        let out = run(&mut chain, 512, &mut retired);
        assert!(max_step(&out) <= 1.0 / FADE as f64 + 1e-12);
        assert_eq!(out[511], 0.0);
    }

    #[test]
    fn test_wet_dry_mix() {
        let mut chain = TrackChain::new(1, 256, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(0).unwrap().install(TestGain::boxed(0.0));
        chain.slot(0).unwrap().controls().set_mix(0.5);

        let out = run(&mut chain, 1024, &mut retired);
        // 50% of 1.0 (dry) + 50% of 0.0 (wet) = 0.5
        assert_relative_eq!(out[1023], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_replace_crossfades_and_retires() {
        let mut chain = TrackChain::new(1, 64, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(0).unwrap().install(TestGain::boxed(0.5));
        run(&mut chain, 512, &mut retired);

        assert!(chain.slot_mut(0).unwrap().install(TestGain::boxed(0.25)).is_none());
        let out = run(&mut chain, 512, &mut retired);
        assert!(max_step(&out) <= 0.25 / FADE as f64 + 1e-12);
        assert_relative_eq!(out[511], 0.25, epsilon = 1e-12);
        assert_eq!(retired.len(), 1);
        assert!(!chain.slot(0).unwrap().is_transitioning());
    }

    #[test]
    fn test_replace_during_fade_is_deferred() {
        let mut chain = TrackChain::new(1, 64, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(0).unwrap().install(TestGain::boxed(0.5));
        run(&mut chain, 512, &mut retired);

        let slot = chain.slot_mut(0).unwrap();
        assert!(slot.install(TestGain::boxed(0.25)).is_none());
        // Second and third loads queue behind the running fade; the second is superseded
        assert!(slot.install(TestGain::boxed(2.0)).is_none());
        assert!(slot.install(TestGain::boxed(0.125)).is_some());

        let out = run(&mut chain, 2048, &mut retired);
        assert_relative_eq!(out[2047], 0.125, epsilon = 1e-12);
        assert_eq!(retired.len(), 2);
    }

    #[test]
    fn test_remove_fades_to_dry() {
        let mut chain = TrackChain::new(1, 64, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(0).unwrap().install(TestGain::boxed(0.0));
        run(&mut chain, 512, &mut retired);

        assert!(chain.slot_mut(0).unwrap().remove().is_none());
        assert!(!chain.slot(0).unwrap().is_loaded());
        let out = run(&mut chain, 512, &mut retired);
        assert!(max_step(&out) <= 1.0 / FADE as f64 + 1e-12);
        assert_eq!(out[511], 1.0);
        assert_eq!(retired.len(), 1);
    }

    #[test]
    fn test_remove_of_bypassed_retires_immediately() {
        let mut chain = TrackChain::new(1, 64, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(0).unwrap().install(TestGain::boxed(0.0));
        chain.slot(0).unwrap().controls().set_bypass(true);
        run(&mut chain, 64, &mut retired);
        assert!(chain.slot_mut(0).unwrap().remove().is_some());
    }

    #[test]
    fn test_fault_passes_dry_and_counts() {
        let mut chain = TrackChain::new(1, 64, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(1).unwrap().install(TestGain::boxed(0.5));
        run(&mut chain, 512, &mut retired);

        // Swap in a processor that always emits NaN, then let the fade finish
        chain.slot_mut(1).unwrap().install(TestGain::poisoned());
        let out = run(&mut chain, 1024, &mut retired);
        assert!(out.iter().all(|s| s.is_finite()));
        // Old instance fades out towards the (dry) faulted new one
        assert_eq!(out[1023], 1.0);
        assert!(chain.slot(1).unwrap().controls().faults() > 0);
    }

    #[test]
    fn test_chunks_longer_than_scratch() {
        let mut chain = TrackChain::new(1, 32, 1);
        let mut retired = Vec::new();
        chain.slot_mut(0).unwrap().install(TestGain::boxed(0.5));
        chain.slot_mut(7).unwrap().install(TestGain::boxed(0.5));
        run(&mut chain, 32, &mut retired);
        let out = run(&mut chain, 1000, &mut retired);
        assert!(out.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_drain_empties_chain() {
        let mut chain = TrackChain::new(1, 32, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(0).unwrap().install(TestGain::boxed(0.5));
        chain.slot_mut(4).unwrap().install(TestGain::boxed(0.5));
        assert_eq!(chain.loaded_slots(), vec![0, 4]);
        chain.drain(&mut |p| retired.push(p));
        assert_eq!(retired.len(), 2);
        assert!(chain.loaded_slots().is_empty());
    }

    #[test]
    fn test_held_processors_include_fading_and_queued() {
        let mut chain = TrackChain::new(1, 32, FADE);
        let mut retired = Vec::new();
        chain.slot_mut(2).unwrap().install(TestGain::boxed(0.5));
        run(&mut chain, FADE * 2, &mut retired);
        assert_eq!(chain.held_processors(), 1);

        // B fades in over A; C waits for the fade
        assert!(chain.slot_mut(2).unwrap().install(TestGain::boxed(0.25)).is_none());
        assert!(chain.slot_mut(2).unwrap().install(TestGain::boxed(2.0)).is_none());
        assert_eq!(chain.held_processors(), 3);

        chain.drain(&mut |p| retired.push(p));
        assert_eq!(retired.len(), 3);
        assert_eq!(chain.held_processors(), 0);
    }
}
