//! Multi-rig playback/preview scheduler.
//!
//! Per rig, the scheduler tracks one of three states:
//! - Idle: not sampled
//! - Scrubbing: the selected rig held at a fixed clip time
//! - Playing: a playback entry whose time advances every tick
//!
//! Any number of rigs may be Playing at once; only the selected rig can be
//! Scrubbing. All of them are sampled in a single evaluator batch per tick,
//! playing entries first, so the evaluator's per-batch reset never erases a
//! rig that should hold its pose.
//!
//! Permanent writes go through the commit bracket
//! ([`PreviewScheduler::pause_all_for_apply`] /
//! [`PreviewScheduler::resume_background_playback`]), which closes the
//! evaluator session before the write and restarts it afterwards.

mod commands;
pub mod events;
pub mod session;
pub mod state;

use std::fmt::Debug;
use std::hash::Hash;

use hashbrown::HashMap;
use log::{debug, trace};

use crate::config::Config;
use crate::host::{ClipEvaluator, ClipRef, SceneGraph};
use crate::mask::{BoneMask, MaskMode};
use crate::snapshot::PoseSnapshot;

pub use events::PreviewEvent;
pub use session::SchedulerState;
pub use state::{ApplyMode, HistoryEntry, PerTargetState, PlaybackEntry, ScrubState};

#[derive(Debug)]
pub struct PreviewScheduler<N> {
    cfg: Config,
    session: SchedulerState,
    selected: Option<N>,
    current: PerTargetState,
    saved: HashMap<N, PerTargetState>,
    entries: Vec<PlaybackEntry<N>>,
    scrub: Option<ScrubState<N>>,
    events: Vec<PreviewEvent<N>>,
}

impl<N> Default for PreviewScheduler<N>
where
    N: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Write the rest value of every masked-out bone under `root`.
fn freeze_masked<S: SceneGraph>(
    scene: &mut S,
    root: S::Node,
    mask: &BoneMask,
    rest: &PoseSnapshot,
) {
    if mask.mode == MaskMode::AllBones {
        return;
    }
    for rec in rest.iter() {
        if mask.is_included(&rec.path) {
            continue;
        }
        if let Some(node) = scene.find(root, &rec.path) {
            scene.write(node, rec.transform);
        }
    }
}

impl<N> PreviewScheduler<N>
where
    N: Copy + Eq + Hash + Debug,
{
    pub fn new(cfg: Config) -> Self {
        let current = PerTargetState::with_defaults(&cfg);
        Self {
            cfg,
            session: SchedulerState::new(),
            selected: None,
            current,
            saved: HashMap::new(),
            entries: Vec::new(),
            scrub: None,
            events: Vec::new(),
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn selected(&self) -> Option<N> {
        self.selected
    }

    /// Editable state of the selected rig.
    pub fn state(&self) -> &PerTargetState {
        &self.current
    }

    pub fn saved_state(&self, target: N) -> Option<&PerTargetState> {
        self.saved.get(&target)
    }

    pub fn playback_entries(&self) -> &[PlaybackEntry<N>] {
        &self.entries
    }

    pub fn scrub_state(&self) -> Option<&ScrubState<N>> {
        self.scrub.as_ref()
    }

    pub fn current_time(&self) -> f32 {
        self.current.time
    }

    pub fn current_frame(&self) -> u32 {
        match &self.current.clip {
            Some(clip) if clip.frame_rate > 0.0 => {
                ((self.current.time * clip.frame_rate).round() as u32).min(clip.frame_count())
            }
            _ => 0,
        }
    }

    pub fn total_frames(&self) -> u32 {
        self.current.clip.as_ref().map_or(0, ClipRef::frame_count)
    }

    /// Whether the selected rig has a playback entry.
    pub fn is_playing(&self) -> bool {
        self.selected.is_some_and(|t| self.is_target_playing(t))
    }

    pub fn is_target_playing(&self, target: N) -> bool {
        self.entries.iter().any(|e| e.target == target)
    }

    /// Whether the selected rig is in preview mode.
    pub fn is_scrubbing(&self) -> bool {
        match (&self.scrub, self.selected) {
            (Some(scrub), Some(sel)) => scrub.target == sel,
            _ => false,
        }
    }

    pub fn is_tick_registered(&self) -> bool {
        self.session.is_tick_registered()
    }

    pub fn drain_events(&mut self) -> Vec<PreviewEvent<N>> {
        std::mem::take(&mut self.events)
    }

    // ---- editable state ----

    /// Clip of the selected rig. A live entry switches clips in place and
    /// keeps its phase wrapped into the new length; clearing the clip stops it.
    pub fn set_clip(&mut self, clip: Option<ClipRef>) {
        self.current.time = clip.as_ref().map_or(0.0, |c| c.clamp_time(self.current.time));
        if let Some(sel) = self.selected {
            match &clip {
                Some(next) => {
                    if let Some(entry) = self.entries.iter_mut().find(|e| e.target == sel) {
                        entry.clip = next.clone();
                        entry.elapsed = next.wrap_time(entry.elapsed);
                        self.current.time = entry.elapsed;
                    }
                }
                None => {
                    if self.remove_entry(sel) {
                        self.emit_state(sel);
                    }
                }
            }
        }
        self.current.clip = clip;
    }

    /// Playback speed of the selected rig; a live entry picks it up immediately.
    pub fn set_speed(&mut self, speed: f32) {
        let speed = if speed.is_finite() { speed } else { self.cfg.default_speed };
        self.current.speed = speed;
        if let Some(sel) = self.selected {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.target == sel) {
                entry.speed = speed;
            }
        }
    }

    pub fn set_mask(&mut self, mask: BoneMask) {
        if let Some(sel) = self.selected {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.target == sel) {
                entry.mask = mask.clone();
            }
        }
        self.current.mask = mask;
    }

    pub fn set_blend_weight(&mut self, weight: f32) {
        self.current.blend_weight = crate::compose::clamp_weight(weight);
    }

    pub fn set_apply_mode(&mut self, mode: ApplyMode) {
        self.current.apply_mode = mode;
    }

    pub fn stack_mut(&mut self) -> &mut Vec<crate::compose::PoseLayer> {
        &mut self.current.stack
    }

    pub fn push_history(&mut self, label: impl Into<String>, pose: PoseSnapshot) {
        let cap = self.cfg.max_history;
        self.current.push_history(
            HistoryEntry {
                label: label.into(),
                pose,
            },
            cap,
        );
    }

    pub fn clear_history(&mut self) {
        self.current.history.clear();
    }

    // ---- transport ----

    fn emit_state(&mut self, target: N) {
        let playing = self.is_target_playing(target);
        let scrubbing = self.scrub.as_ref().is_some_and(|s| s.target == target);
        self.events.push(PreviewEvent::StateChanged {
            target,
            playing,
            scrubbing,
        });
    }

    fn still_required(&self) -> bool {
        !self.entries.is_empty() || self.scrub.is_some()
    }

    /// Enter Scrubbing for the selected rig. No-op without a selection or clip.
    pub fn start_preview<S, E>(&mut self, scene: &mut S, evaluator: &mut E) -> bool
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let (Some(target), Some(_)) = (self.selected, self.current.clip.as_ref()) else {
            return false;
        };
        if self.scrub.as_ref().is_some_and(|s| s.target == target) {
            return false;
        }
        let rest = self.rest_for(scene, evaluator, target);
        self.scrub = Some(ScrubState { target, rest });
        self.session.ensure_running(scene, evaluator);
        self.evaluate_batch(scene, evaluator);
        debug!("preview started for {:?}", target);
        self.emit_state(target);
        true
    }

    /// Rest values for `target`: reuse what a live entry or scrub already
    /// holds, else capture from the scene. With a session open the rig may
    /// still show the last frame it was sampled at, so a batch runs first;
    /// the target is not part of it and comes back at rest.
    fn rest_for<S, E>(&mut self, scene: &mut S, evaluator: &mut E, target: N) -> PoseSnapshot
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        if let Some(scrub) = self.scrub.as_ref().filter(|s| s.target == target) {
            return scrub.rest.clone();
        }
        if let Some(entry) = self.entries.iter().find(|e| e.target == target) {
            return entry.rest.clone();
        }
        if evaluator.is_session_active() {
            self.evaluate_batch(scene, evaluator);
        }
        PoseSnapshot::capture(scene, target, "rest", "rest", &BoneMask::all())
    }

    /// Register (or refresh) the selected rig's playback entry. The rig is
    /// Playing and Scrubbing afterwards.
    pub fn start_playback<S, E>(&mut self, scene: &mut S, evaluator: &mut E) -> bool
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let (Some(target), Some(clip)) = (self.selected, self.current.clip.clone()) else {
            return false;
        };
        let rest = self.rest_for(scene, evaluator, target);
        let elapsed = clip.wrap_time(self.current.time);
        match self.entries.iter_mut().find(|e| e.target == target) {
            Some(entry) => {
                entry.clip = clip;
                entry.speed = self.current.speed;
                entry.mask = self.current.mask.clone();
            }
            None => self.entries.push(PlaybackEntry {
                target,
                clip,
                elapsed,
                speed: self.current.speed,
                mask: self.current.mask.clone(),
                rest: rest.clone(),
            }),
        }
        if self.scrub.as_ref().map_or(true, |s| s.target != target) {
            self.scrub = Some(ScrubState { target, rest });
        }
        self.session.ensure_running(scene, evaluator);
        debug!("playback started for {:?} ({} playing)", target, self.entries.len());
        self.emit_state(target);
        true
    }

    /// Remove the selected rig's playback entry; releases the loop and
    /// session when nothing else needs them.
    pub fn stop_playback<S, E>(&mut self, scene: &mut S, evaluator: &mut E) -> bool
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let Some(target) = self.selected else {
            return false;
        };
        let removed = self.remove_entry(target);
        if removed {
            self.emit_state(target);
        }
        let required = self.still_required();
        self.session.release_if_idle(required, scene, evaluator);
        removed
    }

    fn remove_entry(&mut self, target: N) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.target != target);
        before != self.entries.len()
    }

    /// Stop playback, then leave Scrubbing for the selected rig.
    pub fn stop_preview<S, E>(&mut self, scene: &mut S, evaluator: &mut E) -> bool
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let Some(target) = self.selected else {
            return false;
        };
        let had_entry = self.remove_entry(target);
        let had_scrub = self.scrub.as_ref().is_some_and(|s| s.target == target);
        if had_scrub {
            self.scrub = None;
        }
        let required = self.still_required();
        if !self.session.release_if_idle(required, scene, evaluator) && required {
            // Other rigs keep playing; the next batch reverts this one to rest.
            self.evaluate_batch(scene, evaluator);
        }
        if had_entry || had_scrub {
            self.emit_state(target);
        }
        had_entry || had_scrub
    }

    /// Move the selection. Background playback of the outgoing rig continues.
    pub fn set_target<S, E>(&mut self, target: Option<N>, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        if target == self.selected {
            return;
        }
        let previous = self.selected;
        let mut dropped_scrub = false;
        if let Some(old) = previous {
            self.current.was_playing = self.is_target_playing(old);
            let defaults = PerTargetState::with_defaults(&self.cfg);
            let outgoing = std::mem::replace(&mut self.current, defaults);
            self.saved.insert(old, outgoing);
            if self.scrub.as_ref().is_some_and(|s| s.target == old) {
                self.scrub = None;
                dropped_scrub = !self.is_target_playing(old);
            }
        }

        self.selected = target;
        if let Some(new) = target {
            self.current = match self.saved.get(&new) {
                Some(saved) => saved.clone(),
                None => PerTargetState::with_defaults(&self.cfg),
            };
            if let Some(entry) = self.entries.iter().find(|e| e.target == new) {
                self.current.time = entry.elapsed;
                self.scrub = Some(ScrubState {
                    target: new,
                    rest: entry.rest.clone(),
                });
            } else if self.current.was_playing && self.current.clip.is_some() {
                debug!("re-registering playback for {:?}", new);
                self.start_playback(scene, evaluator);
            }
        }

        debug!("target {:?} -> {:?}", previous, target);
        self.events.push(PreviewEvent::TargetChanged {
            previous,
            current: target,
        });
        let required = self.still_required();
        let released = self.session.release_if_idle(required, scene, evaluator);
        if dropped_scrub && !released && evaluator.is_session_active() {
            // The outgoing rig is no longer sampled; one batch puts it back at rest.
            self.evaluate_batch(scene, evaluator);
        }
    }

    /// Forget a rig deleted from the workspace.
    pub fn remove_target<S, E>(&mut self, target: N, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        self.saved.remove(&target);
        self.remove_entry(target);
        if self.scrub.as_ref().is_some_and(|s| s.target == target) {
            self.scrub = None;
        }
        if self.selected == Some(target) {
            self.selected = None;
            self.current = PerTargetState::with_defaults(&self.cfg);
            self.events.push(PreviewEvent::TargetChanged {
                previous: Some(target),
                current: None,
            });
        }
        let required = self.still_required();
        self.session.release_if_idle(required, scene, evaluator);
    }

    /// Move the selected rig's playhead (clamped to the clip). A playing rig
    /// continues from the new time.
    pub fn scrub_to<S, E>(&mut self, time: f32, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let (Some(target), Some(clip)) = (self.selected, self.current.clip.as_ref()) else {
            return;
        };
        let time = clip.clamp_time(time);
        self.current.time = time;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.target == target) {
            entry.elapsed = entry.clip.wrap_time(time);
        }
        if self.session.is_tick_registered() && evaluator.is_session_active() {
            self.evaluate_batch(scene, evaluator);
        }
        self.events.push(PreviewEvent::TimeChanged { target, time });
    }

    pub fn set_frame<S, E>(&mut self, frame: u32, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let Some(rate) = self.current.clip.as_ref().map(|c| c.frame_rate) else {
            return;
        };
        if rate > 0.0 {
            self.scrub_to(frame as f32 / rate, scene, evaluator);
        }
    }

    /// One shared clock pulse. Returns false when the loop is not registered
    /// or was released by this tick.
    pub fn tick<S, E>(&mut self, now_seconds: f64, scene: &mut S, evaluator: &mut E) -> bool
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        if !self.session.is_tick_registered() {
            return false;
        }
        let dt = self.session.advance_clock(now_seconds);
        if !self.still_required() {
            self.session.shutdown(scene, evaluator);
            return false;
        }
        for entry in &mut self.entries {
            entry.elapsed = entry.clip.wrap_time(entry.elapsed + dt * entry.speed);
        }
        if !evaluator.is_session_active() {
            evaluator.start_session(scene);
        }
        self.evaluate_batch(scene, evaluator);

        if let Some(sel) = self.selected {
            if let Some(entry) = self.entries.iter().find(|e| e.target == sel) {
                self.current.time = entry.elapsed;
                self.events.push(PreviewEvent::TimeChanged {
                    target: sel,
                    time: entry.elapsed,
                });
            }
        }
        true
    }

    /// One evaluator batch: every playing entry, then the scrubbed rig if it
    /// is not also playing.
    fn evaluate_batch<S, E>(&mut self, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        self.evaluate_batch_with(scene, evaluator, None);
    }

    /// As `evaluate_batch`, with one extra `(root, clip, time)` sample last.
    fn evaluate_batch_with<S, E>(
        &mut self,
        scene: &mut S,
        evaluator: &mut E,
        extra: Option<(N, &ClipRef, f32)>,
    ) where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        evaluator.begin_batch(scene);
        for entry in &self.entries {
            evaluator.sample(scene, entry.target, &entry.clip, entry.elapsed);
            freeze_masked(scene, entry.target, &entry.mask, &entry.rest);
        }
        if let Some(scrub) = &self.scrub {
            let playing = self.entries.iter().any(|e| e.target == scrub.target);
            if let (false, Some(clip)) = (playing, self.current.clip.as_ref()) {
                evaluator.sample(scene, scrub.target, clip, self.current.time);
                freeze_masked(scene, scrub.target, &self.current.mask, &scrub.rest);
            }
        }
        if let Some((root, clip, time)) = extra {
            evaluator.sample(scene, root, clip, time);
        }
        evaluator.end_batch(scene);
        trace!(
            "batch: {} playing, scrub {:?}",
            self.entries.len(),
            self.scrub.as_ref().map(|s| s.target)
        );
    }

    /// First half of the commit bracket: remove every playback entry except
    /// `keep`'s, stop the loop and close the session. Returns the removed
    /// entries for [`resume_background_playback`](Self::resume_background_playback).
    pub fn pause_all_for_apply<S, E>(
        &mut self,
        keep: Option<N>,
        scene: &mut S,
        evaluator: &mut E,
    ) -> Vec<PlaybackEntry<N>>
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| Some(e.target) == keep);
        self.entries = kept;
        self.session.shutdown(scene, evaluator);
        debug!("paused {} background entries for apply", removed.len());
        removed
    }

    /// Second half of the commit bracket: re-register `removed` entries
    /// (keeping their elapsed times), refresh rest values of the kept rigs
    /// from the committed scene, and restart the loop if anything needs it.
    pub fn resume_background_playback<S, E>(
        &mut self,
        removed: Vec<PlaybackEntry<N>>,
        scene: &mut S,
        evaluator: &mut E,
    ) where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let all = BoneMask::all();
        for entry in &mut self.entries {
            entry.rest = PoseSnapshot::capture(scene, entry.target, "rest", "rest", &all);
        }
        if let Some(scrub) = &mut self.scrub {
            scrub.rest = PoseSnapshot::capture(scene, scrub.target, "rest", "rest", &all);
        }
        for entry in removed {
            if !self.is_target_playing(entry.target) {
                self.entries.push(entry);
            }
        }
        if self.still_required() {
            self.session.ensure_running(scene, evaluator);
            self.evaluate_batch(scene, evaluator);
        }
        debug!("resumed with {} entries", self.entries.len());
    }

    /// Force every rig to Idle, stop the loop and close the session.
    pub fn stop_all<S, E>(&mut self, scene: &mut S, evaluator: &mut E)
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let affected: Vec<N> = self
            .entries
            .iter()
            .map(|e| e.target)
            .chain(self.scrub.as_ref().map(|s| s.target))
            .collect();
        self.entries.clear();
        self.scrub = None;
        self.current.was_playing = false;
        for state in self.saved.values_mut() {
            state.was_playing = false;
        }
        self.session.shutdown(scene, evaluator);
        let mut seen = Vec::new();
        for target in affected {
            if !seen.contains(&target) {
                seen.push(target);
                self.emit_state(target);
            }
        }
    }
}
