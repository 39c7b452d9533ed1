//! Animation scheduler
//!
//! Cooperative per-frame control loop. The host calls [`Tray::tick`] from its
//! frame/timer callback with the [`RunToken`] returned when the roll started;
//! the tray steps physics, syncs transforms, and fires the completion callback
//! exactly once when the dice settle.
//!
//! Starting a new roll or calling [`Tray::clear`] invalidates the current
//! token, so ticks still in flight for an old roll become no-ops.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::body::{BodyDesc, BodyId, PhysicsWorld, Transform};
use super::geometry::{DieGeometry, GeometryCache};
use super::resolve::{self, OutcomeMap};
use super::settle::{SettleConfig, SettleDetector};
use super::throw::{self, ThrowVector};
use crate::consts::{SETTLE_CEILING_SECS, SIM_DT};
use crate::dice::DieType;
use crate::error::ResolveError;
use crate::gesture::Gesture;
use crate::notation::Notation;
use crate::settings::Settings;

/// Epoch of one roll; only the active token may advance the tray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunToken(u64);

/// When the host should call [`Tray::tick`] again
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextTick {
    /// On the next animation frame
    Frame,
    /// After a delay, then on the next frame (fixed-step pacing)
    After(Duration),
}

/// Result of one scheduler tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickResult {
    Continue(NextTick),
    /// Dice settled; values are externally visible, in die order
    Finished(Vec<i32>),
    /// Token no longer matches the active roll; nothing happened
    Stale,
}

/// A die on the tray: its body plus the (possibly remapped) labelling
#[derive(Debug, Clone)]
pub struct DieInstance {
    pub die: DieType,
    pub body: BodyId,
    pub geometry: Arc<DieGeometry>,
    pub outcome: Option<OutcomeMap>,
    pub transform: Transform,
}

impl DieInstance {
    /// Bake a label shift into this instance's own copy of the geometry
    pub fn apply_outcome(&mut self, map: OutcomeMap) {
        map.apply(Arc::make_mut(&mut self.geometry));
        self.outcome = Some(map);
    }
}

/// Finished roll handed to [`Tray::throw`] callbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Notation with forced results back-filled, ready for replay
    pub notation: Notation,
    /// Externally visible die values, in die order
    pub values: Vec<i32>,
    /// Die values plus modifiers
    pub total: i32,
}

type Completion = Box<dyn FnOnce(&[i32])>;

/// Dice tray: owns the physics world and drives rolls through it
pub struct Tray<W: PhysicsWorld> {
    world: W,
    settings: Settings,
    geometry: GeometryCache,
    dice: Vec<DieInstance>,
    detector: SettleDetector,
    active: Option<RunToken>,
    next_run: u64,
    iteration: u64,
    sim_time: f32,
    last_time: Option<f64>,
    adaptive: bool,
    on_complete: Option<Completion>,
}

impl<W: PhysicsWorld> Tray<W> {
    /// Create a tray. A step or ceiling that would stall the loop falls back
    /// to its default.
    pub fn new(world: W, mut settings: Settings) -> Self {
        if let Err(err) = settings.validate() {
            log::warn!("Tray created with {}", err);
            if !(settings.fixed_step > 0.0 && settings.fixed_step.is_finite()) {
                settings.fixed_step = SIM_DT;
            }
            if !(settings.settle_ceiling_secs > 0.0 && settings.settle_ceiling_secs.is_finite()) {
                settings.settle_ceiling_secs = SETTLE_CEILING_SECS;
            }
        }
        let detector = SettleDetector::new(SettleConfig::from(&settings), 0);
        let adaptive = settings.adaptive_timestep;
        Self {
            world,
            settings,
            geometry: GeometryCache::new(),
            dice: Vec::new(),
            detector,
            active: None,
            next_run: 1,
            iteration: 0,
            sim_time: 0.0,
            last_time: None,
            adaptive,
            on_complete: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Dice currently on the tray, in throw order
    pub fn dice(&self) -> &[DieInstance] {
        &self.dice
    }

    pub fn active_run(&self) -> Option<RunToken> {
        self.active
    }

    pub fn is_rolling(&self) -> bool {
        self.active.is_some()
    }

    /// Cancel the active roll and remove every die from the world
    pub fn clear(&mut self) {
        if let Some(token) = self.active.take() {
            log::debug!("Cancelling run {:?}", token);
        }
        self.on_complete = None;
        self.remove_bodies();
    }

    fn remove_bodies(&mut self) {
        for instance in self.dice.drain(..) {
            if let Err(err) = self.world.remove_body(instance.body) {
                log::warn!("Removing {} body failed: {}", instance.die, err);
            }
        }
    }

    /// Put fresh bodies for `vectors` into the world
    fn prepare(&mut self, vectors: &[ThrowVector]) {
        self.remove_bodies();
        self.iteration = 0;
        self.sim_time = 0.0;
        self.detector.reset(vectors.len());

        for vector in vectors {
            let geometry = self.geometry.get(vector.die, self.settings.dice_scale);
            let desc = BodyDesc::for_throw(vector, geometry.clone(), &self.settings);
            let transform = Transform::from(&desc.state);
            let body = self.world.add_body(desc);
            self.dice.push(DieInstance {
                die: vector.die,
                body,
                geometry,
                outcome: None,
                transform,
            });
        }
    }

    /// Start a roll from explicit throw vectors.
    ///
    /// `forced` holds internal face values aligned with `vectors` (a sparse
    /// prefix is fine; out-of-range values roll naturally). Returns `None`
    /// without touching the tray when there is nothing to throw.
    pub fn roll<F>(
        &mut self,
        vectors: &[ThrowVector],
        forced: &[Option<i32>],
        on_complete: F,
    ) -> Result<Option<RunToken>, ResolveError>
    where
        F: FnOnce(&[i32]) + 'static,
    {
        self.start(vectors, None, forced, Box::new(on_complete))
    }

    /// Parse-to-throw convenience: generate vectors for every valid die of
    /// `notation`, honour its forced results, and report a [`RollOutcome`].
    pub fn throw<R, F>(
        &mut self,
        notation: &Notation,
        gesture: &Gesture,
        rng: &mut R,
        on_complete: F,
    ) -> Result<Option<RunToken>, ResolveError>
    where
        R: Rng,
        F: FnOnce(RollOutcome) + 'static,
    {
        let dice = notation.dice();
        if dice.is_empty() {
            log::debug!("Notation {:?} has no dice to throw", notation.stringify());
            return Ok(None);
        }

        let forced = notation.forced_results();
        let (direction, boost) = (gesture.direction, gesture.boost);
        let vectors = throw::generate(&dice, direction, boost, &self.settings, rng);
        let rerandomize =
            self.settings.rerandomize_forced_throw && forced.iter().any(Option::is_some);
        let visible =
            rerandomize.then(|| throw::generate(&dice, direction, boost, &self.settings, rng));

        let mut notation = notation.clone();
        let completion = move |values: &[i32]| {
            notation.back_fill(values);
            let total = notation.total(values);
            on_complete(RollOutcome {
                notation,
                values: values.to_vec(),
                total,
            });
        };

        self.start(&vectors, visible.as_deref(), &forced, Box::new(completion))
    }

    fn start(
        &mut self,
        vectors: &[ThrowVector],
        visible: Option<&[ThrowVector]>,
        forced: &[Option<i32>],
        on_complete: Completion,
    ) -> Result<Option<RunToken>, ResolveError> {
        if vectors.is_empty() {
            return Ok(None);
        }
        self.clear();
        self.prepare(vectors);

        let forced_any = forced.iter().any(Option::is_some);
        self.adaptive = self.settings.adaptive_timestep && !forced_any;

        if forced_any {
            let natural = match resolve::emulate_throw(
                &mut self.world,
                &self.dice,
                &mut self.detector,
                self.settings.fixed_step,
            ) {
                Ok(natural) => natural,
                Err(err) => {
                    self.remove_bodies();
                    return Err(err);
                }
            };

            // Pre-simulation state is discarded; the visible throw starts over
            self.prepare(visible.unwrap_or(vectors));
            for ((instance, natural), forced) in self.dice.iter_mut().zip(natural).zip(forced) {
                let map = forced.and_then(|f| OutcomeMap::between(instance.die, natural, f));
                if let Some(map) = map {
                    log::debug!("Shifting {} labels by {}", instance.die, map.offset);
                    instance.apply_outcome(map);
                }
            }
        }

        let token = RunToken(self.next_run);
        self.next_run += 1;
        self.active = Some(token);
        self.last_time = None;
        self.on_complete = Some(on_complete);

        log::info!(
            "Rolling {} dice (run {}, forced: {})",
            self.dice.len(),
            token.0,
            forced_any
        );
        Ok(Some(token))
    }

    /// Advance the roll identified by `token` to wall time `now` (seconds).
    pub fn tick(&mut self, token: RunToken, now: f64) -> Result<TickResult, ResolveError> {
        if self.active != Some(token) {
            return Ok(TickResult::Stale);
        }
        let result = self.tick_active(now);
        if result.is_err() {
            self.active = None;
            self.on_complete = None;
        }
        result
    }

    fn tick_active(&mut self, now: f64) -> Result<TickResult, ResolveError> {
        let fixed = self.settings.fixed_step;
        let mut elapsed = self.last_time.map_or(fixed, |last| (now - last) as f32);
        if !(elapsed > 0.0 && elapsed <= self.settings.stall_secs) {
            elapsed = fixed;
        }
        self.iteration += 1;

        if self.adaptive {
            let mut remaining = elapsed;
            while fixed > 0.0 && remaining > fixed * 1.1 {
                self.step_world(fixed);
                remaining -= fixed;
            }
            self.step_world(remaining);
        } else {
            self.step_world(fixed);
        }

        self.sync_transforms();
        self.last_time = Some(now);

        let states = resolve::body_states(&self.world, &self.dice)?;
        if self.detector.observe(self.iteration, self.sim_time, &states) {
            self.active = None;
            let values = self.read_values()?;
            log::info!(
                "Dice settled after {} ticks ({:.2}s simulated): {:?}",
                self.iteration,
                self.sim_time,
                values
            );
            if let Some(callback) = self.on_complete.take() {
                callback(&values);
            }
            return Ok(TickResult::Finished(values));
        }

        let next = if !self.adaptive && elapsed < fixed {
            NextTick::After(Duration::from_secs_f32(fixed - elapsed))
        } else {
            NextTick::Frame
        };
        Ok(TickResult::Continue(next))
    }

    /// Step physics, logging rather than propagating collaborator failures
    fn step_world(&mut self, dt: f32) {
        if let Err(err) = self.world.step(dt) {
            log::error!("Physics step failed at tick {}: {}", self.iteration, err);
        }
        self.sim_time += dt;
    }

    fn sync_transforms(&mut self) {
        for instance in &mut self.dice {
            if let Some(state) = self.world.body(instance.body) {
                instance.transform = Transform::from(state);
            }
        }
    }

    /// Externally visible values of the dice as they lie now
    pub fn read_values(&self) -> Result<Vec<i32>, ResolveError> {
        let faces = resolve::read_faces(&self.world, &self.dice)?;
        Ok(self
            .dice
            .iter()
            .zip(faces)
            .map(|(instance, face)| instance.die.to_external_value(face))
            .collect())
    }

    /// Drive `token` to completion on a simulated clock advancing `frame_secs`
    /// per tick. Returns `None` if the run was cancelled.
    pub fn run_to_completion(
        &mut self,
        token: RunToken,
        frame_secs: f32,
    ) -> Result<Option<Vec<i32>>, ResolveError> {
        let frame = f64::from(frame_secs.max(self.settings.fixed_step));
        let mut now = 0.0;
        loop {
            now += frame;
            match self.tick(token, now)? {
                TickResult::Finished(values) => return Ok(Some(values)),
                TickResult::Stale => return Ok(None),
                TickResult::Continue(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhysicsError;
    use crate::sim::body::BodyState;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    /// World whose bodies freeze after a fixed number of steps
    #[derive(Default)]
    struct FreezeWorld {
        bodies: BTreeMap<BodyId, BodyState>,
        next: BodyId,
        steps: u32,
        freeze_after: u32,
        fail_steps: bool,
    }

    impl PhysicsWorld for FreezeWorld {
        fn add_body(&mut self, desc: BodyDesc) -> BodyId {
            self.next += 1;
            self.bodies.insert(self.next, desc.state);
            self.steps = 0;
            self.next
        }

        fn remove_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
            self.bodies
                .remove(&id)
                .map(|_| ())
                .ok_or(PhysicsError::UnknownBody(id))
        }

        fn body(&self, id: BodyId) -> Option<&BodyState> {
            self.bodies.get(&id)
        }

        fn body_mut(&mut self, id: BodyId) -> Option<&mut BodyState> {
            self.bodies.get_mut(&id)
        }

        fn step(&mut self, _dt: f32) -> Result<(), PhysicsError> {
            self.steps += 1;
            if self.steps >= self.freeze_after {
                for body in self.bodies.values_mut() {
                    body.linear_velocity = Vec3::ZERO;
                    body.angular_velocity = Vec3::ZERO;
                }
            }
            if self.fail_steps {
                return Err(PhysicsError::Step("boom".into()));
            }
            Ok(())
        }
    }

    fn vectors(n: usize) -> Vec<ThrowVector> {
        (0..n)
            .map(|_| ThrowVector {
                die: DieType::D6,
                position: Vec3::new(0.0, 0.0, 100.0),
                linear_velocity: Vec3::new(500.0, 0.0, -10.0),
                angular_velocity: Vec3::new(3.0, 1.0, 0.0),
                random_axis: throw::RandomAxis {
                    axis: Vec3::Z,
                    angle: 0.0,
                },
            })
            .collect()
    }

    fn tray(freeze_after: u32) -> Tray<FreezeWorld> {
        let world = FreezeWorld {
            freeze_after,
            ..Default::default()
        };
        Tray::new(world, Settings::default())
    }

    #[test]
    fn test_callback_fires_exactly_once() {
        let mut tray = tray(10);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let token = tray
            .roll(&vectors(2), &[], move |values| sink.borrow_mut().push(values.to_vec()))
            .ok()
            .flatten();
        let Some(token) = token else {
            panic!("roll did not start");
        };

        let result = tray.run_to_completion(token, 1.0 / 60.0);
        assert_eq!(result, Ok(Some(vec![6, 6])));
        assert_eq!(calls.borrow().len(), 1);

        // Further ticks with the old token are no-ops
        assert_eq!(tray.tick(token, 100.0), Ok(TickResult::Stale));
        assert_eq!(calls.borrow().len(), 1);
        assert!(!tray.is_rolling());
    }

    #[test]
    fn test_new_roll_invalidates_old_token() {
        let mut tray = tray(1000);
        let fired = Rc::new(RefCell::new(0));

        let f1 = fired.clone();
        let first = tray.roll(&vectors(1), &[], move |_| *f1.borrow_mut() += 1);
        let f2 = fired.clone();
        let second = tray.roll(&vectors(3), &[], move |_| *f2.borrow_mut() += 10);

        let (Ok(Some(first)), Ok(Some(second))) = (first, second) else {
            panic!("rolls did not start");
        };
        assert_ne!(first, second);
        assert_eq!(tray.tick(first, 0.1), Ok(TickResult::Stale));
        assert_eq!(tray.dice().len(), 3);
        assert_eq!(tray.world().bodies.len(), 3);

        let _ = tray.run_to_completion(second, 1.0 / 60.0);
        assert_eq!(*fired.borrow(), 10);
    }

    #[test]
    fn test_clear_cancels() {
        let mut tray = tray(5);
        let fired = Rc::new(RefCell::new(false));
        let f = fired.clone();
        let token = tray.roll(&vectors(1), &[], move |_| *f.borrow_mut() = true);
        tray.clear();
        assert!(tray.world().bodies.is_empty());
        if let Ok(Some(token)) = token {
            assert_eq!(tray.tick(token, 1.0), Ok(TickResult::Stale));
        }
        assert!(!*fired.borrow());
    }

    #[test]
    fn test_empty_roll_is_noop() {
        let mut tray = tray(5);
        let token = tray.roll(&vectors(2), &[], |_| {}).ok().flatten();
        assert_eq!(tray.roll(&[], &[], |_| panic!("must not fire")), Ok(None));
        // The earlier roll is untouched
        assert_eq!(tray.active_run(), token);
    }

    #[test]
    fn test_step_failures_are_logged_not_fatal() {
        let world = FreezeWorld {
            freeze_after: 3,
            fail_steps: true,
            ..Default::default()
        };
        let mut tray = Tray::new(world, Settings::default());
        let token = tray.roll(&vectors(1), &[], |_| {}).ok().flatten();
        let Some(token) = token else {
            panic!("roll did not start");
        };
        assert_eq!(tray.run_to_completion(token, 1.0 / 60.0), Ok(Some(vec![6])));
    }

    #[test]
    fn test_jitter_hits_ceiling() {
        let mut tray = tray(u32::MAX);
        let token = tray.roll(&vectors(1), &[], |_| {}).ok().flatten();
        let Some(token) = token else {
            panic!("roll did not start");
        };
        assert!(tray.run_to_completion(token, 1.0 / 60.0).is_ok());
        let ceiling = tray.settings().settle_ceiling_secs;
        assert!(tray.sim_time >= ceiling && tray.sim_time < ceiling + 0.1);
    }

    #[test]
    fn test_forced_mode_remaps_labels() {
        let mut tray = tray(4);
        let token = tray.roll(&vectors(2), &[Some(3)], |_| {}).ok().flatten();
        assert!(!tray.adaptive);
        assert!(tray.dice()[0].outcome.is_some());
        assert!(tray.dice()[1].outcome.is_none());
        let Some(token) = token else {
            panic!("roll did not start");
        };
        assert_eq!(tray.run_to_completion(token, 1.0 / 60.0), Ok(Some(vec![3, 6])));
    }

    #[test]
    fn test_fixed_step_pacing_requests_delay() {
        let mut tray = tray(1000);
        let token = tray.roll(&vectors(1), &[Some(2)], |_| {}).ok().flatten();
        let Some(token) = token else {
            panic!("roll did not start");
        };
        assert!(matches!(tray.tick(token, 0.0), Ok(TickResult::Continue(NextTick::Frame))));
        assert!(matches!(
            tray.tick(token, 0.005),
            Ok(TickResult::Continue(NextTick::After(_)))
        ));
    }

    #[test]
    fn test_failed_pre_simulation_leaves_tray_empty() {
        let world = FreezeWorld {
            freeze_after: 3,
            fail_steps: true,
            ..Default::default()
        };
        let mut tray = Tray::new(world, Settings::default());
        let fired = Rc::new(RefCell::new(false));
        let f = fired.clone();

        let result = tray.roll(&vectors(2), &[Some(4), None], move |_| *f.borrow_mut() = true);
        assert!(matches!(result, Err(ResolveError::Physics(PhysicsError::Step(_)))));
        assert!(tray.world().bodies.is_empty());
        assert!(tray.dice().is_empty());
        assert_eq!(tray.active_run(), None);
        assert!(!*fired.borrow());
    }

    #[test]
    fn test_zero_step_falls_back_and_ticks_return() {
        let settings = Settings {
            fixed_step: 0.0,
            settle_ceiling_secs: f32::NAN,
            ..Settings::default()
        };
        let world = FreezeWorld {
            freeze_after: 1000,
            ..Default::default()
        };
        let mut tray = Tray::new(world, settings);
        assert_eq!(tray.settings().fixed_step, SIM_DT);
        assert_eq!(tray.settings().settle_ceiling_secs, SETTLE_CEILING_SECS);

        let Ok(Some(token)) = tray.roll(&vectors(1), &[], |_| {}) else {
            panic!("roll did not start");
        };
        assert!(tray.adaptive);
        assert!(matches!(tray.tick(token, 0.0), Ok(TickResult::Continue(_))));
        assert!(matches!(tray.tick(token, 0.5), Ok(TickResult::Continue(_))));
        assert!(tray.sim_time > 0.5);
    }
}
