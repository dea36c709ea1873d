//! The frame loop. It plays the part of a UI's timer: every frame it emits, updates, renders and
//! checks whether the simulation is over.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;

use particle_engine::{Engine, Outcome};

use crate::canvas::Canvas;
use crate::config::Config;
use crate::form::SimulationForm;

/// How many recent frames the rolling FPS is averaged over.
const FPS_WINDOW: usize = 30;

/// One microsecond.
const ONE_MICROSECOND: u64 = 1_000_000;

/// Move the cursor to the top-left of the terminal.
const CURSOR_HOME: &str = "\x1b[H";

/// What state the simulation was left in after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameStatus {
    /// There's more to come.
    Running,
    /// The emitter is done and every particle has died.
    Finished,
    /// Someone asked the engine to stop, eg with Ctrl-C.
    Cancelled,
}

/// How a whole run went.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Summary {
    /// The last frame's status. `Running` means the frame limit was reached.
    pub status: FrameStatus,
    /// How many frames were drawn.
    pub frames: u64,
    /// Wall time of the whole run.
    pub elapsed: Duration,
    /// How many particles were emitted in total.
    pub total_emitted: usize,
}

/// Owns an engine and drives it frame by frame.
pub(crate) struct Driver {
    /// User config, including the engine config that the form doesn't cover.
    config: Config,
    /// The running simulation.
    engine: Engine,
    /// Where particles are drawn to.
    canvas: Canvas,
    /// How long recent frames took to compute.
    frame_times: VecDeque<Duration>,
    /// When the last frame was started.
    last_frame_tick: Instant,
    /// Number of frames since the engine was built.
    frames: u64,
}

impl Driver {
    /// Start a simulation from a submitted form.
    pub fn new(config: Config, form: &SimulationForm) -> Result<Self> {
        let engine_config = form.parse(&config.engine)?;
        let engine = Engine::new(engine_config)?;
        let canvas = Canvas::new(config.columns, config.rows, engine.config().bounds);
        tracing::debug!(
            "Driving {} worker thread(s) at {} FPS",
            engine.threads(),
            config.frame_rate
        );

        Ok(Self {
            config,
            engine,
            canvas,
            frame_times: VecDeque::with_capacity(FPS_WINDOW),
            last_frame_tick: Instant::now(),
            frames: 0,
        })
    }

    /// Replace the running simulation with a new one, like pressing "Start" again.
    ///
    /// A bad form leaves the running simulation exactly as it was.
    pub fn rebuild(&mut self, form: &SimulationForm) -> Result<()> {
        let engine_config = form.parse(&self.config.engine)?;
        let engine = Engine::new(engine_config)?;

        let old = std::mem::replace(&mut self.engine, engine);
        old.shutdown()?;

        self.canvas = Canvas::new(
            self.config.columns,
            self.config.rows,
            self.engine.config().bounds,
        );
        self.frame_times.clear();
        self.frames = 0;
        tracing::info!("Simulation rebuilt: {:?}", self.engine.config());
        Ok(())
    }

    /// The running simulation.
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Emit, update and render a single frame.
    pub fn frame(&mut self) -> Result<FrameStatus> {
        let started = Instant::now();

        if self.engine.emit()? == Outcome::Cancelled {
            return Ok(FrameStatus::Cancelled);
        }
        if self.engine.update()? == Outcome::Cancelled {
            return Ok(FrameStatus::Cancelled);
        }

        self.canvas.clear();
        let drawn = self.engine.render(&mut self.canvas)?;
        if self.config.show {
            self.show();
        }

        self.record_frame_time(started.elapsed());
        self.frames += 1;
        if self.frames % u64::try_from(FPS_WINDOW).unwrap_or(u64::MAX) == 0 {
            tracing::debug!(
                "Frame {}: {drawn} particle(s), {:.1} FPS",
                self.frames,
                self.fps()
            );
        }

        if self.engine.finished()? {
            return Ok(FrameStatus::Finished);
        }
        Ok(FrameStatus::Running)
    }

    /// Drive frames at the configured frame rate until the simulation finishes, is cancelled, or
    /// the frame limit is reached. Ctrl-C cancels the engine, even mid-frame.
    pub async fn run(&mut self) -> Result<Summary> {
        let started = Instant::now();
        let cancel = self.engine.cancel_token();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C pressed, cancelling the simulation");
                cancel.cancel();
            }
        });

        let result = self.frame_loop().await;
        ctrl_c.abort();
        let status = result?;

        let summary = Summary {
            status,
            frames: self.frames,
            elapsed: started.elapsed(),
            total_emitted: self.engine.total_emitted()?,
        };
        tracing::info!(
            "Total animation time: {:.3} seconds ({summary:?})",
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// Keep drawing frames until there's a reason to stop.
    async fn frame_loop(&mut self) -> Result<FrameStatus> {
        loop {
            self.sleep_until_next_frame_tick().await;
            // The engine blocks on its own worker pool, so hand this runtime thread's other tasks
            // elsewhere until the frame is done.
            let status = tokio::task::block_in_place(|| self.frame())?;
            if status != FrameStatus::Running {
                return Ok(status);
            }
            if self
                .config
                .max_frames
                .is_some_and(|max_frames| self.frames >= max_frames)
            {
                tracing::debug!("Frame limit of {} reached", self.frames);
                return Ok(status);
            }
        }
    }

    /// Sleep until the next frame is due.
    async fn sleep_until_next_frame_tick(&mut self) {
        let target = ONE_MICROSECOND.wrapping_div(self.config.frame_rate.max(1).into());
        let target_frame_rate_micro = Duration::from_micros(target);
        if let Some(wait) = target_frame_rate_micro.checked_sub(self.last_frame_tick.elapsed()) {
            tokio::time::sleep(wait).await;
        }
        self.last_frame_tick = Instant::now();
    }

    /// Remember how long a frame took, forgetting the oldest once the window is full.
    fn record_frame_time(&mut self, duration: Duration) {
        if self.frame_times.len() == FPS_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(duration);
    }

    /// Frames per second, averaged over the most recent frames. This is how fast frames can be
    /// computed, not the paced rate they are shown at.
    pub fn fps(&self) -> f64 {
        let total: Duration = self.frame_times.iter().sum();
        if total.is_zero() {
            return 0.0;
        }
        let frames = u32::try_from(self.frame_times.len()).unwrap_or(u32::MAX);
        f64::from(frames) / total.as_secs_f64()
    }

    /// Draw the canvas over the top of the terminal.
    #[expect(
        clippy::print_stdout,
        reason = "Showing the simulation in the terminal is the point"
    )]
    fn show(&mut self) {
        print!("{CURSOR_HOME}{}", self.canvas.render());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(policy: &str, particles: &str, initial_ttl: f64) -> (Config, SimulationForm) {
        let mut config = Config {
            frame_rate: 1000,
            ..Config::default()
        };
        config.engine.threads = Some(2);
        config.engine.seed = Some(1);
        config.engine.physics.initial_ttl = initial_ttl;

        let mut form = SimulationForm::from_config(&config.engine);
        form.policy = policy.to_owned();
        form.particles = particles.to_owned();
        (config, form)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_until_finished() {
        let (config, form) = config("burst", "10", 0.05);
        let mut driver = Driver::new(config, &form).unwrap();
        let summary = driver.run().await.unwrap();
        assert_eq!(summary.status, FrameStatus::Finished);
        // ttl goes 0.05 -> 0.034 -> 0.018 -> 0.002 -> dead
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.total_emitted, 10);
        assert!(driver.engine().finished().unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stops_at_the_frame_limit() {
        let (mut config, form) = config("continuous", "200", 15.0);
        config.max_frames = Some(3);
        let mut driver = Driver::new(config, &form).unwrap();
        let summary = driver.run().await.unwrap();
        assert_eq!(summary.status, FrameStatus::Running);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.total_emitted, 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn other_tasks_run_during_a_frame() {
        let (config, form) = config("continuous", "200", 15.0);
        let mut driver = Driver::new(config, &form).unwrap();
        assert_eq!(driver.engine().threads(), 2);

        let (sender, receiver) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            sender.send(()).ok();
        });

        // The only runtime worker is busy with the frame, so the task above can only run if the
        // worker was handed off.
        let status = tokio::task::block_in_place(|| {
            let status = driver.frame().unwrap();
            receiver.blocking_recv().unwrap();
            status
        });
        assert_eq!(status, FrameStatus::Running);
    }

    #[test]
    fn cancelled_frames() {
        let (config, form) = config("continuous", "200", 15.0);
        let mut driver = Driver::new(config, &form).unwrap();
        assert_eq!(driver.frame().unwrap(), FrameStatus::Running);
        driver.engine().cancel_token().cancel();
        assert_eq!(driver.frame().unwrap(), FrameStatus::Cancelled);
        assert_eq!(driver.engine().total_emitted().unwrap(), 5);
    }

    #[test]
    fn bad_form_keeps_the_running_simulation() {
        let (config, form) = config("continuous", "200", 15.0);
        let mut driver = Driver::new(config, &form).unwrap();
        driver.frame().unwrap();

        let mut bad_form = form.clone();
        bad_form.width = "wide".to_owned();
        assert!(driver.rebuild(&bad_form).is_err());
        assert_eq!(driver.engine().config().max_particles, 200);
        assert_eq!(driver.engine().len().unwrap(), 5);
        assert_eq!(driver.frame().unwrap(), FrameStatus::Running);
    }

    #[test]
    fn rebuilding_starts_afresh() {
        let (config, form) = config("continuous", "200", 15.0);
        let mut driver = Driver::new(config, &form).unwrap();
        driver.frame().unwrap();

        let mut new_form = form.clone();
        new_form.particles = "3".to_owned();
        driver.rebuild(&new_form).unwrap();
        assert_eq!(driver.engine().config().max_particles, 3);
        assert!(driver.engine().is_empty().unwrap());
        driver.frame().unwrap();
        assert_eq!(driver.engine().len().unwrap(), 3);
    }

    #[test]
    fn fps_is_a_rolling_average() {
        let (config, form) = config("continuous", "200", 15.0);
        let mut driver = Driver::new(config, &form).unwrap();
        assert!(driver.fps().abs() < f64::EPSILON);
        for _ in 0..FPS_WINDOW {
            driver.record_frame_time(Duration::from_secs(1));
        }
        driver.record_frame_time(Duration::from_millis(500));
        assert_eq!(driver.frame_times.len(), FPS_WINDOW);
        let expected = 30.0 / 29.5;
        assert!((driver.fps() - expected).abs() < 1e-9);
    }
}
