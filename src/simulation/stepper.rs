//! Background driver that runs a simulator one tick at a time

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use super::error::{SimError, SimResult};
use super::simulator::TrafficSimulator;

/// Report destination handed to the worker thread
pub type Sink = Box<dyn Write + Send>;

/// Owns a simulator while a worker thread steps it
pub struct Stepper {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<(TrafficSimulator, u32, io::Result<()>)>,
}

impl Stepper {
    /// Moves `simulator` to a worker thread and runs up to `steps` ticks,
    /// pausing `delay` between them. A failing tick ends the run; the
    /// simulator has already notified its subscribers. The sink is flushed
    /// once the run ends.
    pub fn start(
        mut simulator: TrafficSimulator,
        steps: u32,
        delay: Duration,
        mut sink: Option<Sink>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            let mut done = 0;
            while done < steps && !stop_flag.load(Ordering::Relaxed) {
                let sink = sink.as_deref_mut().map(|w| w as &mut dyn Write);
                if simulator.step(sink).is_err() {
                    break;
                }
                done += 1;
                if done < steps && !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
            let flushed = match sink.as_mut() {
                Some(sink) => sink.flush(),
                None => Ok(()),
            };
            if let Err(err) = &flushed {
                warn!("Failed to flush the reports: {}", err);
                simulator.notify_error(format!("Failed to flush the reports: {}", err));
            }
            debug!("Stepper finished after {} ticks", done);
            (simulator, done, flushed)
        });

        info!("Stepping {} ticks every {:?}", steps, delay);
        Self { stop, handle }
    }

    /// Asks the worker not to start another tick
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and hands back the simulator together with the
    /// number of ticks it ran. Fails with [`SimError::Io`] when the sink
    /// could not be flushed.
    pub fn join(self) -> SimResult<(TrafficSimulator, u32)> {
        let (simulator, done, flushed) = self
            .handle
            .join()
            .map_err(|_| SimError::InvalidState("stepper thread panicked".to_string()))?;
        flushed?;
        Ok((simulator, done))
    }
}
