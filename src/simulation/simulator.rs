//! Traffic simulator: event schedule, road map and the tick loop

use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};

use super::error::{SimError, SimResult};
use super::events::{parse_section, Event};
use super::multimap::{MultiTreeMap, ValuesList};
use super::notify::{Notification, Subscribers};
use super::road_map::{RoadMap, SimObject};
use super::types::{JunctionId, RoadId, Tick, VehicleId};
use crate::ini::{Ini, IniSection};

/// Owns the road map and the event schedule and advances them tick by tick
#[derive(Debug, Default)]
pub struct TrafficSimulator {
    time: Tick,
    events: MultiTreeMap<Tick, Event>,
    road_map: RoadMap,
    subscribers: Subscribers,
}

impl TrafficSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time, i.e. the next tick to run
    pub fn time(&self) -> Tick {
        self.time
    }

    pub fn road_map(&self) -> &RoadMap {
        &self.road_map
    }

    /// New receiver for every future state change
    pub fn subscribe(&mut self) -> Receiver<Notification> {
        self.subscribers.subscribe()
    }

    /// Back to time 0 with no events and an empty road map
    pub fn reset(&mut self) {
        self.time = 0;
        self.events.clear();
        self.road_map = RoadMap::new();
        self.subscribers.notify(Notification::Reset);
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.put(event.time(), event);
        self.subscribers.notify(Notification::NewEvent);
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Scheduled events ordered by time, then by insertion
    pub fn events(&self) -> ValuesList<'_, Tick, Event> {
        self.events.values_list()
    }

    /// Parses every section of `reader` and schedules the events. Nothing is
    /// scheduled unless every section parses. Returns how many were added.
    pub fn load_events<R: BufRead>(&mut self, reader: R) -> SimResult<usize> {
        let parsed = Ini::load(reader).and_then(|ini| {
            ini.sections()
                .iter()
                .map(parse_section)
                .collect::<Result<Vec<_>, _>>()
        });
        let events = match parsed {
            Ok(events) => events,
            Err(err) => {
                let err = SimError::from(err);
                error!("Failed to load events: {}", err);
                self.notify_error(err.to_string());
                return Err(err);
            }
        };

        let count = events.len();
        for event in events {
            self.add_event(event);
        }
        info!("Scheduled {} events", count);
        Ok(count)
    }

    pub fn add_simulated_object(&mut self, object: impl Into<SimObject>) -> SimResult<()> {
        self.road_map.add_simulated_object(object)
    }

    pub fn get_path(&self, junctions: &[JunctionId]) -> SimResult<Vec<JunctionId>> {
        self.road_map.get_path(junctions)
    }

    pub fn green_roads(&self) -> BTreeSet<RoadId> {
        self.road_map.green_roads()
    }

    pub fn make_vehicle_faulty(&mut self, id: &VehicleId, duration: u32) -> SimResult<()> {
        self.road_map.make_vehicle_faulty(id, duration)
    }

    /// Runs `steps` ticks, writing a report after each one when a sink is
    /// given. Stops at the first failing tick; work done before the failure
    /// is kept.
    pub fn run(&mut self, steps: u32, mut sink: Option<&mut (dyn Write + '_)>) -> SimResult<()> {
        for _ in 0..steps {
            self.step(sink.as_deref_mut())?;
        }
        Ok(())
    }

    /// Runs exactly one tick
    pub fn step(&mut self, sink: Option<&mut (dyn Write + '_)>) -> SimResult<()> {
        if let Err(err) = self.advance() {
            self.fail(&err);
            return Err(err);
        }

        self.time += 1;
        debug!("Tick {} done", self.time);
        self.subscribers
            .notify(Notification::Advanced { time: self.time });

        if let Some(sink) = sink {
            self.write_reports(sink);
        }
        Ok(())
    }

    fn advance(&mut self) -> SimResult<()> {
        let due: Vec<Event> = self
            .events
            .get(&self.time)
            .map(<[Event]>::to_vec)
            .unwrap_or_default();
        for event in &due {
            event.execute(&mut self.road_map)?;
        }
        self.road_map.advance_roads()?;
        self.road_map.advance_junctions()
    }

    fn fail(&mut self, err: &SimError) {
        error!("Simulation aborted at tick {}: {}", self.time, err);
        self.notify_error(err.to_string());
    }

    pub(crate) fn notify_error(&mut self, message: String) {
        self.subscribers.notify(Notification::Error(message));
    }

    /// Reports of every entity at the current time
    pub fn reports(&self) -> Vec<IniSection> {
        self.road_map.reports(self.time)
    }

    /// A failing entity is reported to subscribers and skipped
    fn write_reports(&mut self, sink: &mut (dyn Write + '_)) {
        for report in self.reports() {
            let written = report.store(&mut *sink).and_then(|_| writeln!(sink));
            if let Err(err) = written {
                let id = report.get("id").unwrap_or_default();
                warn!("Failed to write the report of {}: {}", id, err);
                self.notify_error(format!(
                    "Something went wrong while writing {}'s report",
                    id
                ));
            }
        }
    }
}
