//! Vehicle state machine
//!
//! A vehicle is either queued at a junction, moving along a road, broken
//! down, or arrived. Roads and junctions are referenced by id and resolved
//! through the road map.

use std::collections::VecDeque;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::{SimError, SimResult};
use super::types::{JunctionId, RoadId, Tick, VehicleId, VEHICLE_REPORT};
use crate::ini::IniSection;

/// Fault model of a car
#[derive(Debug, Clone)]
pub struct CarState {
    pub resistance: u32,
    pub fault_probability: f64,
    pub max_fault_duration: u32,
    /// Kilometrage when the car last broke down
    last_fault_kilometrage: u32,
    /// Only this car draws from it, so a fixed seed replays the same faults
    rng: StdRng,
}

/// Variant of a vehicle
#[derive(Debug, Clone)]
pub enum VehicleKind {
    Plain,
    /// Breaks down at random once it has travelled `resistance` since its last fault
    Car(CarState),
    /// Only breaks down when riding faster than half its max speed
    Bicycle,
}

impl VehicleKind {
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            VehicleKind::Plain => None,
            VehicleKind::Car(_) => Some("car"),
            VehicleKind::Bicycle => Some("bike"),
        }
    }
}

/// Outcome of a single vehicle advance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleStep {
    /// Broken down or waiting at a junction
    Stalled,
    Moved,
    /// Reached the end of its road and must queue at this junction
    ReachedJunction(JunctionId),
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    max_speed: u32,
    current_speed: u32,
    faulty: u32,
    kilometrage: u32,
    road: Option<RoadId>,
    location: u32,
    /// Junctions still to visit; the front is the next one
    itinerary: VecDeque<JunctionId>,
    arrived: bool,
    in_junction: bool,
    kind: VehicleKind,
}

impl Vehicle {
    pub fn new(id: impl Into<VehicleId>, max_speed: u32, itinerary: Vec<JunctionId>) -> Self {
        Self {
            id: id.into(),
            max_speed,
            current_speed: 0,
            faulty: 0,
            kilometrage: 0,
            road: None,
            location: 0,
            itinerary: itinerary.into(),
            arrived: false,
            in_junction: false,
            kind: VehicleKind::Plain,
        }
    }

    pub fn car(
        id: impl Into<VehicleId>,
        max_speed: u32,
        itinerary: Vec<JunctionId>,
        resistance: u32,
        fault_probability: f64,
        max_fault_duration: u32,
        seed: u64,
    ) -> Self {
        let mut vehicle = Self::new(id, max_speed, itinerary);
        vehicle.kind = VehicleKind::Car(CarState {
            resistance,
            fault_probability,
            max_fault_duration,
            last_fault_kilometrage: 0,
            rng: StdRng::seed_from_u64(seed),
        });
        vehicle
    }

    pub fn bicycle(id: impl Into<VehicleId>, max_speed: u32, itinerary: Vec<JunctionId>) -> Self {
        let mut vehicle = Self::new(id, max_speed, itinerary);
        vehicle.kind = VehicleKind::Bicycle;
        vehicle
    }

    pub fn id(&self) -> &VehicleId {
        &self.id
    }

    pub fn kind(&self) -> &VehicleKind {
        &self.kind
    }

    pub fn max_speed(&self) -> u32 {
        self.max_speed
    }

    pub fn current_speed(&self) -> u32 {
        self.current_speed
    }

    /// Remaining ticks broken down
    pub fn faulty(&self) -> u32 {
        self.faulty
    }

    pub fn is_faulty(&self) -> bool {
        self.faulty > 0
    }

    pub fn kilometrage(&self) -> u32 {
        self.kilometrage
    }

    pub fn road(&self) -> Option<&RoadId> {
        self.road.as_ref()
    }

    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn itinerary(&self) -> impl Iterator<Item = &JunctionId> {
        self.itinerary.iter()
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    pub fn in_junction(&self) -> bool {
        self.in_junction
    }

    /// Ignored while broken down or waiting at a junction
    pub fn set_current_speed(&mut self, speed: u32) {
        if self.faulty == 0 && !self.in_junction {
            self.current_speed = speed.min(self.max_speed);
        }
    }

    /// Breaks the vehicle down for `duration` more ticks
    pub fn set_faulty(&mut self, duration: u32) -> SimResult<()> {
        if let VehicleKind::Bicycle = self.kind {
            if self.current_speed <= self.max_speed / 2 {
                return Ok(());
            }
        }
        if self.arrived {
            return Err(SimError::InvalidState(format!(
                "vehicle {} has already arrived",
                self.id
            )));
        }
        self.break_down(duration);
        Ok(())
    }

    fn break_down(&mut self, duration: u32) {
        self.faulty = self.faulty.saturating_add(duration);
        self.current_speed = 0;
        if let VehicleKind::Car(car) = &mut self.kind {
            car.last_fault_kilometrage = self.kilometrage;
        }
    }

    /// Rolls a car's dice; `Some(duration)` when it breaks down this tick
    fn random_fault(&mut self) -> Option<u32> {
        if self.faulty > 0 {
            return None;
        }
        let kilometrage = self.kilometrage;
        let VehicleKind::Car(car) = &mut self.kind else {
            return None;
        };
        if kilometrage.saturating_sub(car.last_fault_kilometrage) <= car.resistance {
            return None;
        }
        if car.rng.random::<f64>() < car.fault_probability {
            Some(car.rng.random_range(1..=car.max_fault_duration.max(1)))
        } else {
            None
        }
    }

    /// Moves the vehicle `current_speed` units along a road of `road_length`
    pub(crate) fn advance(&mut self, road_length: u32) -> SimResult<VehicleStep> {
        if let Some(duration) = self.random_fault() {
            debug!("Car {} broke down for {} ticks", self.id, duration);
            self.break_down(duration);
        }

        if self.faulty > 0 {
            self.faulty -= 1;
            return Ok(VehicleStep::Stalled);
        }
        if self.in_junction {
            return Ok(VehicleStep::Stalled);
        }

        let mut new_location = self.location.saturating_add(self.current_speed);
        let mut step = VehicleStep::Moved;
        if new_location >= road_length {
            new_location = road_length;
            let next = self.itinerary.front().cloned().ok_or_else(|| {
                SimError::InvalidState(format!("vehicle {} has an empty itinerary", self.id))
            })?;
            self.current_speed = 0;
            self.in_junction = true;
            step = VehicleStep::ReachedJunction(next);
        }
        self.kilometrage = self.kilometrage.saturating_add(new_location - self.location);
        self.location = new_location;
        Ok(step)
    }

    /// Pops the junction just crossed
    pub(crate) fn pop_junction(&mut self) -> Option<JunctionId> {
        self.itinerary.pop_front()
    }

    /// The junction the vehicle is heading to or waiting at
    pub fn next_junction(&self) -> Option<&JunctionId> {
        self.itinerary.front()
    }

    pub(crate) fn enter_road(&mut self, road: RoadId) {
        self.road = Some(road);
        self.location = 0;
        self.in_junction = false;
    }

    pub(crate) fn arrive(&mut self) {
        self.arrived = true;
        self.current_speed = 0;
        self.road = None;
        self.in_junction = false;
    }

    pub fn report(&self, time: Tick) -> IniSection {
        let mut section = IniSection::new(VEHICLE_REPORT);
        section.set_value("id", self.id.as_str());
        section.set_value("time", time.to_string());
        if let Some(tag) = self.kind.type_tag() {
            section.set_value("type", tag);
        }
        section.set_value("speed", self.current_speed.to_string());
        section.set_value("kilometrage", self.kilometrage.to_string());
        section.set_value("faulty", self.faulty.to_string());
        section.set_value("location", self.location_text());
        section
    }

    fn location_text(&self) -> String {
        match (&self.road, self.arrived) {
            (Some(road), false) => format!("({},{})", road, self.location),
            _ => "arrived".to_string(),
        }
    }

    /// Columns shown in the summary table
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let road = match (&self.road, self.arrived) {
            (Some(road), false) => road.to_string(),
            _ => "arrived".to_string(),
        };
        let location = if self.arrived {
            "arrived".to_string()
        } else {
            self.location.to_string()
        };
        let itinerary: Vec<&str> = self.itinerary.iter().map(JunctionId::as_str).collect();
        vec![
            ("ID", self.id.to_string()),
            ("Road", road),
            ("Location", location),
            ("Speed", self.current_speed.to_string()),
            ("Km", self.kilometrage.to_string()),
            ("Faulty Units", self.faulty.to_string()),
            ("Itinerary", format!("[{}]", itinerary.join(","))),
        ]
    }
}
