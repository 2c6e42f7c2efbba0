//! Road logic for the traffic simulation
//!
//! A road keeps its vehicles indexed by position, nearest to the end first,
//! and moves all of them once per tick.

use std::cmp::Reverse;

use super::error::{SimError, SimResult};
use super::multimap::MultiTreeMap;
use super::road_map::Registry;
use super::types::{JunctionId, RoadId, Tick, VehicleId, ROAD_REPORT};
use super::vehicle::{Vehicle, VehicleStep};
use crate::ini::IniSection;

/// Vehicles on a road keyed by position, descending
pub type PositionIndex = MultiTreeMap<Reverse<u32>, VehicleId>;

/// Speed model of a road
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadKind {
    Plain,
    /// Always full speed, but every broken vehicle ahead slows the ones behind further
    Dirt,
    /// Several lanes let vehicles overtake broken ones until all lanes are blocked
    Lanes(u32),
}

impl RoadKind {
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            RoadKind::Plain => None,
            RoadKind::Dirt => Some("dirt"),
            RoadKind::Lanes(_) => Some("lanes"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Road {
    id: RoadId,
    length: u32,
    max_speed: u32,
    source: JunctionId,
    destination: JunctionId,
    kind: RoadKind,
    vehicles: PositionIndex,
}

impl Road {
    pub fn new(
        id: impl Into<RoadId>,
        length: u32,
        max_speed: u32,
        source: impl Into<JunctionId>,
        destination: impl Into<JunctionId>,
    ) -> Self {
        Self {
            id: id.into(),
            length,
            max_speed,
            source: source.into(),
            destination: destination.into(),
            kind: RoadKind::Plain,
            vehicles: PositionIndex::new(),
        }
    }

    pub fn with_kind(mut self, kind: RoadKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn id(&self) -> &RoadId {
        &self.id
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn max_speed(&self) -> u32 {
        self.max_speed
    }

    pub fn source(&self) -> &JunctionId {
        &self.source
    }

    pub fn destination(&self) -> &JunctionId {
        &self.destination
    }

    pub fn kind(&self) -> RoadKind {
        self.kind
    }

    /// Number of vehicles currently on the road
    pub fn occupancy(&self) -> usize {
        self.vehicles.total_count()
    }

    /// Vehicles in iteration order, nearest to the end first
    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleId> {
        self.vehicles.values()
    }

    /// `(vehicle, position)` pairs, nearest to the end first
    pub fn positions(&self) -> impl Iterator<Item = (&VehicleId, u32)> {
        self.vehicles
            .entries()
            .map(|(Reverse(position), vehicle)| (vehicle, *position))
    }

    pub(crate) fn vehicle_in(&mut self, vehicle: VehicleId) {
        self.vehicles.put(Reverse(0), vehicle);
    }

    pub(crate) fn vehicle_out(&mut self, vehicle: &VehicleId, location: u32) -> bool {
        self.vehicles.remove(&Reverse(location), vehicle)
    }

    /// Speed every vehicle gets before reductions
    pub fn base_speed(&self) -> u32 {
        // Wide enough for any max speed times any lane count
        let max_speed = u64::from(self.max_speed);
        let occupancy = self.occupancy().max(1) as u64;
        let speed = match self.kind {
            RoadKind::Plain => max_speed / occupancy + 1,
            RoadKind::Dirt => max_speed,
            RoadKind::Lanes(lanes) => max_speed * u64::from(lanes) / occupancy + 1,
        };
        speed.min(max_speed) as u32
    }

    /// Divisor applied to the base speed of a vehicle with
    /// `faulty_ahead` broken vehicles in front of it
    pub fn reduction_factor(&self, faulty_ahead: u32) -> u32 {
        match self.kind {
            RoadKind::Plain => {
                if faulty_ahead > 0 {
                    2
                } else {
                    1
                }
            }
            RoadKind::Dirt => faulty_ahead + 1,
            RoadKind::Lanes(lanes) => {
                if faulty_ahead >= lanes {
                    2
                } else {
                    1
                }
            }
        }
    }

    /// Moves every vehicle on the road one tick.
    ///
    /// Returns the vehicles that reached the end during this tick, in the
    /// order they got there, paired with the junction they now wait at.
    pub(crate) fn advance(
        &mut self,
        vehicles: &mut Registry<VehicleId, Vehicle>,
    ) -> SimResult<Vec<(VehicleId, JunctionId)>> {
        let mut queued = Vec::new();
        if self.vehicles.is_empty() {
            return Ok(queued);
        }

        let base_speed = self.base_speed();
        let mut faulty_ahead = 0;
        // Positions change while iterating, so the index is rebuilt
        let mut rebuilt = PositionIndex::new();
        for vehicle_id in self.vehicles.values() {
            let vehicle = vehicles
                .get_mut(vehicle_id)
                .ok_or_else(|| SimError::UnknownVehicle(vehicle_id.to_string()))?;

            let reduction = self.reduction_factor(faulty_ahead);
            if vehicle.is_faulty() {
                faulty_ahead += 1;
            }
            vehicle.set_current_speed(base_speed / reduction);
            if let VehicleStep::ReachedJunction(junction) = vehicle.advance(self.length)? {
                queued.push((vehicle_id.clone(), junction));
            }
            rebuilt.put(Reverse(vehicle.location()), vehicle_id.clone());
        }
        self.vehicles = rebuilt;
        Ok(queued)
    }

    pub fn report(&self, time: Tick) -> IniSection {
        let mut section = IniSection::new(ROAD_REPORT);
        section.set_value("id", self.id.as_str());
        section.set_value("time", time.to_string());
        if let Some(tag) = self.kind.type_tag() {
            section.set_value("type", tag);
        }
        let state: Vec<String> = self
            .positions()
            .map(|(vehicle, position)| format!("({},{})", vehicle, position))
            .collect();
        section.set_value("state", state.join(","));
        section
    }

    /// Columns shown in the summary table
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let vehicles: Vec<&str> = self.vehicles().map(VehicleId::as_str).collect();
        vec![
            ("ID", self.id.to_string()),
            ("Source", self.source.to_string()),
            ("Target", self.destination.to_string()),
            ("Length", self.length.to_string()),
            ("Max Speed", self.max_speed.to_string()),
            ("Vehicles", format!("[{}]", vehicles.join(","))),
        ]
    }
}
