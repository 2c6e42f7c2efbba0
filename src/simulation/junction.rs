//! Junction logic for the traffic simulation
//!
//! Every road ending at a junction gets a FIFO queue and a traffic light.
//! One incoming road at a time is green; the light policy decides which one
//! and for how long.

use std::collections::VecDeque;

use log::debug;

use super::error::{SimError, SimResult};
use super::types::{JunctionId, RoadId, Tick, VehicleId, JUNCTION_REPORT};
use crate::ini::IniSection;

/// A road registered at its destination junction
#[derive(Debug, Clone)]
pub struct IncomingRoad {
    road: RoadId,
    /// Junction the road starts at
    source: JunctionId,
    queue: VecDeque<VehicleId>,
    green: bool,
}

impl IncomingRoad {
    fn new(road: RoadId, source: JunctionId) -> Self {
        Self {
            road,
            source,
            queue: VecDeque::new(),
            green: false,
        }
    }

    pub fn road(&self) -> &RoadId {
        &self.road
    }

    pub fn source(&self) -> &JunctionId {
        &self.source
    }

    pub fn is_green(&self) -> bool {
        self.green
    }

    /// Waiting vehicles, front first
    pub fn queue(&self) -> impl Iterator<Item = &VehicleId> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn queue_text(&self) -> String {
        let ids: Vec<&str> = self.queue.iter().map(VehicleId::as_str).collect();
        format!("[{}]", ids.join(","))
    }
}

/// Counters of a light that stays green for several ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlice {
    /// Ticks the current green lasts
    pub time_lapse: u32,
    /// Ticks spent green so far
    pub ticks_elapsed: u32,
    /// Vehicles let through since the light turned green
    pub ticks_used: u32,
}

impl TimeSlice {
    fn new(time_lapse: u32) -> Self {
        Self {
            time_lapse,
            ticks_elapsed: 0,
            ticks_used: 0,
        }
    }

    fn ends_this_tick(&self) -> bool {
        self.ticks_elapsed + 1 >= self.time_lapse
    }

    pub fn remaining(&self) -> u32 {
        self.time_lapse.saturating_sub(self.ticks_elapsed)
    }
}

/// How a junction picks its next green road
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightPolicy {
    /// Next road every tick
    Cyclic,
    /// Next road when the slice ends; the slice grows when busy, shrinks when idle
    RoundRobin { min_slice: u32, max_slice: u32 },
    /// Longest queue when the slice ends, green for half its length
    MostCrowded,
}

impl LightPolicy {
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            LightPolicy::Cyclic => None,
            LightPolicy::RoundRobin { .. } => Some("rr"),
            LightPolicy::MostCrowded => Some("mc"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Junction {
    id: JunctionId,
    /// In registration order
    incoming: Vec<IncomingRoad>,
    green: Option<usize>,
    /// Index of the road the cyclic scan yields next
    cursor: usize,
    policy: LightPolicy,
    slice: TimeSlice,
}

impl Junction {
    pub fn new(id: impl Into<JunctionId>) -> Self {
        Self::with_policy(id, LightPolicy::Cyclic)
    }

    pub fn round_robin(id: impl Into<JunctionId>, min_slice: u32, max_slice: u32) -> Self {
        Self::with_policy(
            id,
            LightPolicy::RoundRobin {
                min_slice,
                max_slice,
            },
        )
    }

    pub fn most_crowded(id: impl Into<JunctionId>) -> Self {
        Self::with_policy(id, LightPolicy::MostCrowded)
    }

    pub fn with_policy(id: impl Into<JunctionId>, policy: LightPolicy) -> Self {
        let time_lapse = match policy {
            LightPolicy::RoundRobin { max_slice, .. } => max_slice,
            LightPolicy::Cyclic | LightPolicy::MostCrowded => 1,
        };
        Self {
            id: id.into(),
            incoming: Vec::new(),
            green: None,
            cursor: 0,
            policy,
            slice: TimeSlice::new(time_lapse),
        }
    }

    pub fn id(&self) -> &JunctionId {
        &self.id
    }

    pub fn policy(&self) -> LightPolicy {
        self.policy
    }

    /// Slice counters, for the policies that keep a light green for several ticks
    pub fn time_slice(&self) -> Option<TimeSlice> {
        match self.policy {
            LightPolicy::Cyclic => None,
            LightPolicy::RoundRobin { .. } | LightPolicy::MostCrowded => Some(self.slice),
        }
    }

    pub fn incoming_roads(&self) -> &[IncomingRoad] {
        &self.incoming
    }

    /// Registers a road ending here. Registering the same road twice keeps
    /// one record.
    pub(crate) fn add_road(&mut self, road: RoadId, source: JunctionId) {
        match self.incoming.iter_mut().find(|r| r.road == road) {
            Some(existing) => *existing = IncomingRoad::new(road, source),
            None => self.incoming.push(IncomingRoad::new(road, source)),
        }
    }

    /// Queues a vehicle that reached the end of `road`
    pub(crate) fn vehicle_in(&mut self, road: &RoadId, vehicle: VehicleId) -> SimResult<()> {
        let incoming = self
            .incoming
            .iter_mut()
            .find(|r| r.road == *road)
            .ok_or_else(|| SimError::UnknownRoad(road.to_string()))?;
        incoming.queue.push_back(vehicle);
        Ok(())
    }

    pub fn green_road(&self) -> Option<&RoadId> {
        self.green.map(|idx| &self.incoming[idx].road)
    }

    /// First registered road arriving here from `previous`
    pub fn straight_road(&self, previous: &JunctionId) -> Option<&RoadId> {
        self.incoming
            .iter()
            .find(|r| r.source == *previous)
            .map(|r| &r.road)
    }

    /// Lets the front vehicle of the green road through, then updates the
    /// lights. Returns the vehicle that crossed, which the caller moves onto
    /// its next road.
    pub(crate) fn advance(&mut self) -> Option<VehicleId> {
        if self.incoming.is_empty() {
            return None;
        }
        let crossed = self
            .green
            .and_then(|idx| self.incoming[idx].queue.pop_front());
        if crossed.is_some() {
            self.slice.ticks_used += 1;
        }
        self.switch_lights();
        crossed
    }

    fn switch_lights(&mut self) {
        match self.policy {
            LightPolicy::Cyclic => {
                let next = self.next_road();
                self.switch_to(next);
            }
            LightPolicy::RoundRobin {
                min_slice,
                max_slice,
            } => {
                if self.green.is_none() {
                    let next = self.next_road();
                    self.switch_to(next);
                } else if self.slice.ends_this_tick() {
                    if self.slice.ticks_used == 0 {
                        self.slice.time_lapse = self.slice.time_lapse.saturating_sub(1).max(min_slice);
                    } else if self.slice.ticks_used == self.slice.ticks_elapsed {
                        self.slice.time_lapse = (self.slice.time_lapse + 1).min(max_slice);
                    }
                    let next = self.next_road();
                    self.switch_to(next);
                    self.slice.ticks_elapsed = 0;
                } else {
                    self.slice.ticks_elapsed += 1;
                }
            }
            LightPolicy::MostCrowded => {
                if self.slice.ends_this_tick() {
                    let chosen = self.find_most_crowded();
                    self.switch_to(chosen);
                    self.slice.time_lapse = (self.incoming[chosen].queue_len() as u32 / 2).max(1);
                    self.slice.ticks_elapsed = 0;
                } else {
                    self.slice.ticks_elapsed += 1;
                }
            }
        }
    }

    /// Cyclic cursor over the incoming roads, wrapping at the end
    fn next_road(&mut self) -> usize {
        if self.cursor >= self.incoming.len() {
            self.cursor = 0;
        }
        let idx = self.cursor;
        self.cursor += 1;
        idx
    }

    fn switch_to(&mut self, idx: usize) {
        if let Some(previous) = self.green {
            self.incoming[previous].green = false;
        }
        self.incoming[idx].green = true;
        self.green = Some(idx);
        self.slice.ticks_used = 0;
        debug!("Junction {}: {} is green", self.id, self.incoming[idx].road);
    }

    /// Scans every other road once, starting after the cursor. The first
    /// road with the strictly longest queue wins. With no green road yet the
    /// first scanned road is the baseline and a candidate itself. Leaves the
    /// cursor just past the winner.
    fn find_most_crowded(&mut self) -> usize {
        let mut road = self.next_road();
        let mut most_crowded = road;
        let current = match self.green {
            Some(green) => green,
            None => {
                let baseline = road;
                road = self.next_road();
                baseline
            }
        };
        while road != current {
            if self.incoming[road].queue_len() > self.incoming[most_crowded].queue_len() {
                most_crowded = road;
            }
            road = self.next_road();
        }
        while road != most_crowded {
            road = self.next_road();
        }
        most_crowded
    }

    fn light_color(&self, incoming: &IncomingRoad) -> String {
        match (incoming.green, self.policy) {
            (false, _) => "red".to_string(),
            (true, LightPolicy::Cyclic) => "green".to_string(),
            (true, _) => format!("green:{}", self.slice.remaining()),
        }
    }

    fn queue_entry(&self, incoming: &IncomingRoad, color: &str) -> String {
        format!("({},{},{})", incoming.road, color, incoming.queue_text())
    }

    pub fn report(&self, time: Tick) -> IniSection {
        let mut section = IniSection::new(JUNCTION_REPORT);
        section.set_value("id", self.id.as_str());
        section.set_value("time", time.to_string());
        let queues: Vec<String> = self
            .incoming
            .iter()
            .map(|r| self.queue_entry(r, &self.light_color(r)))
            .collect();
        section.set_value("queues", queues.join(","));
        if let Some(tag) = self.policy.type_tag() {
            section.set_value("type", tag);
        }
        section
    }

    /// Columns shown in the summary table
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let green = match self.green {
            Some(idx) => {
                let road = &self.incoming[idx];
                format!("[{}]", self.queue_entry(road, &self.light_color(road)))
            }
            None => "[]".to_string(),
        };
        let red: Vec<String> = self
            .incoming
            .iter()
            .filter(|r| !r.green)
            .map(|r| self.queue_entry(r, "red"))
            .collect();
        vec![
            ("ID", self.id.to_string()),
            ("Green", green),
            ("Red", format!("[{}]", red.join(","))),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn junction_with_roads(mut junction: Junction, roads: usize) -> Junction {
        for i in 1..=roads {
            junction.add_road(RoadId(format!("r{}", i)), JunctionId(format!("s{}", i)));
        }
        junction
    }

    #[test]
    fn test_cyclic_lights_rotate_every_tick() {
        let mut junction = junction_with_roads(Junction::new("j"), 3);
        assert_eq!(junction.green_road(), None);
        junction.advance();
        assert_eq!(junction.green_road(), Some(&RoadId::from("r1")));
        junction.advance();
        junction.advance();
        assert_eq!(junction.green_road(), Some(&RoadId::from("r3")));
        junction.advance();
        assert_eq!(junction.green_road(), Some(&RoadId::from("r1")));
    }

    #[test]
    fn test_single_road_stays_green() {
        let mut junction = junction_with_roads(Junction::new("j"), 1);
        junction.advance();
        junction.advance();
        assert_eq!(junction.green_road(), Some(&RoadId::from("r1")));
        assert!(junction.incoming_roads()[0].is_green());
    }

    #[test]
    fn test_add_road_twice_keeps_one_record() {
        let mut junction = Junction::new("j");
        junction.add_road("r1".into(), "a".into());
        junction.add_road("r1".into(), "a".into());
        assert_eq!(junction.incoming_roads().len(), 1);
    }

    #[test]
    fn test_queue_on_unregistered_road_fails() {
        let mut junction = Junction::new("j");
        assert!(matches!(
            junction.vehicle_in(&"r9".into(), "v1".into()),
            Err(SimError::UnknownRoad(_))
        ));
    }

    #[test]
    fn test_straight_road_prefers_first_registered() {
        let mut junction = Junction::new("j");
        junction.add_road("r1".into(), "a".into());
        junction.add_road("r2".into(), "a".into());
        assert_eq!(junction.straight_road(&"a".into()), Some(&RoadId::from("r1")));
        assert_eq!(junction.straight_road(&"b".into()), None);
    }
}
