use road_traffic_sim::simulation::{Junction, Road, RoadKind, RoadMap, Vehicle, VehicleId};

/// Two junctions joined by a single road of the given kind
fn single_road_map(length: u32, max_speed: u32, kind: RoadKind) -> RoadMap {
    let mut map = RoadMap::new();
    map.add_simulated_object(Junction::new("jt1")).unwrap();
    map.add_simulated_object(Junction::new("jt2")).unwrap();
    map.add_simulated_object(Road::new("rt1", length, max_speed, "jt1", "jt2").with_kind(kind))
        .unwrap();
    map
}

fn add_vehicle(map: &mut RoadMap, id: &str, max_speed: u32) {
    map.add_simulated_object(Vehicle::new(id, max_speed, vec!["jt1".into(), "jt2".into()]))
        .unwrap();
}

fn break_down(map: &mut RoadMap, ids: &[&str], duration: u32) {
    for id in ids {
        map.make_vehicle_faulty(&VehicleId::from(*id), duration).unwrap();
    }
}

fn state(map: &RoadMap) -> String {
    let road = map.road(&"rt1".into()).unwrap();
    road.report(1).get("state").unwrap().to_string()
}

#[test]
fn test_vehicles_share_the_road() {
    let mut map = single_road_map(100, 20, RoadKind::Plain);
    add_vehicle(&mut map, "vt1", 20);
    add_vehicle(&mut map, "vt2", 20);

    map.advance_roads().unwrap();

    assert_eq!(state(&map), "(vt1,11),(vt2,11)");
    let report = map.road(&"rt1".into()).unwrap().report(1);
    assert_eq!(report.tag(), "road_report");
    assert_eq!(report.get("id"), Some("rt1"));
    assert_eq!(report.get("time"), Some("1"));
    assert_eq!(report.get("type"), None);
}

#[test]
fn test_broken_vehicle_slows_the_ones_behind() {
    let mut map = single_road_map(100, 20, RoadKind::Plain);
    add_vehicle(&mut map, "vt1", 20);
    map.advance_roads().unwrap();
    add_vehicle(&mut map, "vt2", 15);
    break_down(&mut map, &["vt1"], 2);

    map.advance_roads().unwrap();
    map.advance_roads().unwrap();
    map.advance_roads().unwrap();

    assert_eq!(state(&map), "(vt1,31),(vt2,21)");
}

#[test]
fn test_dirt_road_compounds_slowdowns() {
    let mut map = single_road_map(100, 20, RoadKind::Dirt);
    for i in 1..=5 {
        add_vehicle(&mut map, &format!("vt{}", i), 20);
    }

    map.advance_roads().unwrap();
    assert_eq!(state(&map), "(vt1,20),(vt2,20),(vt3,20),(vt4,20),(vt5,20)");
    assert_eq!(
        map.road(&"rt1".into()).unwrap().report(1).get("type"),
        Some("dirt")
    );

    break_down(&mut map, &["vt5"], 10);
    map.advance_roads().unwrap();
    assert_eq!(state(&map), "(vt1,40),(vt2,40),(vt3,40),(vt4,40),(vt5,20)");

    break_down(&mut map, &["vt1", "vt2", "vt3"], 10);
    map.advance_roads().unwrap();
    assert_eq!(state(&map), "(vt4,45),(vt1,40),(vt2,40),(vt3,40),(vt5,20)");
}

#[test]
fn test_lanes_absorb_broken_vehicles() {
    let mut map = single_road_map(100, 40, RoadKind::Lanes(3));
    for i in 1..=7 {
        add_vehicle(&mut map, &format!("vt{}", i), 20);
    }

    map.advance_roads().unwrap();
    assert_eq!(
        state(&map),
        "(vt1,18),(vt2,18),(vt3,18),(vt4,18),(vt5,18),(vt6,18),(vt7,18)"
    );

    break_down(&mut map, &["vt1", "vt2"], 10);
    map.advance_roads().unwrap();
    assert_eq!(
        state(&map),
        "(vt3,36),(vt4,36),(vt5,36),(vt6,36),(vt7,36),(vt1,18),(vt2,18)"
    );

    break_down(&mut map, &["vt3", "vt4", "vt5"], 10);
    map.advance_roads().unwrap();
    assert_eq!(
        state(&map),
        "(vt6,45),(vt7,45),(vt3,36),(vt4,36),(vt5,36),(vt1,18),(vt2,18)"
    );
}

#[test]
fn test_empty_road_does_nothing() {
    let mut map = single_road_map(100, 20, RoadKind::Plain);
    map.advance_roads().unwrap();
    assert_eq!(state(&map), "");
    assert_eq!(map.road(&"rt1".into()).unwrap().occupancy(), 0);
}

#[test]
fn test_road_describe_lists_vehicles() {
    let mut map = single_road_map(60, 20, RoadKind::Plain);
    add_vehicle(&mut map, "v1", 30);
    add_vehicle(&mut map, "v4", 20);

    let columns = map.road(&"rt1".into()).unwrap().describe();
    let expected = vec![
        ("ID", "rt1".to_string()),
        ("Source", "jt1".to_string()),
        ("Target", "jt2".to_string()),
        ("Length", "60".to_string()),
        ("Max Speed", "20".to_string()),
        ("Vehicles", "[v1,v4]".to_string()),
    ];
    assert_eq!(columns, expected);
}

#[test]
fn test_lane_road_with_huge_limits_advances() {
    let mut map = single_road_map(1_000_000, 100_000, RoadKind::Lanes(100_000));
    add_vehicle(&mut map, "vt1", 100_000);

    map.advance_roads().unwrap();
    assert_eq!(state(&map), "(vt1,100000)");
}

#[test]
fn test_repeated_long_faults_do_not_overflow() {
    let mut map = single_road_map(100, 20, RoadKind::Plain);
    add_vehicle(&mut map, "vt1", 20);

    break_down(&mut map, &["vt1", "vt1", "vt1"], i32::MAX as u32);
    map.advance_roads().unwrap();
    let vehicle = map.vehicle(&"vt1".into()).unwrap();
    assert_eq!(vehicle.faulty(), u32::MAX - 1);
    assert_eq!(vehicle.location(), 0);
}
