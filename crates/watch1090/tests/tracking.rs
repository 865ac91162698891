//! End-to-end tracking scenarios: raw frames in, plane state and
//! events out.

use approx::assert_relative_eq;
use std::sync::Arc;
use watch1090::event::Event;
use watch1090::source::{self, Frame, InputFormat, SourceTag};
use watch1090::track::Registry;

fn avr_tag() -> Arc<SourceTag> {
    Arc::new(SourceTag::new("test", InputFormat::Avr))
}

fn decode_avr(line: &str, t: f64) -> Frame {
    source::decode(line.as_bytes(), t, &avr_tag())
        .unwrap()
        .unwrap()
}

fn apply(registry: &Registry, line: &str, t: f64) -> Vec<Event> {
    let frame = decode_avr(line, t);
    let mut events = Vec::new();
    registry.apply(&frame, |e| events.push(e));
    events
}

#[test]
fn track_airborne_position_from_avr() {
    let registry = Registry::default();

    // odd and even halves of a position, even most recent
    apply(&registry, "*8D40621D58C386435CC412692AD6;", 1.0);
    apply(&registry, "*8D40621D58C382D690C8AC2863A7;", 2.0);

    let plane = registry.get(0x40621d).unwrap();
    assert_eq!(plane.altitude(), Some(38000));
    assert!(plane.has_location());
    assert_relative_eq!(
        plane.latitude.unwrap(),
        52.2572021484375,
        epsilon = 1e-10
    );
    assert_relative_eq!(
        plane.longitude.unwrap(),
        3.9193725585938,
        epsilon = 1e-10
    );
}

#[test]
fn position_events_coalesce_per_frame() {
    let registry = Registry::default();

    let events = apply(&registry, "*8D40621D58C386435CC412692AD6;", 1.0);
    let locations = events
        .iter()
        .filter(|e| matches!(e, Event::PlaneLocation(_)))
        .count();
    assert_eq!(locations, 1);

    // the same frame again changes nothing and emits nothing
    let events = apply(&registry, "*8D40621D58C386435CC412692AD6;", 2.0);
    assert!(events.is_empty());
}

/// History only accrues once a plane holds a valid location and one of
/// the tracked location fields changes afterwards.
#[test]
fn location_history_suppression() {
    let registry = Registry::default();
    let steps: [(&str, u32, usize); 6] = [
        // airborne operational status, twice
        ("*8D7C4A0CF80300030049B8BA7984;", 0x7c4a0c, 0),
        ("*8D7C4A0CF80300030049B8BA7984;", 0x7c4a0c, 0),
        // surface operational status, twice
        ("*8C7C4A0CF9004103834938E42BD4;", 0x7c4a0c, 0),
        ("*8C7C4A0CF9004103834938E42BD4;", 0x7c4a0c, 0),
        // odd half of a position: no location yet
        ("*8D7C75285841B71C2FB174E7746B;", 0x7c7528, 0),
        // even half completes the pair
        ("*8D7C75285841C2C178571CF5234E;", 0x7c7528, 1),
    ];

    for (i, (line, icao, expected_history)) in steps.iter().enumerate() {
        apply(&registry, line, i as f64);
        let plane = registry.get(*icao).unwrap();
        assert_eq!(
            plane.location_history().len(),
            *expected_history,
            "after frame {i}"
        );
    }

    let plane = registry.get(0x7c7528).unwrap();
    assert!(plane.has_location());
}

#[test]
fn frames_with_unknown_icao_do_not_create_planes() {
    let registry = Registry::default();
    let frame = Frame::Sbs1(watch1090::source::Sbs1Frame {
        msg_type: 3,
        icao24: 0,
        generated: None,
        received_at: 1.0,
        callsign: None,
        altitude: Some(1000),
        ground_speed: None,
        track: None,
        latitude: None,
        longitude: None,
        vertical_rate: None,
        squawk: None,
        alert: None,
        emergency: None,
        spi: None,
        on_ground: None,
    });
    registry.apply(&frame, |_| {});
    assert!(registry.is_empty());
}

#[test]
fn mixed_downlink_formats_track_one_aircraft() {
    // a slice of live traffic for one airframe, all formats mixed
    let frames = [
        "*8D7C7DAA99146D0980080D6131A1;",
        "*5D7C7DAACD3CE9;",
        "*0005050870B303;",
        "*8D7C7DAA99146C0980040D2A616F;",
        "*8D7C7DAAF80020060049B06CA244;",
        "*8D7C7DAA582886FA618B21ADB377;",
        "*5D7C7DAACD3CE9;",
        "*8D7C7DAA5828829F322FE81F6DD1;",
        "*8D7C7DAA99146C0980040D2A616F;",
        "*8D7C7DAA99146C0960080D47BBB9;",
        "*8D7C7DAA582886FA778B115D2F89;",
        "*000005084A3646;",
        "*28000A00307264;",
        "*8D7C7DAA99146A09280C0D91E947;",
        "*8D7C7DAA9914690920080DC2621D;",
        "*8D7C7DAA210DA1E0820820472D63;",
        "*5D7C7DAACD3CE9;",
        "*8D7C7DAA582886FB218A9AFB0420;",
        "*8D7C7DAA5828829FF42F5E556B2D;",
        "*8D7C7DAA9914680920080DC168D3;",
        "*000005084A3646;",
        "*8D7C7DAA582886FB318A8FD96CD7;",
        "*8D7C7DAA9914670900080D9576E0;",
    ];
    let registry = Registry::default();
    for (i, line) in frames.iter().enumerate() {
        apply(&registry, line, i as f64 * 0.5);
    }

    assert_eq!(registry.len(), 1);
    let plane = registry.get(0x7c7daa).unwrap();
    assert!(plane.has_location());
    assert!(plane.altitude().is_some());
    assert!(plane.callsign.is_some());
    assert!(plane.has_vertical_rate());
}

#[test]
fn prune_emits_one_terminal_event() {
    let registry = Registry::default();
    apply(&registry, "*8D40621D58C382D690C8AC2863A7;", 0.0);
    assert_eq!(registry.len(), 1);

    let mut events = Vec::new();
    registry.prune(2.0, 1.0, |e| events.push(e));

    assert!(registry.get(0x40621d).is_none());
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::PlaneGone(_)));

    // pruning again finds nothing
    let mut events = Vec::new();
    registry.prune(3.0, 1.0, |e| events.push(e));
    assert!(events.is_empty());
}

#[test]
fn squawk_changes_surface_info_events() {
    let registry = Registry::default();
    // identity reply carrying the squawk
    let events = apply(&registry, "*28000A00307264;", 1.0);
    assert!(events.iter().any(|e| matches!(e, Event::PlaneInfo(_))));

    // same squawk again: silence
    let events = apply(&registry, "*28000A00307264;", 2.0);
    assert!(events
        .iter()
        .all(|e| !matches!(e, Event::PlaneInfo(_))));
}
