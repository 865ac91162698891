use crate::decode::adsb::Me;
use crate::decode::bds::bds08::WakeVortex;
use crate::decode::bds::bds09::VelocitySubType;
use crate::decode::cpr::{self, CprCoordinates, CprError, CprFormat, Position};
use crate::decode::{Df, FlightStatus, Icao, ModeS};
use crate::event::{
    Event, InfoChange, PlaneInfoEvent, PlaneLocationEvent,
};
use crate::source::{Frame, Sbs1Frame};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

/// Entries kept in a plane's location history
pub const HISTORY_CAP: usize = 64;

/// A CPR half older than this cannot be paired for a global decode
pub const CPR_PAIR_MAX_AGE_S: f64 = 10.0;

/// One half of an odd/even CPR pair, as received
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CprHalf {
    pub coordinates: CprCoordinates,
    pub received_at: f64,
    pub surface: bool,
}

/// The two most recent half-positions of an aircraft
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CprPair {
    pub even: Option<CprHalf>,
    pub odd: Option<CprHalf>,
}

/// A committed position at some point of the plane's life
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<i32>,
    pub heading: Option<f64>,
    pub on_ground: Option<bool>,
    pub t: f64,
}

/// Mutable per-aircraft state, owned by one registry shard. Every
/// attribute is optional until a frame sets it; `Option::is_some`
/// doubles as the ever-set flag.
#[derive(Debug, Clone)]
pub struct Plane {
    icao: Icao,

    pub callsign: Option<String>,
    pub category: Option<WakeVortex>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_baro: Option<i32>,
    pub altitude_gnss: Option<i32>,
    pub on_ground: Option<bool>,

    pub heading: Option<f64>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub velocity: Option<f64>,
    pub vertical_rate: Option<i32>,

    pub squawk: Option<u16>,
    pub alert: Option<bool>,
    pub spi: Option<bool>,
    pub flight_status: Option<String>,

    pub last_seen: f64,
    pub cpr: CprPair,
    location_history: VecDeque<LocationSnapshot>,

    // Dirty flags of the mutation batch in progress
    location_changed: bool,
    motion_changed: bool,
    info_changes: Vec<InfoChange>,
}

impl Plane {
    pub fn new(icao: Icao, now: f64) -> Self {
        Plane {
            icao,
            callsign: None,
            category: None,
            latitude: None,
            longitude: None,
            altitude_baro: None,
            altitude_gnss: None,
            on_ground: None,
            heading: None,
            ground_speed: None,
            track: None,
            velocity: None,
            vertical_rate: None,
            squawk: None,
            alert: None,
            spi: None,
            flight_status: None,
            last_seen: now,
            cpr: CprPair::default(),
            location_history: VecDeque::new(),
            location_changed: false,
            motion_changed: false,
            info_changes: Vec::new(),
        }
    }

    /// The immutable identity of this plane
    pub fn icao24(&self) -> Icao {
        self.icao
    }

    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn has_heading(&self) -> bool {
        self.heading.is_some()
    }

    pub fn has_velocity(&self) -> bool {
        self.velocity.is_some()
    }

    pub fn has_vertical_rate(&self) -> bool {
        self.vertical_rate.is_some()
    }

    pub fn has_on_ground(&self) -> bool {
        self.on_ground.is_some()
    }

    pub fn altitude(&self) -> Option<i32> {
        self.altitude_baro.or(self.altitude_gnss)
    }

    pub fn location_history(&self) -> &VecDeque<LocationSnapshot> {
        &self.location_history
    }

    // -- field setters; each returns whether the value changed --

    pub fn set_identity(
        &mut self,
        callsign: &str,
        category: WakeVortex,
    ) -> bool {
        let mut changed = false;
        if self.callsign.as_deref() != Some(callsign) {
            self.callsign = Some(callsign.to_string());
            self.info_changes
                .push(InfoChange::Callsign(callsign.to_string()));
            changed = true;
        }
        if self.category != Some(category) {
            self.category = Some(category);
            self.info_changes
                .push(InfoChange::Category(category.to_string()));
            changed = true;
        }
        changed
    }

    pub fn set_altitude_baro(&mut self, ft: i32) -> bool {
        if self.altitude_baro == Some(ft) {
            return false;
        }
        self.altitude_baro = Some(ft);
        self.location_changed = true;
        true
    }

    pub fn set_altitude_gnss(&mut self, ft: i32) -> bool {
        if self.altitude_gnss == Some(ft) {
            return false;
        }
        self.altitude_gnss = Some(ft);
        self.motion_changed = true;
        true
    }

    pub fn set_squawk(&mut self, squawk: u16) -> bool {
        if self.squawk == Some(squawk) {
            return false;
        }
        self.squawk = Some(squawk);
        self.info_changes.push(InfoChange::Squawk(squawk));
        if let Some(status) = squawk_special(squawk) {
            self.set_flight_status(status);
        }
        true
    }

    pub fn set_flight_status(&mut self, status: &str) -> bool {
        if self.flight_status.as_deref() == Some(status) {
            return false;
        }
        self.flight_status = Some(status.to_string());
        self.info_changes
            .push(InfoChange::FlightStatus(status.to_string()));
        true
    }

    pub fn set_alert_spi(&mut self, alert: bool, spi: bool) -> bool {
        let mut changed = false;
        if self.alert != Some(alert) {
            self.alert = Some(alert);
            self.info_changes.push(InfoChange::Alert(alert));
            changed = true;
        }
        if self.spi != Some(spi) {
            self.spi = Some(spi);
            self.info_changes.push(InfoChange::Spi(spi));
            changed = true;
        }
        changed
    }

    pub fn set_on_ground(&mut self, on_ground: bool) -> bool {
        if self.on_ground == Some(on_ground) {
            return false;
        }
        self.on_ground = Some(on_ground);
        self.location_changed = true;
        true
    }

    pub fn set_heading(&mut self, degrees: f64) -> bool {
        if self.heading == Some(degrees) {
            return false;
        }
        self.heading = Some(degrees);
        self.location_changed = true;
        true
    }

    pub fn set_track(&mut self, degrees: f64) -> bool {
        if self.track == Some(degrees) {
            return false;
        }
        self.track = Some(degrees);
        self.motion_changed = true;
        true
    }

    pub fn set_velocity(&mut self, knots: f64) -> bool {
        if self.velocity == Some(knots) {
            return false;
        }
        self.velocity = Some(knots);
        self.motion_changed = true;
        true
    }

    pub fn set_ground_speed(&mut self, knots: f64) -> bool {
        if self.ground_speed == Some(knots) {
            return false;
        }
        self.ground_speed = Some(knots);
        self.motion_changed = true;
        true
    }

    pub fn set_vertical_rate(&mut self, ft_per_min: i32) -> bool {
        if self.vertical_rate == Some(ft_per_min) {
            return false;
        }
        self.vertical_rate = Some(ft_per_min);
        self.motion_changed = true;
        true
    }

    /// Commit a resolved position.
    pub fn add_lat_lon(&mut self, lat: f64, lon: f64, t: f64) -> bool {
        let mut changed = false;
        if self.latitude != Some(lat) {
            self.latitude = Some(lat);
            changed = true;
        }
        if self.longitude != Some(lon) {
            self.longitude = Some(lon);
            changed = true;
        }
        if changed {
            self.location_changed = true;
        }
        self.last_seen = t;
        changed
    }

    /// Store the even half of the CPR pair and try to resolve a
    /// position.
    pub fn set_cpr_even_location(
        &mut self,
        coordinates: CprCoordinates,
        t: f64,
        surface: bool,
        reference: Option<Position>,
    ) -> Result<Position, CprError> {
        self.cpr.even = Some(CprHalf {
            coordinates,
            received_at: t,
            surface,
        });
        self.try_resolve(CprFormat::Even, t, reference)
    }

    /// Store the odd half of the CPR pair and try to resolve a
    /// position.
    pub fn set_cpr_odd_location(
        &mut self,
        coordinates: CprCoordinates,
        t: f64,
        surface: bool,
        reference: Option<Position>,
    ) -> Result<Position, CprError> {
        self.cpr.odd = Some(CprHalf {
            coordinates,
            received_at: t,
            surface,
        });
        self.try_resolve(CprFormat::Odd, t, reference)
    }

    fn try_resolve(
        &mut self,
        latest: CprFormat,
        t: f64,
        reference: Option<Position>,
    ) -> Result<Position, CprError> {
        let position = self.resolve_position(latest, reference);
        match position {
            Ok(position) => {
                self.add_lat_lon(position.latitude, position.longitude, t);
            }
            // half a pair is the normal case, not worth a log line
            Err(CprError::MissingParity) => {}
            Err(reason) => {
                info!(icao = %self.icao, %reason, "position unresolved");
            }
        }
        position
    }

    fn resolve_position(
        &mut self,
        latest: CprFormat,
        reference: Option<Position>,
    ) -> Result<Position, CprError> {
        let newest = match latest {
            CprFormat::Even => self.cpr.even,
            CprFormat::Odd => self.cpr.odd,
        }
        .ok_or(CprError::MissingParity)?;

        let global = self.global_decode(latest, &newest, reference);
        match global {
            Ok(position) => {
                if let Some(reference) = reference {
                    cpr::check_global_range(&position, &reference)?;
                }
                Ok(position)
            }
            Err(CprError::OutOfRange) => Err(CprError::OutOfRange),
            // A single frame can still be resolved against a nearby
            // reference point
            Err(reason) => {
                let Some(reference) = reference else {
                    return Err(reason);
                };
                if newest.surface {
                    cpr::local_surface(
                        &newest.coordinates,
                        latest,
                        &reference,
                    )
                } else {
                    cpr::local_airborne(
                        &newest.coordinates,
                        latest,
                        &reference,
                    )
                }
            }
        }
    }

    fn global_decode(
        &mut self,
        latest: CprFormat,
        newest: &CprHalf,
        reference: Option<Position>,
    ) -> Result<Position, CprError> {
        let other = match latest {
            CprFormat::Even => &mut self.cpr.odd,
            CprFormat::Odd => &mut self.cpr.even,
        };
        let Some(paired) = *other else {
            return Err(CprError::MissingParity);
        };

        if (newest.received_at - paired.received_at).abs() > CPR_PAIR_MAX_AGE_S
        {
            // The stored half can never pair up again
            *other = None;
            return Err(CprError::Stale);
        }
        if paired.surface != newest.surface {
            return Err(CprError::MissingParity);
        }

        let (even, odd) = match latest {
            CprFormat::Even => (newest, &paired),
            CprFormat::Odd => (&paired, newest),
        };

        if newest.surface {
            // The quarter-sized surface grid needs a reference: the
            // operator's, or where the plane was last seen
            let near = reference.or_else(|| self.position())
                .ok_or(CprError::NoReference)?;
            cpr::global_surface(
                &even.coordinates,
                &odd.coordinates,
                latest,
                &near,
            )
        } else {
            cpr::global_airborne(&even.coordinates, &odd.coordinates, latest)
        }
    }

    fn position(&self) -> Option<Position> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Position {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// Apply one decoded frame, close the mutation batch and return
    /// the events it produced.
    pub fn apply(&mut self, frame: &Frame) -> Vec<Event> {
        match frame {
            Frame::ModeS { msg, raw } => {
                self.apply_modes(msg, raw.received_at, raw.tag.reference)
            }
            Frame::Sbs1(sbs1) => self.apply_sbs1(sbs1),
        }
        self.finish_batch(frame.received_at())
    }

    fn apply_modes(
        &mut self,
        msg: &ModeS,
        t: f64,
        reference: Option<Position>,
    ) {
        match &msg.df {
            Df::ShortAirAir { vs, altitude, .. }
            | Df::LongAirAir { vs, altitude, .. } => {
                self.set_on_ground(*vs == 1);
                if altitude.0 > 0 {
                    self.set_altitude_baro(i32::from(altitude.0));
                }
            }
            Df::AltitudeReply { fs, altitude, .. }
            | Df::CommBAltitudeReply { fs, altitude, .. } => {
                self.apply_flight_status(fs);
                if altitude.0 > 0 {
                    self.set_altitude_baro(i32::from(altitude.0));
                }
            }
            Df::IdentityReply { fs, id, .. }
            | Df::CommBIdentityReply { fs, id, .. } => {
                self.apply_flight_status(fs);
                self.set_squawk(id.0);
            }
            Df::AllCallReply { capability, .. } => {
                use crate::decode::Capability;
                match capability {
                    Capability::Ground => {
                        self.set_on_ground(true);
                    }
                    Capability::Airborne => {
                        self.set_on_ground(false);
                    }
                    _ => {}
                }
            }
            Df::ExtendedSquitter(adsb) => {
                self.apply_me(&adsb.message, t, reference);
            }
            Df::ExtendedSquitterTisB { cf, .. } => {
                self.apply_me(&cf.me, t, reference);
            }
            Df::ExtendedSquitterMilitary { .. } | Df::CommDExtended { .. } => {}
        }
        self.last_seen = t;
    }

    fn apply_me(&mut self, me: &Me, t: f64, reference: Option<Position>) {
        match me {
            Me::Identification(id) => {
                self.set_identity(&id.callsign, id.category);
            }
            Me::SurfacePosition(surface) => {
                self.set_on_ground(true);
                if let Some(speed) = surface.groundspeed {
                    self.set_ground_speed(speed);
                }
                if let Some(track) = surface.track {
                    self.set_track(track);
                }
                let coordinates = CprCoordinates {
                    lat_cpr: surface.lat_cpr,
                    lon_cpr: surface.lon_cpr,
                };
                let _ = match surface.parity {
                    CprFormat::Even => self.set_cpr_even_location(
                        coordinates,
                        t,
                        true,
                        reference,
                    ),
                    CprFormat::Odd => self.set_cpr_odd_location(
                        coordinates,
                        t,
                        true,
                        reference,
                    ),
                };
            }
            Me::AirbornePosition(airborne) => {
                use crate::decode::bds::bds05::AltitudeSource;
                self.set_on_ground(false);
                if let Some(alt) = airborne.alt {
                    match airborne.source {
                        AltitudeSource::Barometric => {
                            self.set_altitude_baro(i32::from(alt));
                        }
                        AltitudeSource::Gnss => {
                            self.set_altitude_gnss(i32::from(alt));
                        }
                    }
                }
                let coordinates = CprCoordinates {
                    lat_cpr: airborne.lat_cpr,
                    lon_cpr: airborne.lon_cpr,
                };
                let _ = match airborne.parity {
                    CprFormat::Even => self.set_cpr_even_location(
                        coordinates,
                        t,
                        false,
                        reference,
                    ),
                    CprFormat::Odd => self.set_cpr_odd_location(
                        coordinates,
                        t,
                        false,
                        reference,
                    ),
                };
            }
            Me::AirborneVelocity(velocity) => {
                match &velocity.velocity {
                    VelocitySubType::GroundSpeed(gs) => {
                        self.set_ground_speed(gs.groundspeed);
                        self.set_track(gs.track);
                    }
                    VelocitySubType::Airspeed(airspeed) => {
                        if let Some(speed) = airspeed.airspeed {
                            self.set_velocity(f64::from(speed));
                        }
                        if let Some(heading) = airspeed.heading {
                            self.set_heading(heading);
                        }
                    }
                    _ => {}
                }
                if let Some(rate) = velocity.vertical_rate {
                    self.set_vertical_rate(i32::from(rate));
                }
            }
            Me::AircraftStatus(status) => {
                self.set_squawk(status.squawk.0);
                if status.emergency_state.is_emergency() {
                    let state = status.emergency_state.to_string();
                    self.set_flight_status(&state);
                }
            }
            Me::OperationalStatus(status) => {
                if let Some(on_ground) = status.on_ground() {
                    self.set_on_ground(on_ground);
                }
            }
            Me::TargetState(_)
            | Me::NoPosition { .. }
            | Me::Reserved { .. }
            | Me::OperationalCoordination { .. } => {}
        }
    }

    fn apply_flight_status(&mut self, fs: &FlightStatus) {
        if let Some(on_ground) = fs.on_ground() {
            self.set_on_ground(on_ground);
        }
        self.set_alert_spi(fs.alert(), fs.spi());
    }

    fn apply_sbs1(&mut self, sbs1: &Sbs1Frame) {
        if let Some(callsign) = &sbs1.callsign {
            if self.callsign.as_deref() != Some(callsign.as_str()) {
                self.callsign = Some(callsign.clone());
                self.info_changes
                    .push(InfoChange::Callsign(callsign.clone()));
            }
        }
        if let Some(altitude) = sbs1.altitude {
            self.set_altitude_baro(altitude);
        }
        if let Some(speed) = sbs1.ground_speed {
            self.set_ground_speed(speed);
        }
        if let Some(track) = sbs1.track {
            self.set_track(track);
        }
        if let Some(rate) = sbs1.vertical_rate {
            self.set_vertical_rate(rate);
        }
        if let Some(squawk) = sbs1.squawk {
            self.set_squawk(squawk);
        }
        if let (Some(alert), Some(spi)) = (sbs1.alert, sbs1.spi) {
            self.set_alert_spi(alert, spi);
        }
        if let Some(on_ground) = sbs1.on_ground {
            self.set_on_ground(on_ground);
        }
        if let (Some(lat), Some(lon)) = (sbs1.latitude, sbs1.longitude) {
            self.add_lat_lon(lat, lon, sbs1.received_at);
        }
        self.last_seen = sbs1.received_at;
    }

    /// Close the current mutation batch: append a history snapshot if
    /// the plane holds a valid location and any location field just
    /// changed, then drain the collected changes into events.
    pub fn finish_batch(&mut self, t: f64) -> Vec<Event> {
        let mut events = Vec::new();

        if self.location_changed && self.has_location() {
            if self.location_history.len() == HISTORY_CAP {
                self.location_history.pop_front();
            }
            self.location_history.push_back(LocationSnapshot {
                latitude: self.latitude.unwrap_or_default(),
                longitude: self.longitude.unwrap_or_default(),
                altitude: self.altitude(),
                heading: self.heading.or(self.track),
                on_ground: self.on_ground,
                t,
            });
        }

        if self.location_changed || self.motion_changed {
            events.push(Event::PlaneLocation(self.location_event(t)));
        }
        for change in self.info_changes.drain(..) {
            events.push(Event::PlaneInfo(PlaneInfoEvent {
                icao: self.icao,
                t,
                change,
            }));
        }
        self.location_changed = false;
        self.motion_changed = false;

        events
    }

    fn location_event(&self, t: f64) -> PlaneLocationEvent {
        PlaneLocationEvent {
            icao: self.icao,
            callsign: self.callsign.clone(),
            lat: self.latitude,
            lon: self.longitude,
            altitude: self.altitude(),
            heading: self.heading.or(self.track),
            ground_speed: self.ground_speed.or(self.velocity),
            vertical_rate: self.vertical_rate,
            on_ground: self.on_ground,
            squawk: self.squawk,
            t,
        }
    }
}

/// The well-known emergency squawks
fn squawk_special(squawk: u16) -> Option<&'static str> {
    match squawk {
        0x7500 => Some("unlawful interference (7500)"),
        0x7600 => Some("radio failure (7600)"),
        0x7700 => Some("general emergency (7700)"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane() -> Plane {
        Plane::new(Icao(0x010101), 0.0)
    }

    #[test]
    fn setters_report_change_exactly_once() {
        let mut p = plane();
        assert!(p.set_heading(99.0));
        assert!(!p.set_heading(99.0));
        assert!(p.has_heading());

        assert!(p.set_velocity(99.0));
        assert!(!p.set_velocity(99.0));
        assert!(p.has_velocity());

        assert!(p.set_vertical_rate(99));
        assert!(!p.set_vertical_rate(99));
        assert!(p.has_vertical_rate());

        assert!(p.set_squawk(0x3601));
        assert!(!p.set_squawk(0x3601));
        assert!(p.set_squawk(0x3602));
    }

    #[test]
    fn first_location_commit_snapshots_history() {
        let mut p = plane();
        assert!(!p.has_location());
        assert!(p.add_lat_lon(0.01, 0.02, 1.0));
        let _ = p.finish_batch(1.0);
        assert!(p.has_location());
        assert_eq!(p.location_history().len(), 1);
    }

    #[test]
    fn repeat_updates_do_not_snapshot() {
        let mut p = plane();
        p.add_lat_lon(0.01, 0.02, 1.0);
        let _ = p.finish_batch(1.0);
        p.add_lat_lon(0.01, 0.02, 2.0);
        let _ = p.finish_batch(2.0);
        assert_eq!(p.location_history().len(), 1);
    }

    #[test]
    fn identification_does_not_snapshot() {
        let mut p = plane();
        p.add_lat_lon(0.01, 0.02, 1.0);
        let _ = p.finish_batch(1.0);
        p.set_identity("QFA421", WakeVortex::Medium2);
        let _ = p.finish_batch(2.0);
        assert_eq!(p.location_history().len(), 1);
    }

    #[test]
    fn changes_without_location_do_not_snapshot() {
        let mut p = plane();
        p.set_altitude_baro(12000);
        let _ = p.finish_batch(1.0);
        p.set_on_ground(true);
        let _ = p.finish_batch(2.0);
        assert_eq!(p.location_history().len(), 0);
    }

    #[test]
    fn history_is_bounded() {
        let mut p = plane();
        for i in 0..(HISTORY_CAP + 40) {
            p.add_lat_lon(f64::from(i as u32) * 0.01, 0.02, i as f64);
            let _ = p.finish_batch(i as f64);
        }
        assert_eq!(p.location_history().len(), HISTORY_CAP);
    }

    #[test]
    fn emergency_squawk_sets_flight_status() {
        let mut p = plane();
        p.set_squawk(0x7700);
        assert_eq!(
            p.flight_status.as_deref(),
            Some("general emergency (7700)")
        );
        let events = p.finish_batch(1.0);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::PlaneInfo(PlaneInfoEvent {
                change: InfoChange::FlightStatus(_),
                ..
            })
        )));
    }

    #[test]
    fn global_cpr_pair_commits_position() {
        let mut p = plane();
        let odd = CprCoordinates {
            lat_cpr: 61720,
            lon_cpr: 9192,
        };
        let even = CprCoordinates {
            lat_cpr: 80536,
            lon_cpr: 9432,
        };
        assert_eq!(
            p.set_cpr_odd_location(odd, 1.0, false, None),
            Err(CprError::MissingParity)
        );
        let pos = p.set_cpr_even_location(even, 2.0, false, None).unwrap();
        assert_eq!(format!("{:+0.6}", pos.latitude), "+51.686646");
        assert_eq!(format!("{:+0.6}", pos.longitude), "+0.700156");
        assert!(p.has_location());
    }

    #[test]
    fn stale_pair_is_discarded() {
        let mut p = plane();
        let odd = CprCoordinates {
            lat_cpr: 61720,
            lon_cpr: 9192,
        };
        let even = CprCoordinates {
            lat_cpr: 80536,
            lon_cpr: 9432,
        };
        let _ = p.set_cpr_odd_location(odd, 1.0, false, None);
        assert_eq!(
            p.set_cpr_even_location(even, 20.0, false, None),
            Err(CprError::Stale)
        );
        // the stale odd half is gone, a fresh odd half pairs again
        assert!(p.cpr.odd.is_none());
        let result = p.set_cpr_odd_location(odd, 21.0, false, None);
        assert!(result.is_ok());
    }
}
