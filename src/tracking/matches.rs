//! Match-level rollup and the JSON match report

use crate::histogram::{StatAccumulator, StatSnapshot};

use super::config::{ConfigError, TrackerConfig};
use super::player::{PlayerReport, PlayerTracker};

/// Version of the [`MatchReport`] layout; bump on any field change
pub const REPORT_SCHEMA_VERSION: u32 = 6;

/// Top of the tracking hierarchy for one match
///
/// Holds the server's own frame-time statistics and one [`PlayerTracker`]
/// per player that ever joined, in join order.
#[derive(Clone, Debug)]
pub struct MatchTracker {
    match_id: String,
    config: TrackerConfig,
    started_at: Option<f64>,
    ended_at: Option<f64>,
    frame_time: StatAccumulator,
    fubar_reason: Option<String>,
    players: Vec<PlayerTracker>,
}

impl MatchTracker {
    pub fn new(match_id: impl Into<String>, config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            match_id: match_id.into(),
            frame_time: StatAccumulator::with_shape(config.frame_time_shape),
            config,
            started_at: None,
            ended_at: None,
            fubar_reason: None,
            players: Vec::new(),
        })
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Start recording; a no-op while the match is already in progress
    pub fn start(&mut self, now: f64) {
        if self.is_in_progress() {
            log::debug!("match {} already in progress", self.match_id);
            return;
        }
        self.started_at = Some(now);
        self.ended_at = None;
        for player in &mut self.players {
            player.begin_recording(now);
        }
        log::debug!("match {} started at {}", self.match_id, now);
    }

    /// End the match, recording every connected player's data up to `now`
    ///
    /// Nothing recorded after this reaches the report. A no-op unless the
    /// match is in progress.
    pub fn end(&mut self, now: f64) {
        if !self.is_in_progress() {
            log::warn!("match {} ended without being in progress", self.match_id);
            return;
        }
        for player in &mut self.players {
            player.end_recording(now);
        }
        self.ended_at = Some(now);
        log::debug!(
            "match {} ended at {} with {} players",
            self.match_id,
            now,
            self.players.len()
        );
    }

    pub fn is_in_progress(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }

    /// Seconds between start and end, once both happened
    pub fn duration(&self) -> Option<f64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).max(0.0)),
            _ => None,
        }
    }

    /// Record one server frame time in milliseconds, while in progress
    pub fn record_frame_time(&mut self, frame_time_ms: f64) {
        if self.is_in_progress() && frame_time_ms > 0.0 {
            self.frame_time.add_sample(frame_time_ms);
        }
    }

    pub fn frame_time_stats(&self) -> &StatAccumulator {
        &self.frame_time
    }

    /// Flag the match as broken; the report carries the latest reason
    pub fn mark_fubar(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("match {} marked fubar: {}", self.match_id, reason);
        self.fubar_reason = Some(reason);
    }

    pub fn is_fubar(&self) -> bool {
        self.fubar_reason.is_some()
    }

    pub fn fubar_reason(&self) -> Option<&str> {
        self.fubar_reason.as_deref()
    }

    /// Tracker for `player_id`, created on first use
    pub fn add_player(&mut self, player_id: &str) -> &mut PlayerTracker {
        match self.players.iter().position(|p| p.player_id() == player_id) {
            Some(index) => &mut self.players[index],
            None => {
                log::debug!("tracking new player {} in match {}", player_id, self.match_id);
                let tracker = PlayerTracker::new(player_id, &self.config)
                    .with_recording(self.is_in_progress());
                self.players.push(tracker);
                let last = self.players.len() - 1;
                &mut self.players[last]
            }
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerTracker> {
        self.players.iter().find(|p| p.player_id() == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut PlayerTracker> {
        self.players.iter_mut().find(|p| p.player_id() == player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerTracker> {
        self.players.iter()
    }

    /// Snapshot every accumulator into a report
    pub fn create_report(&self) -> MatchReport {
        let players: Vec<PlayerReport> =
            self.players.iter().map(PlayerTracker::capture_report).collect();
        log::debug!(
            "created report for match {} with {} players",
            self.match_id,
            players.len()
        );
        MatchReport {
            schema_version: REPORT_SCHEMA_VERSION,
            match_id: self.match_id.clone(),
            match_start_time: self.started_at,
            duration: self.duration(),
            match_is_fubar: self.is_fubar(),
            fubar_reason: self.fubar_reason.clone().unwrap_or_default(),
            frame_time_stats: self.frame_time.capture_snapshot(),
            players,
        }
    }
}

/// Telemetry report for one match
///
/// Keys serialize in snake_case, as the reporting backend expects.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchReport {
    pub schema_version: u32,
    pub match_id: String,
    /// Caller clock at start, seconds; absent if the match never started
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub match_start_time: Option<f64>,
    /// Seconds; absent while the match has not ended
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<f64>,
    pub match_is_fubar: bool,
    pub fubar_reason: String,
    pub frame_time_stats: StatSnapshot,
    pub players: Vec<PlayerReport>,
}

impl MatchReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> MatchTracker {
        let config = TrackerConfig {
            update_period_jitter: 0.0,
            ..TrackerConfig::default()
        };
        MatchTracker::new("match-1", config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = TrackerConfig {
            update_to_server_period: -1.0,
            ..TrackerConfig::default()
        };
        assert!(MatchTracker::new("m", config).is_err());
    }

    #[test]
    fn test_lifecycle() {
        let mut tracker = tracker();
        assert!(!tracker.is_in_progress());
        tracker.start(100.0);
        assert!(tracker.is_in_progress());
        assert_eq!(tracker.duration(), None);
        tracker.end(160.0);
        assert!(!tracker.is_in_progress());
        assert_eq!(tracker.duration(), Some(60.0));
    }

    #[test]
    fn test_add_player_is_find_or_create() {
        let mut tracker = tracker();
        tracker.add_player("a").connect(0.0);
        tracker.add_player("b");
        tracker.add_player("a");
        assert_eq!(tracker.players().count(), 2);
        assert!(tracker.player("a").unwrap().is_connected());
        assert!(tracker.player_mut("c").is_none());
    }

    #[test]
    fn test_start_and_end_are_idempotent() {
        let mut tracker = tracker();
        tracker.end(5.0);
        assert_eq!(tracker.duration(), None);

        tracker.start(10.0);
        tracker.start(20.0);
        tracker.end(40.0);
        tracker.end(90.0);
        assert_eq!(tracker.duration(), Some(30.0));
        assert_eq!(tracker.create_report().match_start_time, Some(10.0));
    }

    #[test]
    fn test_frame_times_only_while_in_progress() {
        let mut tracker = tracker();
        tracker.record_frame_time(16.0);
        tracker.start(0.0);
        tracker.record_frame_time(17.0);
        tracker.end(1.0);
        tracker.record_frame_time(18.0);
        assert_eq!(tracker.frame_time_stats().total_samples(), 1);
        assert_eq!(tracker.frame_time_stats().mean(), 17.0);
    }

    #[test]
    fn test_frame_times_filtered() {
        let mut tracker = tracker();
        tracker.start(0.0);
        tracker.record_frame_time(16.0);
        tracker.record_frame_time(0.0);
        tracker.record_frame_time(f64::NAN);
        assert_eq!(tracker.frame_time_stats().total_samples(), 1);
    }

    #[test]
    fn test_end_records_connected_players() {
        let mut tracker = tracker();
        tracker.start(0.0);
        tracker.add_player("a").connect(0.0).record_ping(0.05);
        tracker.end(30.0);

        let player = tracker.player("a").unwrap();
        assert_eq!(player.ping_stats().total_samples(), 1);
        assert!((player.time_connected() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_data_after_end_stays_out_of_report() {
        let mut tracker = tracker();
        tracker.start(0.0);
        tracker.add_player("a").connect(0.0).record_ping(0.05);
        tracker.end(30.0);

        tracker.player_mut("a").unwrap().component_mut().unwrap().record_ping(0.08);
        tracker.record_frame_time(16.0);
        tracker.player_mut("a").unwrap().disconnect(100.0);

        let report = tracker.create_report();
        assert_eq!(report.players[0].ping_stats.sample_count, 1);
        assert_eq!(report.players[0].time_connected, 30.0);
        assert_eq!(report.players[0].disconnections, 1);
        assert_eq!(report.frame_time_stats.sample_count, 0);
    }

    #[test]
    fn test_players_joining_before_start_record_from_start() {
        let mut tracker = tracker();
        tracker.add_player("early").connect(0.0).record_ping(0.05);
        assert!(!tracker.player("early").unwrap().is_recording());

        tracker.start(10.0);
        assert!(tracker.player("early").unwrap().is_recording());
        tracker.add_player("late");
        assert!(tracker.player("late").unwrap().is_recording());

        tracker.end(25.0);
        assert!(!tracker.player("early").unwrap().is_recording());
        let early = tracker.player("early").unwrap();
        assert!((early.time_connected() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_mark_fubar() {
        let mut tracker = tracker();
        assert!(!tracker.is_fubar());
        tracker.mark_fubar("server crashed");
        assert_eq!(tracker.fubar_reason(), Some("server crashed"));

        let report = tracker.create_report();
        assert!(report.match_is_fubar);
        assert_eq!(report.fubar_reason, "server crashed");
    }

    #[test]
    fn test_report_json() {
        let mut tracker = tracker();
        tracker.start(0.0);
        tracker.record_frame_time(8.0);
        tracker.add_player("a").connect(1.0).record_ping(0.03);
        tracker.end(11.0);

        let report = tracker.create_report();
        assert_eq!(report.players.len(), 1);
        assert_eq!(report.frame_time_stats.sample_count, 1);

        let value = report.to_json_value().unwrap();
        assert_eq!(value["schema_version"], REPORT_SCHEMA_VERSION);
        assert_eq!(value["match_id"], "match-1");
        assert_eq!(value["match_start_time"], 0.0);
        assert_eq!(value["duration"], 11.0);
        assert_eq!(value["match_is_fubar"], false);
        assert_eq!(value["players"][0]["player_id"], "a");
        assert_eq!(value["players"][0]["ping_stats"]["sample_count"], 1);
        assert!(value["frame_time_stats"]["standard_deviation"].is_number());

        let back: MatchReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(back.match_id, report.match_id);
        assert_eq!(back.players[0].connections, 1);
        assert_eq!(back.players[0].time_connected, 10.0);
    }

    #[test]
    fn test_report_with_extreme_samples_roundtrips() {
        let mut tracker = tracker();
        tracker.start(0.0);
        tracker.record_frame_time(f64::INFINITY);
        tracker.record_frame_time(1e300);
        tracker.end(1.0);

        let report = tracker.create_report();
        assert_eq!(report.frame_time_stats.maximum, f32::MAX);
        let back: MatchReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(back.frame_time_stats.maximum, f32::MAX);
    }

    #[test]
    fn test_report_before_end_omits_duration() {
        let mut tracker = tracker();
        tracker.start(0.0);
        let value = tracker.create_report().to_json_value().unwrap();
        assert!(value.get("duration").is_none());
    }
}
