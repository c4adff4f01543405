//! Per-player rollup across connections

use crate::histogram::{StatAccumulator, StatSnapshot};

use super::component::{ComponentTotals, PacketTotals, PlayerComponent};
use super::config::TrackerConfig;

/// Lifetime statistics of one player in a match
///
/// Owns the [`PlayerComponent`] of the player's current connection. When
/// the connection ends, or the match ends, the component's totals are
/// drained into the tracker's own accumulators.
///
/// A tracker only records while its match is in progress. A standalone
/// tracker records from the start; one owned by a [`MatchTracker`] follows
/// the match lifecycle.
///
/// [`MatchTracker`]: super::MatchTracker
#[derive(Clone, Debug)]
pub struct PlayerTracker {
    player_id: String,
    config: TrackerConfig,
    connections: u32,
    disconnections: u32,
    connection_timeouts: u32,
    time_connected: f64,
    last_connected_at: Option<f64>,
    ping: StatAccumulator,
    frame_time: StatAccumulator,
    hitches: u32,
    server_corrections: u32,
    /// Closed connections only
    packets: PacketTotals,
    /// Last recorded reading of the live connection
    connection_packets: PacketTotals,
    recording: bool,
    component: Option<PlayerComponent>,
}

impl PlayerTracker {
    pub fn new(player_id: impl Into<String>, config: &TrackerConfig) -> Self {
        Self {
            player_id: player_id.into(),
            config: config.clone(),
            connections: 0,
            disconnections: 0,
            connection_timeouts: 0,
            time_connected: 0.0,
            last_connected_at: None,
            ping: StatAccumulator::with_shape(config.ping_shape),
            frame_time: StatAccumulator::with_shape(config.frame_time_shape),
            hitches: 0,
            server_corrections: 0,
            packets: PacketTotals::default(),
            connection_packets: PacketTotals::default(),
            recording: true,
            component: None,
        }
    }

    pub(super) fn with_recording(mut self, recording: bool) -> Self {
        self.recording = recording;
        self
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Start a connection at time `now` (seconds) and spawn its component
    ///
    /// An existing connection is closed first and counted as a
    /// disconnect.
    pub fn connect(&mut self, now: f64) -> &mut PlayerComponent {
        if self.is_connected() {
            self.disconnect(now);
        }
        self.connections += 1;
        self.last_connected_at = Some(now);
        log::debug!(
            "player {} connected (connection #{})",
            self.player_id,
            self.connections
        );
        self.component.insert(PlayerComponent::new(&self.config))
    }

    /// End the current connection, folding its component into the rollup
    pub fn disconnect(&mut self, now: f64) {
        if !self.is_connected() {
            return;
        }
        self.disconnections += 1;
        self.record_active_data(now);
        self.packets += core::mem::take(&mut self.connection_packets);
        self.component = None;
        self.last_connected_at = None;
        log::debug!("player {} disconnected", self.player_id);
    }

    pub fn handle_timeout(&mut self) {
        self.connection_timeouts += 1;
    }

    /// Bring connected time and component data up to `now`
    ///
    /// The component is drained, so calling this repeatedly never counts a
    /// sample twice. Does nothing while not recording.
    pub fn record_active_data(&mut self, now: f64) {
        if !self.recording {
            return;
        }
        self.force_record_active_data(now);
    }

    fn force_record_active_data(&mut self, now: f64) {
        if let Some(last) = self.last_connected_at {
            self.time_connected += (now - last).max(0.0);
            self.last_connected_at = Some(now);
        }
        if let Some(component) = self.component.as_mut() {
            let totals = component.take_totals();
            // cumulative reading; replaces the previous one
            self.connection_packets = totals.packets;
            self.fold_samples(totals);
        }
    }

    /// Match started: connected time counts from `now`
    pub(super) fn begin_recording(&mut self, now: f64) {
        self.recording = true;
        if let Some(last) = self.last_connected_at.as_mut() {
            *last = last.max(now);
        }
    }

    /// Match ended: record everything up to `now`, then stop recording
    pub(super) fn end_recording(&mut self, now: f64) {
        self.force_record_active_data(now);
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Fold the totals of a closed connection into this player's rollup
    pub fn record_component_totals(&mut self, totals: ComponentTotals) {
        self.packets += totals.packets;
        self.fold_samples(totals);
    }

    fn fold_samples(&mut self, totals: ComponentTotals) {
        self.ping += totals.ping;
        self.frame_time += totals.frame_time;
        self.hitches += totals.hitches;
        self.server_corrections += totals.server_corrections;
    }

    pub fn is_connected(&self) -> bool {
        self.component.is_some()
    }

    pub fn component(&self) -> Option<&PlayerComponent> {
        self.component.as_ref()
    }

    pub fn component_mut(&mut self) -> Option<&mut PlayerComponent> {
        self.component.as_mut()
    }

    pub fn connections(&self) -> u32 {
        self.connections
    }

    pub fn disconnections(&self) -> u32 {
        self.disconnections
    }

    pub fn connection_timeouts(&self) -> u32 {
        self.connection_timeouts
    }

    /// Seconds connected, as of the last recorded data
    pub fn time_connected(&self) -> f64 {
        self.time_connected
    }

    /// Rolled-up ping, not including the live component
    pub fn ping_stats(&self) -> &StatAccumulator {
        &self.ping
    }

    /// Rolled-up frame times, not including the live component
    pub fn frame_time_stats(&self) -> &StatAccumulator {
        &self.frame_time
    }

    /// Report of everything recorded for this player, including data still
    /// held by a live component while recording
    pub fn capture_report(&self) -> PlayerReport {
        let mut ping = self.ping.clone();
        let mut frame_time = self.frame_time.clone();
        let mut hitches = self.hitches;
        let mut server_corrections = self.server_corrections;
        let mut packets = self.packets;

        let live = self.component.as_ref().filter(|_| self.recording);
        match live.map(PlayerComponent::totals) {
            Some(live) => {
                ping += live.ping;
                frame_time += live.frame_time;
                hitches += live.hitches;
                server_corrections += live.server_corrections;
                packets += live.packets;
            }
            None => packets += self.connection_packets,
        }

        PlayerReport {
            player_id: self.player_id.clone(),
            time_connected: self.time_connected,
            connections: self.connections,
            disconnections: self.disconnections,
            connection_timeouts: self.connection_timeouts,
            packets,
            ping_stats: ping.capture_snapshot(),
            frame_time_stats: frame_time.capture_snapshot(),
            num_hitches_detected: hitches,
            num_server_corrections: server_corrections,
        }
    }
}

/// Report entry for one player
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlayerReport {
    pub player_id: String,
    pub time_connected: f64,
    pub connections: u32,
    pub disconnections: u32,
    pub connection_timeouts: u32,
    #[serde(flatten)]
    pub packets: PacketTotals,
    pub ping_stats: StatSnapshot,
    pub frame_time_stats: StatSnapshot,
    pub num_hitches_detected: u32,
    pub num_server_corrections: u32,
}
