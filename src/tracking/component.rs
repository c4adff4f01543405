//! Per-player sample producer
//!
//! A [`PlayerComponent`] lives as long as one connection of one player. The
//! client side feeds it frame times and periodically publishes the period
//! shard as a [`FrameTimeUpdate`]; the server side feeds it ping readings,
//! movement corrections and packet totals, and folds received updates in.

use crate::histogram::wire::WireReader;
use crate::histogram::{HistogramShape, StatAccumulator};
use crate::traits::{DecodeError, EncodeError, MergeError, Sketch};
use core::ops::AddAssign;

use super::config::TrackerConfig;

/// Packet counters read from a connection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PacketTotals {
    pub in_total_packets: u32,
    pub in_total_packets_lost: u32,
    pub out_total_packets: u32,
    pub out_total_packets_lost: u32,
}

impl AddAssign for PacketTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.in_total_packets += rhs.in_total_packets;
        self.in_total_packets_lost += rhs.in_total_packets_lost;
        self.out_total_packets += rhs.out_total_packets;
        self.out_total_packets_lost += rhs.out_total_packets_lost;
    }
}

/// Frame-time shard sent from a client to the server once per period
#[derive(Clone, Debug, PartialEq)]
pub struct FrameTimeUpdate {
    pub frame_time: StatAccumulator,
    pub hitches: u32,
}

impl FrameTimeUpdate {
    /// Sparse accumulator record followed by an `i32` hitch count
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let hitches = i32::try_from(self.hitches)
            .map_err(|_| EncodeError::CountOverflow { count: self.hitches })?;
        let mut buf = Vec::with_capacity(self.frame_time.encoded_len() + 4);
        self.frame_time.encode_sparse_into(&mut buf)?;
        buf.extend_from_slice(&hitches.to_le_bytes());
        Ok(buf)
    }

    pub fn decode(shape: HistogramShape, bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = WireReader::new(bytes);
        let frame_time = StatAccumulator::read_sparse(shape, &mut reader)?;
        let hitches = reader.count("hitch count")?;
        reader.finish()?;
        Ok(Self {
            frame_time,
            hitches,
        })
    }
}

/// Everything a component accumulated, handed to its player tracker
///
/// `packets` is the connection's latest cumulative reading, not a delta.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentTotals {
    pub ping: StatAccumulator,
    pub frame_time: StatAccumulator,
    pub hitches: u32,
    pub server_corrections: u32,
    pub packets: PacketTotals,
}

/// Simple xorshift64 PRNG for the publish jitter
#[derive(Clone, Debug)]
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x853c49e6748fea9b } else { seed },
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in `[-1, 1)`
    fn next_signed_unit(&mut self) -> f32 {
        // top 24 bits give every representable step of an f32 mantissa
        let unit = (self.next() >> 40) as f32 / (1u32 << 24) as f32;
        unit * 2.0 - 1.0
    }
}

/// Sample producer for one connected player
///
/// # Example
///
/// ```
/// use rollupstats::tracking::{PlayerComponent, TrackerConfig};
///
/// let config = TrackerConfig { update_period_jitter: 0.0, ..TrackerConfig::default() };
/// let mut client = PlayerComponent::new(&config);
/// let mut server = PlayerComponent::new(&config);
///
/// for _ in 0..1200 {
///     client.client_frame(16.6);
///     if let Some(update) = client.tick(1.0 / 60.0) {
///         let bytes = update.encode().unwrap();
///         server.receive_frame_time_update(&bytes).unwrap();
///     }
/// }
///
/// // flush the open period
/// let last = client.publish();
/// server.receive_frame_time_update(&last.encode().unwrap()).unwrap();
///
/// assert_eq!(server.frame_time_stats().total_samples(), 1200);
/// assert_eq!(server.frame_time_stats(), client.frame_time_stats());
/// ```
#[derive(Clone, Debug)]
pub struct PlayerComponent {
    config: TrackerConfig,
    rng: Xorshift64,
    ping: StatAccumulator,
    /// Frame times published since the last drain
    frame_time: StatAccumulator,
    /// Every published frame time of this connection; never drained
    hitch_baseline: StatAccumulator,
    /// Frame times since the last publish
    frame_time_period: StatAccumulator,
    hitches: u32,
    hitches_period: u32,
    server_corrections: u32,
    last_correction_timestamp: Option<f32>,
    packets: PacketTotals,
    time_until_publish: f32,
}

impl PlayerComponent {
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_seed(config, 0x5eed_f00d)
    }

    /// Create a component whose publish jitter is reproducible
    pub fn with_seed(config: &TrackerConfig, seed: u64) -> Self {
        let mut component = Self {
            config: config.clone(),
            rng: Xorshift64::new(seed),
            ping: StatAccumulator::with_shape(config.ping_shape),
            frame_time: StatAccumulator::with_shape(config.frame_time_shape),
            frame_time_period: StatAccumulator::with_shape(config.frame_time_shape),
            hitch_baseline: StatAccumulator::with_shape(config.frame_time_shape),
            hitches: 0,
            hitches_period: 0,
            server_corrections: 0,
            last_correction_timestamp: None,
            packets: PacketTotals::default(),
            time_until_publish: 0.0,
        };
        component.rearm_publish_timer();
        component
    }

    /// Record one client frame time in milliseconds
    ///
    /// Returns whether the frame counted as a hitch. Non-positive frame
    /// times (first frame, paused clock) are skipped.
    pub fn client_frame(&mut self, frame_time_ms: f64) -> bool {
        if !(frame_time_ms > 0.0) {
            return false;
        }
        self.frame_time_period.add_sample(frame_time_ms);

        let baseline = &self.hitch_baseline;
        if baseline.sample_count() <= self.config.required_samples_for_hitch_detection {
            return false;
        }
        let above_mean = frame_time_ms - baseline.mean();
        let threshold = self.config.hitch_detection_threshold;
        let is_hitch = above_mean > 0.0
            && above_mean * above_mean > baseline.variance() * threshold * threshold;
        if is_hitch {
            self.hitches_period += 1;
        }
        is_hitch
    }

    /// Advance the publish timer by `delta_seconds`
    ///
    /// Returns the period's shard when a publish is due.
    pub fn tick(&mut self, delta_seconds: f32) -> Option<FrameTimeUpdate> {
        self.time_until_publish -= delta_seconds;
        if self.time_until_publish > 0.0 {
            return None;
        }
        self.rearm_publish_timer();
        Some(self.publish())
    }

    /// Close the current period
    ///
    /// The shard is folded into the lifetime totals and handed out in the
    /// same step, then the period starts empty.
    pub fn publish(&mut self) -> FrameTimeUpdate {
        let shard = self.frame_time_period.take();
        let hitches = core::mem::take(&mut self.hitches_period);

        self.frame_time += &shard;
        self.hitch_baseline += &shard;
        self.hitches += hitches;

        log::debug!(
            "publishing frame time shard: {} samples, {} hitches",
            shard.total_samples(),
            hitches
        );
        FrameTimeUpdate {
            frame_time: shard,
            hitches,
        }
    }

    /// Server side: fold a client's shard into this component
    pub fn apply_frame_time_update(&mut self, update: &FrameTimeUpdate) -> Result<(), MergeError> {
        self.frame_time.merge(&update.frame_time)?;
        self.hitches += update.hitches;
        Ok(())
    }

    /// Server side: decode and apply an encoded [`FrameTimeUpdate`]
    pub fn receive_frame_time_update(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        let update = FrameTimeUpdate::decode(self.config.frame_time_shape, bytes).map_err(|err| {
            log::warn!("dropping malformed frame time update: {}", err);
            err
        })?;
        // decoded with our own shape, so the merge can't mismatch
        self.frame_time += &update.frame_time;
        self.hitches += update.hitches;
        Ok(())
    }

    /// Record an average round trip time, in seconds
    pub fn record_ping(&mut self, seconds: f32) {
        if !seconds.is_finite() {
            log::warn!("ignoring non-finite ping reading {}", seconds);
            return;
        }
        if seconds > 0.0 {
            self.ping.add_sample(seconds as f64 * 1000.0);
        }
    }

    /// Count a server movement correction identified by its timestamp
    ///
    /// Only one correction is counted per new timestamp. Returns whether
    /// this one was counted.
    pub fn record_server_correction(&mut self, timestamp: f32) -> bool {
        if !self.config.record_net_corrections || !(timestamp > 0.0) {
            return false;
        }
        if matches!(self.last_correction_timestamp, Some(last) if last >= timestamp) {
            return false;
        }
        self.last_correction_timestamp = Some(timestamp);
        self.server_corrections += 1;
        true
    }

    /// Latest connection packet counters; these replace, not add to, the
    /// previous reading
    pub fn set_packet_totals(&mut self, packets: PacketTotals) {
        self.packets = packets;
    }

    pub fn ping_stats(&self) -> &StatAccumulator {
        &self.ping
    }

    /// Published frame times since the last drain, not including the open
    /// period
    pub fn frame_time_stats(&self) -> &StatAccumulator {
        &self.frame_time
    }

    /// Every published frame time of this connection, drained or not
    pub fn hitch_baseline(&self) -> &StatAccumulator {
        &self.hitch_baseline
    }

    /// Frame times of the open period
    pub fn period_frame_time_stats(&self) -> &StatAccumulator {
        &self.frame_time_period
    }

    pub fn hitches(&self) -> u32 {
        self.hitches
    }

    pub fn server_corrections(&self) -> u32 {
        self.server_corrections
    }

    pub fn packet_totals(&self) -> PacketTotals {
        self.packets
    }

    pub fn time_until_publish(&self) -> f32 {
        self.time_until_publish
    }

    /// Hand everything accumulated so far to the caller and start over
    ///
    /// Packet counters are cumulative readings of the connection, so they are
    /// copied and kept. The hitch baseline is kept too.
    pub fn take_totals(&mut self) -> ComponentTotals {
        ComponentTotals {
            ping: self.ping.take(),
            frame_time: self.frame_time.take(),
            hitches: core::mem::take(&mut self.hitches),
            server_corrections: core::mem::take(&mut self.server_corrections),
            packets: self.packets,
        }
    }

    /// Copy of the totals without resetting anything
    pub fn totals(&self) -> ComponentTotals {
        ComponentTotals {
            ping: self.ping.clone(),
            frame_time: self.frame_time.clone(),
            hitches: self.hitches,
            server_corrections: self.server_corrections,
            packets: self.packets,
        }
    }

    fn rearm_publish_timer(&mut self) {
        let jitter = self.config.update_period_jitter * self.rng.next_signed_unit();
        self.time_until_publish =
            (self.config.update_to_server_period + jitter).max(self.config.min_update_period);
    }
}
