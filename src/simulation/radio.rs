//! Per-rover radio transceiver state machine.
//!
//! Each radio owns its link configuration, a precomputed transmit slot,
//! tx/rx/discard counters and the most recent neighbour observation with its
//! decay configuration. Channel access is fixed-slot TDMA: the swarm shares
//! one slot interval and every rover is assigned a distinct slot inside it,
//! derived by the pure function [`tx_slot`].

use log::warn;
use rand::Rng;
use serde::Deserialize;

use crate::signal_calculations::{LoraParameters, PathLossParameters, calculate_air_time, calculate_rssi, calculate_sensitivity};
use crate::simulation::channel::Packet;

/// How the trust in a stale neighbour observation decays toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayCurve {
    Linear,
    Quadratic,
}

/// Decay of the neighbour observation weight over elapsed time.
#[derive(Debug, Clone, Deserialize)]
pub struct DecayConfig {
    pub curve: DecayCurve,
    /// Number of communication cycles (slot intervals) after which the
    /// weight reaches zero.
    pub zero_crossing_cycles: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        DecayConfig {
            curve: DecayCurve::Quadratic,
            zero_crossing_cycles: 20,
        }
    }
}

/// Radio link configuration for every rover in the swarm.
#[derive(Debug, Clone, Deserialize)]
pub struct RadioConfig {
    pub lora: LoraParameters,
    /// Transmit power in dBm.
    pub tx_power: f64,
    /// Fixed antenna gain in dBi, applied once per link.
    #[serde(default = "default_antenna_gain")]
    pub antenna_gain: f64,
    /// Duty-cycle limit as a fraction (0, 1]. Advisory: reported, not enforced.
    pub duty_cycle: f64,
    /// Payload length in bytes, used for airtime accounting.
    pub payload_length: usize,
    #[serde(default)]
    pub decay: DecayConfig,
}

fn default_antenna_gain() -> f64 {
    2.15
}

/// The most recently accepted packet from a neighbour.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourObservation {
    pub sender_id: usize,
    pub x: f64,
    pub y: f64,
    /// Tick index of the reception; the decay clock starts here.
    pub received_at: u64,
}

/// Slot index for a rover inside the shared slot interval.
///
/// Rovers are spread with stride `floor(slot_interval / swarm_size)`, so the
/// assignment is injective modulo the interval whenever
/// `slot_interval >= swarm_size`: consecutive indices map to slots
/// `0, stride, 2*stride, ...`, all below the interval.
pub fn tx_slot(rover_index: usize, swarm_size: usize, slot_interval: u64) -> u64 {
    let stride = (slot_interval / swarm_size as u64).max(1);
    (rover_index as u64 * stride) % slot_interval
}

/// Shared slot interval in ticks: long enough to honour the duty-cycle limit
/// for one transmission per interval, and never shorter than the swarm size
/// so every rover gets a distinct slot.
pub fn slot_interval_ticks(airtime: f64, duty_cycle: f64, dt: f64, swarm_size: usize) -> u64 {
    let duty_ticks = (airtime / duty_cycle / dt).ceil() as u64;
    duty_ticks.max(swarm_size as u64).max(1)
}

/// Transceiver state attached to a rover.
#[derive(Debug, Clone)]
pub struct Radio {
    config: RadioConfig,
    /// Time-on-air of one packet, in seconds.
    airtime: f64,
    /// Reception threshold in dBm.
    sensitivity: f64,
    /// Tick duration, for duty-cycle accounting.
    t_slot: f64,
    swarm_size: usize,
    slot_interval: u64,
    /// Absolute tick index of the next scheduled transmission.
    next_tx: u64,
    num_tx: u64,
    num_rx: u64,
    num_disc: u64,
    neighbour: Option<NeighbourObservation>,
}

impl Radio {
    /// Build a radio for the rover at `rover_index` in a swarm of
    /// `swarm_size`, with tick duration `t_slot` seconds.
    ///
    /// An airtime longer than the tick duration is a simulation-parameter
    /// mismatch: the transmission would span several ticks while the model
    /// completes it within one. This is reported as an advisory warning, not
    /// an error.
    pub fn new(config: RadioConfig, rover_index: usize, swarm_size: usize, t_slot: f64) -> Self {
        let airtime = calculate_air_time(&config.lora, config.payload_length);
        let sensitivity = calculate_sensitivity(&config.lora);
        if airtime > t_slot {
            warn!(
                "Airtime ({:.4} s) exceeds the slot duration ({:.4} s), reduces accuracy of simulation",
                airtime, t_slot
            );
        }
        let slot_interval = slot_interval_ticks(airtime, config.duty_cycle, t_slot, swarm_size);
        let next_tx = tx_slot(rover_index, swarm_size, slot_interval);
        Radio {
            config,
            airtime,
            sensitivity,
            t_slot,
            swarm_size,
            slot_interval,
            next_tx,
            num_tx: 0,
            num_rx: 0,
            num_disc: 0,
            neighbour: None,
        }
    }

    /// Re-derive the slot schedule after a swarm size change. Resets the
    /// schedule to the first interval; counters and neighbour data survive.
    pub fn reschedule(&mut self, rover_index: usize, swarm_size: usize) {
        self.swarm_size = swarm_size;
        self.slot_interval = slot_interval_ticks(self.airtime, self.config.duty_cycle, self.t_slot, swarm_size);
        self.next_tx = tx_slot(rover_index, swarm_size, self.slot_interval);
    }

    /// Whether this radio is scheduled to transmit at tick `tn`.
    pub fn is_tx_slot(&self, tn: u64) -> bool {
        tn == self.next_tx
    }

    /// Emit a packet for the owning rover and advance the schedule by one
    /// slot interval.
    pub fn transmit(&mut self, sender_id: usize, x: f64, y: f64) -> Packet {
        self.num_tx += 1;
        self.next_tx += self.slot_interval;
        Packet { sender_id, x, y }
    }

    /// Attempt reception of a packet transmitted from `(packet.x, packet.y)`
    /// while this radio sits at `(x, y)`.
    ///
    /// The link budget test compares the sampled RSSI against the receiver
    /// sensitivity. On success the sender's pose is recorded as the freshest
    /// neighbour observation and the decay clock restarts; on failure the
    /// discard counter increments and the packet has no effect.
    pub fn receive<R: Rng>(&mut self, packet: &Packet, x: f64, y: f64, tn: u64, path_loss: &PathLossParameters, rng: &mut R) -> bool {
        let distance = ((packet.x - x).powi(2) + (packet.y - y).powi(2)).sqrt();
        let rssi = calculate_rssi(distance, self.config.tx_power, self.config.antenna_gain, path_loss, rng);
        if rssi >= self.sensitivity {
            self.num_rx += 1;
            self.neighbour = Some(NeighbourObservation {
                sender_id: packet.sender_id,
                x: packet.x,
                y: packet.y,
                received_at: tn,
            });
            true
        } else {
            self.num_disc += 1;
            false
        }
    }

    /// Confidence in the stored neighbour observation at tick `tn`, in
    /// `[0, 1]`. 1 immediately after a reception, 0 once fully decayed or when
    /// nothing has been received yet.
    pub fn decay_weight(&self, tn: u64) -> f64 {
        let Some(neighbour) = &self.neighbour else { return 0.0 };
        let zero_ticks = self.config.decay.zero_crossing_cycles * self.slot_interval;
        if zero_ticks == 0 {
            return 0.0;
        }
        let elapsed = tn.saturating_sub(neighbour.received_at) as f64 / zero_ticks as f64;
        let weight = match self.config.decay.curve {
            DecayCurve::Linear => 1.0 - elapsed,
            DecayCurve::Quadratic => 1.0 - elapsed * elapsed,
        };
        weight.clamp(0.0, 1.0)
    }

    /// The stored neighbour observation, if any.
    pub fn neighbour(&self) -> Option<&NeighbourObservation> {
        self.neighbour.as_ref()
    }

    /// Fraction of discarded receptions, or `None` when no reception was
    /// attempted (reported as "N/A", not a fault).
    pub fn packet_loss_ratio(&self) -> Option<f64> {
        let attempts = self.num_rx + self.num_disc;
        if attempts == 0 {
            None
        } else {
            Some(self.num_disc as f64 / attempts as f64)
        }
    }

    /// Observed duty cycle: airtime over the slot interval duration.
    pub fn actual_duty_cycle(&self) -> f64 {
        self.airtime / (self.slot_interval as f64 * self.t_slot)
    }

    /// Time between this radio's successive transmissions, in seconds.
    pub fn silent_time(&self) -> f64 {
        self.slot_interval as f64 * self.t_slot
    }

    pub fn airtime(&self) -> f64 {
        self.airtime
    }

    pub fn airtime_exceeds_slot(&self) -> bool {
        self.airtime > self.t_slot
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn slot_interval(&self) -> u64 {
        self.slot_interval
    }

    pub fn swarm_size(&self) -> usize {
        self.swarm_size
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    pub fn num_tx(&self) -> u64 {
        self.num_tx
    }

    pub fn num_rx(&self) -> u64 {
        self.num_rx
    }

    pub fn num_disc(&self) -> u64 {
        self.num_disc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_calculations::LoraParameters;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_config(decay: DecayConfig) -> RadioConfig {
        RadioConfig {
            lora: LoraParameters {
                frequency: 869.525,
                bandwidth: 125_000,
                spreading_factor: 9,
                coding_rate: 4,
                preamble_symbols: 8.0,
                crc_enabled: true,
                low_data_rate_optimization: false,
            },
            tx_power: 14.0,
            antenna_gain: 2.15,
            duty_cycle: 0.01,
            payload_length: 20,
            decay,
        }
    }

    fn free_space() -> PathLossParameters {
        PathLossParameters {
            path_loss_exponent: 2.0,
            shadowing_sigma: 0.0,
            path_loss_at_reference_distance: 40.0,
        }
    }

    #[test]
    fn slot_assignment_is_injective() {
        for swarm_size in 2..=50usize {
            for slot_interval in [swarm_size as u64, 64, 1000] {
                if slot_interval < swarm_size as u64 {
                    continue;
                }
                let mut seen = std::collections::HashSet::new();
                for index in 0..swarm_size {
                    let slot = tx_slot(index, swarm_size, slot_interval);
                    assert!(slot < slot_interval);
                    assert!(seen.insert(slot), "duplicate slot {} for swarm size {} and interval {}", slot, swarm_size, slot_interval);
                }
            }
        }
    }

    #[test]
    fn slot_interval_honours_duty_cycle_and_swarm_size() {
        // 0.1 s airtime at 1% duty cycle needs 10 s of silence = 100 ticks at dt=0.1
        assert_eq!(slot_interval_ticks(0.1, 0.01, 0.1, 5), 100);
        // A large swarm dominates a permissive duty cycle
        assert_eq!(slot_interval_ticks(0.01, 1.0, 0.1, 40), 40);
    }

    #[test]
    fn transmit_advances_schedule_and_counts() {
        let mut radio = Radio::new(test_config(DecayConfig::default()), 0, 4, 0.12);
        let first_slot = radio.next_tx;
        assert!(radio.is_tx_slot(first_slot));
        let packet = radio.transmit(1, 10.0, 20.0);
        assert_eq!(packet.sender_id, 1);
        assert_eq!(radio.num_tx(), 1);
        assert!(radio.is_tx_slot(first_slot + radio.slot_interval()));
    }

    #[test]
    fn reception_succeeds_close_and_discards_far() {
        let mut radio = Radio::new(test_config(DecayConfig::default()), 1, 2, 0.12);
        let mut rng = StdRng::seed_from_u64(7);
        let near = Packet { sender_id: 2, x: 100.0, y: 0.0 };
        assert!(radio.receive(&near, 0.0, 0.0, 5, &free_space(), &mut rng));
        assert_eq!(radio.num_rx(), 1);
        assert_eq!(radio.neighbour().unwrap().received_at, 5);

        // ~10^9 meters of free-space loss is far beyond any LoRa budget
        let far = Packet { sender_id: 2, x: 1.0e9, y: 0.0 };
        assert!(!radio.receive(&far, 0.0, 0.0, 6, &free_space(), &mut rng));
        assert_eq!(radio.num_disc(), 1);
        // The failed reception must not clobber the stored observation
        assert_eq!(radio.neighbour().unwrap().received_at, 5);
    }

    #[test]
    fn packet_loss_ratio_is_na_without_attempts() {
        let radio = Radio::new(test_config(DecayConfig::default()), 0, 2, 0.12);
        assert_eq!(radio.packet_loss_ratio(), None);
    }

    #[test]
    fn packet_loss_ratio_stays_in_unit_interval() {
        let mut radio = Radio::new(test_config(DecayConfig::default()), 1, 2, 0.12);
        let mut rng = StdRng::seed_from_u64(1);
        let near = Packet { sender_id: 2, x: 10.0, y: 0.0 };
        let far = Packet { sender_id: 2, x: 1.0e9, y: 0.0 };
        radio.receive(&near, 0.0, 0.0, 0, &free_space(), &mut rng);
        radio.receive(&far, 0.0, 0.0, 1, &free_space(), &mut rng);
        let ratio = radio.packet_loss_ratio().unwrap();
        assert!((0.0..=1.0).contains(&ratio));
        assert!((ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn decay_weight_monotone_and_resets_on_reception() {
        let config = test_config(DecayConfig {
            curve: DecayCurve::Quadratic,
            zero_crossing_cycles: 2,
        });
        let mut radio = Radio::new(config, 1, 2, 0.12);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(radio.decay_weight(0), 0.0);

        let packet = Packet { sender_id: 2, x: 50.0, y: 0.0 };
        radio.receive(&packet, 0.0, 0.0, 10, &free_space(), &mut rng);
        assert_eq!(radio.decay_weight(10), 1.0);

        let mut prev = 1.0;
        for tn in 11..(10 + 3 * radio.slot_interval()) {
            let w = radio.decay_weight(tn);
            assert!(w <= prev, "weight increased between receptions at tick {}", tn);
            assert!((0.0..=1.0).contains(&w));
            prev = w;
        }
        // Fully decayed at the zero crossing
        assert_eq!(radio.decay_weight(10 + 2 * radio.slot_interval()), 0.0);

        radio.receive(&packet, 0.0, 0.0, 500, &free_space(), &mut rng);
        assert_eq!(radio.decay_weight(500), 1.0);
    }

    #[test]
    fn linear_decay_hits_zero_at_crossing() {
        let config = test_config(DecayConfig {
            curve: DecayCurve::Linear,
            zero_crossing_cycles: 1,
        });
        let mut radio = Radio::new(config, 1, 2, 0.12);
        let mut rng = StdRng::seed_from_u64(3);
        radio.receive(&Packet { sender_id: 2, x: 1.0, y: 0.0 }, 0.0, 0.0, 0, &free_space(), &mut rng);
        let interval = radio.slot_interval();
        let halfway = radio.decay_weight(interval / 2);
        assert!(halfway > 0.0 && halfway < 1.0);
        assert_eq!(radio.decay_weight(interval), 0.0);
    }

    #[test]
    fn reschedule_recomputes_slots() {
        let mut radio = Radio::new(test_config(DecayConfig::default()), 3, 4, 0.12);
        let before = radio.slot_interval();
        radio.reschedule(3, 2 * before as usize);
        assert!(radio.slot_interval() >= 2 * before);
        assert!(tx_slot(3, radio.swarm_size(), radio.slot_interval()) < radio.slot_interval());
    }
}
