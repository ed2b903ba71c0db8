//! The shared broadcast medium.
//!
//! A single channel is shared by the whole swarm. Within one tick it is
//! append-only during the transmit phase, read-only during the receive phase,
//! and emptied unconditionally at the end of the tick: it never carries state
//! across ticks. Under correct slot assignment it holds at most one packet,
//! but coinciding slots append all of their packets (see `World::step`).

/// A single in-flight transmission: the sender's id and pose. The pose is the
/// whole payload of the cooperative protocol; the configured payload length
/// only affects airtime accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub sender_id: usize,
    pub x: f64,
    pub y: f64,
}

/// Per-tick list of in-flight transmissions.
#[derive(Debug, Default)]
pub struct Channel {
    packets: Vec<Packet>,
}

impl Channel {
    pub fn new() -> Self {
        Channel { packets: Vec::new() }
    }

    /// Add a new transmission to the channel.
    pub fn add_packet(&mut self, packet: Packet) {
        self.packets.push(packet);
    }

    /// All transmissions in flight during the current tick.
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Empty the channel.
    pub fn clear(&mut self) {
        self.packets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_clears() {
        let mut channel = Channel::new();
        assert!(channel.is_empty());
        channel.add_packet(Packet { sender_id: 1, x: 0.0, y: 0.0 });
        channel.add_packet(Packet { sender_id: 2, x: 5.0, y: 5.0 });
        assert_eq!(channel.packets().len(), 2);
        channel.clear();
        assert!(channel.is_empty());
    }
}
