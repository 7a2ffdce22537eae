use serde::Serialize;

/// Per-node packet counters, computed by replaying a simulation's steps
#[derive(Clone, Debug, Default, Serialize)]
pub struct NodeStats {
    pub generated: PacketStats,
    pub sent: PacketStats,
    pub received: PacketStats,
    pub enqueued: PacketStats,
    pub dropped: PacketStats,
    pub delivered: PacketStats,
    pub deadline_misses: PacketStats,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PacketStats {
    pub packets: u64,
    pub bytes: u64,
}

impl PacketStats {
    pub fn track_one(&mut self, size_bytes: u32) {
        self.packets += 1;
        self.bytes += u64::from(size_bytes);
    }
}
