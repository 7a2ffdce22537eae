use crate::Tick;

/// The amount of ticks needed to push a frame of `size_bytes` through a link that moves
/// `byte_budget` bytes per tick
///
/// Frames larger than the budget are fragmented over several consecutive ticks.
pub fn transfer_ticks(size_bytes: u32, byte_budget: u32) -> Tick {
    u64::from(size_bytes)
        .div_ceil(u64::from(byte_budget.max(1)))
        .max(1)
}

/// Keeps track of how long a node's outgoing link stays occupied by the frame it last sent
///
/// The occupancy ages once per tick, including ticks in which nothing is sent. A frame spanning
/// `n` ticks sent at tick `t` blocks the link during ticks `t..t + n`.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct LinkOccupancy {
    remaining: Tick,
}

impl LinkOccupancy {
    /// Ages the occupancy by one tick and returns whether the link is free during the current tick
    pub(crate) fn advance(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.is_idle()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.remaining == 0
    }

    pub(crate) fn occupy(&mut self, ticks: Tick) {
        self.remaining = ticks;
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> Tick {
        self.remaining
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_transfer_ticks() {
        assert_eq!(transfer_ticks(16, 16), 1);
        assert_eq!(transfer_ticks(17, 16), 2);
        assert_eq!(transfer_ticks(40, 16), 3);
        assert_eq!(transfer_ticks(1, 16), 1);
    }

    #[test]
    fn test_fragmented_frame_blocks_link() {
        let mut link = LinkOccupancy::default();
        assert!(link.advance());
        link.occupy(transfer_ticks(40, 16));

        // Busy during the two ticks after the send, free on the third
        assert!(!link.advance());
        assert!(!link.advance());
        assert_eq!(link.remaining(), 1);
        assert!(link.advance());
    }
}
