//! Crude Buster protection / priority resolver.
//!
//! The game writes magic words to its protection port and expects fixed
//! answers back. Some of those writes also decide whether playfield 3 or
//! playfield 4 is drawn on top; no separate priority register has been found
//! on the board, so the selector rides along with the protection state.

/// Which of the two mid playfields is drawn above the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerOrder {
    #[default]
    Pf4OverPf3,
    Pf3OverPf4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtectionState {
    #[default]
    Unknown,
    Idle,
    Level0,
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

struct ProtectionEntry {
    write: u16,
    readback: u16,
    next: Option<(ProtectionState, LayerOrder)>,
}

const fn answer(write: u16, readback: u16) -> ProtectionEntry {
    ProtectionEntry {
        write,
        readback,
        next: None,
    }
}

const fn level(write: u16, readback: u16, state: ProtectionState, order: LayerOrder) -> ProtectionEntry {
    ProtectionEntry {
        write,
        readback,
        next: Some((state, order)),
    }
}

// Reverse-engineered chip responses. Opaque constants: keep verbatim.
const CRUDE_BUSTER_TABLE: &[ProtectionEntry] = &[
    answer(0x9a00, 0x0000),
    answer(0x00aa, 0x0074),
    answer(0x0200, 0x6300),
    answer(0x009a, 0x000e),
    answer(0x0055, 0x001e),
    level(0x000e, 0x000e, ProtectionState::Idle, LayerOrder::Pf4OverPf3),
    level(0x0000, 0x000e, ProtectionState::Level0, LayerOrder::Pf4OverPf3),
    level(0x00f1, 0x0036, ProtectionState::Level1, LayerOrder::Pf3OverPf4),
    level(0x0080, 0x002e, ProtectionState::Level2, LayerOrder::Pf3OverPf4),
    level(0x0040, 0x001e, ProtectionState::Level3, LayerOrder::Pf3OverPf4),
    level(0x00c0, 0x003e, ProtectionState::Level4, LayerOrder::Pf4OverPf3),
    level(0x00ff, 0x0076, ProtectionState::Level5, LayerOrder::Pf3OverPf4),
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProtectionResolver {
    state: ProtectionState,
    readback: u16,
    order: LayerOrder,
    unknown_writes: u32,
}

impl ProtectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a write to the protection port. Only exact table matches have
    /// any effect.
    pub fn write(&mut self, data: u16, mask: u16) {
        let value = data & mask;
        match CRUDE_BUSTER_TABLE.iter().find(|entry| entry.write == value) {
            Some(entry) => {
                self.readback = entry.readback;
                if let Some((state, order)) = entry.next {
                    if state != self.state {
                        log::trace!("protection: {:?} -> {state:?}, {order:?}", self.state);
                    }
                    self.state = state;
                    self.order = order;
                }
            }
            None => {
                self.unknown_writes += 1;
                log::debug!("protection: unrecognised write {value:#06x}");
            }
        }
    }

    /// Value the CPU sees when it reads the protection port.
    pub fn read(&self) -> u16 {
        self.readback
    }

    pub fn state(&self) -> ProtectionState {
        self.state
    }

    pub fn layer_order(&self) -> LayerOrder {
        self.order
    }

    pub fn unknown_writes(&self) -> u32 {
        self.unknown_writes
    }
}
