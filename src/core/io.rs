//! Side channels to the collaborators outside the video core: the sound CPU
//! command latch and the input ports.

/// Latch written by the main CPU to hand a command byte to the sound CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundLatch {
    value: u8,
    pending: bool,
}

impl SoundLatch {
    pub fn write(&mut self, value: u8) {
        self.value = value;
        self.pending = true;
    }

    /// Last value written, regardless of whether it has been consumed.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Consume a pending command. The sound CPU side calls this when it
    /// services its interrupt.
    pub fn take(&mut self) -> Option<u8> {
        if self.pending {
            self.pending = false;
            Some(self.value)
        } else {
            None
        }
    }
}

/// Raw input port values as the board's address decoder sees them. Active-low
/// conventions are the input collaborator's business; this only stores words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPorts {
    ports: Vec<u16>,
}

impl InputPorts {
    pub fn new(count: usize) -> Self {
        Self {
            ports: vec![0xFFFF; count],
        }
    }

    pub fn set(&mut self, port: usize, value: u16) {
        self.ports[port] = value;
    }

    pub fn get(&self, port: usize) -> u16 {
        self.ports[port]
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
