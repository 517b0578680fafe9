// src/config.rs

/// Slots reserved per call frame when sizing the operand stack.
pub const FRAME_SLOTS: usize = 256;
pub const DEFAULT_MAX_FRAMES: usize = 64;

/// Runtime limits for the virtual machine. The VM enforces them; this only states them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum operand stack depth, shared by all active frames.
    pub stack_size: usize,
    /// Maximum call depth, the top-level script included.
    pub max_frames: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_size: FRAME_SLOTS * DEFAULT_MAX_FRAMES,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }
}
