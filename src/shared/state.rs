//! Progress state of the capture screen

/// Status shown while idle
pub const STATUS_IDLE: &str = "Select an image to recognize";

/// Status after a successful run
pub const STATUS_COMPLETED: &str = "Completed";

/// Loading flag and user-visible status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureState {
    /// A recognition is in flight
    pub is_loading: bool,
    /// Last progress or error message
    pub status: String,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            is_loading: false,
            status: STATUS_IDLE.to_string(),
        }
    }
}

impl CaptureState {
    /// Enter the loading state with `status`
    pub fn begin(&mut self, status: impl Into<String>) {
        self.is_loading = true;
        self.status = status.into();
    }

    /// Leave the loading state with a final `status`
    pub fn finish(&mut self, status: impl Into<String>) {
        self.is_loading = false;
        self.status = status.into();
    }
}
