//! Window state

mod app_state;

pub use app_state::{ActiveView, AppState, HotkeyCapture, BLOCK_SIZES, SAMPLE_RATES};
