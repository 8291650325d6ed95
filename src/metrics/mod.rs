pub mod timing;

pub use timing::{Timing, TimingStats};
