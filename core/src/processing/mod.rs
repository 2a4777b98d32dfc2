pub mod correlator;

pub use correlator::{BatchReport, Correlator};
