pub mod fake_source;
pub mod fixtures;

pub use fake_source::{FakeFailure, FakeSource, FakeSourceStats};
