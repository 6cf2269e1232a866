//! Light sensing: pulse-count sampling, the bounded history, and the shared
//! sensor state consulted by the decision engine.

pub mod history;
pub mod sampler;
pub mod sensor;

pub use history::LightHistory;
pub use sampler::{LightSampler, MeasureError, Sample, SampleError};
pub use sensor::{Evaluation, LightSensor};
