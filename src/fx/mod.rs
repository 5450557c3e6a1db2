pub mod delay;

pub use delay::{DelayEffect, DelayLine, DelayProcessor};
