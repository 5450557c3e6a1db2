pub mod bank;
pub mod engine;
pub mod frame;
pub mod voice;

pub use bank::{SampleBank, SAMPLE_FILES};
pub use engine::{AudioEngine, AudioOutput};
pub use frame::Frame;
pub use voice::VoiceMixer;

/// Fire-and-forget request to play a track's sample.
/// Must be safe to call from the sequencer's timing thread.
pub trait SamplePlayer: Send + Sync {
    fn play_sample(&self, track: usize);
}
