//! Alert tone playback. Fire-and-forget: the engine never learns whether
//! a tone actually played.

use crate::engine::Chime;
use crate::models::SoundKind;
use rodio::source::{SineWave, Source};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("Failed to play audio: {0}")]
    Play(#[from] rodio::PlayError),
}

pub struct AudioNotifier {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioNotifier {
    pub fn new() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Plays the requested tone at the requested volume. Failures go to
    /// stderr and are otherwise swallowed.
    pub fn play(&self, chime: Chime) {
        if let Err(e) = self.play_tone(chime) {
            eprintln!("Failed to play alert tone: {}", e);
        }
    }

    fn play_tone(&self, chime: Chime) -> Result<(), AudioError> {
        let sink = Sink::try_new(&self.handle)?;
        let volume = chime.volume.clamp(0.0, 1.0);

        match chime.kind {
            SoundKind::Chime => {
                // Two-tone chime: A5 then C6.
                sink.append(
                    SineWave::new(880.0)
                        .take_duration(Duration::from_millis(150))
                        .amplify(volume),
                );
                sink.append(
                    rodio::source::Zero::<f32>::new(1, 44100)
                        .take_duration(Duration::from_millis(50)),
                );
                sink.append(
                    SineWave::new(1046.5)
                        .take_duration(Duration::from_millis(200))
                        .amplify(volume),
                );
            }
            SoundKind::Beep => {
                sink.append(
                    SineWave::new(440.0)
                        .take_duration(Duration::from_millis(300))
                        .amplify(volume),
                );
            }
            SoundKind::Tick => {
                // Short click, metronome-style.
                sink.append(
                    SineWave::new(1500.0)
                        .take_duration(Duration::from_millis(40))
                        .amplify(volume),
                );
            }
        }

        sink.detach();
        Ok(())
    }
}
