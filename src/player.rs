use crate::registry::MediaSource;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::time::Duration;

type BoxedSource = Box<dyn Source<Item = i16> + Send>;

/// Runtime audio player wrapping rodio. Not `Send`; lives on the audio thread.
pub struct Player {
    _stream: OutputStream,
    sink: Sink,
}

impl Player {
    /// Initialize audio output and create a playback sink.
    pub fn new() -> Result<Self, String> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to open audio output: {}", e))?;
        let sink =
            Sink::try_new(&handle).map_err(|e| format!("Failed to create audio sink: {}", e))?;
        Ok(Player {
            _stream: stream,
            sink,
        })
    }

    /// Replace whatever is queued with `source`, paused at the start.
    /// Returns the decoder's total duration when it knows one.
    pub fn load(&self, source: &MediaSource) -> Result<Option<Duration>, String> {
        let decoded = decode(source)?;
        let duration = decoded.total_duration();
        self.sink.clear();
        self.sink.append(decoded);
        self.sink.pause();
        Ok(duration)
    }

    pub fn play(&self) {
        self.sink.play();
    }

    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Drop the queued source; the sink stays usable.
    pub fn stop(&self) {
        self.sink.clear();
    }

    /// True when the sink has finished all queued audio.
    pub fn is_empty(&self) -> bool {
        self.sink.empty()
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }

    pub fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    /// Attempt to seek to a position in the current source.
    pub fn try_seek(&self, position: Duration) -> Result<(), String> {
        self.sink
            .try_seek(position)
            .map_err(|e| format!("Seek failed: {}", e))
    }
}

fn decode(source: &MediaSource) -> Result<BoxedSource, String> {
    match source {
        MediaSource::Path(path) => {
            let file = File::open(path)
                .map_err(|e| format!("Cannot open '{}': {}", path.display(), e))?;
            let decoder = Decoder::new(BufReader::new(file))
                .map_err(|e| format!("Cannot decode '{}': {}", path.display(), e))?;
            Ok(Box::new(decoder))
        }
        MediaSource::Bytes(bytes) => {
            let decoder = Decoder::new(Cursor::new(bytes.clone()))
                .map_err(|e| format!("Cannot decode buffer: {}", e))?;
            Ok(Box::new(decoder))
        }
    }
}
