//! File-backed media elements for the background and preview channels

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rodio::{Decoder, OutputStreamHandle, Sink, Source};

use super::RodioBackend;
use crate::backend::{Channel, ElementError, ElementFactory, MediaElement, Readiness};

/// Local-file player on its own sink
///
/// Loading decodes the file header synchronously, so an element is either
/// ready or failed as soon as `load` returns.
pub struct RodioElement {
    handle: OutputStreamHandle,
    channel: Channel,
    path: Option<PathBuf>,
    looping: bool,
    volume: f32,
    sink: Option<Sink>,
    failure: Option<ElementError>,
}

impl ElementFactory for RodioBackend {
    type Element = RodioElement;

    fn create_element(&mut self, channel: Channel) -> RodioElement {
        RodioElement {
            handle: self.handle.clone(),
            channel,
            path: None,
            looping: false,
            volume: 1.0,
            sink: None,
            failure: None,
        }
    }
}

fn resolve(url: &str) -> Result<PathBuf, ElementError> {
    let path = url.strip_prefix("file://").unwrap_or(url);
    if path.contains("://") {
        return Err(ElementError::Unsupported(format!("only local files are supported: {url}")));
    }
    Ok(PathBuf::from(path))
}

fn open(path: &Path) -> Result<Decoder<BufReader<File>>, ElementError> {
    let file = File::open(path).map_err(|e| ElementError::Network(format!("{}: {e}", path.display())))?;
    Decoder::new(BufReader::new(file)).map_err(|e| ElementError::Decode(e.to_string()))
}

impl RodioElement {
    fn start_sink(&mut self) -> Result<(), ElementError> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| ElementError::Other("no source assigned".into()))?;
        let decoder = open(path)?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| ElementError::Other(format!("Failed to create audio sink: {e}")))?;
        sink.set_volume(self.volume);
        if self.looping {
            sink.append(decoder.buffered().repeat_infinite());
        } else {
            sink.append(decoder);
        }
        self.sink = Some(sink);
        Ok(())
    }
}

impl MediaElement for RodioElement {
    fn load(&mut self, url: &str, _cross_origin: bool) -> Result<(), ElementError> {
        self.sink = None;
        self.failure = None;
        let path = resolve(url)?;
        // Probe once so format errors surface on load rather than on play.
        if let Err(err) = open(&path) {
            self.failure = Some(err.clone());
            return Err(err);
        }
        log::debug!("{:?}: assigned {}", self.channel, path.display());
        self.path = Some(path);
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(volume);
        }
    }

    fn play(&mut self) -> Result<(), ElementError> {
        if let Some(sink) = self.sink.as_ref().filter(|s| !s.empty()) {
            sink.play();
            return Ok(());
        }
        if let Err(err) = self.start_sink() {
            self.failure = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.pause();
        }
    }

    fn rewind(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn readiness(&self) -> Readiness {
        if let Some(err) = self.failure.as_ref() {
            return Readiness::Failed(err.clone());
        }
        match (self.path.as_ref(), self.sink.as_ref()) {
            (None, _) => Readiness::Empty,
            (Some(_), Some(sink)) if sink.empty() && !self.looping => Readiness::Ended,
            (Some(_), _) => Readiness::Ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_accepts_local_paths() {
        assert_eq!(resolve("audio/rain.ogg").unwrap(), PathBuf::from("audio/rain.ogg"));
        assert_eq!(resolve("file:///tmp/rain.ogg").unwrap(), PathBuf::from("/tmp/rain.ogg"));
        assert!(matches!(
            resolve("https://cdn.example.com/rain.mp3"),
            Err(ElementError::Unsupported(_))
        ));
    }

    #[test]
    fn test_missing_file_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(&dir.path().join("missing.wav")).unwrap_err();
        assert!(matches!(err, ElementError::Network(_)));
    }

    #[test]
    fn test_garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(open(&path), Err(ElementError::Decode(_))));
    }
}
