use std::{
    io::{self, Write},
    sync::{Mutex, PoisonError},
};

use log::warn;

use crate::{models::VideoDescriptor, playback::PlayerSurface};

use super::SurfaceEvent;

/// Writes surface events as JSON lines. The renderer on the other end of the
/// pipe owns the actual player and rating popup.
pub struct JsonLineSurface {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLineSurface {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn emit(&self, event: &SurfaceEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!("Failed to serialize surface event {event:?}: {err}");
                return;
            }
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!("Failed to write surface event: {err}");
        }
    }
}

impl PlayerSurface for JsonLineSurface {
    fn load_video(&self, video: &VideoDescriptor) {
        self.emit(&SurfaceEvent::LoadVideo {
            video: video.clone(),
        });
    }

    fn pause(&self) {
        self.emit(&SurfaceEvent::Pause);
    }

    fn play(&self) {
        self.emit(&SurfaceEvent::Play);
    }

    fn show_rating_prompt(&self, advance_after: bool) {
        self.emit(&SurfaceEvent::ShowRatingPrompt { advance_after });
    }

    fn hide_rating_prompt(&self) {
        self.emit(&SurfaceEvent::HideRatingPrompt);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        io::{self, Write},
        sync::{Arc, Mutex},
    };

    use serde_json::Value;

    /// In-memory sink that can be read back while the surface still owns it.
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn lines(&self) -> Vec<Value> {
            let raw = self.0.lock().unwrap().clone();
            String::from_utf8(raw)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }

        pub fn types(&self) -> Vec<String> {
            self.lines()
                .iter()
                .map(|line| line["type"].as_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
