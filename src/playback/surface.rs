use crate::models::VideoDescriptor;

/// The player and rating popup, as seen from the controller. Implementations
/// must not block; they forward instructions to whatever renders the study.
pub trait PlayerSurface: Send + Sync {
    fn load_video(&self, video: &VideoDescriptor);
    fn pause(&self);
    fn play(&self);
    fn show_rating_prompt(&self, advance_after: bool);
    fn hide_rating_prompt(&self);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::PlayerSurface;
    use crate::models::VideoDescriptor;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SurfaceCall {
        Load(String),
        Pause,
        Play,
        ShowPrompt { advance_after: bool },
        HidePrompt,
    }

    #[derive(Default)]
    pub struct RecordingSurface {
        calls: Mutex<Vec<SurfaceCall>>,
    }

    impl RecordingSurface {
        pub fn calls(&self) -> Vec<SurfaceCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, call: &SurfaceCall) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
        }

        pub fn prompts_shown(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, SurfaceCall::ShowPrompt { .. }))
                .count()
        }

        fn push(&self, call: SurfaceCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl PlayerSurface for RecordingSurface {
        fn load_video(&self, video: &VideoDescriptor) {
            self.push(SurfaceCall::Load(video.id.clone()));
        }

        fn pause(&self) {
            self.push(SurfaceCall::Pause);
        }

        fn play(&self) {
            self.push(SurfaceCall::Play);
        }

        fn show_rating_prompt(&self, advance_after: bool) {
            self.push(SurfaceCall::ShowPrompt { advance_after });
        }

        fn hide_rating_prompt(&self) {
            self.push(SurfaceCall::HidePrompt);
        }
    }
}
