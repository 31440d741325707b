pub mod boundary;
pub mod controller;
pub mod state;
pub mod surface;

pub use boundary::{align_to_boundary, BoundaryGate};
pub use controller::{PlaybackController, RatingOutcome};
pub use state::{PlaybackSnapshot, PlaybackStatus};
pub use surface::PlayerSurface;
