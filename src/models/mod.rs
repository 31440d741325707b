pub mod participant;
pub mod prediction;
pub mod rating;
pub mod session;
pub mod video;

pub use participant::Participant;
pub use prediction::{AffectPrediction, FusedPrediction, PassivePrediction, VisualPrediction};
pub use rating::{Rating, RatingInput};
pub use session::{Session, SessionStatus, VideoVisit};
pub use video::{VideoDescriptor, VideoKind};
