pub mod state;
pub mod store;

pub use state::{StudyAction, StudyPhase, StudyState};
pub use store::{SensorResource, StudyStore};
