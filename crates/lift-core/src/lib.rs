pub mod errors;
pub mod events;
pub mod ids;
pub mod model;

pub use errors::{LiftError, LiftResult};
pub use events::{Envelope, LiftRequestEvent, Notification};
pub use ids::{LiftId, LiftRequestId, ObserverId, SessionId};
pub use model::{
    Lift, LiftRequest, LiftRequestView, LiftStatus, RequestStatus, Session, SessionView,
};
