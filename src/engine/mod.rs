//! Request lifecycle engine
//!
//! Students create point requests (directly or by claiming a lab); tutors
//! approve them, paying from their own balance, or reject them.

pub mod manager;
pub mod request;
pub mod store;

pub use manager::{PointsEngine, PointsEvent};
pub use request::{PointsRequest, RequestId, RequestStatus};
pub use store::RequestStore;
