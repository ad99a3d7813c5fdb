//! View-layer seam: route classification, the router interface and the
//! gate that decides whether a view renders, waits or redirects.

mod gate;
mod router;

pub use gate::{classify, GateDecision, RouteClass, ViewGate};
pub use router::{routes, RecordingRouter, ViewRouter};
