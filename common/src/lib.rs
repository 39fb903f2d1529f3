//! Types shared between the tracker backend and the workers and orchestrators
//! that talk to it.

pub mod jobs;
pub mod model;
pub mod requests;
