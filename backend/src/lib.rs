//! Tracks, for every (template, storage pool) pair, whether the template has
//! been copied into the pool, and answers where a template is usable, where a
//! copy is running and where one still has to be staged.

pub mod config;
pub mod job_controller;
pub mod services;
pub mod store;
pub mod topology;
