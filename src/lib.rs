//! Drowsyguard - client-side drowsiness monitoring pipeline
//!
//! ## Architecture (5 Components)
//!
//! 1. FrameSource - one still image per request from a live feed
//! 2. DetectionClient - classification service adapter with retry/backoff
//! 3. CaptureScheduler - fixed-cadence capture-and-submit loop
//! 4. AlertStateMachine - serializes results into Normal/Warning transitions
//! 5. AlarmScheduler - repeating two-tone audio loop while armed
//!
//! ## Design Principles
//!
//! - Liveness first: classification latency never stalls the capture cadence,
//!   and a failed cycle is absorbed rather than surfaced
//! - Single owner per resource: the scheduler owns the frame source, one
//!   attempt chain owns its cancellation handle and retry counter
//! - At most one tone loop while armed, enforced with a generation counter

pub mod alarm;
pub mod alert;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame_source;

pub use error::{Error, Result};
