#![cfg_attr(docsrs, feature(doc_cfg))]
//! # Metronome
//!
//! A deterministic, virtual-time test harness for reactive streams.
//!
//! Metronome lets a test declare timestamped inputs for one or more stream
//! sinks, declare observations over one or more stream sources, drive a
//! logical clock until everything scheduled has settled, and compare what
//! was recorded against wildcard-aware expectations. No wall-clock time is
//! involved: a test over minutes of stream activity runs instantly and
//! always in the same order.
//!
//! ## Quick Start
//!
//! ```rust
//! use metronome::{next, completed, Harness, Subject};
//!
//! let mut h = Harness::new();
//! let source = Subject::<&str>::new();
//!
//! h.input(&source, vec![next(100, "A"), next(200, "B"), completed(300)])
//!     .unwrap();
//! h.expect(&source).filter_next().equal_values(vec!["A", "B"]);
//! h.expect(&source).filter_next().since(200).count(1);
//! h.run();
//! ```
//!
//! Nothing executes while declarations are collected. The run phase
//! (entered by [`Harness::run`], [`Harness::run_with`], or automatically
//! when the harness is dropped) wires every observation, materializes every
//! input as hot emissions on the clock, advances virtual time until
//! quiescence, then resolves every assertion in declaration order.
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Harness`] | Collects inputs, observations, and assertions; owns the run phase |
//! | [`VirtualClock`] / [`ClockHandle`] | Deterministic scheduler driving all deliveries |
//! | [`Subject`] | Hot multicast relay, usable as input target and observation point |
//! | [`Variable`] | Value cell that replays its current value to subscribers |
//! | [`ColdSource`] | Replays a scripted sequence relative to each subscription |
//! | [`Recorded`] / [`StreamEvent`] | Time-stamped `Next` / `Error` / `Completed` events |
//! | [`Assertion`] | Fluent filters plus one terminal comparison |
//! | [`AssertionResult`] | Per-assertion `Success` / `Failure` outcome |
//!
//! ## Expected Events
//!
//! Build expected sequences with [`next()`], [`error()`], [`failed()`], and
//! [`completed()`], or use [`any()`] for a value whose timestamp does not
//! matter: the wildcard time ([`ANY_TIME`]) matches any recorded time and
//! survives every time-window filter. Inputs must use concrete times.
//!
//! ## Threads
//!
//! Event ordering is cooperative and effectively single-threaded, but test
//! graphs may hop real threads: bracket the remote work with
//! [`ClockHandle::begin_op`] and the clock will hold virtual time still
//! until the remote side schedules its follow-up. The run phase is bounded
//! by a wall-clock watchdog ([`HarnessConfig::with_watchdog`]) so a stuck
//! stage fails the test instead of hanging the suite.
//!
//! ## Features
//!
//! - **`serde`** - `Serialize` for [`Recorded`] and [`StreamEvent`]
//! - **`recorder`** (default) - [`TraceWriter`] for dumping observed events
//!   to JSON Lines files (enables `serde`)

mod assertion;
mod clock;
mod cold;
mod config;
mod error;
mod event;
mod harness;
mod outcome;
mod recorded;
mod recording;
mod source;
mod subject;
mod time;
mod variable;

#[cfg(feature = "recorder")]
#[cfg_attr(docsrs, doc(cfg(feature = "recorder")))]
mod trace;

pub use assertion::Assertion;
pub use clock::{ClockHandle, OpGuard, VirtualClock};
pub use cold::ColdSource;
pub use config::HarnessConfig;
pub use error::Error;
pub use event::{events_equal, Element, StreamError, StreamEvent};
pub use harness::Harness;
pub use outcome::{AssertionResult, Location};
pub use recorded::{
    any, completed, error, failed, next, recorded_equal, sequence_contains, sequences_equal,
    Recorded, RecordedSequence,
};
pub use recording::Recording;
pub use source::{Observer, Sink, Source, Subscription};
pub use subject::Subject;
pub use time::{times_equal, VirtualTime, ANY_TIME};
pub use variable::Variable;

#[cfg(feature = "recorder")]
#[cfg_attr(docsrs, doc(cfg(feature = "recorder")))]
pub use trace::TraceWriter;

/// Convenience alias for `Result<T, metronome::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
