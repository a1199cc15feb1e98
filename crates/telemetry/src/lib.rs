#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Beacon Telemetry
//!
//! Process-wide telemetry bus for interactive applications.
//!
//! This crate provides:
//! - [`TelemetryBus`] -- one broadcast channel per [`MetricKind`], typed
//!   `report_*` entry points and `on_*` subscriptions
//! - [`record`] -- the immutable, timestamped record model
//! - [`navigation`] -- derivation of navigation records from the host
//!   framework's push/pop/replace/remove callbacks
//!
//! Producers never block and never see consumer failures. A consumer only
//! receives what is published while it is subscribed.
//!
//! ```
//! use std::time::Duration;
//! use beacon_telemetry::{PaintType, TelemetryBus};
//!
//! let bus = TelemetryBus::global();
//! bus.report_paint("Hero", Duration::from_millis(16), PaintType::FirstPaint)
//!     .unwrap();
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod navigation;
pub mod record;

pub use beacon_eventbus::{ChannelStats, Subscription};
pub use bus::TelemetryBus;
pub use config::TelemetryConfig;
pub use error::{Error, Result};
pub use navigation::{NavigationObserver, NavigationTracker, Route, RouteSettings};
pub use record::{
    Attributes, ErrorRecord, ErrorReport, LayoutShift, LayoutShiftCause, LayoutShiftRecord,
    MetricKind, MetricRecord, Navigation, NavigationRecord, NavigationType, PageLoad,
    PageLoadRecord, Paint, PaintRecord, PaintType, Performance, PerformanceRecord, Record,
    StackTrace, UserInteraction, UserInteractionRecord,
};
