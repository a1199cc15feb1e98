//! Metric record model.
//!
//! Every observation is a [`Record`]: an envelope carrying the capture
//! timestamp, optional free-form [`Attributes`], and a kind-specific payload.
//! [`MetricRecord`] is the closed union over the seven kinds, for consumers
//! that handle more than one kind in one place.
//!
//! Records are built with the `with_*` methods and become read-only once
//! published: channels wrap them in an [`Arc`] and every subscriber sees the
//! same instance.
//!
//! Values are taken as given. Nothing here clamps or range-checks durations
//! or scores.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Free-form key/value context attached to a record.
pub type Attributes = HashMap<String, serde_json::Value>;

macro_rules! labelled_enum {
    ($ty:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable snake_case label, identical to the serialized form.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Kinds and enumerations
// ---------------------------------------------------------------------------

/// The closed set of observation kinds. One channel exists per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Timing of a named operation.
    Performance,
    /// Time to load a page or screen.
    PageLoad,
    /// An application error.
    Error,
    /// A user action on a screen.
    UserInteraction,
    /// A navigation transition between routes.
    Navigation,
    /// A paint milestone of a component.
    Paint,
    /// A layout shift of a component.
    LayoutShift,
}

impl MetricKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Performance,
        Self::PageLoad,
        Self::Error,
        Self::UserInteraction,
        Self::Navigation,
        Self::Paint,
        Self::LayoutShift,
    ];
}

labelled_enum!(MetricKind {
    Performance => "performance",
    PageLoad => "page_load",
    Error => "error",
    UserInteraction => "user_interaction",
    Navigation => "navigation",
    Paint => "paint",
    LayoutShift => "layout_shift",
});

/// How a navigation transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationType {
    /// A route was pushed on top of the stack.
    Push,
    /// The top route was popped.
    Pop,
    /// A route was replaced in place.
    Replace,
    /// A route was removed from the stack.
    Remove,
}

labelled_enum!(NavigationType {
    Push => "push",
    Pop => "pop",
    Replace => "replace",
    Remove => "remove",
});

/// Paint milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintType {
    /// First pixels on screen.
    FirstPaint,
    /// First meaningful content on screen.
    FirstContentfulPaint,
    /// Largest content element rendered.
    LargestContentfulPaint,
}

labelled_enum!(PaintType {
    FirstPaint => "first_paint",
    FirstContentfulPaint => "first_contentful_paint",
    LargestContentfulPaint => "largest_contentful_paint",
});

/// What triggered a layout shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutShiftCause {
    /// An animation moved content.
    Animation,
    /// Scrolling moved content.
    Scroll,
    /// The viewport or a container was resized.
    Resize,
    /// Anything else.
    Other,
}

labelled_enum!(LayoutShiftCause {
    Animation => "animation",
    Scroll => "scroll",
    Resize => "resize",
    Other => "other",
});

// ---------------------------------------------------------------------------
// Record envelope
// ---------------------------------------------------------------------------

/// Timestamped observation of one kind.
///
/// The timestamp is taken when the record is constructed, not when it is
/// delivered. Use [`with_timestamp`](Self::with_timestamp) to supply the
/// capture time explicitly.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use beacon_telemetry::record::{Performance, Record};
///
/// let record = Record::new(Performance::new("db_query", Duration::from_millis(12)))
///     .with_attribute("table", "users");
///
/// assert_eq!(record.data().name, "db_query");
/// assert_eq!(record.attribute("table"), Some(&"users".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<K> {
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<Attributes>,
    #[serde(flatten)]
    data: K,
}

impl<K> Record<K> {
    /// Wrap a payload, stamping it with the current time.
    #[must_use]
    pub fn new(data: K) -> Self {
        Self {
            timestamp: Utc::now(),
            attributes: None,
            data,
        }
    }

    /// Override the capture timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Replace the attribute map.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Add one attribute, replacing any previous value under `key`.
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Capture time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Attached attributes, if any were supplied.
    #[must_use]
    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }

    /// Look up a single attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.as_ref()?.get(key)
    }

    /// Kind-specific payload.
    #[must_use]
    pub fn data(&self) -> &K {
        &self.data
    }

    /// Consume the record, returning its payload.
    #[must_use]
    pub fn into_data(self) -> K {
        self.data
    }
}

impl<K: Payload> Record<K> {
    /// Kind of this record.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        K::KIND
    }
}

impl<K: Payload + DeserializeOwned> Record<K> {
    /// Build a record from an untyped JSON object.
    ///
    /// Durations are given in milliseconds. A missing `timestamp` defaults
    /// to now. Missing or ill-typed required fields yield
    /// [`Error::MalformedRecord`].
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|err| Error::MalformedRecord {
            kind: K::KIND,
            reason: err.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

mod sealed {
    pub trait Sealed {}
}

/// Kind-specific payload of a [`Record`].
///
/// Implemented for exactly the seven payload types in this module.
pub trait Payload: sealed::Sealed + Clone + Send + Sync + 'static {
    /// Kind this payload belongs to.
    const KIND: MetricKind;

    /// Lift a shared record into the [`MetricRecord`] union.
    fn wrap(record: Arc<Record<Self>>) -> MetricRecord;
}

/// Timing of a named operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    /// Operation name.
    pub name: String,
    /// How long the operation took (milliseconds when serialized).
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl Performance {
    /// Create a performance payload.
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

/// Time to load a page or screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLoad {
    /// Page or screen name.
    pub page_name: String,
    /// Load time (milliseconds when serialized).
    #[serde(with = "duration_ms")]
    pub load_time: Duration,
    /// How the page was reached, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<String>,
}

impl PageLoad {
    /// Create a page-load payload.
    pub fn new(page_name: impl Into<String>, load_time: Duration) -> Self {
        Self {
            page_name: page_name.into(),
            load_time,
            transition_type: None,
        }
    }

    /// Set the transition type.
    pub fn with_transition_type(mut self, transition_type: impl Into<String>) -> Self {
        self.transition_type = Some(transition_type.into());
        self
    }
}

/// Opaque stack trace text attached to an [`ErrorReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackTrace(String);

impl StackTrace {
    /// Wrap an already rendered trace.
    pub fn new(trace: impl Into<String>) -> Self {
        Self(trace.into())
    }

    /// Capture the current thread's backtrace, regardless of
    /// `RUST_BACKTRACE`.
    #[must_use]
    pub fn capture() -> Self {
        Self(std::backtrace::Backtrace::force_capture().to_string())
    }

    /// Trace text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An application error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error description.
    pub error: String,
    /// Where the error happened, if captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<StackTrace>,
}

impl ErrorReport {
    /// Create an error payload without a stack trace.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            stack_trace: None,
        }
    }

    /// Create an error payload from any [`std::error::Error`], rendering its
    /// source chain into the description.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut description = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            description.push_str(": ");
            description.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(description)
    }

    /// Attach a stack trace.
    pub fn with_stack_trace(mut self, stack_trace: StackTrace) -> Self {
        self.stack_trace = Some(stack_trace);
        self
    }
}

/// A user action on a screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInteraction {
    /// Screen the action happened on.
    pub screen_name: String,
    /// Action performed (tap, scroll, submit, ...).
    pub action_type: String,
    /// Time until the UI responded, if measured.
    #[serde(
        default,
        with = "duration_ms::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time: Option<Duration>,
}

impl UserInteraction {
    /// Create a user-interaction payload.
    pub fn new(screen_name: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            action_type: action_type.into(),
            response_time: None,
        }
    }

    /// Set the measured response time.
    pub fn with_response_time(mut self, response_time: Duration) -> Self {
        self.response_time = Some(response_time);
        self
    }
}

/// A navigation transition.
///
/// `from_route` is always the origin and `to_route` the destination; the
/// [`NavigationType`] says how the transition happened. A route without a
/// declared name leaves its field unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    /// Origin route name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_route: Option<String>,
    /// Destination route name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_route: Option<String>,
    /// Kind of transition.
    pub navigation_type: NavigationType,
    /// How long the transition took, if measured.
    #[serde(
        default,
        with = "duration_ms::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
}

impl Navigation {
    /// Create a navigation payload.
    pub fn new(
        from_route: Option<String>,
        to_route: Option<String>,
        navigation_type: NavigationType,
    ) -> Self {
        Self {
            from_route,
            to_route,
            navigation_type,
            duration: None,
        }
    }

    /// Set the measured transition duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// A paint milestone of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paint {
    /// Component that painted.
    pub component_name: String,
    /// Time spent painting (milliseconds when serialized).
    #[serde(with = "duration_ms")]
    pub paint_duration: Duration,
    /// Which milestone this is.
    pub paint_type: PaintType,
}

impl Paint {
    /// Create a paint payload.
    pub fn new(
        component_name: impl Into<String>,
        paint_duration: Duration,
        paint_type: PaintType,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            paint_duration,
            paint_type,
        }
    }
}

/// A layout shift of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutShift {
    /// Component that shifted.
    pub component_name: String,
    /// Shift score; expected non-negative but not checked.
    pub shift_score: f64,
    /// What triggered the shift, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<LayoutShiftCause>,
}

impl LayoutShift {
    /// Create a layout-shift payload.
    pub fn new(component_name: impl Into<String>, shift_score: f64) -> Self {
        Self {
            component_name: component_name.into(),
            shift_score,
            cause: None,
        }
    }

    /// Set the cause.
    pub fn with_cause(mut self, cause: LayoutShiftCause) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// [`Record`] of a [`Performance`] payload.
pub type PerformanceRecord = Record<Performance>;
/// [`Record`] of a [`PageLoad`] payload.
pub type PageLoadRecord = Record<PageLoad>;
/// [`Record`] of an [`ErrorReport`] payload.
pub type ErrorRecord = Record<ErrorReport>;
/// [`Record`] of a [`UserInteraction`] payload.
pub type UserInteractionRecord = Record<UserInteraction>;
/// [`Record`] of a [`Navigation`] payload.
pub type NavigationRecord = Record<Navigation>;
/// [`Record`] of a [`Paint`] payload.
pub type PaintRecord = Record<Paint>;
/// [`Record`] of a [`LayoutShift`] payload.
pub type LayoutShiftRecord = Record<LayoutShift>;

// ---------------------------------------------------------------------------
// MetricRecord
// ---------------------------------------------------------------------------

/// Any published record, tagged by kind.
///
/// Serializes as the record's fields plus a `"kind"` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricRecord {
    /// A performance record.
    Performance(Arc<PerformanceRecord>),
    /// A page-load record.
    PageLoad(Arc<PageLoadRecord>),
    /// An error record.
    Error(Arc<ErrorRecord>),
    /// A user-interaction record.
    UserInteraction(Arc<UserInteractionRecord>),
    /// A navigation record.
    Navigation(Arc<NavigationRecord>),
    /// A paint record.
    Paint(Arc<PaintRecord>),
    /// A layout-shift record.
    LayoutShift(Arc<LayoutShiftRecord>),
}

macro_rules! payload_kind {
    ($payload:ty => $variant:ident) => {
        impl sealed::Sealed for $payload {}

        impl Payload for $payload {
            const KIND: MetricKind = MetricKind::$variant;

            fn wrap(record: Arc<Record<Self>>) -> MetricRecord {
                MetricRecord::$variant(record)
            }
        }
    };
}

payload_kind!(Performance => Performance);
payload_kind!(PageLoad => PageLoad);
payload_kind!(ErrorReport => Error);
payload_kind!(UserInteraction => UserInteraction);
payload_kind!(Navigation => Navigation);
payload_kind!(Paint => Paint);
payload_kind!(LayoutShift => LayoutShift);

impl<K: Payload> From<Record<K>> for MetricRecord {
    fn from(record: Record<K>) -> Self {
        K::wrap(Arc::new(record))
    }
}

impl MetricRecord {
    /// Kind of the wrapped record.
    #[must_use]
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Performance(_) => MetricKind::Performance,
            Self::PageLoad(_) => MetricKind::PageLoad,
            Self::Error(_) => MetricKind::Error,
            Self::UserInteraction(_) => MetricKind::UserInteraction,
            Self::Navigation(_) => MetricKind::Navigation,
            Self::Paint(_) => MetricKind::Paint,
            Self::LayoutShift(_) => MetricKind::LayoutShift,
        }
    }

    /// Capture time of the wrapped record.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Performance(r) => r.timestamp(),
            Self::PageLoad(r) => r.timestamp(),
            Self::Error(r) => r.timestamp(),
            Self::UserInteraction(r) => r.timestamp(),
            Self::Navigation(r) => r.timestamp(),
            Self::Paint(r) => r.timestamp(),
            Self::LayoutShift(r) => r.timestamp(),
        }
    }

    /// Attributes of the wrapped record.
    #[must_use]
    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Self::Performance(r) => r.attributes(),
            Self::PageLoad(r) => r.attributes(),
            Self::Error(r) => r.attributes(),
            Self::UserInteraction(r) => r.attributes(),
            Self::Navigation(r) => r.attributes(),
            Self::Paint(r) => r.attributes(),
            Self::LayoutShift(r) => r.attributes(),
        }
    }

    /// Build a record of `kind` from an untyped JSON object.
    ///
    /// See [`Record::from_json`] for the accepted shape.
    pub fn from_json(kind: MetricKind, value: serde_json::Value) -> Result<Self> {
        fn decode<K: Payload + DeserializeOwned>(value: serde_json::Value) -> Result<MetricRecord> {
            Record::<K>::from_json(value).map(MetricRecord::from)
        }

        match kind {
            MetricKind::Performance => decode::<Performance>(value),
            MetricKind::PageLoad => decode::<PageLoad>(value),
            MetricKind::Error => decode::<ErrorReport>(value),
            MetricKind::UserInteraction => decode::<UserInteraction>(value),
            MetricKind::Navigation => decode::<Navigation>(value),
            MetricKind::Paint => decode::<Paint>(value),
            MetricKind::LayoutShift => decode::<LayoutShift>(value),
        }
    }
}

/// Serde adapter storing a [`Duration`] as fractional milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        from_millis::<D>(f64::deserialize(deserializer)?)
    }

    fn from_millis<'de, D: Deserializer<'de>>(millis: f64) -> Result<Duration, D::Error> {
        let nanos = (millis * 1_000_000.0).round();
        if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
            return Err(D::Error::custom(format!(
                "{millis} is not a valid duration in milliseconds"
            )));
        }
        Ok(Duration::from_nanos(nanos as u64))
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => serializer.serialize_some(&(duration.as_secs_f64() * 1000.0)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<f64>::deserialize(deserializer)?
                .map(super::from_millis::<D>)
                .transpose()
        }
    }
}
