//! Typed multi-channel telemetry bus.
//!
//! [`TelemetryBus`] owns one [`Channel`] per [`MetricKind`]. Producers call
//! the `report_*` shortcuts (or `publish_*` with a pre-built record carrying
//! attributes or an explicit timestamp); consumers subscribe per kind with
//! `on_*`, or to everything at once with [`TelemetryBus::on_all`].
//!
//! The handle is cheap to clone; clones share the same channels. The
//! process-wide instance lives behind [`TelemetryBus::global`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use beacon_eventbus::{Channel, ChannelStats, Subscription};
use futures::stream::{self, BoxStream, StreamExt};

use crate::config::TelemetryConfig;
use crate::error::{Error, Result};
use crate::record::{
    ErrorRecord, ErrorReport, LayoutShift, LayoutShiftCause, LayoutShiftRecord, MetricKind,
    MetricRecord, Navigation, NavigationRecord, NavigationType, PageLoad, PageLoadRecord, Paint,
    PaintRecord, PaintType, Performance, PerformanceRecord, Record, StackTrace, UserInteraction,
    UserInteractionRecord,
};

static GLOBAL: OnceLock<TelemetryBus> = OnceLock::new();

struct Channels {
    capacity: usize,
    disposed: AtomicBool,
    performance: Channel<PerformanceRecord>,
    page_load: Channel<PageLoadRecord>,
    error: Channel<ErrorRecord>,
    user_interaction: Channel<UserInteractionRecord>,
    navigation: Channel<NavigationRecord>,
    paint: Channel<PaintRecord>,
    layout_shift: Channel<LayoutShiftRecord>,
}

impl Channels {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            disposed: AtomicBool::new(false),
            performance: Channel::new(MetricKind::Performance.as_str(), capacity),
            page_load: Channel::new(MetricKind::PageLoad.as_str(), capacity),
            error: Channel::new(MetricKind::Error.as_str(), capacity),
            user_interaction: Channel::new(MetricKind::UserInteraction.as_str(), capacity),
            navigation: Channel::new(MetricKind::Navigation.as_str(), capacity),
            paint: Channel::new(MetricKind::Paint.as_str(), capacity),
            layout_shift: Channel::new(MetricKind::LayoutShift.as_str(), capacity),
        }
    }

    fn stats(&self, kind: MetricKind) -> ChannelStats {
        match kind {
            MetricKind::Performance => self.performance.stats(),
            MetricKind::PageLoad => self.page_load.stats(),
            MetricKind::Error => self.error.stats(),
            MetricKind::UserInteraction => self.user_interaction.stats(),
            MetricKind::Navigation => self.navigation.stats(),
            MetricKind::Paint => self.paint.stats(),
            MetricKind::LayoutShift => self.layout_shift.stats(),
        }
    }

    fn close_all(&self) {
        self.performance.close();
        self.page_load.close();
        self.error.close();
        self.user_interaction.close();
        self.navigation.close();
        self.paint.close();
        self.layout_shift.close();
    }
}

/// Process-wide telemetry event bus.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use beacon_telemetry::TelemetryBus;
///
/// let bus = TelemetryBus::default();
/// let mut sub = bus.on_performance().unwrap();
///
/// bus.report_performance("db_query", Duration::from_millis(12)).unwrap();
///
/// let record = sub.try_recv().unwrap().expect("record delivered");
/// assert_eq!(record.data().name, "db_query");
///
/// bus.dispose();
/// assert!(bus.report_performance("late", Duration::ZERO).is_err());
/// ```
#[derive(Clone)]
pub struct TelemetryBus {
    inner: Arc<Channels>,
}

macro_rules! kind_endpoints {
    ($($field:ident: $record:ident => $kind:ident, $publish:ident, $on:ident;)+) => {
        impl TelemetryBus {
            $(
                #[doc = concat!(
                    "Publish a pre-built [`", stringify!($record), "`] on the `",
                    stringify!($field), "` channel.\n\n",
                    "Fails with [`Error::ClosedChannel`] after [`dispose`](Self::dispose)."
                )]
                pub fn $publish(&self, record: $record) -> Result<()> {
                    self.inner
                        .$field
                        .publish(record)
                        .map_err(|err| Error::from_channel(MetricKind::$kind, err))
                }

                #[doc = concat!(
                    "Subscribe to the `", stringify!($field), "` channel.\n\n",
                    "Only records published after this call are delivered."
                )]
                pub fn $on(&self) -> Result<Subscription<$record>> {
                    self.inner
                        .$field
                        .subscribe()
                        .map_err(|err| Error::from_channel(MetricKind::$kind, err))
                }
            )+
        }
    };
}

kind_endpoints! {
    performance: PerformanceRecord => Performance, publish_performance, on_performance;
    page_load: PageLoadRecord => PageLoad, publish_page_load, on_page_load;
    error: ErrorRecord => Error, publish_error, on_error;
    user_interaction: UserInteractionRecord => UserInteraction, publish_user_interaction, on_user_interaction;
    navigation: NavigationRecord => Navigation, publish_navigation, on_navigation;
    paint: PaintRecord => Paint, publish_paint, on_paint;
    layout_shift: LayoutShiftRecord => LayoutShift, publish_layout_shift, on_layout_shift;
}

impl TelemetryBus {
    /// Create a standalone bus.
    ///
    /// Use this to hand a bus to components explicitly; the process-wide
    /// instance is [`TelemetryBus::global`].
    pub fn new(config: TelemetryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(&config))
    }

    fn build(config: &TelemetryConfig) -> Self {
        tracing::debug!(
            channel_capacity = config.channel_capacity,
            "telemetry bus created"
        );
        Self {
            inner: Arc::new(Channels::new(config.channel_capacity)),
        }
    }

    /// The process-wide bus, created on first use.
    ///
    /// The first call reads [`TelemetryConfig::from_env`]; an invalid
    /// environment is logged and replaced by defaults.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| {
            let config = TelemetryConfig::from_env().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "invalid telemetry configuration, using defaults");
                TelemetryConfig::default()
            });
            Self::build(&config)
        })
    }

    /// Create the process-wide bus with an explicit configuration.
    ///
    /// Must run before anything calls [`TelemetryBus::global`]; afterwards
    /// it fails with [`Error::AlreadyInitialized`].
    pub fn install_global(config: TelemetryConfig) -> Result<&'static Self> {
        let bus = Self::new(config)?;
        GLOBAL.set(bus).map_err(|_| Error::AlreadyInitialized)?;
        Ok(Self::global())
    }

    // -- producer shortcuts --------------------------------------------------

    /// Report the duration of a named operation.
    ///
    /// Stamped now, without attributes; use
    /// [`publish_performance`](Self::publish_performance) to set either.
    pub fn report_performance(&self, name: impl Into<String>, duration: Duration) -> Result<()> {
        self.publish_performance(Record::new(Performance::new(name, duration)))
    }

    /// Report how long a page took to load.
    ///
    /// Stamped now, without attributes; use
    /// [`publish_page_load`](Self::publish_page_load) to set either.
    pub fn report_page_load(
        &self,
        page_name: impl Into<String>,
        load_time: Duration,
        transition_type: Option<String>,
    ) -> Result<()> {
        let mut page_load = PageLoad::new(page_name, load_time);
        page_load.transition_type = transition_type;
        self.publish_page_load(Record::new(page_load))
    }

    /// Report an application error.
    ///
    /// Stamped now, without attributes; use
    /// [`publish_error`](Self::publish_error) to set either.
    pub fn report_error(
        &self,
        error: impl Into<String>,
        stack_trace: Option<StackTrace>,
    ) -> Result<()> {
        let mut report = ErrorReport::new(error);
        report.stack_trace = stack_trace;
        self.publish_error(Record::new(report))
    }

    /// Report a user action on a screen.
    ///
    /// Stamped now, without attributes; use
    /// [`publish_user_interaction`](Self::publish_user_interaction) to set either.
    pub fn report_user_interaction(
        &self,
        screen_name: impl Into<String>,
        action_type: impl Into<String>,
        response_time: Option<Duration>,
    ) -> Result<()> {
        let mut interaction = UserInteraction::new(screen_name, action_type);
        interaction.response_time = response_time;
        self.publish_user_interaction(Record::new(interaction))
    }

    /// Report a navigation transition.
    ///
    /// Stamped now, without attributes; use
    /// [`publish_navigation`](Self::publish_navigation) to set either.
    pub fn report_navigation(
        &self,
        from_route: Option<String>,
        to_route: Option<String>,
        navigation_type: NavigationType,
        duration: Option<Duration>,
    ) -> Result<()> {
        let mut navigation = Navigation::new(from_route, to_route, navigation_type);
        navigation.duration = duration;
        self.publish_navigation(Record::new(navigation))
    }

    /// Report a paint milestone.
    ///
    /// Stamped now, without attributes; use
    /// [`publish_paint`](Self::publish_paint) to set either.
    pub fn report_paint(
        &self,
        component_name: impl Into<String>,
        paint_duration: Duration,
        paint_type: PaintType,
    ) -> Result<()> {
        self.publish_paint(Record::new(Paint::new(
            component_name,
            paint_duration,
            paint_type,
        )))
    }

    /// Report a layout shift.
    ///
    /// Stamped now, without attributes; use
    /// [`publish_layout_shift`](Self::publish_layout_shift) to set either.
    pub fn report_layout_shift(
        &self,
        component_name: impl Into<String>,
        shift_score: f64,
        cause: Option<LayoutShiftCause>,
    ) -> Result<()> {
        let mut shift = LayoutShift::new(component_name, shift_score);
        shift.cause = cause;
        self.publish_layout_shift(Record::new(shift))
    }

    /// Publish a record of any kind on its channel.
    pub fn report(&self, record: impl Into<MetricRecord>) -> Result<()> {
        let record = record.into();
        let kind = record.kind();
        let channels = &self.inner;
        let published = match record {
            MetricRecord::Performance(r) => channels.performance.publish_shared(r),
            MetricRecord::PageLoad(r) => channels.page_load.publish_shared(r),
            MetricRecord::Error(r) => channels.error.publish_shared(r),
            MetricRecord::UserInteraction(r) => channels.user_interaction.publish_shared(r),
            MetricRecord::Navigation(r) => channels.navigation.publish_shared(r),
            MetricRecord::Paint(r) => channels.paint.publish_shared(r),
            MetricRecord::LayoutShift(r) => channels.layout_shift.publish_shared(r),
        };
        published.map_err(|err| Error::from_channel(kind, err))
    }

    // -- consumers -----------------------------------------------------------

    /// Subscribe to every kind at once.
    ///
    /// Records of one kind keep their publish order; there is no ordering
    /// across kinds. The stream ends after [`dispose`](Self::dispose).
    pub fn on_all(&self) -> Result<BoxStream<'static, MetricRecord>> {
        let streams = vec![
            self.on_performance()?
                .into_stream()
                .map(MetricRecord::Performance)
                .boxed(),
            self.on_page_load()?
                .into_stream()
                .map(MetricRecord::PageLoad)
                .boxed(),
            self.on_error()?
                .into_stream()
                .map(MetricRecord::Error)
                .boxed(),
            self.on_user_interaction()?
                .into_stream()
                .map(MetricRecord::UserInteraction)
                .boxed(),
            self.on_navigation()?
                .into_stream()
                .map(MetricRecord::Navigation)
                .boxed(),
            self.on_paint()?
                .into_stream()
                .map(MetricRecord::Paint)
                .boxed(),
            self.on_layout_shift()?
                .into_stream()
                .map(MetricRecord::LayoutShift)
                .boxed(),
        ];
        Ok(stream::select_all(streams).boxed())
    }

    // -- lifecycle -----------------------------------------------------------

    /// Close every channel.
    ///
    /// Subscribers drain what they already received and then see
    /// end-of-sequence. Later reports and subscriptions fail with
    /// [`Error::ClosedChannel`]. Calling this again is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.close_all();
        tracing::info!("telemetry bus disposed");
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Per-subscriber buffer size of every channel.
    #[must_use]
    pub fn channel_capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Counters of one kind's channel.
    #[must_use]
    pub fn channel_stats(&self, kind: MetricKind) -> ChannelStats {
        self.inner.stats(kind)
    }

    /// Counters of every channel, in [`MetricKind::ALL`] order.
    #[must_use]
    pub fn stats(&self) -> Vec<(MetricKind, ChannelStats)> {
        MetricKind::ALL
            .into_iter()
            .map(|kind| (kind, self.inner.stats(kind)))
            .collect()
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::build(&TelemetryConfig::default())
    }
}

impl std::fmt::Debug for TelemetryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBus")
            .field("channel_capacity", &self.inner.capacity)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::config::MAX_CHANNEL_CAPACITY;

    #[rstest]
    #[case(0)]
    #[case(MAX_CHANNEL_CAPACITY + 1)]
    #[case(usize::MAX / 2)]
    fn new_rejects_invalid_config(#[case] channel_capacity: usize) {
        let err = TelemetryBus::new(
            TelemetryConfig::default().with_channel_capacity(channel_capacity),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn clones_share_channels() {
        let bus = TelemetryBus::default();
        let producer = bus.clone();
        let mut sub = bus.on_error().unwrap();

        producer.report_error("boom", None).unwrap();

        let record = sub.try_recv().unwrap().unwrap();
        assert_eq!(record.data().error, "boom");
    }

    #[test]
    fn kinds_are_isolated() {
        let bus = TelemetryBus::default();
        let mut paints = bus.on_paint().unwrap();

        bus.report_performance("x", Duration::from_millis(1)).unwrap();

        assert!(paints.try_recv().unwrap().is_none());
        assert_eq!(bus.channel_stats(MetricKind::Performance).published, 1);
        assert_eq!(bus.channel_stats(MetricKind::Paint).published, 0);
    }

    #[test]
    fn report_dispatches_by_kind() {
        let bus = TelemetryBus::default();
        let mut shifts = bus.on_layout_shift().unwrap();

        let record = Record::new(LayoutShift::new("Feed", 0.1)).with_attribute("row", 3);
        bus.report(record.clone()).unwrap();

        let received = shifts.try_recv().unwrap().unwrap();
        assert_eq!(*received, record);
    }

    #[test]
    fn dispose_is_idempotent_and_closes_every_channel() {
        let bus = TelemetryBus::default();
        bus.dispose();
        bus.dispose();

        assert!(bus.is_disposed());
        for (kind, stats) in bus.stats() {
            assert!(stats.closed, "{kind} channel should be closed");
        }
    }

    #[test]
    fn debug_shows_state() {
        let bus = TelemetryBus::new(TelemetryConfig::default().with_channel_capacity(8)).unwrap();
        assert_eq!(
            format!("{bus:?}"),
            "TelemetryBus { channel_capacity: 8, disposed: false }"
        );
    }
}
