//! Navigation tracking.
//!
//! The host UI framework reports route-stack changes through four callbacks
//! (push, pop, replace, remove). Each callback carries both endpoints, but
//! their positions mean different things per callback. [`Transition::derive`]
//! maps every callback onto one canonical origin/destination pair, and
//! [`NavigationTracker`] publishes the result on the bus.
//!
//! | Callback                     | `from_route`     | `to_route`       |
//! |------------------------------|------------------|------------------|
//! | `push(route, previous)`      | `previous`       | `route`          |
//! | `pop(route, previous)`       | `route`          | `previous`       |
//! | `replace(new, old)`          | `new`            | `old`            |
//! | `remove(route, previous)`    | `previous`       | `route`          |
//!
//! Tracking is stateless: one callback, one record.

use std::fmt;

use crate::bus::TelemetryBus;
use crate::error::Result;
use crate::record::{Navigation, NavigationType, Record};

/// Opaque route handle supplied by the host framework.
///
/// Only the declared name is read.
pub trait Route {
    /// Declared route name, if the route has one.
    fn name(&self) -> Option<&str>;
}

/// Minimal [`Route`] implementation carrying just a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSettings {
    name: Option<String>,
}

impl RouteSettings {
    /// A route with a declared name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// A route without a declared name.
    #[must_use]
    pub fn unnamed() -> Self {
        Self::default()
    }
}

impl Route for RouteSettings {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// One raw callback from the host framework.
#[derive(Clone, Copy)]
pub enum NavigationNotification<'a> {
    /// `route` was pushed on top of `previous_route`.
    Push {
        /// Route that became visible.
        route: Option<&'a dyn Route>,
        /// Route that was on top before.
        previous_route: Option<&'a dyn Route>,
    },
    /// `route` was popped, revealing `previous_route`.
    Pop {
        /// Route being popped.
        route: Option<&'a dyn Route>,
        /// Route revealed underneath.
        previous_route: Option<&'a dyn Route>,
    },
    /// `old_route` was replaced by `new_route`.
    Replace {
        /// Replacement route.
        new_route: Option<&'a dyn Route>,
        /// Route that was replaced.
        old_route: Option<&'a dyn Route>,
    },
    /// `route` was removed; `previous_route` was below it.
    Remove {
        /// Route being removed.
        route: Option<&'a dyn Route>,
        /// Route below the removed one.
        previous_route: Option<&'a dyn Route>,
    },
}

impl NavigationNotification<'_> {
    /// Transition type this callback stands for.
    #[must_use]
    pub fn navigation_type(&self) -> NavigationType {
        match self {
            Self::Push { .. } => NavigationType::Push,
            Self::Pop { .. } => NavigationType::Pop,
            Self::Replace { .. } => NavigationType::Replace,
            Self::Remove { .. } => NavigationType::Remove,
        }
    }
}

impl fmt::Debug for NavigationNotification<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |route: Option<&dyn Route>| route.map(|r| r.name().map(str::to_owned));
        let (first, second, a, b) = match *self {
            Self::Push {
                route,
                previous_route,
            }
            | Self::Pop {
                route,
                previous_route,
            }
            | Self::Remove {
                route,
                previous_route,
            } => ("route", "previous_route", route, previous_route),
            Self::Replace {
                new_route,
                old_route,
            } => ("new_route", "old_route", new_route, old_route),
        };
        f.debug_struct(self.navigation_type().as_str())
            .field(first, &name(a))
            .field(second, &name(b))
            .finish()
    }
}

/// Canonical origin/destination pair derived from one callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Origin route name.
    pub from_route: Option<String>,
    /// Destination route name.
    pub to_route: Option<String>,
    /// Transition type.
    pub navigation_type: NavigationType,
}

impl Transition {
    /// Map a callback onto its origin and destination.
    ///
    /// Unnamed or absent routes leave the corresponding field unset.
    #[must_use]
    pub fn derive(notification: NavigationNotification<'_>) -> Self {
        let (from, to) = match notification {
            NavigationNotification::Push {
                route,
                previous_route,
            } => (previous_route, route),
            NavigationNotification::Pop {
                route,
                previous_route,
            } => (route, previous_route),
            NavigationNotification::Replace {
                new_route,
                old_route,
            } => (new_route, old_route),
            NavigationNotification::Remove {
                route,
                previous_route,
            } => (previous_route, route),
        };

        Self {
            from_route: route_name(from),
            to_route: route_name(to),
            navigation_type: notification.navigation_type(),
        }
    }
}

impl From<Transition> for Navigation {
    fn from(transition: Transition) -> Self {
        Self::new(
            transition.from_route,
            transition.to_route,
            transition.navigation_type,
        )
    }
}

fn route_name(route: Option<&dyn Route>) -> Option<String> {
    route.and_then(|route| route.name()).map(str::to_owned)
}

/// Route-stack callbacks exposed by the host framework.
///
/// Register an implementation with the host's navigator.
pub trait NavigationObserver {
    /// `route` was pushed on top of `previous_route`.
    fn did_push(&self, route: Option<&dyn Route>, previous_route: Option<&dyn Route>)
    -> Result<()>;

    /// `route` was popped, revealing `previous_route`.
    fn did_pop(&self, route: Option<&dyn Route>, previous_route: Option<&dyn Route>)
    -> Result<()>;

    /// `old_route` was replaced by `new_route`.
    fn did_replace(&self, new_route: Option<&dyn Route>, old_route: Option<&dyn Route>)
    -> Result<()>;

    /// `route` was removed from above `previous_route`.
    fn did_remove(
        &self,
        route: Option<&dyn Route>,
        previous_route: Option<&dyn Route>,
    ) -> Result<()>;
}

/// Publishes one navigation record per host callback.
///
/// # Examples
///
/// ```
/// use beacon_telemetry::TelemetryBus;
/// use beacon_telemetry::navigation::{NavigationObserver, NavigationTracker, RouteSettings};
///
/// let bus = TelemetryBus::default();
/// let mut sub = bus.on_navigation().unwrap();
/// let tracker = NavigationTracker::new(bus.clone());
///
/// let home = RouteSettings::named("Home");
/// let details = RouteSettings::named("Details");
/// tracker.did_push(Some(&details), Some(&home)).unwrap();
///
/// let record = sub.try_recv().unwrap().unwrap();
/// assert_eq!(record.data().from_route.as_deref(), Some("Home"));
/// assert_eq!(record.data().to_route.as_deref(), Some("Details"));
/// ```
#[derive(Debug, Clone)]
pub struct NavigationTracker {
    bus: TelemetryBus,
}

impl NavigationTracker {
    /// Track into the given bus.
    #[must_use]
    pub fn new(bus: TelemetryBus) -> Self {
        Self { bus }
    }

    /// Track into the process-wide bus.
    #[must_use]
    pub fn global() -> Self {
        Self::new(TelemetryBus::global().clone())
    }

    /// Derive and publish the record for one callback.
    ///
    /// The only failure is a disposed bus.
    pub fn track(&self, notification: NavigationNotification<'_>) -> Result<()> {
        let transition = Transition::derive(notification);
        tracing::trace!(
            from = ?transition.from_route,
            to = ?transition.to_route,
            navigation_type = %transition.navigation_type,
            "navigation transition"
        );
        self.bus
            .publish_navigation(Record::new(Navigation::from(transition)))
    }
}

impl NavigationObserver for NavigationTracker {
    fn did_push(
        &self,
        route: Option<&dyn Route>,
        previous_route: Option<&dyn Route>,
    ) -> Result<()> {
        self.track(NavigationNotification::Push {
            route,
            previous_route,
        })
    }

    fn did_pop(
        &self,
        route: Option<&dyn Route>,
        previous_route: Option<&dyn Route>,
    ) -> Result<()> {
        self.track(NavigationNotification::Pop {
            route,
            previous_route,
        })
    }

    fn did_replace(
        &self,
        new_route: Option<&dyn Route>,
        old_route: Option<&dyn Route>,
    ) -> Result<()> {
        self.track(NavigationNotification::Replace {
            new_route,
            old_route,
        })
    }

    fn did_remove(
        &self,
        route: Option<&dyn Route>,
        previous_route: Option<&dyn Route>,
    ) -> Result<()> {
        self.track(NavigationNotification::Remove {
            route,
            previous_route,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_goes_from_previous_to_pushed() {
        let home = RouteSettings::named("Home");
        let details = RouteSettings::named("Details");

        let transition = Transition::derive(NavigationNotification::Push {
            route: Some(&details),
            previous_route: Some(&home),
        });

        assert_eq!(
            transition,
            Transition {
                from_route: Some("Home".into()),
                to_route: Some("Details".into()),
                navigation_type: NavigationType::Push,
            }
        );
    }

    #[test]
    fn unnamed_route_leaves_field_unset() {
        let unnamed = RouteSettings::unnamed();
        let home = RouteSettings::named("Home");

        let transition = Transition::derive(NavigationNotification::Pop {
            route: Some(&unnamed),
            previous_route: Some(&home),
        });

        assert_eq!(transition.from_route, None);
        assert_eq!(transition.to_route.as_deref(), Some("Home"));
    }

    #[test]
    fn absent_routes_produce_a_transition() {
        let transition = Transition::derive(NavigationNotification::Replace {
            new_route: None,
            old_route: None,
        });
        assert_eq!(transition.from_route, None);
        assert_eq!(transition.to_route, None);
        assert_eq!(transition.navigation_type, NavigationType::Replace);
    }

    #[test]
    fn debug_distinguishes_unnamed_from_absent() {
        let unnamed = RouteSettings::unnamed();
        let notification = NavigationNotification::Remove {
            route: Some(&unnamed),
            previous_route: None,
        };
        assert_eq!(
            format!("{notification:?}"),
            "remove { route: Some(None), previous_route: None }"
        );
    }

    #[test]
    fn transition_converts_into_navigation_payload() {
        let navigation = Navigation::from(Transition {
            from_route: Some("A".into()),
            to_route: None,
            navigation_type: NavigationType::Remove,
        });
        assert_eq!(navigation.from_route.as_deref(), Some("A"));
        assert_eq!(navigation.to_route, None);
        assert_eq!(navigation.duration, None);
    }
}
