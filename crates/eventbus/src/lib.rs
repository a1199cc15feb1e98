#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Beacon Event Bus
//!
//! Generic single-kind broadcast channels.
//!
//! A [`Channel`] accepts published records and hands a shared copy to every
//! subscriber registered at publish time. Subscribers are independent: each
//! one sees the records in publish order, starting from the moment it
//! subscribed, and dropping one never affects the others.
//!
//! Channels can be closed once. After [`Channel::close`] every publish and
//! subscribe fails with [`ChannelError::Closed`], and active subscribers see
//! end-of-sequence once they have drained what was already delivered.
//!
//! ```
//! use beacon_eventbus::Channel;
//!
//! let channel = Channel::new("ticks", 16);
//! let mut sub = channel.subscribe().unwrap();
//!
//! channel.publish(1_u32).unwrap();
//! assert_eq!(sub.try_recv().unwrap().as_deref(), Some(&1));
//!
//! channel.close();
//! assert!(channel.publish(2).is_err());
//! ```

pub mod channel;
pub mod error;
pub mod subscription;

pub use channel::{Channel, ChannelStats};
pub use error::ChannelError;
pub use subscription::Subscription;
