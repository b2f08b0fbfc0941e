//! Domain helpers built on top of the [`Bot`](gramkit_core::Bot) API.
//!
//! Each helper is independent: it carries its own policy limits and, where
//! needed, an in-memory cache. Helpers are `Send + Sync` and meant to be
//! shared between handlers behind an `Arc`. Helpers that talk to Telegram
//! take the bot per call (`ctx.bot().as_ref()` inside a handler) and own no
//! client of their own.
//!
//! | Module | Helper | Concern |
//! |--------|--------|---------|
//! | [`media`] | [`MediaHandler`] | download, upload and clean up files |
//! | [`location`] | [`LocationHandler`] | distances, radii, location keyboards |
//! | [`payment`] | [`PaymentHandler`] | invoices and pre-checkout answers |
//! | [`story`] | [`StoryHandler`] | expiring per-user stories |
//! | [`voice_chat`] | [`VoiceChatHandler`] | participants and moderation |
//! | [`topic`] | [`TopicManager`] | forum topics |

pub mod location;
pub mod media;
pub mod payment;
pub mod story;
pub mod voice_chat;
pub mod topic;

pub use location::{LocationHandler, NearbyVenue, haversine_km};
pub use media::{MediaHandler, MediaInfo};
pub use payment::PaymentHandler;
pub use story::{Story, StoryHandler, StoryStats};
pub use topic::{CachedTopic, TopicManager};
pub use voice_chat::{VoiceChatEvent, VoiceChatHandler, VoiceChatStats, Warning};
