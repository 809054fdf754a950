//! Client for the Fever API served by RSS aggregators such as FreshRSS.
//!
//! ```no_run
//! # async fn demo() -> fever_client::client::Result<()> {
//! use fever_client::client::{ClientConfig, FeverApi};
//!
//! let config = ClientConfig::new("https://freshrss.example.net", "alice", "api-password");
//! let api = FeverApi::connect(config).await?;
//! for item in api.get_unread_items().await? {
//!     println!("{} {}", item.id, item.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod domain;
pub mod id;

pub use client::{ClientConfig, ClientError, FeverApi};
pub use domain::{Feed, Group, Item};
pub use id::{FeedId, GroupId, ItemId};
