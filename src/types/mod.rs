//! Core data structures shared across the crate

pub mod event;
pub mod stats;
pub mod user;

pub use event::{ActivityEvent, ApiUsageEvent, HttpMethod, PageViewEvent};
pub use stats::{
    ActivityListItem, EndpointStat, PageInfo, PageViewListItem, Paginated, StatPoint,
};
pub use user::User;
