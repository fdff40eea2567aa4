//! Stays.net channel integration: the HTTP client, the wire-shape decoder
//! and the entity mappers. The `test-util` feature adds an in-process fake.

pub mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod http;
pub mod mappers;
pub mod payload;

pub use client::{
    CalendarQuery, ChannelClient, ChannelProvider, ChannelResponse, DateType, ReservationLookup,
    ReservationQuery,
};
pub use http::{StaysNetClient, StaysNetProvider};
pub use payload::EntityList;
