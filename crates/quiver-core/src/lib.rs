//! Quiver Core - Core types for the Quiver time series client
//!
//! This crate provides the fundamental data types shared by the routing and
//! write path crates:
//! - `Timestamp`: Nanosecond-precision Unix epoch timestamps
//! - `Tag`: Key-value metadata attached to a series
//! - `SeriesIdentity`: Opaque series ID plus its ordered, unique tags
//! - `Datapoint`: A single timestamped value
//! - `NamespaceId`: Cheaply cloneable namespace name
//! - `time`: Duration parsing and formatting helpers used by configuration

pub mod error;
pub mod time;
pub mod types;

pub use error::{CoreError, Result};
pub use types::*;
