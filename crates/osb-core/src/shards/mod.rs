//! Sharded data: acquisition, local query access and federated search.

pub mod acquire;
pub mod dispatch;
pub mod registry;
pub mod sink;
pub mod store;
