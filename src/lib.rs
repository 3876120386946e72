pub mod booking;
pub mod config;
pub mod limits;
pub mod model;
pub mod observability;
pub mod phone;
pub mod planner;
pub mod store;
pub mod throttle;
pub mod timeline;
