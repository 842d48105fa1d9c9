pub mod model;
pub mod permission;
pub mod query;
pub mod util;
