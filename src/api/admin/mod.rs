/*
* Admin endpoints: health check and bound endpoint listing.
*/

pub mod handler;
pub mod routes;

pub use routes::{admin_routes, ADMIN_PATHS};
