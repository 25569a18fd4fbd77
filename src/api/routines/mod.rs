/*
* Routine endpoints are not registered as individual axum routes: the endpoint
* table can be replaced at runtime, so a fallback handler looks paths up in it.
*/

pub mod handler;

pub use handler::dispatch_handler;
