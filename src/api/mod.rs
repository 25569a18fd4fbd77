pub mod admin;
pub mod routines;
