pub mod error;
pub mod routes;
pub mod startup;
pub mod state;
pub mod webhook;
pub mod worker;
