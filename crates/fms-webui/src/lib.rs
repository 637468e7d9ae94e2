mod routes;
mod server;

pub use server::{start, ServerFrame, UiCommand, WebuiConfig};
