pub mod locomotive;
pub mod server;

pub use locomotive::{Heading, Locomotive, Profile};
pub use server::{reply_for, router, SimConfig, SimState};
