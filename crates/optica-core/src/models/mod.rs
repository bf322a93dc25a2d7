//! Domain models for the optica system.

mod client;
mod clinical;
mod invoice;
mod money;
mod product;
mod register;
mod user;
mod validation;

pub use client::*;
pub use clinical::*;
pub use invoice::*;
pub use money::*;
pub use product::*;
pub use register::*;
pub use user::*;
pub use validation::*;
