//! Support library for the `chronicle` binary: configuration, fetch
//! collaborators and the collection driver.

pub mod driver;
pub mod fetch;
pub mod settings;
