//! External command inputs.

pub mod mqtt;
