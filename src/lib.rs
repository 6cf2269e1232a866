//! Sun-shade controller library.
//!
//! Samples ambient light through a photoresistor on a GPIO pin and moves a
//! motorized shade up or down based on the recent light history, within a
//! daily operating window derived from fixed times or sunrise/sunset.

pub mod config;
pub mod controller;
pub mod error;
pub mod gpio;
pub mod input;
pub mod instance_lock;
pub mod light;
pub mod notify;
pub mod schedule;
pub mod shade;
pub mod storage;
pub mod sun;
