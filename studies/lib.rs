#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod cohort;
pub mod config;
pub mod data;
pub mod evaluate;
pub mod hosseinzahde;
pub mod protocol;
pub mod sadiahmed;
pub mod selection;

#[path = "../learn/mod.rs"]
pub mod learn;
