pub mod config;
pub mod pack;
pub mod run;
pub mod validate;
