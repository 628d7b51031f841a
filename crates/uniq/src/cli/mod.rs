pub mod compare;
pub mod config;
pub mod exif;
pub mod interactive;
pub mod run;
