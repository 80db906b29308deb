pub mod anchor;
pub mod hash;
pub mod merkle;
