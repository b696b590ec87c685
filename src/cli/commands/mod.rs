pub mod check;
pub mod exec;
pub mod verify;
