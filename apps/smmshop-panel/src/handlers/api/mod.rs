pub mod bot;
pub mod webapp;
