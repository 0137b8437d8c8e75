pub mod listing;
pub mod status;
