pub mod poker;
pub mod setting;
pub mod vacation;
