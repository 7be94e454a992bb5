pub mod access;
pub mod auth;
pub mod calendar;
pub mod clients;
pub mod health;
pub mod shifts;
pub mod staff;
pub mod timesheets;
