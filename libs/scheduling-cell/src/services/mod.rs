pub mod booking;
pub mod calendar;
pub mod lifecycle;
pub mod notify;
pub mod waitlist;
