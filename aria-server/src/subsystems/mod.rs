pub mod dashboard;
pub mod memories;
pub mod tasks;
pub mod users;
