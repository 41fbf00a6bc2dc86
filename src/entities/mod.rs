pub mod audit_log;
pub mod borrow_record;
pub mod category;
pub mod damage_report;
pub mod item;
pub mod project;
pub mod return_record;
pub mod user;
pub mod warranty;
