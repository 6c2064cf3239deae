pub mod financing;
pub mod projection;
pub mod taxation;
