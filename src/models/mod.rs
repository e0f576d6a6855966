pub mod qr_record;
pub mod scan;
pub mod tracked_link;
pub mod user;
