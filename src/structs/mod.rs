pub mod link_request;
pub mod qr_request;
pub mod user;
