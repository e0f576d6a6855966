pub mod device;
pub mod hash_ip;
pub mod ip;
pub mod jwt;
