pub mod authmw;
pub mod res_owner;
