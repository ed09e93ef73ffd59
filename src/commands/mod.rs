pub mod admin;
pub mod redeem;
