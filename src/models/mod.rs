//! Data models for ShareIt

pub mod booking;
pub mod comment;
pub mod item;
pub mod user;
