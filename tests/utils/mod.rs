#![allow(dead_code)]

pub mod db;
pub mod factories;
pub mod fakes;
pub mod helpers;
