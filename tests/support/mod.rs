#![allow(dead_code)]

pub mod library;
