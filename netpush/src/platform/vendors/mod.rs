//! Built-in vendor syntax tables.

pub mod huawei_vrp5;
pub mod huawei_vrp8;
pub mod juniper_junos;
