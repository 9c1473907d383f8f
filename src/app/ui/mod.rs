mod controls;
mod details;
mod panels;

pub(in crate::app) use details::DetailsDraft;
