pub mod ability;
pub mod ai;
pub mod catalog;
pub mod entity;
pub mod physics;
pub mod rules;
