pub mod apply;
pub mod composer;
pub mod fragment;
