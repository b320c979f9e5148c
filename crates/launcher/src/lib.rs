pub mod headless;
pub mod native;
pub mod policy;
pub mod view;
